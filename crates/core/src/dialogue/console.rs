//! Bidirectional text console over a pair of byte streams.

use regex_lite::Regex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// Unmatched output kept for matching; older output is dropped first.
const MAX_BUFFERED: usize = 64 * 1024;

/// Where a copy of the console output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleMirror {
    /// Echo to the operator's terminal.
    #[default]
    Terminal,
    /// Drop it.
    Discard,
}

impl ConsoleMirror {
    pub fn from_echo(echo: bool) -> Self {
        if echo {
            Self::Terminal
        } else {
            Self::Discard
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Timed out waiting for console output")]
    Timeout,

    #[error("Console closed")]
    Closed,
}

/// A console attached to a reader (guest output) and a writer (guest input).
///
/// Output is pumped by a background task into an unbounded channel, with an
/// optional second copy to the mirror, so a slow terminal never holds back
/// pattern matching.
pub struct Console {
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    input: Box<dyn AsyncWrite + Send + Unpin>,
    buffer: String,
    tasks: Vec<JoinHandle<()>>,
}

impl Console {
    pub fn attach<R, W>(reader: R, writer: W, mirror: ConsoleMirror) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (output_tx, output) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(2);

        let mirror_tx = match mirror {
            ConsoleMirror::Terminal => {
                let (tx, rx) = mpsc::unbounded_channel();
                tasks.push(tokio::spawn(mirror_to_stdout(rx)));
                Some(tx)
            }
            ConsoleMirror::Discard => None,
        };
        tasks.push(tokio::spawn(pump(reader, output_tx, mirror_tx)));

        Self {
            output,
            input: Box::new(writer),
            buffer: String::new(),
            tasks,
        }
    }

    /// Waits until `pattern` matches the accumulated output or `deadline` passes.
    ///
    /// Output up to the end of the match is consumed and returned, so the next
    /// wait only sees what came after it.
    pub async fn expect(&mut self, pattern: &Regex, deadline: Instant) -> Result<String, ConsoleError> {
        loop {
            if let Some(end) = pattern.find(&self.buffer).map(|m| m.end()) {
                return Ok(self.buffer.drain(..end).collect());
            }

            match timeout_at(deadline, self.output.recv()).await {
                Ok(Some(chunk)) => self.append(&chunk),
                Ok(None) => return Err(ConsoleError::Closed),
                Err(_) => return Err(ConsoleError::Timeout),
            }
        }
    }

    /// Writes `text` verbatim; does not wait for any response.
    pub async fn send(&mut self, text: &str) -> std::io::Result<()> {
        self.input.write_all(text.as_bytes()).await?;
        self.input.flush().await
    }

    /// Output received but not yet consumed by a match.
    pub fn unmatched(&self) -> &str {
        &self.buffer
    }

    fn append(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        if self.buffer.len() > MAX_BUFFERED {
            let mut cut = self.buffer.len() - MAX_BUFFERED;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn pump<R>(
    mut reader: R,
    output: mpsc::UnboundedSender<Vec<u8>>,
    mirror: Option<mpsc::UnboundedSender<Vec<u8>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = buf[..n].to_vec();
                if let Some(ref mirror) = mirror {
                    let _ = mirror.send(chunk.clone());
                }
                if output.send(chunk).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "Console read failed");
                break;
            }
        }
    }
}

async fn mirror_to_stdout(mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = rx.recv().await {
        if stdout.write_all(&chunk).await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, split, AsyncBufReadExt, BufReader};

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_expect_across_chunks() {
        let (ours, mut guest) = duplex(1024);
        let (r, w) = split(ours);
        let mut console = Console::attach(r, w, ConsoleMirror::Discard);

        guest.write_all(b"OpenBSD/amd64 BOOT 3.65\nbo").await.unwrap();
        guest.write_all(b"ot>").await.unwrap();

        let pattern = Regex::new("boot>$").unwrap();
        let matched = console.expect(&pattern, soon()).await.unwrap();
        assert!(matched.ends_with("boot>"));
        assert!(console.unmatched().is_empty());
    }

    #[tokio::test]
    async fn test_match_consumes_output() {
        let (ours, mut guest) = duplex(1024);
        let (r, w) = split(ours);
        let mut console = Console::attach(r, w, ConsoleMirror::Discard);

        guest.write_all(b"login: trailing").await.unwrap();
        let pattern = Regex::new("login:").unwrap();
        assert_eq!(console.expect(&pattern, soon()).await.unwrap(), "login:");
        assert_eq!(console.unmatched(), " trailing");

        // Same pattern again needs fresh output
        let result = console
            .expect(&pattern, Instant::now() + Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(ConsoleError::Timeout)));
        assert_eq!(console.unmatched(), " trailing");
    }

    #[tokio::test]
    async fn test_expect_reports_closed() {
        let (ours, mut guest) = duplex(1024);
        let (r, w) = split(ours);
        let mut console = Console::attach(r, w, ConsoleMirror::Discard);

        guest.write_all(b"panic: no root").await.unwrap();
        drop(guest);

        let pattern = Regex::new("login:").unwrap();
        let result = console.expect(&pattern, soon()).await;
        assert!(matches!(result, Err(ConsoleError::Closed)));
    }

    #[tokio::test]
    async fn test_send_writes_verbatim() {
        let (ours, guest) = duplex(1024);
        let (r, w) = split(ours);
        let mut console = Console::attach(r, w, ConsoleMirror::Discard);

        console.send("set tty com0\n").await.unwrap();

        let mut lines = BufReader::new(guest).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "set tty com0");
    }

    #[tokio::test]
    async fn test_buffer_is_bounded() {
        let (ours, mut guest) = duplex(8192);
        let (r, w) = split(ours);
        let mut console = Console::attach(r, w, ConsoleMirror::Discard);

        let writer = tokio::spawn(async move {
            let noise = vec![b'.'; 4096];
            for _ in 0..40 {
                guest.write_all(&noise).await.unwrap();
            }
            guest.write_all(b"done#").await.unwrap();
            guest
        });

        let pattern = Regex::new("done#").unwrap();
        let matched = console.expect(&pattern, soon()).await.unwrap();
        assert!(matched.len() <= MAX_BUFFERED);
        assert!(matched.ends_with("done#"));
        writer.await.unwrap();
    }
}
