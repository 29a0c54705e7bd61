//! Launches the emulator and owns its lifetime.

use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info};

use super::EmulatorError;
use crate::config::EmulatorConfig;
use crate::dialogue::{Console, ConsoleMirror};

/// Starts emulator processes with their console attached to stdio.
pub struct Emulator {
    config: EmulatorConfig,
}

impl Emulator {
    pub fn new(config: EmulatorConfig) -> Self {
        Self { config }
    }

    /// Spawns `command` (program first) and attaches its console.
    ///
    /// The session deadline starts counting at spawn.
    pub fn launch(&self, command: &[String]) -> Result<EmulatorSession, EmulatorError> {
        let (program, args) = command.split_first().ok_or(EmulatorError::EmptyCommand)?;
        let mirror = ConsoleMirror::from_echo(self.config.echo_console);

        info!(program = %program, args = ?args, "Launching emulator");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(match mirror {
                ConsoleMirror::Terminal => Stdio::inherit(),
                ConsoleMirror::Discard => Stdio::null(),
            })
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EmulatorError::NotFound {
                        program: program.clone(),
                    }
                } else {
                    EmulatorError::Spawn {
                        program: program.clone(),
                        source: e,
                    }
                }
            })?;

        let stdin = child.stdin.take().ok_or(EmulatorError::ConsoleUnavailable)?;
        let stdout = child.stdout.take().ok_or(EmulatorError::ConsoleUnavailable)?;

        Ok(EmulatorSession {
            console: Console::attach(stdout, stdin, mirror),
            child,
            deadline: Instant::now() + self.config.session_timeout(),
        })
    }
}

/// A running emulator and its console.
///
/// Dropping the session kills the process; [`EmulatorSession::terminate`]
/// does the same and also reaps it.
pub struct EmulatorSession {
    console: Console,
    child: Child,
    deadline: Instant,
}

impl EmulatorSession {
    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    /// End of the session's overall time budget.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kills the emulator if it is still running and waits for it to exit.
    pub async fn terminate(mut self) -> Result<ExitStatus, EmulatorError> {
        if let Some(status) = self.child.try_wait()? {
            debug!(?status, "Emulator already exited");
            return Ok(status);
        }
        self.child.start_kill()?;
        let status = self.child.wait().await?;
        info!(?status, "Emulator terminated");
        Ok(status)
    }
}
