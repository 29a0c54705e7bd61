//! Sequential interpreter for dialogue scripts.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::console::{Console, ConsoleError};
use super::{DialogueError, DialogueScript, DialogueStep, Phase};

/// Tail of unmatched output included in timeout logs.
const TAIL_CHARS: usize = 240;

/// Outcome of a completed dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueReport {
    pub steps: usize,
    pub elapsed: Duration,
}

/// Runs a [`DialogueScript`] against a [`Console`].
pub struct DialogueEngine {
    script: DialogueScript,
}

impl DialogueEngine {
    pub fn new(script: DialogueScript) -> Self {
        Self { script }
    }

    pub fn script(&self) -> &DialogueScript {
        &self.script
    }

    /// Executes every step in order. A wait without its own budget may use
    /// the time left until `deadline`; one with a budget is still capped by it.
    pub async fn run(
        &self,
        console: &mut Console,
        deadline: Instant,
    ) -> Result<DialogueReport, DialogueError> {
        let started = Instant::now();
        let mut current: Option<Phase> = None;

        for (step, (phase, action)) in self.script.steps().enumerate() {
            if current != Some(phase) {
                info!(%phase, step, "Dialogue entering phase");
                current = Some(phase);
            }

            match action {
                DialogueStep::WaitFor { pattern, timeout } => {
                    let now = Instant::now();
                    let step_deadline = match timeout {
                        Some(budget) => (now + *budget).min(deadline),
                        None => deadline,
                    };
                    debug!(step, pattern = pattern.as_str(), "Waiting");

                    if let Err(e) = console.expect(pattern, step_deadline).await {
                        return Err(match e {
                            ConsoleError::Timeout => {
                                warn!(
                                    step,
                                    %phase,
                                    pattern = pattern.as_str(),
                                    tail = %tail(console.unmatched()),
                                    "Console wait timed out"
                                );
                                DialogueError::Timeout {
                                    step,
                                    phase,
                                    pattern: pattern.as_str().to_string(),
                                    waited: step_deadline.saturating_duration_since(now),
                                }
                            }
                            ConsoleError::Closed => DialogueError::ConsoleClosed {
                                step,
                                phase,
                                pattern: pattern.as_str().to_string(),
                            },
                        });
                    }
                }
                DialogueStep::Send(text) => {
                    debug!(step, text = text.trim_end(), "Sending");
                    console
                        .send(text)
                        .await
                        .map_err(|source| DialogueError::Send { step, phase, source })?;
                }
            }
        }

        let elapsed = started.elapsed();
        info!(steps = self.script.len(), ?elapsed, "Dialogue complete");
        Ok(DialogueReport {
            steps: self.script.len(),
            elapsed,
        })
    }
}

fn tail(text: &str) -> String {
    let skip = text.chars().count().saturating_sub(TAIL_CHARS);
    text.chars().skip(skip).collect()
}
