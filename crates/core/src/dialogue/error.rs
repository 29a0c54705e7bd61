use std::time::Duration;
use thiserror::Error;

use super::Phase;

/// Errors that abort a dialogue.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// A step's pattern is not a valid regular expression.
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A wait step did not see its pattern in time.
    #[error("Timed out after {waited:?} waiting for {pattern:?} (step {step}, {phase} phase)")]
    Timeout {
        step: usize,
        phase: Phase,
        pattern: String,
        waited: Duration,
    },

    /// The console closed (emulator exited) before the pattern appeared.
    #[error("Console closed while waiting for {pattern:?} (step {step}, {phase} phase)")]
    ConsoleClosed {
        step: usize,
        phase: Phase,
        pattern: String,
    },

    /// Writing to the console failed.
    #[error("Failed to send step {step} ({phase} phase): {source}")]
    Send {
        step: usize,
        phase: Phase,
        #[source]
        source: std::io::Error,
    },
}

impl DialogueError {
    /// Index of the step that failed, if the failure happened while running.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::InvalidPattern { .. } => None,
            Self::Timeout { step, .. } | Self::ConsoleClosed { step, .. } | Self::Send { step, .. } => {
                Some(*step)
            }
        }
    }
}
