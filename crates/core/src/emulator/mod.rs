//! Emulator process supervision.

mod supervisor;

pub use supervisor::{Emulator, EmulatorSession};

use thiserror::Error;

/// Errors that can occur while launching or stopping the emulator.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Emulator command is empty")]
    EmptyCommand,

    #[error("Emulator not found: {program}")]
    NotFound { program: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Emulator console streams were not captured")]
    ConsoleUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
