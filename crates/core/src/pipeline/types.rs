use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::control::ServerError;
use crate::dialogue::DialogueError;
use crate::disk::ProvisionError;
use crate::emulator::EmulatorError;
use crate::fetch::FetchError;
use crate::verify::VerifyError;

/// Failure of one stage for one architecture.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{arch}] fetch failed: {source}")]
    Fetch {
        arch: String,
        #[source]
        source: FetchError,
    },

    #[error("[{arch}] verification failed: {source}")]
    Verify {
        arch: String,
        #[source]
        source: VerifyError,
    },

    #[error("[{arch}] cannot prepare {path}: {source}")]
    Workspace {
        arch: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{arch}] disk provisioning failed: {source}")]
    Provision {
        arch: String,
        #[source]
        source: ProvisionError,
    },

    #[error("[{arch}] control server failed: {source}")]
    Server {
        arch: String,
        #[source]
        source: ServerError,
    },

    #[error("[{arch}] emulator failed: {source}")]
    Emulator {
        arch: String,
        #[source]
        source: EmulatorError,
    },

    #[error("[{arch}] console dialogue failed: {source}")]
    Dialogue {
        arch: String,
        #[source]
        source: DialogueError,
    },
}

impl PipelineError {
    /// Architecture the failure belongs to.
    pub fn arch(&self) -> &str {
        match self {
            Self::Fetch { arch, .. }
            | Self::Verify { arch, .. }
            | Self::Workspace { arch, .. }
            | Self::Provision { arch, .. }
            | Self::Server { arch, .. }
            | Self::Emulator { arch, .. }
            | Self::Dialogue { arch, .. } => arch,
        }
    }
}

/// Outcome of a completed build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Architecture that was built.
    pub arch: String,
    /// Dialogue steps executed.
    pub steps: usize,
    /// Wall time of the whole build.
    pub elapsed: Duration,
    /// The uploaded result, if the guest sent one.
    pub result_file: Option<PathBuf>,
    /// Size of the upload; zero when absent or empty.
    pub result_bytes: u64,
}
