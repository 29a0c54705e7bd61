//! Signature verification of fetched artifacts.

mod signify;

pub use signify::SignifyVerifier;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::target::{Release, Target};

/// Errors that can occur during verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Verification tool not found.
    #[error("Verification tool not found: {path}")]
    ToolNotFound { path: PathBuf },

    /// The tool rejected a file.
    #[error("Verification of {file:?} failed!\n{output}")]
    Failed { file: String, output: String },

    /// A required artifact is not in the working directory.
    #[error("Can't verify {file:?} for {arch:?}: file is missing")]
    Missing { file: String, arch: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checks a target's artifacts against the release's signed checksum list.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, target: &Target, release: &Release) -> Result<(), VerifyError>;
}
