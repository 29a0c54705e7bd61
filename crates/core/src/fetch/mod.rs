//! Retrieval of release artifacts from a mirror into a target's working directory.

mod mirror;

pub use mirror::MirrorFetcher;

use async_trait::async_trait;
use thiserror::Error;

use crate::target::{Release, Target};

/// Errors that can occur while fetching artifacts.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Can't find {file:?} for {arch:?}")]
    NotFound { file: String, arch: String },

    #[error("Mirror returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// What a fetch did, per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Files downloaded in this run.
    pub downloaded: Vec<String>,
    /// Files already present locally.
    pub reused: Vec<String>,
    /// Optional files the mirror does not carry.
    pub skipped: Vec<String>,
}

/// Ensures every artifact of a target exists locally.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &Target, release: &Release) -> Result<FetchReport, FetchError>;
}
