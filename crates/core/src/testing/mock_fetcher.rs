//! Mock fetcher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::fetch::{FetchError, FetchReport, Fetcher};
use crate::target::{Release, Target};

/// Mock implementation of the Fetcher trait.
///
/// Records the architectures it was asked for and reports every artifact as
/// already present. Nothing is written to disk.
#[derive(Debug, Default, Clone)]
pub struct MockFetcher {
    fetched: Arc<RwLock<Vec<String>>>,
    /// If set, the next fetch fails with this error.
    next_error: Arc<RwLock<Option<FetchError>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Architectures fetched so far, in call order.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, target: &Target, _release: &Release) -> Result<FetchReport, FetchError> {
        self.fetched.write().await.push(target.arch().to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(FetchReport {
            reused: target.artifacts().iter().map(str::to_string).collect(),
            ..FetchReport::default()
        })
    }
}
