//! Mock verifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::target::{Release, Target};
use crate::verify::{Verifier, VerifyError};

/// Mock implementation of the Verifier trait.
#[derive(Debug, Default, Clone)]
pub struct MockVerifier {
    verified: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<VerifyError>>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_next_error(&self, error: VerifyError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn verified(&self) -> Vec<String> {
        self.verified.read().await.clone()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn verify(&self, target: &Target, _release: &Release) -> Result<(), VerifyError> {
        self.verified.write().await.push(target.arch().to_string());

        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
