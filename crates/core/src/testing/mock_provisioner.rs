//! Mock provisioner for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::disk::{DiskImage, ProvisionError, Provisioner};
use crate::target::Target;

/// Mock implementation of the Provisioner trait.
///
/// Creates an empty file at the target's disk path instead of a real image,
/// so emulator stand-ins can still find it.
#[derive(Debug, Default, Clone)]
pub struct MockProvisioner {
    provisioned: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<ProvisionError>>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_next_error(&self, error: ProvisionError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn provisioned(&self) -> Vec<String> {
        self.provisioned.read().await.clone()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn provision(&self, target: &Target) -> Result<DiskImage, ProvisionError> {
        self.provisioned.write().await.push(target.arch().to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let path = target.disk_image().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, b"").await?;

        Ok(DiskImage {
            path,
            size_bytes: 0,
            seeded: true,
        })
    }
}
