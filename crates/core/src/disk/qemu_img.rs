//! qemu-img + dd provisioner.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

use super::{DiskImage, ProvisionError, Provisioner};
use crate::config::DiskConfig;
use crate::target::Target;

/// Creates a fully preallocated raw image with `qemu-img` and overlays the
/// miniroot with a non-truncating `dd`.
pub struct QemuImgProvisioner {
    config: DiskConfig,
}

impl QemuImgProvisioner {
    pub fn new(config: DiskConfig) -> Self {
        Self { config }
    }

    fn create_args(&self, image: &Path) -> Vec<String> {
        vec![
            "create".to_string(),
            "-f".to_string(),
            "raw".to_string(),
            "-o".to_string(),
            "preallocation=full".to_string(),
            image.to_string_lossy().to_string(),
            format!("{}M", self.config.size_mb),
        ]
    }

    fn seed_args(miniroot: &Path, image: &Path) -> Vec<String> {
        vec![
            "conv=notrunc".to_string(),
            format!("if={}", miniroot.display()),
            format!("of={}", image.display()),
        ]
    }

    async fn create_image(&self, image: &Path) -> Result<(), ProvisionError> {
        let output = Command::new(&self.config.qemu_img)
            .args(self.create_args(image))
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProvisionError::ToolNotFound {
                        path: self.config.qemu_img.clone(),
                    }
                } else {
                    ProvisionError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProvisionError::ImageCreation {
                path: image.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Returns whether the overlay succeeded; failures are logged, not raised.
    async fn seed_image(&self, miniroot: &Path, image: &Path) -> bool {
        let result = Command::new(&self.config.dd)
            .args(Self::seed_args(miniroot, image))
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                warn!(
                    miniroot = %miniroot.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Installer overlay failed, booting the disk as created"
                );
                false
            }
            Err(e) => {
                warn!(
                    miniroot = %miniroot.display(),
                    error = %e,
                    "Could not run dd, booting the disk as created"
                );
                false
            }
        }
    }
}

#[async_trait]
impl Provisioner for QemuImgProvisioner {
    async fn provision(&self, target: &Target) -> Result<DiskImage, ProvisionError> {
        let image = target.disk_image();
        if let Some(parent) = image.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(arch = target.arch(), image = %image.display(), size_mb = self.config.size_mb, "Creating disk image");
        self.create_image(image).await?;

        let miniroot = target.work_dir().join(target.artifacts().miniroot());
        let seeded = self.seed_image(&miniroot, image).await;

        let size_bytes = tokio::fs::metadata(image).await?.len();
        Ok(DiskImage {
            path: image.to_path_buf(),
            size_bytes,
            seeded,
        })
    }
}
