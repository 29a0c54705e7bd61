//! Boot disk provisioning.
//!
//! Creating the raw image is a hard requirement of a build. Seeding it with
//! the installer miniroot is best-effort: the failure is logged and reported
//! through [`DiskImage::seeded`], because some setups ship an image that
//! already carries the installer.

mod qemu_img;

pub use qemu_img::QemuImgProvisioner;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::target::Target;

/// Errors that can occur while provisioning a disk.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Image tool not found.
    #[error("Disk image tool not found: {path}")]
    ToolNotFound { path: PathBuf },

    /// Image creation failed.
    #[error("Image creation failed for {path}: {reason}")]
    ImageCreation { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A provisioned boot disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskImage {
    /// Location of the raw image.
    pub path: PathBuf,
    /// Apparent size, independent of how much was overlaid.
    pub size_bytes: u64,
    /// Whether the installer image was copied onto the disk.
    pub seeded: bool,
}

/// Produces the writable boot disk for a target.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, target: &Target) -> Result<DiskImage, ProvisionError>;
}
