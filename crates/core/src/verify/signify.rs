//! signify(1)-based verifier.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{VerifyError, Verifier};
use crate::config::VerifyConfig;
use crate::target::{Release, Target, SIGNATURE_FILE};

/// Runs `signify -C` (or a compatible tool) for every non-metadata artifact.
pub struct SignifyVerifier {
    config: VerifyConfig,
    /// Files the mirror may lack; only these may be absent locally.
    optional_files: Vec<String>,
}

impl SignifyVerifier {
    pub fn new(config: VerifyConfig, optional_files: Vec<String>) -> Self {
        Self {
            config,
            optional_files,
        }
    }

    fn is_optional(&self, file: &str) -> bool {
        self.optional_files.iter().any(|f| f == file)
    }

    fn build_args(&self, release: &Release, file: &str) -> Vec<String> {
        vec![
            "-C".to_string(),
            "-p".to_string(),
            self.config
                .key_dir
                .join(release.signing_key_name())
                .to_string_lossy()
                .to_string(),
            "-x".to_string(),
            SIGNATURE_FILE.to_string(),
            file.to_string(),
        ]
    }

    async fn verify_file(&self, dir: &Path, release: &Release, file: &str) -> Result<(), VerifyError> {
        let output = Command::new(&self.config.program)
            .args(self.build_args(release, file))
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VerifyError::ToolNotFound {
                        path: self.config.program.clone(),
                    }
                } else {
                    VerifyError::Io(e)
                }
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            text.push_str(&format!("exit status: {:?}", output.status.code()));
            return Err(VerifyError::Failed {
                file: file.to_string(),
                output: text,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Verifier for SignifyVerifier {
    async fn verify(&self, target: &Target, release: &Release) -> Result<(), VerifyError> {
        let dir = target.work_dir();
        for file in target.artifacts().verifiable() {
            if !tokio::fs::try_exists(dir.join(file)).await? {
                if self.is_optional(file) {
                    debug!(arch = target.arch(), file, "Optional file absent, skipping verification");
                    continue;
                }
                return Err(VerifyError::Missing {
                    file: file.to_string(),
                    arch: target.arch().to_string(),
                });
            }
            info!(arch = target.arch(), file, "Verifying");
            self.verify_file(dir, release, file).await?;
        }
        Ok(())
    }
}
