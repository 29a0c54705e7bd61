//! Pipeline runner.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BuildReport, PipelineError};
use crate::config::Config;
use crate::control::{ControlServer, ControlSession};
use crate::dialogue::{buildlet_script, DialogueEngine, DialogueReport, ScriptParams};
use crate::disk::Provisioner;
use crate::emulator::Emulator;
use crate::fetch::Fetcher;
use crate::target::{Release, Target, TargetRegistry};
use crate::verify::Verifier;

/// Drives every target of a registry through fetch, verify and build.
pub struct Pipeline<F, V, P> {
    config: Config,
    fetcher: F,
    verifier: V,
    provisioner: P,
    emulator: Emulator,
}

impl<F, V, P> Pipeline<F, V, P>
where
    F: Fetcher,
    V: Verifier,
    P: Provisioner,
{
    pub fn new(config: Config, fetcher: F, verifier: V, provisioner: P) -> Self {
        let emulator = Emulator::new(config.emulator.clone());
        Self {
            config,
            fetcher,
            verifier,
            provisioner,
            emulator,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Runs all targets in registry order, stopping at the first failure.
    pub async fn run(&self, registry: &TargetRegistry) -> Result<Vec<BuildReport>, PipelineError> {
        let release = registry.release();
        info!(release = %release, targets = registry.len(), "Starting pipeline");

        let mut reports = Vec::with_capacity(registry.len());
        for target in registry.iter() {
            self.prepare(target, release).await?;
            reports.push(self.build(target).await?);
        }

        info!(builds = reports.len(), "Pipeline finished");
        Ok(reports)
    }

    /// Fetches and verifies a target's artifacts.
    pub async fn prepare(&self, target: &Target, release: &Release) -> Result<(), PipelineError> {
        let arch = target.arch();

        info!(arch, "Fetching artifacts");
        let fetched = self
            .fetcher
            .fetch(target, release)
            .await
            .map_err(|source| PipelineError::Fetch {
                arch: arch.to_string(),
                source,
            })?;
        debug!(
            arch,
            downloaded = fetched.downloaded.len(),
            reused = fetched.reused.len(),
            skipped = ?fetched.skipped,
            "Fetch complete"
        );

        info!(arch, "Verifying artifacts");
        self.verifier
            .verify(target, release)
            .await
            .map_err(|source| PipelineError::Verify {
                arch: arch.to_string(),
                source,
            })
    }

    /// Boots, installs and runs the workload for one target.
    ///
    /// The control server is listening before the emulator starts and is
    /// stopped before this returns, whatever the outcome.
    pub async fn build(&self, target: &Target) -> Result<BuildReport, PipelineError> {
        let arch = target.arch();
        let started = Instant::now();
        info!(arch, pkg_arch = target.pkg_arch(), go_arch = target.go_arch(), "Building");

        let session = ControlSession::for_target(target, &self.config.workload.result_file);
        let result_file = session.result_file.clone();
        prepare_workspace(target.work_dir(), &result_file)
            .await
            .map_err(|source| PipelineError::Workspace {
                arch: arch.to_string(),
                path: target.work_dir().to_path_buf(),
                source,
            })?;

        let addr = SocketAddr::new(self.config.server.bind, self.config.server.port);
        let server = ControlServer::start(addr, session)
            .await
            .map_err(|source| PipelineError::Server {
                arch: arch.to_string(),
                source,
            })?;

        let outcome = self.run_guest(target).await;
        server.shutdown().await;
        let dialogue = outcome?;

        let (result_file, result_bytes) = inspect_result(&result_file).await;
        match (&result_file, result_bytes) {
            (None, _) => warn!(arch, "Guest finished without uploading a result"),
            (Some(path), 0) => warn!(arch, path = %path.display(), "Guest uploaded an empty result"),
            (Some(path), bytes) => info!(arch, path = %path.display(), bytes, "Result received"),
        }

        let elapsed = started.elapsed();
        info!(arch, steps = dialogue.steps, elapsed_secs = elapsed.as_secs(), "Build complete");
        Ok(BuildReport {
            arch: arch.to_string(),
            steps: dialogue.steps,
            elapsed,
            result_file,
            result_bytes,
        })
    }

    /// Disk, emulator and dialogue. The emulator is terminated on every path
    /// once it has been launched.
    async fn run_guest(&self, target: &Target) -> Result<DialogueReport, PipelineError> {
        let arch = target.arch();

        let disk = self
            .provisioner
            .provision(target)
            .await
            .map_err(|source| PipelineError::Provision {
                arch: arch.to_string(),
                source,
            })?;
        if !disk.seeded {
            warn!(arch, path = %disk.path.display(), "Disk was not seeded with the installer");
        }

        let server = self.config.server.guest_address();
        let script = buildlet_script(&ScriptParams {
            go_arch: target.go_arch(),
            server: &server,
            install_timeout: self.config.emulator.install_timeout(),
            workload: &self.config.workload,
        })
        .map_err(|source| PipelineError::Dialogue {
            arch: arch.to_string(),
            source,
        })?;
        let engine = DialogueEngine::new(script);

        let mut session =
            self.emulator
                .launch(target.emulator_args())
                .map_err(|source| PipelineError::Emulator {
                    arch: arch.to_string(),
                    source,
                })?;
        let deadline = session.deadline();
        let outcome = engine.run(session.console_mut(), deadline).await;

        match session.terminate().await {
            Ok(status) => debug!(arch, %status, "Emulator stopped"),
            Err(e) => warn!(arch, error = %e, "Failed to stop emulator cleanly"),
        }

        outcome.map_err(|source| PipelineError::Dialogue {
            arch: arch.to_string(),
            source,
        })
    }
}

/// Creates the working directory and clears a result left by an earlier run,
/// so a stale upload is never reported as this build's.
async fn prepare_workspace(work_dir: &Path, result_file: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(work_dir).await?;
    match tokio::fs::remove_file(result_file).await {
        Ok(()) => {
            debug!(path = %result_file.display(), "Removed previous result");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn inspect_result(path: &Path) -> (Option<PathBuf>, u64) {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => (Some(path.to_path_buf()), meta.len()),
        _ => (None, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_workspace_clears_stale_result() {
        let temp = TempDir::new().unwrap();
        let work_dir = temp.path().join("7.4").join("amd64");
        let result = work_dir.join("sys.diff.b64");

        prepare_workspace(&work_dir, &result).await.unwrap();
        assert!(work_dir.is_dir());

        std::fs::write(&result, "old").unwrap();
        prepare_workspace(&work_dir, &result).await.unwrap();
        assert!(!result.exists());
    }

    #[tokio::test]
    async fn test_inspect_result() {
        let temp = TempDir::new().unwrap();
        let result = temp.path().join("sys.diff.b64");

        assert_eq!(inspect_result(&result).await, (None, 0));

        std::fs::write(&result, "").unwrap();
        assert_eq!(inspect_result(&result).await, (Some(result.clone()), 0));

        std::fs::write(&result, "ZGlmZg==").unwrap();
        assert_eq!(inspect_result(&result).await, (Some(result.clone()), 8));
    }
}
