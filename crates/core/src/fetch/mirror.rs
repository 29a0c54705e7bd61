//! HTTP mirror fetcher.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{FetchError, FetchReport, Fetcher};
use crate::config::MirrorConfig;
use crate::target::{Release, Target, SIGNATURE_FILE};

/// Downloads artifacts from `<mirror>/<version>/<arch>/<file>`.
pub struct MirrorFetcher {
    client: Client,
    config: MirrorConfig,
}

impl MirrorFetcher {
    pub fn new(config: MirrorConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Request {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn file_url(&self, release: &Release, arch: &str, file: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.url.trim_end_matches('/'),
            release.version(),
            arch,
            file
        )
    }

    fn is_optional(&self, file: &str) -> bool {
        self.config.optional_files.iter().any(|f| f == file)
    }

    /// Downloads `url` to `dest`; returns `Ok(false)` on 404.
    ///
    /// The body is written to a `.part` sibling and renamed into place once complete.
    async fn download(&self, url: &str, dest: &Path) -> Result<bool, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self.client.get(url).send().await.map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = Path::new(&partial);

        let mut out = File::create(partial).await?;
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        drop(out);

        fs::rename(partial, dest).await?;
        Ok(true)
    }
}

#[async_trait]
impl Fetcher for MirrorFetcher {
    async fn fetch(&self, target: &Target, release: &Release) -> Result<FetchReport, FetchError> {
        let out_dir = target.work_dir();
        fs::create_dir_all(out_dir).await?;

        let mut report = FetchReport::default();
        for file in target.artifacts().iter() {
            let path = out_dir.join(file);
            // The signature is always refreshed; everything else only when missing
            if file != SIGNATURE_FILE && fs::try_exists(&path).await? {
                debug!(arch = target.arch(), file, "Already present");
                report.reused.push(file.to_string());
                continue;
            }

            let url = self.file_url(release, target.arch(), file);
            info!(arch = target.arch(), file, "Fetching");

            if self.download(&url, &path).await? {
                report.downloaded.push(file.to_string());
            } else if self.is_optional(file) {
                info!(arch = target.arch(), file, "Skipping optional file missing on mirror");
                report.skipped.push(file.to_string());
            } else {
                return Err(FetchError::NotFound {
                    file: file.to_string(),
                    arch: target.arch().to_string(),
                });
            }
        }

        Ok(report)
    }
}
