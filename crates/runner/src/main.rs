use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obsdbuild_core::{
    load_config, load_config_from_env, validate_config, Config, MirrorFetcher, Pipeline,
    QemuImgProvisioner, Release, SignifyVerifier, TargetRegistry,
};

/// Config file used when `OBSDBUILD_CONFIG` is not set.
const DEFAULT_CONFIG_FILE: &str = "obsdbuild.toml";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(version), None) = (args.next(), args.next()) else {
        bail!("usage: obsdbuild <openbsd_release>");
    };

    let release = Release::parse(&version)
        .with_context(|| format!("Invalid release {:?}", version))?;

    let config = load()?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(
        architectures = ?config.architectures,
        dest_root = %config.paths.dest_root.display(),
        "Configuration loaded"
    );

    let registry =
        TargetRegistry::builtin(&config, &release).context("Failed to build target table")?;

    let fetcher = MirrorFetcher::new(config.mirror.clone()).context("Failed to create fetcher")?;
    let verifier =
        SignifyVerifier::new(config.verify.clone(), config.mirror.optional_files.clone());
    let provisioner = QemuImgProvisioner::new(config.disk.clone());
    let pipeline = Pipeline::new(config, fetcher, verifier, provisioner);

    let reports = pipeline.run(&registry).await?;
    for report in &reports {
        match &report.result_file {
            Some(path) => info!(
                arch = %report.arch,
                path = %path.display(),
                bytes = report.result_bytes,
                "Result"
            ),
            None => info!(arch = %report.arch, "No result uploaded"),
        }
    }

    Ok(())
}

/// `OBSDBUILD_CONFIG` must exist when set; the default file is optional.
fn load() -> Result<Config> {
    if let Ok(path) = std::env::var("OBSDBUILD_CONFIG") {
        let path = PathBuf::from(path);
        info!("Loading configuration from {:?}", path);
        return load_config(&path).with_context(|| format!("Failed to load config from {:?}", path));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
    } else {
        info!("No configuration file, using defaults and environment");
        load_config_from_env().context("Failed to load config from environment")
    }
}
