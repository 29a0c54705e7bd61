use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{ArtifactSet, Release};
use crate::config::{Config, EmulatorConfig};

/// Token in the embedded response files replaced by the control server's guest-visible address.
pub const SERVER_PLACEHOLDER: &str = "@SERVER@";

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Unknown architecture: {0}")]
    UnknownArch(String),

    #[error("Emulator command for {arch} is empty")]
    EmptyCommand { arch: String },

    #[error("Emulator command for {arch} does not reference disk image {disk}")]
    DiskNotReferenced { arch: String, disk: PathBuf },
}

/// Static description of one supported architecture.
struct ArchSpec {
    arch: &'static str,
    pkg_arch: &'static str,
    go_arch: &'static str,
    emulator: &'static str,
    machine_args: &'static [&'static str],
    smp: bool,
    install_script: &'static str,
}

const ARCH_TABLE: &[ArchSpec] = &[
    ArchSpec {
        arch: "amd64",
        pkg_arch: "amd64",
        go_arch: "amd64",
        emulator: "qemu-system-x86_64",
        machine_args: &[],
        smp: true,
        install_script: include_str!("../../autoinstall/amd64-autoinstall.conf"),
    },
    ArchSpec {
        arch: "arm64",
        pkg_arch: "aarch64",
        go_arch: "arm64",
        emulator: "qemu-system-aarch64",
        machine_args: &["-M", "virt", "-cpu", "cortex-a57"],
        smp: true,
        install_script: include_str!("../../autoinstall/arm64-autoinstall.conf"),
    },
    ArchSpec {
        arch: "armv7",
        pkg_arch: "arm",
        go_arch: "arm",
        emulator: "qemu-system-arm",
        machine_args: &[],
        smp: false,
        install_script: include_str!("../../autoinstall/armv7-autoinstall.conf"),
    },
    ArchSpec {
        arch: "i386",
        pkg_arch: "i386",
        go_arch: "386",
        emulator: "qemu-system-i386",
        machine_args: &[],
        smp: true,
        install_script: include_str!("../../autoinstall/i386-autoinstall.conf"),
    },
    ArchSpec {
        arch: "octeon",
        pkg_arch: "mips64",
        go_arch: "mips64",
        emulator: "qemu-system-mips64",
        machine_args: &[],
        smp: true,
        install_script: include_str!("../../autoinstall/octeon-autoinstall.conf"),
    },
    ArchSpec {
        arch: "riscv64",
        pkg_arch: "riscv64",
        go_arch: "riscv64",
        emulator: "qemu-system-riscv64",
        machine_args: &[],
        smp: false,
        install_script: include_str!("../../autoinstall/riscv64-autoinstall.conf"),
    },
];

fn lookup(arch: &str) -> Option<&'static ArchSpec> {
    ARCH_TABLE.iter().find(|s| s.arch == arch)
}

/// Whether `arch` is in the built-in architecture table.
pub fn is_known_arch(arch: &str) -> bool {
    lookup(arch).is_some()
}

/// One guest architecture to fetch, verify and build.
#[derive(Debug, Clone)]
pub struct Target {
    arch: String,
    pkg_arch: String,
    go_arch: String,
    work_dir: PathBuf,
    disk_image: PathBuf,
    emulator_args: Vec<String>,
    artifacts: ArtifactSet,
    install_script: String,
}

impl Target {
    /// Creates a target, checking that the emulator command boots `disk_image`.
    ///
    /// Package and build architecture tokens default to `arch`.
    pub fn new(
        arch: impl Into<String>,
        work_dir: PathBuf,
        disk_image: PathBuf,
        emulator_args: Vec<String>,
        artifacts: ArtifactSet,
        install_script: impl Into<String>,
    ) -> Result<Self, TargetError> {
        let arch = arch.into();
        if emulator_args.is_empty() {
            return Err(TargetError::EmptyCommand { arch });
        }

        let disk = disk_image.to_string_lossy();
        if !emulator_args.iter().any(|a| a.contains(disk.as_ref())) {
            return Err(TargetError::DiskNotReferenced {
                arch,
                disk: disk_image,
            });
        }

        Ok(Self {
            pkg_arch: arch.clone(),
            go_arch: arch.clone(),
            arch,
            work_dir,
            disk_image,
            emulator_args,
            artifacts,
            install_script: install_script.into(),
        })
    }

    pub fn with_arch_tokens(mut self, pkg_arch: impl Into<String>, go_arch: impl Into<String>) -> Self {
        self.pkg_arch = pkg_arch.into();
        self.go_arch = go_arch.into();
        self
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Architecture name used by the guest's package tools (what `%m` in
    /// `PKG_PATH` resolves to). Reported in build logs.
    pub fn pkg_arch(&self) -> &str {
        &self.pkg_arch
    }

    /// `GOARCH` value for the guest.
    pub fn go_arch(&self) -> &str {
        &self.go_arch
    }

    /// Directory holding this target's artifacts, disk image and upload.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn disk_image(&self) -> &Path {
        &self.disk_image
    }

    /// Full emulator command line, program first.
    pub fn emulator_args(&self) -> &[String] {
        &self.emulator_args
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Autoinstall response file served as `/install.conf`.
    pub fn install_script(&self) -> &str {
        &self.install_script
    }
}

fn emulator_command(spec: &ArchSpec, emulator: &EmulatorConfig, disk: &Path) -> Vec<String> {
    let mut args = vec![spec.emulator.to_string()];
    args.extend(spec.machine_args.iter().map(|a| a.to_string()));
    args.extend(["-nographic".to_string(), "-m".to_string(), emulator.memory_mb.to_string()]);
    if spec.smp {
        args.extend(["-smp".to_string(), emulator.cpus.to_string()]);
    }
    args.extend([
        "-net".to_string(),
        "nic,model=e1000".to_string(),
        "-net".to_string(),
        "user".to_string(),
        "-drive".to_string(),
        format!("file={},format=raw", disk.display()),
    ]);
    args
}

/// Read-only set of targets for one release, ordered by architecture name.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    release: Release,
    targets: Vec<Target>,
}

impl TargetRegistry {
    pub fn new(release: Release, mut targets: Vec<Target>) -> Self {
        targets.sort_by(|a, b| a.arch.cmp(&b.arch));
        Self { release, targets }
    }

    /// Builds the configured architectures from the built-in table.
    pub fn builtin(config: &Config, release: &Release) -> Result<Self, TargetError> {
        let release_dir = config.paths.dest_root.join(release.version());
        let server = config.server.guest_address();

        let targets = config
            .architectures
            .iter()
            .map(|arch| {
                let spec = lookup(arch).ok_or_else(|| TargetError::UnknownArch(arch.clone()))?;
                let work_dir = release_dir.join(spec.arch);
                let disk_image = work_dir.join(&config.disk.image_name);
                let args = emulator_command(spec, &config.emulator, &disk_image);
                let script = spec.install_script.replace(SERVER_PLACEHOLDER, &server);

                Target::new(
                    spec.arch,
                    work_dir,
                    disk_image,
                    args,
                    ArtifactSet::for_release(release),
                    script,
                )
                .map(|t| t.with_arch_tokens(spec.pkg_arch, spec.go_arch))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(release.clone(), targets))
    }

    pub fn release(&self) -> &Release {
        &self.release
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn get(&self, arch: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.arch == arch)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
