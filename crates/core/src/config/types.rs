use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Architectures to build, taken from the built-in table
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub disk: DiskConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            architectures: default_architectures(),
            paths: PathsConfig::default(),
            mirror: MirrorConfig::default(),
            server: ServerConfig::default(),
            verify: VerifyConfig::default(),
            disk: DiskConfig::default(),
            emulator: EmulatorConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

fn default_architectures() -> Vec<String> {
    vec!["amd64".to_string(), "i386".to_string()]
}

/// Working directory layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root of all per-release working directories
    #[serde(default = "default_dest_root")]
    pub dest_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dest_root: default_dest_root(),
        }
    }
}

fn default_dest_root() -> PathBuf {
    PathBuf::from("/tmp/openbsd")
}

/// Release mirror configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorConfig {
    /// Mirror base URL; files live at `<url>/<version>/<arch>/<file>`
    #[serde(default = "default_mirror_url")]
    pub url: String,
    /// Request timeout in seconds (default: 600)
    #[serde(default = "default_mirror_timeout")]
    pub timeout_secs: u64,
    /// Files allowed to be missing on the mirror
    #[serde(default = "default_optional_files")]
    pub optional_files: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            url: default_mirror_url(),
            timeout_secs: default_mirror_timeout(),
            optional_files: default_optional_files(),
        }
    }
}

fn default_mirror_url() -> String {
    "https://cdn.openbsd.org/pub/OpenBSD".to_string()
}

fn default_mirror_timeout() -> u64 {
    600
}

fn default_optional_files() -> Vec<String> {
    vec!["bsd.mp".to_string()]
}

/// Control server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the control server listens on
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Listener port, also handed to the guest in its response file
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host address as seen from inside the guest's user-mode NAT
    #[serde(default = "default_guest_gateway")]
    pub guest_gateway: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            guest_gateway: default_guest_gateway(),
        }
    }
}

impl ServerConfig {
    /// `host:port` the guest uses to reach the control server.
    pub fn guest_address(&self) -> String {
        format!("{}:{}", self.guest_gateway, self.port)
    }
}

fn default_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    // "BSD" in ASCII, followed by 26 years of OpenBSD
    25706
}

fn default_guest_gateway() -> String {
    "10.0.2.2".to_string()
}

/// Signature verification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifyConfig {
    /// signify-compatible verification tool
    #[serde(default = "default_verify_program")]
    pub program: PathBuf,
    /// Directory holding `openbsd-<release>-base.pub` keys
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            program: default_verify_program(),
            key_dir: default_key_dir(),
        }
    }
}

fn default_verify_program() -> PathBuf {
    if cfg!(target_os = "openbsd") {
        PathBuf::from("signify")
    } else {
        PathBuf::from("gosignify")
    }
}

fn default_key_dir() -> PathBuf {
    PathBuf::from("/etc/signify")
}

/// Boot disk configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiskConfig {
    /// Image creation tool
    #[serde(default = "default_qemu_img")]
    pub qemu_img: PathBuf,
    /// Block copy tool used to overlay the miniroot
    #[serde(default = "default_dd")]
    pub dd: PathBuf,
    /// File name of the boot disk inside each architecture's directory
    #[serde(default = "default_image_name")]
    pub image_name: String,
    /// Apparent size of the raw image in MiB
    #[serde(default = "default_disk_size")]
    pub size_mb: u64,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            qemu_img: default_qemu_img(),
            dd: default_dd(),
            image_name: default_image_name(),
            size_mb: default_disk_size(),
        }
    }
}

fn default_qemu_img() -> PathBuf {
    PathBuf::from("qemu-img")
}

fn default_dd() -> PathBuf {
    PathBuf::from("dd")
}

fn default_image_name() -> String {
    "disk.raw".to_string()
}

fn default_disk_size() -> u64 {
    10240
}

/// Emulator session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmulatorConfig {
    /// Bound on the whole emulated session in seconds
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    /// Wait budget for the unattended install to reach the login prompt
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,
    /// Mirror the guest console to the terminal (otherwise discard it)
    #[serde(default = "default_echo_console")]
    pub echo_console: bool,
    /// Guest memory in MiB
    #[serde(default = "default_memory")]
    pub memory_mb: u32,
    /// Guest CPUs, on machines that take `-smp`
    #[serde(default = "default_cpus")]
    pub cpus: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout(),
            install_timeout_secs: default_install_timeout(),
            echo_console: default_echo_console(),
            memory_mb: default_memory(),
            cpus: default_cpus(),
        }
    }
}

impl EmulatorConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

fn default_session_timeout() -> u64 {
    3600 // 1 hour
}

fn default_install_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_echo_console() -> bool {
    true
}

fn default_memory() -> u32 {
    2048
}

fn default_cpus() -> u32 {
    4
}

/// What the guest does once it has a shell
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    /// `PKG_PATH` handed to pkg_add; `%m` expands to the machine arch in the guest
    #[serde(default = "default_pkg_path")]
    pub pkg_path: String,
    #[serde(default = "default_user")]
    pub user: String,
    /// Directory inside the clone where the build runs
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
    /// Where the guest stages the encoded diff before uploading it
    #[serde(default = "default_guest_result_path")]
    pub guest_result_path: String,
    /// Upload destination, relative to the architecture's working directory
    #[serde(default = "default_result_file")]
    pub result_file: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            packages: default_packages(),
            pkg_path: default_pkg_path(),
            user: default_user(),
            build_dir: default_build_dir(),
            guest_result_path: default_guest_result_path(),
            result_file: default_result_file(),
        }
    }
}

fn default_repository() -> String {
    "https://github.com/golang/sys".to_string()
}

fn default_packages() -> Vec<String> {
    vec!["bash".to_string(), "git".to_string(), "go".to_string()]
}

fn default_pkg_path() -> String {
    "http://cdn.openbsd.org/%m".to_string()
}

fn default_user() -> String {
    "gopher".to_string()
}

fn default_build_dir() -> String {
    "sys/unix".to_string()
}

fn default_guest_result_path() -> String {
    "/tmp/sys.diff.b64".to_string()
}

fn default_result_file() -> String {
    "sys.diff.b64".to_string()
}
