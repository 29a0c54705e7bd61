//! Pipeline lifecycle integration tests.
//!
//! The emulator is a `sh` script that prints the installer and shell prompts
//! in order and logs every line it receives. Fetch, verify and disk
//! provisioning use the mocks from `obsdbuild_core::testing`.

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{sleep, Instant};

use obsdbuild_core::config::Config;
use obsdbuild_core::control::DISK_LAYOUT;
use obsdbuild_core::dialogue::DialogueError;
use obsdbuild_core::disk::ProvisionError;
use obsdbuild_core::emulator::EmulatorError;
use obsdbuild_core::fetch::FetchError;
use obsdbuild_core::pipeline::{Pipeline, PipelineError};
use obsdbuild_core::target::{ArtifactSet, Release, Target, TargetRegistry};
use obsdbuild_core::testing::{MockFetcher, MockProvisioner, MockVerifier};
use obsdbuild_core::verify::VerifyError;

/// Walks through the whole session. Before the last shell prompt it waits
/// for `$2` to exist, giving the test time to upload like the guest would.
const FAKE_GUEST: &str = r#"
log="$1"
marker="$2"
step() {
    printf '%s' "$1"
    IFS= read -r line || exit 0
    printf '%s\n' "$line" >> "$log"
}
step 'boot>'
step 'boot>'
step 'Welcome to the OpenBSD installer. (I)nstall, (U)pgrade, (A)utoinstall or (S)hell? '
step 'Response file location? [http://10.0.2.2/install.conf] '
step 'buildlet login: '
step 'Password:'
step 'buildlet# '
step 'buildlet# '
for i in 1 2 3 4 5 6; do step 'buildlet$ '; done
while [ ! -e "$marker" ]; do sleep 0.1; done
step 'buildlet$ '
"#;

/// Prepended to [`FAKE_GUEST`]: on start, signal `$1.booted` and hold the
/// console until `$1.fetched` exists, like a guest fetching its response
/// file before the installer prompt.
const FETCH_FIRST: &str = r#"
: > "$1.booted"
while [ ! -e "$1.fetched" ]; do sleep 0.1; done
"#;

/// Never prints anything.
const SILENT_GUEST: &str = "exec sleep 30";

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.server.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.server.port = port;
    config.server.guest_gateway = "127.0.0.1".to_string();
    config.emulator.echo_console = false;
    config.emulator.session_timeout_secs = 30;
    config.emulator.install_timeout_secs = 30;
    config
}

struct TestHarness {
    pipeline: Pipeline<MockFetcher, MockVerifier, MockProvisioner>,
    fetcher: MockFetcher,
    verifier: MockVerifier,
    provisioner: MockProvisioner,
    release: Release,
    port: u16,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let port = get_available_port();
        let mut config = test_config(port);
        adjust(&mut config);

        let fetcher = MockFetcher::new();
        let verifier = MockVerifier::new();
        let provisioner = MockProvisioner::new();
        let pipeline = Pipeline::new(config, fetcher.clone(), verifier.clone(), provisioner.clone());

        Self {
            pipeline,
            fetcher,
            verifier,
            provisioner,
            release: Release::parse("7.4").unwrap(),
            port,
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn work_dir(&self, arch: &str) -> PathBuf {
        self.temp_dir.path().join("7.4").join(arch)
    }

    fn log_path(&self, arch: &str) -> PathBuf {
        self.temp_dir.path().join(format!("{}-console.log", arch))
    }

    fn marker_path(&self, arch: &str) -> PathBuf {
        self.temp_dir.path().join(format!("{}-uploaded", arch))
    }

    /// A target whose emulator runs `script` as `sh -c`.
    fn target(&self, arch: &str, script: &str) -> Target {
        let work_dir = self.work_dir(arch);
        let disk = work_dir.join("disk.raw");
        let args = vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "fake-qemu".to_string(),
            self.log_path(arch).to_string_lossy().to_string(),
            self.marker_path(arch).to_string_lossy().to_string(),
            format!("file={},format=raw", disk.display()),
        ];
        Target::new(
            arch,
            work_dir,
            disk,
            args,
            ArtifactSet::for_release(&self.release),
            "System hostname = buildlet\n",
        )
        .unwrap()
    }

    fn registry(&self, targets: Vec<Target>) -> TargetRegistry {
        TargetRegistry::new(self.release.clone(), targets)
    }

    fn console_log(&self, arch: &str) -> Vec<String> {
        std::fs::read_to_string(self.log_path(arch))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Plays the guest's upload: once the upload command has been typed, POST
/// `body` to the control server and let the session finish.
async fn upload_when_requested(log: PathBuf, marker: PathBuf, port: u16, body: &'static str) {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let typed = std::fs::read_to_string(&log).unwrap_or_default();
        if typed.contains("curl --data-binary") {
            break;
        }
        assert!(Instant::now() < deadline, "upload command never sent");
        sleep(Duration::from_millis(20)).await;
    }

    let status = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/", port))
        .body(body)
        .send()
        .await
        .unwrap()
        .status();
    assert!(status.is_success());
    std::fs::write(marker, "").unwrap();
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), suffix))
}

/// Once the emulator has started, fetch what the installer asks for first.
/// A single attempt each: the server must already be listening.
async fn fetch_install_assets(log: PathBuf, port: u16) -> (String, String) {
    let booted = with_suffix(&log, ".booted");
    let deadline = Instant::now() + Duration::from_secs(20);
    while !booted.exists() {
        assert!(Instant::now() < deadline, "emulator never started");
        sleep(Duration::from_millis(20)).await;
    }

    let client = reqwest::Client::new();
    let mut bodies = Vec::new();
    for path in ["install.conf", "disklabel"] {
        let response = client
            .get(format!("http://127.0.0.1:{}/{}", port, path))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        bodies.push(response.text().await.unwrap());
    }

    std::fs::write(with_suffix(&log, ".fetched"), "").unwrap();
    let disklabel = bodies.pop().unwrap();
    let install_conf = bodies.pop().unwrap();
    (install_conf, disklabel)
}

fn mark_uploaded(path: &Path) {
    std::fs::write(path, "").unwrap();
}

#[tokio::test]
async fn test_full_session_collects_upload() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![harness.target("amd64", FAKE_GUEST)]);

    let guest = tokio::spawn(upload_when_requested(
        harness.log_path("amd64"),
        harness.marker_path("amd64"),
        harness.port,
        "ZGlmZiAtLWdpdAo=\n",
    ));

    let reports = harness.pipeline.run(&registry).await.unwrap();
    guest.await.unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.arch, "amd64");
    assert_eq!(report.steps, 30);
    assert_eq!(report.result_bytes, 17);
    let result_file = report.result_file.clone().unwrap();
    assert_eq!(result_file, harness.work_dir("amd64").join("sys.diff.b64"));
    assert_eq!(
        std::fs::read_to_string(result_file).unwrap(),
        "ZGlmZiAtLWdpdAo=\n"
    );

    assert_eq!(harness.fetcher.fetched().await, vec!["amd64"]);
    assert_eq!(harness.verifier.verified().await, vec!["amd64"]);
    assert_eq!(harness.provisioner.provisioned().await, vec!["amd64"]);
    assert!(port_is_free(harness.port));
}

#[tokio::test]
async fn test_server_ready_before_guest_boots() {
    let harness = TestHarness::new();
    let script = format!("{}{}", FETCH_FIRST, FAKE_GUEST);
    let target = harness.target("amd64", &script);
    mark_uploaded(&harness.marker_path("amd64"));

    let guest = tokio::spawn(fetch_install_assets(harness.log_path("amd64"), harness.port));

    let report = harness.pipeline.build(&target).await.unwrap();
    let (install_conf, disklabel) = guest.await.unwrap();

    assert_eq!(install_conf, target.install_script());
    assert_eq!(disklabel, DISK_LAYOUT);
    assert_eq!(report.steps, 30);
    assert!(port_is_free(harness.port));
}

#[tokio::test]
async fn test_console_receives_scripted_answers() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![harness.target("amd64", FAKE_GUEST)]);
    mark_uploaded(&harness.marker_path("amd64"));

    let reports = harness.pipeline.run(&registry).await.unwrap();
    assert_eq!(reports[0].result_file, None);
    assert_eq!(reports[0].result_bytes, 0);

    let server = format!("127.0.0.1:{}", harness.port);
    let typed = harness.console_log("amd64");
    assert_eq!(typed.len(), 15);
    assert_eq!(typed[0], "set tty com0");
    assert_eq!(typed[1], "");
    assert_eq!(typed[2], "a");
    assert_eq!(typed[3], format!("http://{}/install.conf", server));
    assert_eq!(typed[4], "root");
    assert_eq!(typed[5], "root");
    assert!(typed[6].contains("pkg_add bash git go"));
    assert_eq!(typed[7], "su - gopher");
    assert!(typed[10].contains("GOARCH=amd64"));
    assert_eq!(
        typed[13],
        format!("curl --data-binary @/tmp/sys.diff.b64 http://{}/", server)
    );
}

#[tokio::test]
async fn test_targets_run_in_order() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![
        harness.target("i386", FAKE_GUEST).with_arch_tokens("i386", "386"),
        harness.target("amd64", FAKE_GUEST),
    ]);
    mark_uploaded(&harness.marker_path("amd64"));
    mark_uploaded(&harness.marker_path("i386"));

    let reports = harness.pipeline.run(&registry).await.unwrap();

    let arches: Vec<_> = reports.iter().map(|r| r.arch.as_str()).collect();
    assert_eq!(arches, vec!["amd64", "i386"]);
    assert_eq!(harness.fetcher.fetched().await, vec!["amd64", "i386"]);
    assert!(harness.console_log("i386")[10].contains("GOARCH=386"));
}

#[tokio::test]
async fn test_fetch_failure_stops_pipeline() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![
        harness.target("amd64", FAKE_GUEST),
        harness.target("i386", FAKE_GUEST),
    ]);
    harness
        .fetcher
        .set_next_error(FetchError::NotFound {
            file: "comp74.tgz".to_string(),
            arch: "amd64".to_string(),
        })
        .await;

    let error = harness.pipeline.run(&registry).await.unwrap_err();

    assert!(matches!(error, PipelineError::Fetch { .. }));
    assert_eq!(error.arch(), "amd64");
    // Later architectures are never touched
    assert_eq!(harness.fetcher.fetched().await, vec!["amd64"]);
    assert!(harness.verifier.verified().await.is_empty());
    assert!(harness.provisioner.provisioned().await.is_empty());
}

#[tokio::test]
async fn test_verify_failure_stops_pipeline() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![harness.target("amd64", FAKE_GUEST)]);
    harness
        .verifier
        .set_next_error(VerifyError::Failed {
            file: "base74.tgz".to_string(),
            output: "signature mismatch".to_string(),
        })
        .await;

    let error = harness.pipeline.run(&registry).await.unwrap_err();

    match error {
        PipelineError::Verify { arch, source } => {
            assert_eq!(arch, "amd64");
            assert!(source.to_string().contains("base74.tgz"));
        }
        other => panic!("expected Verify, got {:?}", other),
    }
    assert!(harness.provisioner.provisioned().await.is_empty());
}

#[tokio::test]
async fn test_provision_failure_releases_server() {
    let harness = TestHarness::new();
    let registry = harness.registry(vec![harness.target("amd64", FAKE_GUEST)]);
    harness
        .provisioner
        .set_next_error(ProvisionError::ImageCreation {
            path: harness.work_dir("amd64").join("disk.raw"),
            reason: "No space left on device".to_string(),
        })
        .await;

    let error = harness.pipeline.run(&registry).await.unwrap_err();

    assert!(matches!(error, PipelineError::Provision { .. }));
    // The emulator was never started
    assert!(harness.console_log("amd64").is_empty());
    assert!(port_is_free(harness.port));
}

#[tokio::test]
async fn test_dialogue_timeout_releases_everything() {
    let harness = TestHarness::with_config(|config| {
        config.emulator.session_timeout_secs = 1;
        config.emulator.install_timeout_secs = 1;
    });
    let registry = harness.registry(vec![
        harness.target("amd64", SILENT_GUEST),
        harness.target("i386", FAKE_GUEST),
    ]);

    let started = Instant::now();
    let error = harness.pipeline.run(&registry).await.unwrap_err();

    match error {
        PipelineError::Dialogue {
            arch,
            source: DialogueError::Timeout { step, .. },
        } => {
            assert_eq!(arch, "amd64");
            assert_eq!(step, 0);
        }
        other => panic!("expected dialogue timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(port_is_free(harness.port));
    assert_eq!(harness.fetcher.fetched().await, vec!["amd64"]);
}

#[tokio::test]
async fn test_missing_emulator_reported() {
    let harness = TestHarness::new();
    let work_dir = harness.work_dir("amd64");
    let disk = work_dir.join("disk.raw");
    let target = Target::new(
        "amd64",
        work_dir,
        disk.clone(),
        vec![
            "/nonexistent/qemu-system-x86_64".to_string(),
            format!("file={},format=raw", disk.display()),
        ],
        ArtifactSet::for_release(&harness.release),
        "",
    )
    .unwrap();

    let error = harness.pipeline.build(&target).await.unwrap_err();

    assert!(matches!(
        error,
        PipelineError::Emulator {
            source: EmulatorError::NotFound { .. },
            ..
        }
    ));
    assert!(port_is_free(harness.port));
}

#[tokio::test]
async fn test_port_in_use_fails_build() {
    let harness = TestHarness::new();
    let _occupied = TcpListener::bind(("127.0.0.1", harness.port)).unwrap();
    let target = harness.target("amd64", FAKE_GUEST);

    let error = harness.pipeline.build(&target).await.unwrap_err();

    assert!(matches!(error, PipelineError::Server { .. }));
    // Nothing past the server was attempted
    assert!(harness.provisioner.provisioned().await.is_empty());
}
