//! Dialogue scripts and the buildlet session script.

use regex_lite::Regex;
use std::fmt;
use std::time::Duration;

use super::DialogueError;
use crate::config::WorkloadConfig;

/// Shell prompt of the root account on the installed guest.
const ROOT_PROMPT: &str = "buildlet#";
/// Shell prompt of the unprivileged workload account.
const USER_PROMPT: &str = r"buildlet\$";

/// Credentials set by the autoinstall response file.
const ROOT_LOGIN: &str = "root";
const ROOT_PASSWORD: &str = "root";

/// Stage of the guest session a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Boot,
    Install,
    Login,
    Workload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boot => "boot",
            Self::Install => "install",
            Self::Login => "login",
            Self::Workload => "workload",
        };
        f.write_str(name)
    }
}

/// One unit of console interaction.
#[derive(Debug, Clone)]
pub enum DialogueStep {
    /// Block until `pattern` appears. Without an explicit timeout the wait
    /// may use whatever remains of the session.
    WaitFor {
        pattern: Regex,
        timeout: Option<Duration>,
    },
    /// Write literal text to the console.
    Send(String),
}

/// Ordered sequence of phase-tagged steps.
#[derive(Debug, Clone)]
pub struct DialogueScript {
    steps: Vec<(Phase, DialogueStep)>,
    phase: Phase,
}

impl Default for DialogueScript {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogueScript {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            phase: Phase::Boot,
        }
    }

    /// Tags the steps added after this call with `phase`.
    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn wait_for(self, pattern: &str) -> Result<Self, DialogueError> {
        self.push_wait(pattern, None)
    }

    pub fn wait_for_within(self, pattern: &str, timeout: Duration) -> Result<Self, DialogueError> {
        self.push_wait(pattern, Some(timeout))
    }

    pub fn send(mut self, text: impl Into<String>) -> Self {
        self.steps.push((self.phase, DialogueStep::Send(text.into())));
        self
    }

    fn push_wait(mut self, pattern: &str, timeout: Option<Duration>) -> Result<Self, DialogueError> {
        let pattern = Regex::new(pattern).map_err(|e| DialogueError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.steps
            .push((self.phase, DialogueStep::WaitFor { pattern, timeout }));
        Ok(self)
    }

    pub fn steps(&self) -> impl Iterator<Item = (Phase, &DialogueStep)> {
        self.steps.iter().map(|(phase, step)| (*phase, step))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Values substituted into the buildlet session script.
#[derive(Debug, Clone)]
pub struct ScriptParams<'a> {
    /// `GOARCH` of the guest.
    pub go_arch: &'a str,
    /// Control server address as reachable from the guest (`host:port`).
    pub server: &'a str,
    /// Budget for the unattended install to reach the login prompt.
    pub install_timeout: Duration,
    pub workload: &'a WorkloadConfig,
}

/// Full session: boot loader, autoinstall, root login, then the workload.
///
/// Success only means each prompt came back; exit codes of guest commands
/// are not inspected.
pub fn buildlet_script(params: &ScriptParams<'_>) -> Result<DialogueScript, DialogueError> {
    let workload = params.workload;
    let server = params.server;
    let go_env = format!("env GOOS=openbsd GOARCH={}", params.go_arch);

    let script = DialogueScript::new()
        .phase(Phase::Boot)
        .wait_for("boot>$")?
        .send("set tty com0\n")
        .wait_for("boot>")?
        .send("\n")
        .phase(Phase::Install)
        .wait_for("utoinstall or")?
        .send("a\n")
        .wait_for("Response file")?
        .send(format!("http://{}/install.conf\n", server))
        .wait_for_within("login:", params.install_timeout)?
        .phase(Phase::Login)
        .send(format!("{}\n", ROOT_LOGIN))
        .wait_for("Password:")?
        .send(format!("{}\n", ROOT_PASSWORD))
        .wait_for(ROOT_PROMPT)?
        .phase(Phase::Workload)
        .send(format!(
            "env PKG_PATH={} pkg_add {}\n",
            workload.pkg_path,
            workload.packages.join(" ")
        ))
        .wait_for(ROOT_PROMPT)?
        .send(format!("su - {}\n", workload.user))
        .wait_for(USER_PROMPT)?
        .send(format!("git clone {}\n", workload.repository))
        .wait_for(USER_PROMPT)?
        .send(format!("cd {}\n", workload.build_dir))
        .wait_for(USER_PROMPT)?
        .send(format!("{} ./mkall.sh\n", go_env))
        .wait_for(USER_PROMPT)?
        .send(format!("{} go test ./...\n", go_env))
        .wait_for(USER_PROMPT)?
        .send(format!(
            "git diff | openssl enc -base64 >{}\n",
            workload.guest_result_path
        ))
        .wait_for(USER_PROMPT)?
        .send(format!(
            "curl --data-binary @{} http://{}/\n",
            workload.guest_result_path, server
        ))
        .wait_for(USER_PROMPT)?
        .send("\n");

    Ok(script)
}
