pub mod config;
pub mod control;
pub mod dialogue;
pub mod disk;
pub mod emulator;
pub mod fetch;
pub mod pipeline;
pub mod target;
pub mod testing;
pub mod verify;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use control::{ControlServer, ControlServerHandle, ControlSession, ServerError, DISK_LAYOUT};
pub use dialogue::{
    buildlet_script, Console, ConsoleMirror, DialogueEngine, DialogueError, DialogueReport,
    DialogueScript, DialogueStep, Phase, ScriptParams,
};
pub use disk::{DiskImage, ProvisionError, Provisioner, QemuImgProvisioner};
pub use emulator::{Emulator, EmulatorError, EmulatorSession};
pub use fetch::{FetchError, FetchReport, Fetcher, MirrorFetcher};
pub use pipeline::{BuildReport, Pipeline, PipelineError};
pub use target::{ArtifactSet, Release, ReleaseError, Target, TargetError, TargetRegistry};
pub use verify::{SignifyVerifier, Verifier, VerifyError};
