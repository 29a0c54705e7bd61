//! Release, artifact set and per-architecture target definitions.
//!
//! A [`TargetRegistry`] is built once at startup, either from the built-in
//! architecture table via [`TargetRegistry::builtin`] or from an explicit list
//! of [`Target`]s, and is read-only afterwards.

mod artifacts;
mod registry;
mod release;

pub use artifacts::{ArtifactSet, CHECKSUM_FILE, INDEX_FILE, SIGNATURE_FILE};
pub use registry::{is_known_arch, Target, TargetError, TargetRegistry, SERVER_PLACEHOLDER};
pub use release::{Release, ReleaseError};
