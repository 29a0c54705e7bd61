//! Per-architecture driver: Fetch, then Verify, then Build.
//!
//! Architectures run one after another and the first failure stops the run.

mod runner;
mod types;

pub use runner::Pipeline;
pub use types::{BuildReport, PipelineError};
