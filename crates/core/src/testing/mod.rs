//! Mock implementations of the pipeline's external seams.
//!
//! They let a build run end to end against a stand-in emulator without a
//! mirror, `signify` or `qemu-img`.
//!
//! ```rust,ignore
//! use obsdbuild_core::testing::{MockFetcher, MockProvisioner, MockVerifier};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_next_error(FetchError::NotFound { .. }).await;
//!
//! let pipeline = Pipeline::new(config, fetcher, MockVerifier::new(), MockProvisioner::new());
//! ```

mod mock_fetcher;
mod mock_provisioner;
mod mock_verifier;

pub use mock_fetcher::MockFetcher;
pub use mock_provisioner::MockProvisioner;
pub use mock_verifier::MockVerifier;
