//! Host-side HTTP server the guest talks to during install and workload.
//!
//! | request            | response                                        |
//! |--------------------|-------------------------------------------------|
//! | `GET /disklabel`   | partition template                              |
//! | `GET /install.conf`| autoinstall response file                       |
//! | `GET /pub/<path>`  | `<artifact dir>/<path>`                         |
//! | `POST` elsewhere   | body replaces the result file                   |
//! | other `GET`        | logged, 404                                     |

mod routes;
mod server;

pub use routes::create_router;
pub use server::{ControlServer, ControlServerHandle};

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::target::Target;

/// Automatic partitioning template handed to the installer.
pub const DISK_LAYOUT: &str = "/\t5G-*\t95%\nswap\t1G\n";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind control server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the server hands out, and where it stores the upload, for one build.
#[derive(Debug, Clone)]
pub struct ControlSession {
    pub artifact_dir: PathBuf,
    pub install_script: String,
    pub disklabel: String,
    pub result_file: PathBuf,
}

impl ControlSession {
    pub fn for_target(target: &Target, result_file_name: &str) -> Self {
        Self {
            artifact_dir: target.work_dir().to_path_buf(),
            install_script: target.install_script().to_string(),
            disklabel: DISK_LAYOUT.to_string(),
            result_file: target.work_dir().join(result_file_name),
        }
    }
}
