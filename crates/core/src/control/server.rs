//! Control server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{create_router, ControlSession, ServerError};

/// Time allowed for in-flight guest requests after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct ControlServer;

impl ControlServer {
    /// Binds `addr` and starts serving on a background task.
    ///
    /// Returns once the listener is bound, so the guest can connect as soon
    /// as it boots.
    pub async fn start(
        addr: SocketAddr,
        session: ControlSession,
    ) -> Result<ControlServerHandle, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        let router = create_router(Arc::new(session));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Control server failed");
            }
        });

        info!(%local_addr, "Control server listening");
        Ok(ControlServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Owner of a running control server.
///
/// Dropping the handle aborts the server task; [`ControlServerHandle::shutdown`]
/// stops it gracefully and waits until the listener is released.
pub struct ControlServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ControlServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Control server did not drain in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }
        info!(local_addr = %self.local_addr, "Control server stopped");
    }
}

impl Drop for ControlServerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
