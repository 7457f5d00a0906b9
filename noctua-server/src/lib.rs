//! HTTP API for noctua
//!
//! Can be used as:
//! - An embedded server (via `start_server_on`)
//! - A standalone binary (`noctua-server`)

pub mod auth;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use auth::{Authenticator, CurrentUser, SessionClaims, SessionSigner};
pub use error::{ApiError, ErrorBody};
pub use routes::build_router;
pub use state::AppState;

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting, then wait for in-flight requests to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Server task failed: {}", e);
        }
    }
}

/// Serve `router` on `addr`. Use port 0 to get a random available port.
pub async fn start_server_on(addr: &str, router: Router) -> anyhow::Result<ServerHandle> {
    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    info!("Starting noctua server on {}", local_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!("Shutting down noctua server");
            })
            .await;
        if let Err(e) = result {
            error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        addr: local_addr,
        task,
    })
}
