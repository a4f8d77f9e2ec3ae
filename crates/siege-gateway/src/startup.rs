//! Background startup helper.
//!
//! [`spawn_gateway`] binds the listener eagerly, so address problems
//! surface to the caller, then serves on a background Tokio task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the gateway.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A gateway running on a background task.
#[derive(Debug)]
pub struct RunningGateway {
    /// The bound address (useful when the configured port was `0`).
    pub addr: SocketAddr,
    /// The serving task. Resolves after graceful shutdown completes.
    pub task: JoinHandle<Result<(), ServerError>>,
}

/// Bind the gateway and serve it on a background task until `shutdown`
/// resolves.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listener cannot bind.
pub async fn spawn_gateway<F>(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<RunningGateway, StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(&config).await?;
    let addr = server::local_addr(&listener)?;

    let task = tokio::spawn(async move {
        let result = server::serve(listener, &config, state, shutdown).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Gateway exited with error");
        }
        result
    });

    tracing::info!(%addr, "Gateway spawned on background task");

    Ok(RunningGateway { addr, task })
}
