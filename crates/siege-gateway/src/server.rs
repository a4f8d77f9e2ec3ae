//! Gateway HTTP server lifecycle management.
//!
//! Provides [`bind`] and [`serve`], which together run the Axum server
//! on a TCP port until the provided shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use siege_core::config::ServerSection;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on. `0` picks a free port.
    pub port: u16,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSection::default())
    }
}

impl From<&ServerSection> for ServerConfig {
    fn from(section: &ServerSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
            cors_origins: section.cors_origins.clone(),
        }
    }
}

/// Bind the configured address.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is taken or invalid.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let target = (config.host.as_str(), config.port);
    TcpListener::bind(target).await.map_err(|e| {
        ServerError::Bind(format!("bind failed on {}:{}: {e}", config.host, config.port))
    })
}

/// Serve the gateway on an already-bound listener until `shutdown`
/// resolves.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = local_addr(&listener)?;
    let router = build_router(state, &config.cors_origins);

    info!(%addr, "Gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!(%addr, "Gateway stopped");
    Ok(())
}

/// The address a listener is actually bound to.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the OS cannot report it.
pub fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("local address unavailable: {e}")))
}

/// Errors that can occur when starting or running the gateway server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
