//! Server binary for the Siege attack-state service.
//!
//! Wires together configuration, structured logging, the attack-state
//! engine, and the HTTP/`WebSocket` gateway, then serves until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `siege-config.yaml` (or `$SIEGE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the engine task
//! 4. Bind and start the gateway
//! 5. Wait for Ctrl-C, then shut down gracefully

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use siege_core::clock::MonotonicClock;
use siege_core::config::{LogFormat, LoggingConfig, SiegeConfig};
use siege_core::{spawn_engine, EngineSettings};
use siege_gateway::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Config file used when `SIEGE_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "siege-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the gateway cannot
/// bind, or the gateway stops abnormally.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let path = config_path(|key| std::env::var(key).ok());
    let config = SiegeConfig::load_or_default(&path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        config_path = %path.display(),
        host = %config.server.host,
        port = config.server.port,
        timer_ceiling_secs = config.countdown.timer_ceiling_secs,
        tick_interval_ms = config.countdown.tick_interval_ms,
        "siege-server starting"
    );

    // 3. Spawn the engine.
    let settings = EngineSettings::from_config(&config);
    let (engine, engine_task) = spawn_engine(&settings, Arc::new(MonotonicClock::new()));
    let state = Arc::new(AppState::new(engine));

    // 4. Start the gateway.
    let running = siege_gateway::spawn_gateway(
        ServerConfig::from(&config.server),
        state,
        shutdown_signal(),
    )
    .await?;
    info!(addr = %running.addr, "Gateway started");

    // 5. Serve until the shutdown signal stops the gateway.
    running
        .task
        .await
        .map_err(|e| AppError::Join {
            message: format!("{e}"),
        })??;

    engine_task.abort();
    info!("siege-server shutdown complete");
    Ok(())
}

/// Resolve the config file path from `SIEGE_CONFIG`, falling back to
/// the working directory.
fn config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("SIEGE_CONFIG")
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    result.map_err(|e| AppError::Logging {
        message: format!("{e}"),
    })
}

/// Resolve when Ctrl-C is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C; shutting down"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn config_path_defaults_to_working_directory() {
        assert_eq!(config_path(|_| None), PathBuf::from("siege-config.yaml"));
    }

    #[test]
    fn config_path_honours_override() {
        let path = config_path(|key| (key == "SIEGE_CONFIG").then(|| String::from("/etc/siege.yaml")));
        assert_eq!(path, PathBuf::from("/etc/siege.yaml"));
    }

    #[test]
    fn blank_override_is_ignored() {
        let path = config_path(|_| Some(String::from("  ")));
        assert_eq!(path, PathBuf::from("siege-config.yaml"));
    }
}
