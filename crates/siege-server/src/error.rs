//! Error types for the server binary.
//!
//! [`AppError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: siege_core::config::ConfigError,
    },

    /// The gateway could not be started.
    #[error("startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: siege_gateway::StartupError,
    },

    /// The gateway stopped with an error.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: siege_gateway::ServerError,
    },

    /// The gateway task panicked or was cancelled.
    #[error("gateway task failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },

    /// The logging subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the logging failure.
        message: String,
    },
}
