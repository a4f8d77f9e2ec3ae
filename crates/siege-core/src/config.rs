//! Configuration loading and typed config structures.
//!
//! The configuration lives in `siege-config.yaml` next to the binary's
//! working directory. Every field has a default, so an absent file or an
//! empty document yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Smallest accepted countdown tick interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value was parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SiegeConfig {
    /// HTTP listener and CORS settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Countdown settings.
    #[serde(default)]
    pub countdown: CountdownConfig,

    /// Fan-out channel settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Episode history retention.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SiegeConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    ///
    /// Environment variables override YAML values:
    /// - `HOST` overrides `server.host`
    /// - `PORT` overrides `server.port`
    /// - `SIEGE_TIMER_CEILING` overrides `countdown.timer_ceiling_secs`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides and validation apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string and validate it.
    /// Environment overrides are not applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_err| ConfigError::Invalid {
                reason: format!("PORT must be a TCP port number, got {port:?}"),
            })?;
        }
        if let Some(ceiling) = lookup("SIEGE_TIMER_CEILING") {
            self.countdown.timer_ceiling_secs =
                ceiling.trim().parse().map_err(|_err| ConfigError::Invalid {
                    reason: format!(
                        "SIEGE_TIMER_CEILING must be a whole number of seconds, got {ceiling:?}"
                    ),
                })?;
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countdown.timer_ceiling_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "countdown.timer_ceiling_secs must be at least 1".to_owned(),
            });
        }
        if self.countdown.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "countdown.tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}"
                ),
            });
        }
        if self.broadcast.capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "broadcast.capacity must be at least 1".to_owned(),
            });
        }
        if self.history.max_records == 0 {
            return Err(ConfigError::Invalid {
                reason: "history.max_records must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty or containing `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Countdown configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountdownConfig {
    /// Countdown start value in seconds.
    #[serde(default = "default_timer_ceiling_secs")]
    pub timer_ceiling_secs: u32,

    /// Real-time milliseconds between countdown ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl CountdownConfig {
    /// Tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            timer_ceiling_secs: default_timer_ceiling_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Broadcast channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Events buffered per subscriber before it is considered lagged.
    #[serde(default = "default_broadcast_capacity")]
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: default_broadcast_capacity(),
        }
    }
}

/// History retention configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of history records kept; oldest closed records are
    /// dropped first.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3001
}

fn default_cors_origins() -> Vec<String> {
    vec![
        String::from("http://localhost:3000"),
        String::from("http://127.0.0.1:3000"),
    ]
}

const fn default_timer_ceiling_secs() -> u32 {
    3600
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_broadcast_capacity() -> usize {
    256
}

const fn default_max_records() -> usize {
    10_000
}

fn default_log_level() -> String {
    String::from("info")
}
