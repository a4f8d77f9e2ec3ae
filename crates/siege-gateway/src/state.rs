//! Shared application state for the gateway.
//!
//! [`AppState`] wraps the [`EngineHandle`]; all state lives in the
//! engine task, so handlers hold no locks of their own.

use chrono::{DateTime, Utc};
use siege_core::EngineHandle;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the serialized command path.
    pub engine: EngineHandle,
    /// When the gateway was created, for the health endpoint.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create application state around a running engine.
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }

    /// Whole seconds since the gateway was created.
    pub fn uptime_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // `num_seconds` can be negative if clocks are weird; treat as 0.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }
}
