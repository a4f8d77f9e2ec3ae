//! Time sources for the attack-state engine.
//!
//! The engine never reads the wall clock directly. Timestamps on events
//! and history records come from a [`Clock`], which keeps durations
//! immune to wall-clock jumps and lets tests control time.
//!
//! - [`MonotonicClock`] anchors a wall timestamp once and advances it by
//!   a monotonic [`tokio::time::Instant`]. Under a paused Tokio runtime
//!   it advances together with the countdown ticks.
//! - [`ManualClock`] only moves when told to.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// A source of "now" for timestamps.
pub trait Clock: Send + Sync + 'static {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall time anchored at construction and advanced monotonically.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor: DateTime<Utc>,
    origin: Instant,
}

impl MonotonicClock {
    /// Anchor the clock at the current wall time.
    pub fn new() -> Self {
        Self {
            anchor: Utc::now(),
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A clock that stands still until advanced.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move the clock forward by `delta` (backward if negative).
    pub fn advance(&self, delta: TimeDelta) {
        let step = delta.num_milliseconds();
        let mut current = self.millis.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(step);
            match self.millis.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::Acquire)).unwrap_or_default()
    }
}
