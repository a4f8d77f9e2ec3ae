//! Outbound events delivered to every connected observer.
//!
//! Each [`ServerEvent`] serializes as `{"event": "<name>", "data": {...}}`
//! so browser clients can dispatch on the event name the same way a
//! socket.io client would. Unit events (`compromised`, `reset`) carry
//! no `data` field.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Phase;

/// Seconds per minute, for the `mm:ss` split in [`TimerUpdate`].
const SECONDS_PER_MINUTE: u32 = 60;

/// An event published by the broadcaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ServerEvent {
    /// An attack episode started.
    #[serde(rename = "attack-started")]
    AttackStarted(AttackStarted),
    /// An attack episode was defended.
    #[serde(rename = "attack-stopped")]
    AttackStopped(AttackStopped),
    /// The countdown advanced by one tick.
    Timer(TimerUpdate),
    /// The countdown reached zero. Emitted once per episode.
    Compromised,
    /// The system was reset to `Secure`.
    Reset,
    /// The number of connected observers changed.
    UserCount(UserCount),
    /// Point-in-time state for a newly connected observer.
    Snapshot(Snapshot),
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AttackStarted(_) => "attack-started",
            Self::AttackStopped(_) => "attack-stopped",
            Self::Timer(_) => "timer",
            Self::Compromised => "compromised",
            Self::Reset => "reset",
            Self::UserCount(_) => "userCount",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

/// Payload of `attack-started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AttackStarted {
    /// Who started the attack.
    pub attacker_id: String,
    /// Attack label.
    pub attack_type: String,
    /// Countdown value at the start of the episode.
    pub time_remaining: u32,
    /// When the episode began.
    pub started_at: DateTime<Utc>,
}

/// Payload of `attack-stopped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AttackStopped {
    /// Who defended.
    pub defender_id: String,
    /// When the defense was applied.
    pub timestamp: DateTime<Utc>,
}

/// Payload of `timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerUpdate {
    /// Seconds left on the countdown.
    pub time_remaining: u32,
    /// Whole minutes of `time_remaining`.
    pub minutes: u32,
    /// Leftover seconds of `time_remaining`.
    pub seconds: u32,
}

impl TimerUpdate {
    /// Build a timer update, splitting the remaining time into `mm:ss`.
    pub const fn new(time_remaining: u32) -> Self {
        Self {
            time_remaining,
            minutes: time_remaining / SECONDS_PER_MINUTE,
            seconds: time_remaining % SECONDS_PER_MINUTE,
        }
    }
}

/// Payload of `userCount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UserCount {
    /// Number of connected observers.
    pub count: u64,
}

/// Payload of `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Current phase.
    pub phase: Phase,
    /// Seconds left on the countdown.
    pub time_remaining: u32,
    /// When the current episode began, if one is in progress.
    pub started_at: Option<DateTime<Utc>>,
    /// Attackers currently holding the attack.
    pub active_attackers: BTreeSet<String>,
    /// Number of connected observers.
    pub total_users: u64,
}
