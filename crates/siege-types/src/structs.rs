//! Core state structs: the authoritative attack record, its history
//! entries, the query view, and connected observers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EpisodeOutcome, Phase};
use crate::ids::{ConnectionId, EpisodeId};

/// The single authoritative attack-state record.
///
/// Owned exclusively by the state store and mutated only through
/// validated transitions. Everything else sees clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct AttackState {
    /// Current phase.
    pub phase: Phase,
    /// Seconds left on the countdown, in `[0, timer_ceiling]`.
    pub time_remaining: u32,
    /// When the current episode began, if one is in progress.
    pub started_at: Option<DateTime<Utc>>,
    /// Attackers currently holding the attack (zero or one entry).
    pub active_attackers: BTreeSet<String>,
    /// The current (or most recent) episode number.
    pub episode: EpisodeId,
    /// Append-only episode history, oldest first.
    pub history: Vec<HistoryRecord>,
}

impl AttackState {
    /// Fresh state at process start: `Secure`, countdown full.
    pub const fn new(timer_ceiling: u32) -> Self {
        Self {
            phase: Phase::Secure,
            time_remaining: timer_ceiling,
            started_at: None,
            active_attackers: BTreeSet::new(),
            episode: EpisodeId(0),
            history: Vec::new(),
        }
    }

    /// The history record of the episode in progress, if any.
    pub fn open_record(&self) -> Option<&HistoryRecord> {
        self.history.iter().rev().find(|r| r.is_open())
    }

    /// Mutable access to the open history record, if any.
    pub fn open_record_mut(&mut self) -> Option<&mut HistoryRecord> {
        self.history.iter_mut().rev().find(|r| r.is_open())
    }
}

/// One attack episode in the history log.
///
/// Created open (no duration) when an attack is accepted and closed
/// when the episode leaves `UnderAttack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct HistoryRecord {
    /// Episode this record belongs to.
    pub episode: EpisodeId,
    /// Who started the attack.
    pub attacker_id: String,
    /// Free-form attack label supplied by the attacker.
    pub attack_type: String,
    /// When the episode began.
    pub started_at: DateTime<Utc>,
    /// Episode length in seconds; absent while the episode is open.
    pub duration_seconds: Option<f64>,
    /// How the episode ended; absent while open.
    pub outcome: Option<EpisodeOutcome>,
    /// Defender that closed the episode, for defended episodes.
    pub closed_by: Option<String>,
}

impl HistoryRecord {
    /// Open a new record for an episode starting at `started_at`.
    pub const fn open(
        episode: EpisodeId,
        attacker_id: String,
        attack_type: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            episode,
            attacker_id,
            attack_type,
            started_at,
            duration_seconds: None,
            outcome: None,
            closed_by: None,
        }
    }

    /// Whether the episode is still in progress.
    pub const fn is_open(&self) -> bool {
        self.duration_seconds.is_none()
    }

    /// Close the record at `now`.
    ///
    /// Clock skew that would make the duration negative clamps to zero.
    pub fn close(&mut self, outcome: EpisodeOutcome, closed_by: Option<String>, now: DateTime<Utc>) {
        let elapsed = now
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default();
        self.duration_seconds = Some(elapsed.as_secs_f64());
        self.outcome = Some(outcome);
        self.closed_by = closed_by;
    }
}

/// Full state as returned by `queryState` and the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StateView {
    /// Current phase.
    pub phase: Phase,
    /// Seconds left on the countdown.
    pub time_remaining: u32,
    /// Configured countdown start value.
    pub timer_ceiling: u32,
    /// When the current episode began, if any.
    pub started_at: Option<DateTime<Utc>>,
    /// Attackers currently holding the attack.
    pub active_attackers: BTreeSet<String>,
    /// Current (or most recent) episode number.
    pub episode: EpisodeId,
    /// Episode history, oldest first.
    pub history: Vec<HistoryRecord>,
    /// Number of connected observers.
    pub total_users: u64,
}

/// A connected observer. Carries no attack semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Observer {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// When the observer connected.
    pub joined_at: DateTime<Utc>,
}
