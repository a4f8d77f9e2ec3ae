//! Enumeration types for the attack-state machine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Phase of the single global attack state.
///
/// `Secure` and `UnderAttack` are the interactive phases. `Compromised`
/// is terminal until an explicit reset returns the system to `Secure`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// No attack in progress.
    #[default]
    Secure,
    /// An attack episode is running and the countdown is ticking.
    UnderAttack,
    /// The countdown reached zero without a defense.
    Compromised,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Secure => "SECURE",
            Self::UnderAttack => "UNDER_ATTACK",
            Self::Compromised => "COMPROMISED",
        };
        f.write_str(label)
    }
}

/// How an attack episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EpisodeOutcome {
    /// A defend command ended the episode.
    Defended,
    /// The countdown ran out.
    Compromised,
    /// A reset interrupted the episode.
    Reset,
}
