//! Shared type definitions for the Siege attack-state service.
//!
//! Every type that crosses a transport boundary lives here so the
//! engine, the gateway, and the browser client agree on one schema.
//! Types are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Connection and episode identifiers
//! - [`enums`] -- [`Phase`] and [`EpisodeOutcome`]
//! - [`structs`] -- [`AttackState`], [`HistoryRecord`], [`StateView`], [`Observer`]
//! - [`events`] -- Outbound [`ServerEvent`]s and their payloads
//! - [`messages`] -- Inbound request bodies and [`ClientMessage`]

pub mod enums;
pub mod events;
pub mod ids;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EpisodeOutcome, Phase};
pub use events::{
    AttackStarted, AttackStopped, ServerEvent, Snapshot, TimerUpdate, UserCount,
};
pub use ids::{ConnectionId, EpisodeId};
pub use messages::{AttackRequest, ClientMessage, DefendRequest};
pub use structs::{AttackState, HistoryRecord, Observer, StateView};
