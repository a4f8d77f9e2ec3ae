//! Attack-state synchronization engine for Siege.
//!
//! This crate owns the single global "under attack / secure" state, the
//! rules that change it, the countdown that drives it, and the fan-out
//! that keeps every observer consistent.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`](clock::Clock) trait with monotonic and manual
//!   implementations.
//! - [`command`] -- [`Command`](command::Command) type and identifier
//!   sanitization shared by all transports.
//! - [`config`] -- Configuration loading from `siege-config.yaml`.
//! - [`store`] -- [`StateStore`](store::StateStore), the transition
//!   state machine.
//! - [`timer`] -- [`TimerDriver`](timer::TimerDriver), the per-episode
//!   countdown task.
//! - [`session`] -- [`SessionRegistry`](session::SessionRegistry) of
//!   connected observers.
//! - [`broadcast`] -- [`Broadcaster`](broadcast::Broadcaster) event
//!   fan-out.
//! - [`engine`] -- The serialized command path and its
//!   [`EngineHandle`](engine::EngineHandle).

pub mod broadcast;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod session;
pub mod store;
pub mod timer;

pub use engine::{spawn_engine, CommandOutcome, EngineError, EngineHandle, EngineSettings, Subscription};
