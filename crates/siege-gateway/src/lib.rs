//! HTTP and `WebSocket` gateway for the siege attack-state service.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`): each connection is an observer. It
//!   gets a snapshot on join, then every broadcast event, and may send
//!   `attack` / `defend` / `reset` / `get_state` actions.
//! - **REST endpoints** for reading state and history and for issuing
//!   the same commands over plain HTTP.
//!
//! # Architecture
//!
//! The gateway owns no attack state. Every read and write goes through
//! the [`EngineHandle`](siege_core::EngineHandle), whose single task
//! serializes all commands and timer ticks. Live updates reach observers
//! through the engine's broadcast channel.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::GatewayError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{spawn_gateway, RunningGateway, StartupError};
pub use state::AppState;
pub use ws::{dispatch, Dispatch};
