//! Scrim Room - skill-based matchmaking core
//!
//! This crate provides queue management, MMR-banded match composition, a
//! deadline-driven acceptance gate with penalties, idempotent map voting,
//! and report-driven match lifecycle tracking, with AMQP command/event
//! adapters around the transport-agnostic core.

pub mod amqp;
pub mod ban;
pub mod config;
pub mod error;
pub mod game;
pub mod matchmaker;
pub mod metrics;
pub mod player;
pub mod queue;
pub mod rating;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use matchmaker::{MatchComposer, MatchmakingService, MmrBandComposer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
