//! AMQP integration for the matchmaking core
//!
//! This module handles AMQP connections, inbound command consumption, and
//! outbound event publishing. The core itself stays transport-agnostic;
//! everything here is an adapter over `MatchmakingService`.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::CommandHandler;
pub use messages::*;
pub use publisher::EventPublisher;
