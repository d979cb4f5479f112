//! Queue management for waiting players
//!
//! This module owns the ordered collection of queue entries that the
//! matchmaker draws from, including TTL-based lazy expiry.

pub mod store;

// Re-export commonly used types
pub use store::{QueueEntry, QueueStore};
