//! Match aggregate: roster, state machine, and map-vote tally
//!
//! A match owns every transition from creation through completion or
//! cancellation. External game-server reports are applied idempotently.

pub mod instance;

// Re-export commonly used types
pub use instance::{AcceptOutcome, MatchInstance, VoteOutcome};
