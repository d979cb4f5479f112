//! Rating update integration
//!
//! The core's only obligation is to invoke the rating collaborator exactly
//! once per completed match; the formula lives behind the trait. A default
//! Elo implementation backed by the skillratings crate is provided.

pub mod elo;

// Re-export commonly used types
pub use elo::EloRatingUpdater;

use crate::error::Result;
use crate::types::{MatchResult, PlayerId};
use async_trait::async_trait;

/// A single player's rating movement from one match
#[derive(Debug, Clone)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: i32,
    pub new_rating: i32,
}

/// Trait for the rating-update collaborator, invoked on match completion
#[async_trait]
pub trait RatingUpdater: Send + Sync {
    /// Apply the final result to every roster member's rating
    async fn apply(&self, result: &MatchResult) -> Result<Vec<RatingChange>>;
}
