//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Settings for the default Elo rating collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSettings {
    /// Elo K-factor applied per pairwise update
    pub k_factor: f64,
    /// Rating assigned to players the repository has never seen
    pub default_rating: i32,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            default_rating: 1000,
        }
    }
}
