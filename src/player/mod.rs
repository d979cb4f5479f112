//! Player repository interface and implementations
//!
//! The identity subsystem owns player records; the matchmaking core only
//! reads ratings and increments ban counters through this seam.

use crate::error::Result;
use crate::types::PlayerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// The slice of a player record the core is allowed to touch
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub rating: i32,
    pub ban_count: u32,
}

/// Trait for player repository operations
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Current rating of a player; unknown players receive the default
    async fn get_rating(&self, player_id: &str) -> Result<i32>;

    /// Persist a new rating after a match result was applied
    async fn set_rating(&self, player_id: &str, rating: i32) -> Result<()>;

    /// Bump a player's ban escalation counter, returning the new count
    async fn increment_ban_count(&self, player_id: &str) -> Result<u32>;
}

/// In-memory player repository for tests and single-node deployments
#[derive(Debug)]
pub struct InMemoryPlayerRepository {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
    default_rating: i32,
}

impl InMemoryPlayerRepository {
    pub fn new(default_rating: i32) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            default_rating,
        }
    }

    /// Seed a player record (for tests and fixtures)
    pub fn insert(&self, player_id: PlayerId, rating: i32) {
        if let Ok(mut records) = self.records.write() {
            records.insert(
                player_id,
                PlayerRecord {
                    rating,
                    ban_count: 0,
                },
            );
        }
    }

    /// Read a full record (for tests and fixtures)
    pub fn record(&self, player_id: &str) -> Option<PlayerRecord> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(player_id).cloned())
    }

    fn lock_error() -> crate::error::MatchmakingError {
        crate::error::MatchmakingError::InternalError {
            message: "Failed to acquire player records lock".to_string(),
        }
    }
}

impl Default for InMemoryPlayerRepository {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    async fn get_rating(&self, player_id: &str) -> Result<i32> {
        let records = self.records.read().map_err(|_| Self::lock_error())?;
        Ok(records
            .get(player_id)
            .map(|record| record.rating)
            .unwrap_or(self.default_rating))
    }

    async fn set_rating(&self, player_id: &str, rating: i32) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Self::lock_error())?;
        records
            .entry(player_id.to_string())
            .and_modify(|record| record.rating = rating)
            .or_insert(PlayerRecord {
                rating,
                ban_count: 0,
            });
        Ok(())
    }

    async fn increment_ban_count(&self, player_id: &str) -> Result<u32> {
        let mut records = self.records.write().map_err(|_| Self::lock_error())?;
        let default_rating = self.default_rating;
        let record = records
            .entry(player_id.to_string())
            .or_insert(PlayerRecord {
                rating: default_rating,
                ban_count: 0,
            });
        record.ban_count += 1;
        Ok(record.ban_count)
    }
}
