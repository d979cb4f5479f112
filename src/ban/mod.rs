//! Ban ledger interface and implementations
//!
//! Bans are append-mostly: the acceptance scheduler writes them, the queue
//! reads them. A ban is effective while `active` is set and its expiry (if
//! any) lies in the future; both fields are always evaluated together, so a
//! stale `active` flag on an expired ban never blocks a player.

use crate::error::Result;
use crate::types::{BanReason, MatchId, PlayerId};
use crate::utils::expiry_from_minutes;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// A temporary or permanent ban tied to a player
#[derive(Debug, Clone)]
pub struct Ban {
    pub user_id: PlayerId,
    pub reason: BanReason,
    /// Duration in minutes; zero means permanent
    pub duration_minutes: u32,
    pub created_at: DateTime<Utc>,
    /// `None` for permanent bans
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// The match that triggered the ban, when there is one
    pub match_id: Option<MatchId>,
}

impl Ban {
    /// Whether the ban currently blocks the player
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Trait for ban ledger operations
#[async_trait]
pub trait BanLedger: Send + Sync {
    /// The player's currently effective ban, if any; permanent bans win
    /// over timed ones, longer remaining time wins otherwise
    async fn active_ban(&self, player_id: &str, now: DateTime<Utc>) -> Result<Option<Ban>>;

    /// Whether any effective ban exists for the player
    async fn has_active_ban(&self, player_id: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.active_ban(player_id, now).await?.is_some())
    }

    /// Record a new ban; `duration_minutes` of zero makes it permanent
    async fn create_ban(
        &self,
        player_id: &str,
        reason: BanReason,
        duration_minutes: u32,
        match_id: Option<MatchId>,
    ) -> Result<Ban>;
}

/// In-memory ban ledger for tests and single-node deployments
#[derive(Debug, Default)]
pub struct InMemoryBanLedger {
    bans: RwLock<Vec<Ban>>,
}

impl InMemoryBanLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All bans ever recorded for a player (for tests and audit)
    pub fn bans_for(&self, player_id: &str) -> Vec<Ban> {
        self.bans
            .read()
            .map(|bans| {
                bans.iter()
                    .filter(|ban| ban.user_id == player_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flip the `active` flag on bans whose expiry has passed
    ///
    /// Purely cosmetic bookkeeping: effectiveness checks never rely on it.
    pub fn flag_expired(&self, now: DateTime<Utc>) -> usize {
        let mut flipped = 0;
        if let Ok(mut bans) = self.bans.write() {
            for ban in bans.iter_mut() {
                if ban.active && ban.expires_at.is_some_and(|expires| expires <= now) {
                    ban.active = false;
                    flipped += 1;
                }
            }
        }
        flipped
    }

    fn lock_error() -> crate::error::MatchmakingError {
        crate::error::MatchmakingError::InternalError {
            message: "Failed to acquire ban ledger lock".to_string(),
        }
    }
}

#[async_trait]
impl BanLedger for InMemoryBanLedger {
    async fn active_ban(&self, player_id: &str, now: DateTime<Utc>) -> Result<Option<Ban>> {
        let bans = self.bans.read().map_err(|_| Self::lock_error())?;
        let effective = bans
            .iter()
            .filter(|ban| ban.user_id == player_id && ban.is_effective(now))
            .max_by_key(|ban| match ban.expires_at {
                None => DateTime::<Utc>::MAX_UTC,
                Some(expires) => expires,
            });
        Ok(effective.cloned())
    }

    async fn create_ban(
        &self,
        player_id: &str,
        reason: BanReason,
        duration_minutes: u32,
        match_id: Option<MatchId>,
    ) -> Result<Ban> {
        let now = crate::utils::current_timestamp();
        let ban = Ban {
            user_id: player_id.to_string(),
            reason,
            duration_minutes,
            created_at: now,
            expires_at: expiry_from_minutes(now, duration_minutes),
            active: true,
            match_id,
        };

        let mut bans = self.bans.write().map_err(|_| Self::lock_error())?;
        bans.push(ban.clone());
        Ok(ban)
    }
}
