//! Server assignment interface and implementations
//!
//! Once a match has a resolved map it needs a game server. Assignment
//! failure is never fatal: "no server available now" is a transient outcome
//! retried by the reconciliation sweep.

use crate::error::Result;
use crate::types::{GameServer, MatchId, MatchSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Trait for the external server-assignment collaborator
#[async_trait]
pub trait ServerAssigner: Send + Sync {
    /// Try to reserve a server for a match with a resolved map
    ///
    /// `Ok(None)` means no capacity right now; the caller retries later.
    async fn assign(&self, game: &MatchSnapshot) -> Result<Option<GameServer>>;

    /// Give a match's server back to the pool; unknown matches are ignored
    async fn release(&self, match_id: MatchId) -> Result<()>;
}

/// Fixed-pool server assigner for tests and single-node deployments
#[derive(Debug)]
pub struct StaticServerAssigner {
    pool: Vec<GameServer>,
    assigned: RwLock<HashMap<MatchId, GameServer>>,
}

impl StaticServerAssigner {
    pub fn new(pool: Vec<GameServer>) -> Self {
        Self {
            pool,
            assigned: RwLock::new(HashMap::new()),
        }
    }

    /// A single-server pool, enough for development setups
    pub fn single(ip: &str, port: u16, password: &str) -> Self {
        Self::new(vec![GameServer {
            ip: ip.to_string(),
            port,
            password: password.to_string(),
        }])
    }

    fn lock_error() -> crate::error::MatchmakingError {
        crate::error::MatchmakingError::InternalError {
            message: "Failed to acquire server pool lock".to_string(),
        }
    }
}

#[async_trait]
impl ServerAssigner for StaticServerAssigner {
    async fn assign(&self, game: &MatchSnapshot) -> Result<Option<GameServer>> {
        let mut assigned = self.assigned.write().map_err(|_| Self::lock_error())?;

        // A repeated request for the same match keeps its reservation
        if let Some(server) = assigned.get(&game.id) {
            return Ok(Some(server.clone()));
        }

        let free = self
            .pool
            .iter()
            .find(|server| !assigned.values().any(|used| used == *server));

        match free {
            Some(server) => {
                assigned.insert(game.id, server.clone());
                Ok(Some(server.clone()))
            }
            None => {
                debug!("No free server for match {}", game.id);
                Ok(None)
            }
        }
    }

    async fn release(&self, match_id: MatchId) -> Result<()> {
        let mut assigned = self.assigned.write().map_err(|_| Self::lock_error())?;
        assigned.remove(&match_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchStatus, MatchSnapshot};
    use crate::utils::{current_timestamp, generate_match_id};

    fn snapshot() -> MatchSnapshot {
        let now = current_timestamp();
        MatchSnapshot {
            id: generate_match_id(),
            status: MatchStatus::Veto,
            players: vec![],
            map_votes: vec![],
            selected_map: Some("de_dust2".to_string()),
            server: None,
            team_a_score: 0,
            team_b_score: 0,
            winner_team: None,
            created_at: now,
            accept_deadline: now,
        }
    }

    #[tokio::test]
    async fn test_assignment_exhausts_pool() {
        let assigner = StaticServerAssigner::single("10.0.0.1", 27015, "scrim");

        let first = snapshot();
        let second = snapshot();

        assert!(assigner.assign(&first).await.unwrap().is_some());
        // Pool of one: the second match has to wait
        assert!(assigner.assign(&second).await.unwrap().is_none());

        assigner.release(first.id).await.unwrap();
        assert!(assigner.assign(&second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_repeated_assignment_is_stable() {
        let assigner = StaticServerAssigner::single("10.0.0.1", 27015, "scrim");
        let game = snapshot();

        let a = assigner.assign(&game).await.unwrap().unwrap();
        let b = assigner.assign(&game).await.unwrap().unwrap();
        assert_eq!(a, b);
    }
}
