//! Queue store implementation with TTL-based lazy expiry
//!
//! Entries past their `expires_at` are invisible to every query; a periodic
//! sweep physically deletes them, but correctness never depends on when that
//! sweep runs.

use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, PlayerId, QueueEntrySnapshot, QueueEntryStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// One waiting or matched player in the queue
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    /// Rating snapshot taken at enqueue time
    pub mmr: i32,
    pub status: QueueEntryStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub match_id: Option<MatchId>,
    /// Arrival tie-break when two entries share a timestamp
    seq: u64,
}

impl QueueEntry {
    /// Expiry only ever applies to waiting entries; a matched entry's
    /// lifecycle is owned by its match
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            QueueEntryStatus::Waiting => self.expires_at > now,
            QueueEntryStatus::Matched => true,
        }
    }

    pub fn snapshot(&self) -> QueueEntrySnapshot {
        QueueEntrySnapshot {
            player_id: self.player_id.clone(),
            mmr: self.mmr,
            status: self.status,
            created_at: self.created_at,
            expires_at: self.expires_at,
            match_id: self.match_id,
        }
    }
}

/// In-memory queue store keyed by player
#[derive(Debug, Default)]
pub struct QueueStore {
    entries: HashMap<PlayerId, QueueEntry>,
    next_seq: u64,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh waiting entry for a player
    ///
    /// Fails with `AlreadyQueued` if the player already has a live entry.
    /// An expired leftover entry is replaced silently.
    pub fn insert_waiting(
        &mut self,
        player_id: PlayerId,
        mmr: i32,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<QueueEntrySnapshot> {
        if let Some(existing) = self.entries.get(&player_id) {
            if existing.is_live(now) {
                return Err(MatchmakingError::AlreadyQueued { player_id }.into());
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = QueueEntry {
            player_id: player_id.clone(),
            mmr,
            status: QueueEntryStatus::Waiting,
            created_at: now,
            expires_at: now + ttl,
            match_id: None,
            seq,
        };
        let snapshot = entry.snapshot();
        self.entries.insert(player_id, entry);
        Ok(snapshot)
    }

    /// Remove a player's waiting entry
    ///
    /// Matched entries cannot be left voluntarily; returns `None` when the
    /// player has no live waiting entry.
    pub fn dequeue(&mut self, player_id: &str, now: DateTime<Utc>) -> Option<QueueEntrySnapshot> {
        match self.entries.get(player_id) {
            Some(entry) if entry.status == QueueEntryStatus::Waiting && entry.is_live(now) => {
                self.entries.remove(player_id).map(|e| e.snapshot())
            }
            _ => None,
        }
    }

    /// Get a player's live entry, if any
    pub fn entry(&self, player_id: &str, now: DateTime<Utc>) -> Option<&QueueEntry> {
        self.entries
            .get(player_id)
            .filter(|entry| entry.is_live(now))
    }

    /// All live waiting entries ordered by arrival (oldest first)
    pub fn list_waiting(&self, now: DateTime<Utc>) -> Vec<QueueEntry> {
        let mut waiting: Vec<QueueEntry> = self
            .entries
            .values()
            .filter(|entry| entry.status == QueueEntryStatus::Waiting && entry.is_live(now))
            .cloned()
            .collect();
        waiting.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        waiting
    }

    /// Number of live waiting entries
    pub fn waiting_len(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == QueueEntryStatus::Waiting && entry.is_live(now))
            .count()
    }

    /// Flip a set of waiting entries to matched, pointing at a new match
    ///
    /// All-or-nothing: the caller runs this inside the same critical section
    /// that creates the match, and every named player must hold a waiting
    /// entry or the whole step aborts without touching the store.
    pub fn mark_matched(&mut self, player_ids: &[PlayerId], match_id: MatchId) -> Result<()> {
        for player_id in player_ids {
            match self.entries.get(player_id) {
                Some(entry) if entry.status == QueueEntryStatus::Waiting => {}
                _ => {
                    return Err(MatchmakingError::Integrity {
                        message: format!(
                            "cannot mark {} matched for {}: no waiting entry",
                            player_id, match_id
                        ),
                    }
                    .into());
                }
            }
        }

        for player_id in player_ids {
            if let Some(entry) = self.entries.get_mut(player_id) {
                entry.status = QueueEntryStatus::Matched;
                entry.match_id = Some(match_id);
            }
        }
        Ok(())
    }

    /// Delete every entry referencing a match, returning the affected players
    pub fn remove_for_match(&mut self, match_id: MatchId) -> Vec<PlayerId> {
        let affected: Vec<PlayerId> = self
            .entries
            .values()
            .filter(|entry| entry.match_id == Some(match_id))
            .map(|entry| entry.player_id.clone())
            .collect();
        for player_id in &affected {
            self.entries.remove(player_id);
        }
        affected
    }

    /// Physically delete expired waiting entries
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    /// Total number of stored entries, live or not (for stats)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
