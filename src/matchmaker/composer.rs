//! Grouping algorithm for composing balanced matches
//!
//! This module decides which waiting players become a match and how they
//! split into teams. Arrival order determines which entries are considered;
//! team composition is decided purely by MMR.

use crate::config::MatchmakingSettings;
use crate::queue::QueueEntry;
use crate::types::PlayerId;

/// Result of a grouping pass
#[derive(Debug, Clone)]
pub enum GroupOutcome {
    /// Enough compatible players; a match can be created
    Grouped(MatchProposal),
    /// Fewer waiting players than a full roster — normal, frequent outcome
    InsufficientPlayers { waiting: usize, needed: usize },
    /// The candidate group's rating spread exceeds the limit; nothing is
    /// consumed
    SpreadTooWide { spread: i32, limit: i32 },
}

/// A composed match waiting to be committed by the service
#[derive(Debug, Clone)]
pub struct MatchProposal {
    /// Lower-MMR half of the group
    pub team_a: Vec<(PlayerId, i32)>,
    /// Higher-MMR half of the group
    pub team_b: Vec<(PlayerId, i32)>,
    /// Rating spread across the whole roster
    pub spread: i32,
}

/// Trait for grouping algorithms
pub trait MatchComposer: Send + Sync {
    /// Examine the waiting pool (arrival-ordered, oldest first) and either
    /// propose a match or report why none can be formed
    fn compose(&self, waiting: &[QueueEntry], settings: &MatchmakingSettings) -> GroupOutcome;
}

/// MMR-band composer
///
/// Sorts the considered entries by MMR and takes the lowest contiguous
/// window of roster size. A contiguous window keeps both team averages
/// close; the spread bound rejects groups that would pair mismatched
/// players rather than splitting them unevenly.
#[derive(Debug, Default)]
pub struct MmrBandComposer;

impl MmrBandComposer {
    pub fn new() -> Self {
        Self
    }
}

impl MatchComposer for MmrBandComposer {
    fn compose(&self, waiting: &[QueueEntry], settings: &MatchmakingSettings) -> GroupOutcome {
        let needed = settings.roster_size();
        if waiting.len() < needed {
            return GroupOutcome::InsufficientPlayers {
                waiting: waiting.len(),
                needed,
            };
        }

        let mut candidates: Vec<(PlayerId, i32)> = waiting
            .iter()
            .map(|entry| (entry.player_id.clone(), entry.mmr))
            .collect();
        candidates.sort_by_key(|(_, mmr)| *mmr);
        candidates.truncate(needed);

        let spread = candidates[needed - 1].1 - candidates[0].1;
        if spread > settings.max_rating_spread {
            return GroupOutcome::SpreadTooWide {
                spread,
                limit: settings.max_rating_spread,
            };
        }

        let team_b = candidates.split_off(settings.team_size);
        GroupOutcome::Grouped(MatchProposal {
            team_a: candidates,
            team_b,
            spread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueStore;
    use crate::utils::current_timestamp;
    use chrono::Duration;

    fn settings() -> MatchmakingSettings {
        MatchmakingSettings::default()
    }

    fn waiting_with_ratings(ratings: &[i32]) -> Vec<QueueEntry> {
        let mut store = QueueStore::new();
        let now = current_timestamp();
        for (i, mmr) in ratings.iter().enumerate() {
            store
                .insert_waiting(format!("player{}", i), *mmr, now, Duration::minutes(30))
                .unwrap();
        }
        store.list_waiting(now)
    }

    #[test]
    fn test_insufficient_players() {
        let waiting = waiting_with_ratings(&[1000, 1010, 1020]);
        let outcome = MmrBandComposer::new().compose(&waiting, &settings());
        assert!(matches!(
            outcome,
            GroupOutcome::InsufficientPlayers {
                waiting: 3,
                needed: 8
            }
        ));
    }

    #[test]
    fn test_groups_reference_ratings() {
        // The reference happy-path roster: spread 110, teams split 4v4 by MMR
        let waiting =
            waiting_with_ratings(&[950, 980, 1000, 1010, 1020, 1030, 1040, 1060]);
        let outcome = MmrBandComposer::new().compose(&waiting, &settings());

        match outcome {
            GroupOutcome::Grouped(proposal) => {
                assert_eq!(proposal.spread, 110);
                let team_a: Vec<i32> = proposal.team_a.iter().map(|(_, mmr)| *mmr).collect();
                let team_b: Vec<i32> = proposal.team_b.iter().map(|(_, mmr)| *mmr).collect();
                assert_eq!(team_a, vec![950, 980, 1000, 1010]);
                assert_eq!(team_b, vec![1020, 1030, 1040, 1060]);
            }
            other => panic!("expected a grouped outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_spread_rejection() {
        // Two tight clusters 1300 apart must not be forced into one match
        let waiting =
            waiting_with_ratings(&[500, 520, 540, 560, 1800, 1820, 1840, 1860]);
        let outcome = MmrBandComposer::new().compose(&waiting, &settings());
        assert!(matches!(
            outcome,
            GroupOutcome::SpreadTooWide {
                spread: 1360,
                limit: 500
            }
        ));
    }

    #[test]
    fn test_takes_lowest_band_of_larger_pool() {
        let waiting = waiting_with_ratings(&[
            2000, 950, 980, 1000, 1010, 1020, 1030, 1040, 1060, 2100,
        ]);
        let outcome = MmrBandComposer::new().compose(&waiting, &settings());

        match outcome {
            GroupOutcome::Grouped(proposal) => {
                let all: Vec<i32> = proposal
                    .team_a
                    .iter()
                    .chain(proposal.team_b.iter())
                    .map(|(_, mmr)| *mmr)
                    .collect();
                assert_eq!(all, vec![950, 980, 1000, 1010, 1020, 1030, 1040, 1060]);
            }
            other => panic!("expected a grouped outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_spread_exactly_at_limit_is_allowed() {
        let waiting =
            waiting_with_ratings(&[1000, 1100, 1200, 1250, 1300, 1350, 1400, 1500]);
        let outcome = MmrBandComposer::new().compose(&waiting, &settings());
        assert!(matches!(
            outcome,
            GroupOutcome::Grouped(MatchProposal { spread: 500, .. })
        ));
    }
}
