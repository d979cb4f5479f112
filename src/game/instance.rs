//! Match instance implementation and lifecycle management
//!
//! This module contains the core match logic: the fixed roster, the
//! acceptance gate, map voting with deterministic tie-breaks, and the
//! report-driven state machine.

use crate::error::{MatchmakingError, Result};
use crate::types::{
    GameServer, MapId, MapVote, MatchId, MatchSnapshot, MatchStatus, PlayerId, RosterMember, Team,
};
use chrono::{DateTime, Utc};

/// Outcome of recording an acceptance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Acceptance recorded, others still outstanding
    Recorded,
    /// This acceptance was the last one; map voting is open
    AllAccepted,
    /// The player had already accepted; nothing changed
    AlreadyAccepted,
}

/// Outcome of recording a map vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote recorded, waiting for the remaining voters
    Recorded { votes_cast: usize },
    /// This was the final vote; the winning map is now selected
    Resolved { map: MapId },
}

/// A single match and all of its owned state
#[derive(Debug, Clone)]
pub struct MatchInstance {
    id: MatchId,
    status: MatchStatus,
    players: Vec<RosterMember>,
    map_votes: Vec<MapVote>,
    selected_map: Option<MapId>,
    server: Option<GameServer>,
    team_a_score: u32,
    team_b_score: u32,
    winner_team: Option<Team>,
    created_at: DateTime<Utc>,
    accept_deadline: DateTime<Utc>,
}

impl MatchInstance {
    /// Create a match from two equal team rosters of `(player, mmr)` pairs
    pub fn new(
        id: MatchId,
        team_a: Vec<(PlayerId, i32)>,
        team_b: Vec<(PlayerId, i32)>,
        created_at: DateTime<Utc>,
        accept_deadline: DateTime<Utc>,
    ) -> Result<Self> {
        if team_a.is_empty() || team_a.len() != team_b.len() {
            return Err(MatchmakingError::Integrity {
                message: format!(
                    "match {} roster must be two equal non-empty teams, got {}v{}",
                    id,
                    team_a.len(),
                    team_b.len()
                ),
            }
            .into());
        }

        let mut players = Vec::with_capacity(team_a.len() * 2);
        for (team, roster) in [(Team::A, team_a), (Team::B, team_b)] {
            for (player_id, mmr) in roster {
                players.push(RosterMember {
                    player_id,
                    team,
                    mmr,
                    accepted: false,
                    connected: false,
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for member in &players {
            if !seen.insert(member.player_id.clone()) {
                return Err(MatchmakingError::Integrity {
                    message: format!(
                        "match {} roster contains {} twice",
                        id, member.player_id
                    ),
                }
                .into());
            }
        }

        Ok(Self {
            id,
            status: MatchStatus::Veto,
            players,
            map_votes: Vec::new(),
            selected_map: None,
            server: None,
            team_a_score: 0,
            team_b_score: 0,
            winner_team: None,
            created_at,
            accept_deadline,
        })
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn accept_deadline(&self) -> DateTime<Utc> {
        self.accept_deadline
    }

    pub fn selected_map(&self) -> Option<&MapId> {
        self.selected_map.as_ref()
    }

    pub fn server(&self) -> Option<&GameServer> {
        self.server.as_ref()
    }

    pub fn players(&self) -> &[RosterMember] {
        &self.players
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|m| m.player_id.clone()).collect()
    }

    pub fn is_player(&self, player_id: &str) -> bool {
        self.players.iter().any(|m| m.player_id == player_id)
    }

    pub fn all_accepted(&self) -> bool {
        self.players.iter().all(|m| m.accepted)
    }

    /// Players who confirmed readiness in time
    pub fn accepted_players(&self) -> Vec<&RosterMember> {
        self.players.iter().filter(|m| m.accepted).collect()
    }

    /// Players still holding the match up
    pub fn non_accepting_players(&self) -> Vec<&RosterMember> {
        self.players.iter().filter(|m| !m.accepted).collect()
    }

    /// Whether the acceptance deadline has passed
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.accept_deadline
    }

    /// Map voting is resolved but no server has confirmed yet
    pub fn awaiting_server(&self) -> bool {
        self.status == MatchStatus::Veto && self.selected_map.is_some() && self.server.is_none()
    }

    fn member_mut(&mut self, player_id: &str) -> Option<&mut RosterMember> {
        self.players.iter_mut().find(|m| m.player_id == player_id)
    }

    /// Record a player's acceptance
    ///
    /// Idempotent: a second accept reports `AlreadyAccepted` without error
    /// and without double-counting.
    pub fn accept(&mut self, player_id: &str) -> Result<AcceptOutcome> {
        if self.status != MatchStatus::Veto {
            return Err(MatchmakingError::NotInVeto {
                match_id: self.id,
                status: self.status,
            }
            .into());
        }

        let match_id = self.id;
        let member = self.member_mut(player_id).ok_or_else(|| {
            MatchmakingError::NotAPlayer {
                match_id,
                player_id: player_id.to_string(),
            }
        })?;

        if member.accepted {
            return Ok(AcceptOutcome::AlreadyAccepted);
        }
        member.accepted = true;

        if self.all_accepted() {
            Ok(AcceptOutcome::AllAccepted)
        } else {
            Ok(AcceptOutcome::Recorded)
        }
    }

    /// Record a map vote, resolving the tally when the last voter lands
    ///
    /// Voting is a sub-phase of VETO: it opens once every player has
    /// accepted and closes when `selected_map` is set. One vote per player;
    /// re-voting is rejected, not overwritten.
    pub fn vote(&mut self, player_id: &str, map: &str, map_pool: &[String]) -> Result<VoteOutcome> {
        if self.status != MatchStatus::Veto {
            return Err(MatchmakingError::NotInVeto {
                match_id: self.id,
                status: self.status,
            }
            .into());
        }
        if !self.all_accepted() {
            return Err(MatchmakingError::NotAllAccepted { match_id: self.id }.into());
        }
        if !self.is_player(player_id) {
            return Err(MatchmakingError::NotAPlayer {
                match_id: self.id,
                player_id: player_id.to_string(),
            }
            .into());
        }
        if !map_pool.iter().any(|m| m == map) {
            return Err(MatchmakingError::UnknownMap {
                map: map.to_string(),
            }
            .into());
        }
        // A resolved tally means every roster member has voted already,
        // so any further vote is necessarily a repeat
        if self.selected_map.is_some()
            || self.map_votes.iter().any(|v| v.player_id == player_id)
        {
            return Err(MatchmakingError::AlreadyVoted {
                match_id: self.id,
                player_id: player_id.to_string(),
            }
            .into());
        }

        self.map_votes.push(MapVote {
            player_id: player_id.to_string(),
            map: map.to_string(),
        });

        if self.map_votes.len() > self.players.len() {
            return Err(MatchmakingError::Integrity {
                message: format!(
                    "match {} has {} votes for {} players",
                    self.id,
                    self.map_votes.len(),
                    self.players.len()
                ),
            }
            .into());
        }

        if self.map_votes.len() == self.players.len() {
            let winner = self.tally_winner();
            self.selected_map = Some(winner.clone());
            Ok(VoteOutcome::Resolved { map: winner })
        } else {
            Ok(VoteOutcome::Recorded {
                votes_cast: self.map_votes.len(),
            })
        }
    }

    /// Most votes wins; ties break to the map that reached the tied count
    /// first in casting order
    fn tally_winner(&self) -> MapId {
        let mut best: Option<(&MapId, usize, usize)> = None; // (map, count, deciding index)

        for (index, vote) in self.map_votes.iter().enumerate() {
            let count = self
                .map_votes
                .iter()
                .filter(|v| v.map == vote.map)
                .count();
            // The last vote for a map is the one that brought it to its
            // final count, so its index is the deciding position
            let last_index = self
                .map_votes
                .iter()
                .rposition(|v| v.map == vote.map)
                .unwrap_or(index);

            let better = match best {
                None => true,
                Some((_, best_count, best_index)) => {
                    count > best_count || (count == best_count && last_index < best_index)
                }
            };
            if better {
                best = Some((&vote.map, count, last_index));
            }
        }

        best.map(|(map, _, _)| map.clone())
            .expect("tally requires at least one vote")
    }

    /// Apply a server assignment report: VETO with a resolved map → READY
    ///
    /// Returns `true` when the report performed the transition; a repeated
    /// report for an already-ready match is a no-op.
    pub fn assign_server(&mut self, server: GameServer) -> Result<bool> {
        match self.status {
            MatchStatus::Veto if self.selected_map.is_some() => {
                self.server = Some(server);
                self.status = MatchStatus::Ready;
                Ok(true)
            }
            MatchStatus::Ready => Ok(false),
            _ => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "server_assigned".to_string(),
            }
            .into()),
        }
    }

    /// Apply a start report: READY → IN_PROGRESS
    ///
    /// All roster members count as connected once the server confirms the
    /// start. Returns `true` when the report performed the transition;
    /// repeated reports are no-ops.
    pub fn start(&mut self) -> Result<bool> {
        match self.status {
            MatchStatus::Ready => {
                for member in &mut self.players {
                    member.connected = true;
                }
                self.status = MatchStatus::InProgress;
                Ok(true)
            }
            MatchStatus::InProgress => Ok(false),
            _ => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "started".to_string(),
            }
            .into()),
        }
    }

    /// Apply a completion report: IN_PROGRESS → COMPLETED
    ///
    /// Returns `true` when this report was the first application; a repeat
    /// for an already-completed match leaves the scores untouched and
    /// returns `false`.
    pub fn complete(
        &mut self,
        team_a_score: u32,
        team_b_score: u32,
        winner_team: Team,
    ) -> Result<bool> {
        match self.status {
            MatchStatus::InProgress => {
                self.team_a_score = team_a_score;
                self.team_b_score = team_b_score;
                self.winner_team = Some(winner_team);
                self.status = MatchStatus::Completed;
                Ok(true)
            }
            MatchStatus::Completed => Ok(false),
            _ => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "completed".to_string(),
            }
            .into()),
        }
    }

    /// Apply a disconnect report: IN_PROGRESS → PAUSED
    ///
    /// Returns `true` when the report paused the match; a further
    /// disconnect while already paused only marks the player.
    pub fn player_disconnected(&mut self, player_id: &str) -> Result<bool> {
        if !self.is_player(player_id) {
            return Err(MatchmakingError::NotAPlayer {
                match_id: self.id,
                player_id: player_id.to_string(),
            }
            .into());
        }

        match self.status {
            MatchStatus::InProgress => {
                if let Some(member) = self.member_mut(player_id) {
                    member.connected = false;
                }
                self.status = MatchStatus::Paused;
                Ok(true)
            }
            MatchStatus::Paused => {
                if let Some(member) = self.member_mut(player_id) {
                    member.connected = false;
                }
                Ok(false)
            }
            _ => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "player_disconnected".to_string(),
            }
            .into()),
        }
    }

    /// Apply a reconnect report: PAUSED → IN_PROGRESS once everyone is back
    ///
    /// Returns `true` when the report resumed the match.
    pub fn player_reconnected(&mut self, player_id: &str) -> Result<bool> {
        if !self.is_player(player_id) {
            return Err(MatchmakingError::NotAPlayer {
                match_id: self.id,
                player_id: player_id.to_string(),
            }
            .into());
        }

        match self.status {
            MatchStatus::Paused => {
                if let Some(member) = self.member_mut(player_id) {
                    member.connected = true;
                }
                if self.players.iter().all(|m| m.connected) {
                    self.status = MatchStatus::InProgress;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MatchStatus::InProgress => Ok(false),
            _ => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "player_reconnected".to_string(),
            }
            .into()),
        }
    }

    /// Cancel the match (acceptance timeout or manual abort)
    ///
    /// Cancelling an already-cancelled match is a no-op; a completed match
    /// can no longer be cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        match self.status {
            MatchStatus::Cancelled => Ok(()),
            MatchStatus::Completed => Err(MatchmakingError::InvalidTransition {
                match_id: self.id,
                status: self.status,
                event: "cancelled".to_string(),
            }
            .into()),
            _ => {
                self.status = MatchStatus::Cancelled;
                Ok(())
            }
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            status: self.status,
            players: self.players.clone(),
            map_votes: self.map_votes.clone(),
            selected_map: self.selected_map.clone(),
            server: self.server.clone(),
            team_a_score: self.team_a_score,
            team_b_score: self.team_b_score,
            winner_team: self.winner_team,
            created_at: self.created_at,
            accept_deadline: self.accept_deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{current_timestamp, generate_match_id};
    use chrono::Duration;

    fn test_pool() -> Vec<String> {
        vec![
            "de_dust2".to_string(),
            "de_mirage".to_string(),
            "de_inferno".to_string(),
        ]
    }

    fn create_test_match() -> MatchInstance {
        let now = current_timestamp();
        MatchInstance::new(
            generate_match_id(),
            vec![
                ("a1".to_string(), 950),
                ("a2".to_string(), 980),
                ("a3".to_string(), 1000),
                ("a4".to_string(), 1010),
            ],
            vec![
                ("b1".to_string(), 1020),
                ("b2".to_string(), 1030),
                ("b3".to_string(), 1040),
                ("b4".to_string(), 1060),
            ],
            now,
            now + Duration::seconds(30),
        )
        .unwrap()
    }

    fn accept_all(game: &mut MatchInstance) {
        for player in game.player_ids() {
            game.accept(&player).unwrap();
        }
    }

    #[test]
    fn test_match_creation() {
        let game = create_test_match();
        assert_eq!(game.status(), MatchStatus::Veto);
        assert_eq!(game.players().len(), 8);
        assert_eq!(
            game.players().iter().filter(|m| m.team == Team::A).count(),
            4
        );
        assert!(!game.all_accepted());
        assert!(game.selected_map().is_none());
    }

    #[test]
    fn test_unbalanced_roster_rejected() {
        let now = current_timestamp();
        let result = MatchInstance::new(
            generate_match_id(),
            vec![("a1".to_string(), 1000)],
            vec![("b1".to_string(), 1000), ("b2".to_string(), 1000)],
            now,
            now + Duration::seconds(30),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_roster_member_rejected() {
        let now = current_timestamp();
        let result = MatchInstance::new(
            generate_match_id(),
            vec![("dup".to_string(), 1000)],
            vec![("dup".to_string(), 1000)],
            now,
            now + Duration::seconds(30),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_accept_flow() {
        let mut game = create_test_match();

        assert_eq!(game.accept("a1").unwrap(), AcceptOutcome::Recorded);
        // Accepting twice is not an error and does not double-count
        assert_eq!(game.accept("a1").unwrap(), AcceptOutcome::AlreadyAccepted);

        for player in ["a2", "a3", "a4", "b1", "b2", "b3"] {
            assert_eq!(game.accept(player).unwrap(), AcceptOutcome::Recorded);
        }
        assert_eq!(game.accept("b4").unwrap(), AcceptOutcome::AllAccepted);
        assert!(game.all_accepted());
    }

    #[test]
    fn test_accept_rejects_outsiders() {
        let mut game = create_test_match();
        assert!(game.accept("stranger").is_err());
    }

    #[test]
    fn test_vote_gated_on_acceptance() {
        let mut game = create_test_match();
        game.accept("a1").unwrap();
        assert!(game.vote("a1", "de_dust2", &test_pool()).is_err());
    }

    #[test]
    fn test_vote_rejects_unknown_map() {
        let mut game = create_test_match();
        accept_all(&mut game);
        assert!(game.vote("a1", "de_atlantis", &test_pool()).is_err());
    }

    #[test]
    fn test_vote_rejects_revote() {
        let mut game = create_test_match();
        accept_all(&mut game);

        game.vote("a1", "de_dust2", &test_pool()).unwrap();
        assert!(game.vote("a1", "de_mirage", &test_pool()).is_err());
    }

    #[test]
    fn test_vote_resolution_by_majority() {
        let mut game = create_test_match();
        accept_all(&mut game);

        for player in ["a1", "a2", "a3", "a4", "b1"] {
            game.vote(player, "de_mirage", &test_pool()).unwrap();
        }
        for player in ["b2", "b3"] {
            game.vote(player, "de_dust2", &test_pool()).unwrap();
        }
        let outcome = game.vote("b4", "de_inferno", &test_pool()).unwrap();

        assert_eq!(
            outcome,
            VoteOutcome::Resolved {
                map: "de_mirage".to_string()
            }
        );
        assert_eq!(game.selected_map().unwrap(), "de_mirage");
    }

    #[test]
    fn test_vote_tie_breaks_to_earliest_deciding_vote() {
        let mut game = create_test_match();
        accept_all(&mut game);

        // Interleaved 4-4 tie: dust2's fourth vote lands before mirage's
        game.vote("a1", "de_dust2", &test_pool()).unwrap();
        game.vote("b1", "de_mirage", &test_pool()).unwrap();
        game.vote("a2", "de_dust2", &test_pool()).unwrap();
        game.vote("b2", "de_mirage", &test_pool()).unwrap();
        game.vote("a3", "de_dust2", &test_pool()).unwrap();
        game.vote("b3", "de_mirage", &test_pool()).unwrap();
        let outcome = game.vote("a4", "de_dust2", &test_pool()).unwrap();
        assert_eq!(
            outcome,
            VoteOutcome::Recorded { votes_cast: 7 }
        );
        let outcome = game.vote("b4", "de_mirage", &test_pool()).unwrap();

        assert_eq!(
            outcome,
            VoteOutcome::Resolved {
                map: "de_dust2".to_string()
            }
        );
    }

    #[test]
    fn test_server_assignment_requires_resolved_map() {
        let mut game = create_test_match();
        accept_all(&mut game);

        let server = GameServer {
            ip: "10.0.0.1".to_string(),
            port: 27015,
            password: "scrim".to_string(),
        };
        // No map selected yet
        assert!(game.assign_server(server.clone()).is_err());

        for player in game.player_ids() {
            game.vote(&player, "de_dust2", &test_pool()).unwrap();
        }
        assert!(game.assign_server(server.clone()).unwrap());
        assert_eq!(game.status(), MatchStatus::Ready);

        // Repeated report is a no-op
        assert!(!game.assign_server(server).unwrap());
        assert_eq!(game.status(), MatchStatus::Ready);
    }

    fn ready_match() -> MatchInstance {
        let mut game = create_test_match();
        accept_all(&mut game);
        for player in game.player_ids() {
            game.vote(&player, "de_dust2", &test_pool()).unwrap();
        }
        game.assign_server(GameServer {
            ip: "10.0.0.1".to_string(),
            port: 27015,
            password: "scrim".to_string(),
        })
        .unwrap();
        game
    }

    #[test]
    fn test_start_and_complete() {
        let mut game = ready_match();

        assert!(game.start().unwrap());
        assert_eq!(game.status(), MatchStatus::InProgress);
        assert!(game.players().iter().all(|m| m.connected));
        // A repeated start report changes nothing
        assert!(!game.start().unwrap());

        // First completion applies the result
        assert!(game.complete(16, 9, Team::A).unwrap());
        assert_eq!(game.status(), MatchStatus::Completed);

        // Second completion is a no-op with unchanged scores
        assert!(!game.complete(0, 16, Team::B).unwrap());
        let snapshot = game.snapshot();
        assert_eq!(snapshot.team_a_score, 16);
        assert_eq!(snapshot.team_b_score, 9);
        assert_eq!(snapshot.winner_team, Some(Team::A));
    }

    #[test]
    fn test_start_rejected_in_veto() {
        let mut game = create_test_match();
        assert!(game.start().is_err());
    }

    #[test]
    fn test_complete_rejected_after_cancel() {
        let mut game = create_test_match();
        game.cancel().unwrap();
        assert!(game.complete(16, 9, Team::A).is_err());
        // Repeated cancel stays a no-op
        game.cancel().unwrap();
        assert_eq!(game.status(), MatchStatus::Cancelled);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut game = ready_match();
        game.start().unwrap();

        assert!(game.player_disconnected("a1").unwrap());
        assert_eq!(game.status(), MatchStatus::Paused);

        // A second drop while paused only marks the player
        assert!(!game.player_disconnected("b1").unwrap());
        assert_eq!(game.status(), MatchStatus::Paused);

        assert!(!game.player_reconnected("a1").unwrap());
        assert_eq!(game.status(), MatchStatus::Paused);
        assert!(game.player_reconnected("b1").unwrap());
        assert_eq!(game.status(), MatchStatus::InProgress);
    }

    #[test]
    fn test_deadline_passed() {
        let game = create_test_match();
        let created = game.created_at();
        assert!(!game.deadline_passed(created + Duration::seconds(29)));
        assert!(game.deadline_passed(created + Duration::seconds(30)));
        assert!(game.deadline_passed(created + Duration::minutes(5)));
    }
}
