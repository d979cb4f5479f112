//! Common types used throughout the matchmaking core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players, owned by the identity subsystem
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Identifier for a playable map
pub type MapId = String;

/// Side assignment within a match roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    /// Numeric label used in user-facing payloads (1 or 2)
    pub fn number(&self) -> u8 {
        match self {
            Team::A => 1,
            Team::B => 2,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "team {}", self.number())
    }
}

/// Lifecycle status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueEntryStatus {
    /// Waiting to be grouped into a match
    Waiting,
    /// Consumed by a pending match, cannot be left voluntarily
    Matched,
}

/// Match lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Acceptance gate plus map voting, before a server is assigned
    Veto,
    /// Map resolved and server assigned, waiting for the server to start
    Ready,
    /// Server confirmed the match is running
    InProgress,
    /// A connected player dropped mid-match
    Paused,
    /// Result reported (terminal)
    Completed,
    /// Acceptance timeout or manual abort (terminal)
    Cancelled,
}

impl MatchStatus {
    /// A match in one of these states still claims its players
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            MatchStatus::Veto | MatchStatus::Ready | MatchStatus::InProgress | MatchStatus::Paused
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::Veto => "veto",
            MatchStatus::Ready => "ready",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Paused => "paused",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Why a ban was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BanReason {
    /// Failed to accept a found match before the deadline
    AfkAccept,
    /// Accepted but never joined the assigned server
    NoJoin,
    Crash,
    Manual,
    Trolling,
    Cheating,
}

impl std::fmt::Display for BanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BanReason::AfkAccept => "did not accept match",
            BanReason::NoJoin => "did not join server",
            BanReason::Crash => "crashed out of match",
            BanReason::Manual => "administrative action",
            BanReason::Trolling => "trolling",
            BanReason::Cheating => "cheating",
        };
        write!(f, "{}", s)
    }
}

/// Connection details for an assigned game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServer {
    pub ip: String,
    pub port: u16,
    pub password: String,
}

/// One roster slot in a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub player_id: PlayerId,
    pub team: Team,
    /// Rating snapshot carried over from the queue entry
    pub mmr: i32,
    pub accepted: bool,
    pub connected: bool,
}

/// A single recorded map vote; casting order is significant for tie-breaks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapVote {
    pub player_id: PlayerId,
    pub map: MapId,
}

/// Read-only view of a match, safe to hand to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub status: MatchStatus,
    pub players: Vec<RosterMember>,
    pub map_votes: Vec<MapVote>,
    pub selected_map: Option<MapId>,
    pub server: Option<GameServer>,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub winner_team: Option<Team>,
    pub created_at: DateTime<Utc>,
    pub accept_deadline: DateTime<Utc>,
}

/// Read-only view of a queue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntrySnapshot {
    pub player_id: PlayerId,
    pub mmr: i32,
    pub status: QueueEntryStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub match_id: Option<MatchId>,
}

/// Answer to a queue status poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub entry: Option<QueueEntrySnapshot>,
    pub total_waiting: usize,
    pub active_match: Option<MatchSnapshot>,
}

/// Final result of a completed match, handed to the rating collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub players: Vec<RosterMember>,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub winner_team: Team,
}

/// AMQP Message Types
/// Command addressed to the matchmaking core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchmakingCommand {
    Enqueue {
        player_id: PlayerId,
    },
    Dequeue {
        player_id: PlayerId,
    },
    Accept {
        match_id: MatchId,
        player_id: PlayerId,
    },
    Vote {
        match_id: MatchId,
        player_id: PlayerId,
        map: MapId,
    },
}

/// Event emitted when a player enters the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerQueued {
    pub player_id: PlayerId,
    pub mmr: i32,
    pub total_waiting: usize,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a player leaves the queue voluntarily
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDequeued {
    pub player_id: PlayerId,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when the matchmaker composes a new match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreated {
    pub match_id: MatchId,
    pub players: Vec<RosterMember>,
    pub accept_deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match is cancelled at the acceptance deadline
/// or by manual abort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCancelled {
    pub match_id: MatchId,
    /// Players banned for failing the acceptance gate
    pub banned: Vec<PlayerId>,
    /// Players returned to the queue with a fresh entry
    pub requeued: Vec<PlayerId>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when map voting resolves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSelected {
    pub match_id: MatchId,
    pub map: MapId,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a server is assigned and the match becomes ready
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReady {
    pub match_id: MatchId,
    pub server: GameServer,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when the game server confirms the match started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStarted {
    pub match_id: MatchId,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a final result is recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCompleted {
    pub match_id: MatchId,
    pub team_a_score: u32,
    pub team_b_score: u32,
    pub winner_team: Team,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound AMQP events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchEvent {
    PlayerQueued(PlayerQueued),
    PlayerDequeued(PlayerDequeued),
    MatchCreated(MatchCreated),
    MatchCancelled(MatchCancelled),
    MapSelected(MapSelected),
    MatchReady(MatchReady),
    MatchStarted(MatchStarted),
    MatchCompleted(MatchCompleted),
}
