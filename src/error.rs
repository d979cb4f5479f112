//! Error types for the matchmaking core
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Precondition violations carry enough context to
//! render short, specific player-facing messages; repository and transport
//! failures are kept distinct so callers can tell "you can't do that" from
//! "try again".

use crate::types::{BanReason, MapId, MatchId, MatchStatus, PlayerId};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("player {player_id} is already queued")]
    AlreadyQueued { player_id: PlayerId },

    #[error("player {player_id} is banned for {remaining_minutes} more minutes ({reason})")]
    AlreadyBanned {
        player_id: PlayerId,
        reason: BanReason,
        remaining_minutes: i64,
    },

    #[error("player {player_id} is permanently banned ({reason})")]
    PermanentlyBanned {
        player_id: PlayerId,
        reason: BanReason,
    },

    #[error("player {player_id} is already in an active match ({match_id})")]
    AlreadyInActiveMatch {
        player_id: PlayerId,
        match_id: MatchId,
    },

    #[error("match not found: {match_id}")]
    MatchNotFound { match_id: MatchId },

    #[error("match {match_id} is not awaiting acceptance (status: {status})")]
    NotInVeto {
        match_id: MatchId,
        status: MatchStatus,
    },

    #[error("player {player_id} is not part of match {match_id}")]
    NotAPlayer {
        match_id: MatchId,
        player_id: PlayerId,
    },

    #[error("match {match_id} cannot vote yet, not all players have accepted")]
    NotAllAccepted { match_id: MatchId },

    #[error("player {player_id} already voted in match {match_id}")]
    AlreadyVoted {
        match_id: MatchId,
        player_id: PlayerId,
    },

    #[error("unknown map: {map}")]
    UnknownMap { map: MapId },

    #[error("match {match_id} cannot apply '{event}' in status {status}")]
    InvalidTransition {
        match_id: MatchId,
        status: MatchStatus,
        event: String,
    },

    #[error("integrity violation: {message}")]
    Integrity { message: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}
