//! AMQP message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::*;

/// AMQP queue names
pub const COMMAND_QUEUE: &str = "matchmaking.commands";
pub const QUEUE_EVENTS_EXCHANGE: &str = "matchmaking.queue_events";
pub const MATCH_EVENTS_EXCHANGE: &str = "matchmaking.match_events";

/// Routing keys for events
pub const PLAYER_QUEUED_ROUTING_KEY: &str = "queue.joined";
pub const PLAYER_DEQUEUED_ROUTING_KEY: &str = "queue.left";
pub const MATCH_CREATED_ROUTING_KEY: &str = "match.created";
pub const MATCH_CANCELLED_ROUTING_KEY: &str = "match.cancelled";
pub const MAP_SELECTED_ROUTING_KEY: &str = "match.map_selected";
pub const MATCH_READY_ROUTING_KEY: &str = "match.ready";
pub const MATCH_STARTED_ROUTING_KEY: &str = "match.started";
pub const MATCH_COMPLETED_ROUTING_KEY: &str = "match.completed";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Serialize a matchmaking command to bytes
    pub fn serialize_command(command: &MatchmakingCommand) -> Result<Vec<u8>> {
        Self::validate_command(command)?;
        serde_json::to_vec(command).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize command: {}", e),
            }
            .into()
        })
    }

    /// Deserialize a matchmaking command from bytes
    pub fn deserialize_command(bytes: &[u8]) -> Result<MatchmakingCommand> {
        let command: MatchmakingCommand =
            serde_json::from_slice(bytes).map_err(|e| MatchmakingError::InternalError {
                message: format!("Failed to deserialize command: {}", e),
            })?;

        Self::validate_command(&command)?;
        Ok(command)
    }

    /// Validate a matchmaking command
    pub fn validate_command(command: &MatchmakingCommand) -> Result<()> {
        let player_id = match command {
            MatchmakingCommand::Enqueue { player_id }
            | MatchmakingCommand::Dequeue { player_id }
            | MatchmakingCommand::Accept { player_id, .. }
            | MatchmakingCommand::Vote { player_id, .. } => player_id,
        };
        if player_id.is_empty() {
            return Err(MatchmakingError::InternalError {
                message: "Player ID cannot be empty".to_string(),
            }
            .into());
        }

        if let MatchmakingCommand::Vote { map, .. } = command {
            if map.is_empty() {
                return Err(MatchmakingError::InternalError {
                    message: "Map cannot be empty".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}
