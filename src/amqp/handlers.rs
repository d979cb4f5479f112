//! AMQP message handlers for processing inbound matchmaking commands
//!
//! This module provides the consumption side of the AMQP adapter: commands
//! arrive as JSON payloads, get validated, and are dispatched to whatever
//! implements `CommandHandler` (the production handler wraps
//! `MatchmakingService`).

use crate::amqp::messages::MessageUtils;
use crate::error::{MatchmakingError, Result};
use crate::types::MatchmakingCommand;
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Trait defining the interface for handling inbound commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a matchmaking command from a player
    async fn handle_command(&self, command: MatchmakingCommand) -> Result<()>;

    /// Handle processing errors
    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]);
}

/// Consumer for handling matchmaking command messages
pub struct CommandConsumer {
    handler: Arc<dyn CommandHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandConsumer {
    /// Create a new command consumer
    pub fn new(handler: Arc<dyn CommandHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("command-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);

        self.channel
            .basic_consume(CommandDispatcher::new(self.handler.clone()), args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming commands from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming commands");
        Ok(())
    }
}

/// Internal consumer implementation
struct CommandDispatcher {
    handler: Arc<dyn CommandHandler>,
}

impl CommandDispatcher {
    fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }

    /// Process an incoming message
    async fn process_message(&self, content: &[u8]) -> Result<()> {
        let command = MessageUtils::deserialize_command(content)?;

        info!("Command parsed - {:?}", command);

        self.handler.handle_command(command).await?;
        Ok(())
    }
}

#[async_trait]
impl AsyncConsumer for CommandDispatcher {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();

        let start_time = std::time::Instant::now();

        match self.process_message(&content).await {
            Ok(_) => {
                let processing_time = start_time.elapsed();
                info!(
                    "Command processed - delivery_tag: {}, processing_time: {:.2}ms",
                    delivery_tag,
                    processing_time.as_secs_f64() * 1000.0
                );
            }
            Err(e) => {
                error!(
                    "Command processing failed - delivery_tag: {}, error: {}",
                    delivery_tag, e
                );
                self.handler
                    .handle_error(
                        MatchmakingError::InternalError {
                            message: e.to_string(),
                        },
                        &content,
                    )
                    .await;
            }
        }
    }
}

/// Mock command handler for testing
pub struct MockCommandHandler {
    pub received_commands: Arc<tokio::sync::Mutex<Vec<MatchmakingCommand>>>,
}

impl Default for MockCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommandHandler {
    pub fn new() -> Self {
        Self {
            received_commands: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CommandHandler for MockCommandHandler {
    async fn handle_command(&self, command: MatchmakingCommand) -> Result<()> {
        let mut commands = self.received_commands.lock().await;
        commands.push(command);
        Ok(())
    }

    async fn handle_error(&self, error: MatchmakingError, _message_data: &[u8]) {
        eprintln!("Mock handler received error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_handler() {
        let handler = MockCommandHandler::new();
        let command = MatchmakingCommand::Enqueue {
            player_id: "test_player".to_string(),
        };

        handler.handle_command(command).await.unwrap();

        let received = handler.received_commands.lock().await;
        assert_eq!(received.len(), 1);
        assert!(matches!(
            received[0],
            MatchmakingCommand::Enqueue { ref player_id } if player_id == "test_player"
        ));
    }
}
