//! AMQP event publisher for outbound events

use crate::amqp::messages::{
    MessageEnvelope, MAP_SELECTED_ROUTING_KEY, MATCH_CANCELLED_ROUTING_KEY,
    MATCH_COMPLETED_ROUTING_KEY, MATCH_CREATED_ROUTING_KEY, MATCH_EVENTS_EXCHANGE,
    MATCH_READY_ROUTING_KEY, MATCH_STARTED_ROUTING_KEY, PLAYER_DEQUEUED_ROUTING_KEY,
    PLAYER_QUEUED_ROUTING_KEY, QUEUE_EVENTS_EXCHANGE,
};
use crate::error::{MatchmakingError, Result};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing matchmaking events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a PlayerQueued event
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()>;

    /// Publish a PlayerDequeued event
    async fn publish_player_dequeued(&self, event: PlayerDequeued) -> Result<()>;

    /// Publish a MatchCreated event
    async fn publish_match_created(&self, event: MatchCreated) -> Result<()>;

    /// Publish a MatchCancelled event
    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()>;

    /// Publish a MapSelected event
    async fn publish_map_selected(&self, event: MapSelected) -> Result<()>;

    /// Publish a MatchReady event
    async fn publish_match_ready(&self, event: MatchReady) -> Result<()>;

    /// Publish a MatchStarted event
    async fn publish_match_started(&self, event: MatchStarted) -> Result<()>;

    /// Publish a MatchCompleted event
    async fn publish_match_completed(&self, event: MatchCompleted) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_deduplication: bool,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            enable_deduplication: true,
            publish_timeout_ms: 5000,
        }
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
    published_messages: std::sync::Mutex<std::collections::HashSet<String>>, // For deduplication
}

impl AmqpEventPublisher {
    /// Create a new event publisher
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self {
            channel,
            config,
            published_messages: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        // Set up exchanges and queues
        publisher.setup_exchanges().await?;

        Ok(publisher)
    }

    /// Set up AMQP exchanges for events
    async fn setup_exchanges(&self) -> Result<()> {
        // Declare queue events exchange
        let args = ExchangeDeclareArguments::new(QUEUE_EVENTS_EXCHANGE, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to declare queue events exchange: {}", e),
            }
        })?;

        // Declare match events exchange
        let args = ExchangeDeclareArguments::new(MATCH_EVENTS_EXCHANGE, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to declare match events exchange: {}", e),
            }
        })?;

        info!("Successfully set up AMQP exchanges");
        Ok(())
    }

    /// Generic method to publish to an exchange with retry logic
    async fn publish_to_exchange<T>(
        &self,
        exchange: &str,
        envelope: &MessageEnvelope<T>,
    ) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
    {
        // Check for deduplication
        if self.config.enable_deduplication {
            let published_messages =
                self.published_messages
                    .lock()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire published messages lock".to_string(),
                    })?;
            if published_messages.contains(&envelope.correlation_id) {
                debug!(
                    "Message {} already published, skipping",
                    envelope.correlation_id
                );
                return Ok(());
            }
        }

        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(exchange, envelope).await {
                Ok(_) => {
                    if self.config.enable_deduplication {
                        let mut published_messages =
                            self.published_messages.lock().map_err(|_| {
                                MatchmakingError::InternalError {
                                    message: "Failed to acquire published messages lock"
                                        .to_string(),
                                }
                            })?;
                        published_messages.insert(envelope.correlation_id.clone());
                    }

                    debug!(
                        "Successfully published message {} to exchange {}",
                        envelope.correlation_id, exchange
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish<T>(&self, exchange: &str, envelope: &MessageEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()> {
        let envelope = MessageEnvelope::new(event, PLAYER_QUEUED_ROUTING_KEY.to_string());
        self.publish_to_exchange(QUEUE_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_player_dequeued(&self, event: PlayerDequeued) -> Result<()> {
        let envelope = MessageEnvelope::new(event, PLAYER_DEQUEUED_ROUTING_KEY.to_string());
        self.publish_to_exchange(QUEUE_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MATCH_CREATED_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MATCH_CANCELLED_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_map_selected(&self, event: MapSelected) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MAP_SELECTED_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_match_ready(&self, event: MatchReady) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MATCH_READY_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MATCH_STARTED_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }

    async fn publish_match_completed(&self, event: MatchCompleted) -> Result<()> {
        let envelope = MessageEnvelope::new(event, MATCH_COMPLETED_ROUTING_KEY.to_string());
        self.publish_to_exchange(MATCH_EVENTS_EXCHANGE, &envelope)
            .await
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<String>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published event types (for testing)
    pub fn get_published_events(&self) -> Vec<String> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, name: &str) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(name.to_string());
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_player_queued(&self, _event: PlayerQueued) -> Result<()> {
        self.record("PlayerQueued");
        Ok(())
    }

    async fn publish_player_dequeued(&self, _event: PlayerDequeued) -> Result<()> {
        self.record("PlayerDequeued");
        Ok(())
    }

    async fn publish_match_created(&self, _event: MatchCreated) -> Result<()> {
        self.record("MatchCreated");
        Ok(())
    }

    async fn publish_match_cancelled(&self, _event: MatchCancelled) -> Result<()> {
        self.record("MatchCancelled");
        Ok(())
    }

    async fn publish_map_selected(&self, _event: MapSelected) -> Result<()> {
        self.record("MapSelected");
        Ok(())
    }

    async fn publish_match_ready(&self, _event: MatchReady) -> Result<()> {
        self.record("MatchReady");
        Ok(())
    }

    async fn publish_match_started(&self, _event: MatchStarted) -> Result<()> {
        self.record("MatchStarted");
        Ok(())
    }

    async fn publish_match_completed(&self, _event: MatchCompleted) -> Result<()> {
        self.record("MatchCompleted");
        Ok(())
    }
}
