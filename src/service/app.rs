//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates all
//! service components, AMQP connections, and background tasks.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::{CommandConsumer, CommandHandler};
use crate::amqp::publisher::{AmqpEventPublisher, PublisherConfig};
use crate::ban::InMemoryBanLedger;
use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result as MatchmakingResult};
use crate::matchmaker::MatchmakingService;
use crate::metrics::health::{HealthServer, HealthServerConfig};
use crate::metrics::{MetricsCollector, MetricsService};
use crate::player::InMemoryPlayerRepository;
use crate::rating::EloRatingUpdater;
use crate::scheduler;
use crate::server::StaticServerAssigner;
use crate::types::MatchmakingCommand;
use amqprs::channel::QueueDeclareArguments;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Production command handler that dispatches into the matchmaking core
struct ProductionCommandHandler {
    service: Arc<MatchmakingService>,
    metrics: Arc<MetricsCollector>,
}

impl ProductionCommandHandler {
    fn new(service: Arc<MatchmakingService>, metrics: Arc<MetricsCollector>) -> Self {
        Self { service, metrics }
    }
}

#[async_trait]
impl CommandHandler for ProductionCommandHandler {
    async fn handle_command(&self, command: MatchmakingCommand) -> MatchmakingResult<()> {
        let name = match &command {
            MatchmakingCommand::Enqueue { .. } => "enqueue",
            MatchmakingCommand::Dequeue { .. } => "dequeue",
            MatchmakingCommand::Accept { .. } => "accept",
            MatchmakingCommand::Vote { .. } => "vote",
        };

        let result = match command {
            MatchmakingCommand::Enqueue { player_id } => {
                self.service.enqueue(player_id).await.map(|_| ())
            }
            MatchmakingCommand::Dequeue { player_id } => {
                self.service.dequeue(&player_id).await.map(|_| ())
            }
            MatchmakingCommand::Accept {
                match_id,
                player_id,
            } => self
                .service
                .player_accept(match_id, &player_id)
                .await
                .map(|_| ()),
            MatchmakingCommand::Vote {
                match_id,
                player_id,
                map,
            } => self
                .service
                .vote(match_id, &player_id, &map)
                .await
                .map(|_| ()),
        };

        self.metrics.record_command(name, result.is_ok());

        if let Err(e) = &result {
            // Precondition violations are normal business outcomes; the
            // caller sees them through their own channel
            info!("Command '{}' rejected: {}", name, e);
        }
        result
    }

    async fn handle_error(&self, error: MatchmakingError, message_data: &[u8]) {
        error!(
            "Command handler error - type: '{}', message_size: {} bytes",
            error,
            message_data.len()
        );
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// The matchmaking core
    service: Arc<MatchmakingService>,

    /// AMQP connection for command handling
    amqp_connection: Arc<AmqpConnection>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// AMQP consumer for matchmaking commands
    command_consumer: Option<CommandConsumer>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing scrim-room matchmaking service");
        info!(
            "Configuration: service={}, amqp_url={}",
            config.service.name, config.amqp.url
        );

        // AMQP connection and event publisher
        let amqp_config = AmqpConfig::from_settings(&config.amqp);
        let amqp_connection = AmqpConnection::new(amqp_config).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: e.to_string(),
            }
        })?;
        let publisher_channel =
            amqp_connection
                .open_channel()
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: e.to_string(),
                })?;
        let publisher = AmqpEventPublisher::new(
            publisher_channel,
            PublisherConfig {
                max_retries: config.amqp.max_retry_attempts,
                retry_delay_ms: config.amqp.retry_delay_ms,
                ..PublisherConfig::default()
            },
        )
        .await
        .map_err(|e| ServiceError::AmqpConnection {
            message: e.to_string(),
        })?;

        // Metrics
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        // Core collaborators: in-memory reference implementations; a real
        // deployment swaps these for adapters over its own storage
        let players = Arc::new(InMemoryPlayerRepository::new(config.rating.default_rating));
        let bans = Arc::new(InMemoryBanLedger::new());
        let servers = Arc::new(StaticServerAssigner::single("127.0.0.1", 27015, "scrim"));
        let ratings = Arc::new(EloRatingUpdater::new(&config.rating, players.clone()));

        let service = Arc::new(MatchmakingService::new(
            config.matchmaking.clone(),
            players,
            bans,
            servers,
            ratings,
            Arc::new(publisher),
            metrics_collector.clone(),
        ));

        // Health and metrics HTTP surface
        let health_server = HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            metrics_collector.clone(),
        )
        .with_service(service.clone());
        let metrics_service = Arc::new(MetricsService::new(
            metrics_collector,
            Arc::new(health_server),
        ));

        Ok(Self {
            config,
            service,
            amqp_connection: Arc::new(amqp_connection),
            metrics_service,
            background_tasks: Vec::new(),
            command_consumer: None,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start background tasks and the AMQP command consumer
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        {
            let mut is_running = self.is_running.write().await;
            *is_running = true;
        }

        // Health/metrics endpoints
        let metrics_service = self.metrics_service.clone();
        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Health server task failed: {}", e);
            }
        }));

        // The reconciliation sweep keeps deadlines durable
        self.background_tasks.push(scheduler::spawn_reconciliation_sweep(
            self.service.clone(),
            self.config.sweep_interval(),
        ));

        // Inbound command consumer
        let consumer_channel = self
            .amqp_connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: e.to_string(),
            })?;
        consumer_channel
            .queue_declare(QueueDeclareArguments::durable_client_named(
                &self.config.amqp.queue_name,
            ))
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to declare command queue: {}", e),
            })?;

        let handler = Arc::new(ProductionCommandHandler::new(
            self.service.clone(),
            self.metrics_service.collector(),
        ));
        let consumer = CommandConsumer::new(handler, consumer_channel);
        consumer
            .start_consuming(&self.config.amqp.queue_name)
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: e.to_string(),
            })?;
        self.command_consumer = Some(consumer);

        info!("Service components started");
        Ok(())
    }

    /// Stop background tasks and the consumer
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        info!("Stopping service components...");

        {
            let mut is_running = self.is_running.write().await;
            *is_running = false;
        }

        if let Some(consumer) = self.command_consumer.take() {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop command consumer: {}", e);
            }
        }

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        info!("Service components stopped");
        Ok(())
    }

    /// Whether the service has been started and not yet stopped
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Access the matchmaking core
    pub fn service(&self) -> Arc<MatchmakingService> {
        self.service.clone()
    }

    /// Access the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
