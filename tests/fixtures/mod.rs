//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use scrim_room::amqp::publisher::EventPublisher;
use scrim_room::ban::InMemoryBanLedger;
use scrim_room::config::{MatchmakingSettings, RatingSettings};
use scrim_room::error::Result;
use scrim_room::matchmaker::MatchmakingService;
use scrim_room::metrics::MetricsCollector;
use scrim_room::player::InMemoryPlayerRepository;
use scrim_room::rating::EloRatingUpdater;
use scrim_room::server::{ServerAssigner, StaticServerAssigner};
use scrim_room::types::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock event publisher that captures published events for testing
#[derive(Debug, Default)]
pub struct CapturingEventPublisher {
    published_events: Arc<Mutex<Vec<MatchEvent>>>,
}

impl CapturingEventPublisher {
    pub fn new() -> Self {
        Self {
            published_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                MatchEvent::PlayerQueued(_) => event_type == "PlayerQueued",
                MatchEvent::PlayerDequeued(_) => event_type == "PlayerDequeued",
                MatchEvent::MatchCreated(_) => event_type == "MatchCreated",
                MatchEvent::MatchCancelled(_) => event_type == "MatchCancelled",
                MatchEvent::MapSelected(_) => event_type == "MapSelected",
                MatchEvent::MatchReady(_) => event_type == "MatchReady",
                MatchEvent::MatchStarted(_) => event_type == "MatchStarted",
                MatchEvent::MatchCompleted(_) => event_type == "MatchCompleted",
            })
            .count()
    }

    fn record(&self, event: MatchEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventPublisher for CapturingEventPublisher {
    async fn publish_player_queued(&self, event: PlayerQueued) -> Result<()> {
        self.record(MatchEvent::PlayerQueued(event));
        Ok(())
    }

    async fn publish_player_dequeued(&self, event: PlayerDequeued) -> Result<()> {
        self.record(MatchEvent::PlayerDequeued(event));
        Ok(())
    }

    async fn publish_match_created(&self, event: MatchCreated) -> Result<()> {
        self.record(MatchEvent::MatchCreated(event));
        Ok(())
    }

    async fn publish_match_cancelled(&self, event: MatchCancelled) -> Result<()> {
        self.record(MatchEvent::MatchCancelled(event));
        Ok(())
    }

    async fn publish_map_selected(&self, event: MapSelected) -> Result<()> {
        self.record(MatchEvent::MapSelected(event));
        Ok(())
    }

    async fn publish_match_ready(&self, event: MatchReady) -> Result<()> {
        self.record(MatchEvent::MatchReady(event));
        Ok(())
    }

    async fn publish_match_started(&self, event: MatchStarted) -> Result<()> {
        self.record(MatchEvent::MatchStarted(event));
        Ok(())
    }

    async fn publish_match_completed(&self, event: MatchCompleted) -> Result<()> {
        self.record(MatchEvent::MatchCompleted(event));
        Ok(())
    }
}

/// Server assigner that reports "no capacity" a configurable number of
/// times before delegating to a real pool, for retry-path testing
pub struct FlakyServerAssigner {
    refusals_left: AtomicUsize,
    inner: StaticServerAssigner,
}

impl FlakyServerAssigner {
    pub fn new(refusals: usize) -> Self {
        Self {
            refusals_left: AtomicUsize::new(refusals),
            inner: StaticServerAssigner::single("10.0.0.1", 27015, "scrim"),
        }
    }
}

#[async_trait]
impl ServerAssigner for FlakyServerAssigner {
    async fn assign(&self, game: &MatchSnapshot) -> Result<Option<GameServer>> {
        let left = self.refusals_left.load(Ordering::SeqCst);
        if left > 0 {
            self.refusals_left.store(left - 1, Ordering::SeqCst);
            return Ok(None);
        }
        self.inner.assign(game).await
    }

    async fn release(&self, match_id: MatchId) -> Result<()> {
        self.inner.release(match_id).await
    }
}

/// Everything an integration test needs to drive the core and inspect
/// collaborator state
pub struct TestEnvironment {
    pub service: Arc<MatchmakingService>,
    pub players: Arc<InMemoryPlayerRepository>,
    pub bans: Arc<InMemoryBanLedger>,
    pub publisher: Arc<CapturingEventPublisher>,
}

/// Build a service wired to in-memory collaborators and a capturing
/// publisher
pub fn create_test_environment(settings: MatchmakingSettings) -> TestEnvironment {
    create_test_environment_with_assigner(
        settings,
        Arc::new(StaticServerAssigner::new(vec![
        GameServer {
            ip: "10.0.0.1".to_string(),
            port: 27015,
            password: "scrim-a".to_string(),
        },
        GameServer {
            ip: "10.0.0.2".to_string(),
            port: 27015,
            password: "scrim-b".to_string(),
        },
    ])),
    )
}

/// Same as `create_test_environment`, with a caller-supplied assigner
pub fn create_test_environment_with_assigner(
    settings: MatchmakingSettings,
    servers: Arc<dyn ServerAssigner>,
) -> TestEnvironment {
    let players = Arc::new(InMemoryPlayerRepository::new(1000));
    let bans = Arc::new(InMemoryBanLedger::new());
    let ratings = Arc::new(EloRatingUpdater::new(
        &RatingSettings::default(),
        players.clone(),
    ));
    let publisher = Arc::new(CapturingEventPublisher::new());
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));

    let service = Arc::new(MatchmakingService::new(
        settings,
        players.clone(),
        bans.clone(),
        servers,
        ratings,
        publisher.clone(),
        metrics,
    ));

    TestEnvironment {
        service,
        players,
        bans,
        publisher,
    }
}

/// Seed and enqueue a roster of players with the given ratings; player
/// names are `player0..playerN`
pub async fn enqueue_players(env: &TestEnvironment, ratings: &[i32]) {
    for (i, rating) in ratings.iter().enumerate() {
        let player_id = format!("player{}", i);
        env.players.insert(player_id.clone(), *rating);
        env.service
            .enqueue(player_id)
            .await
            .expect("enqueue should succeed");
    }
}

/// The reference 4v4 roster from the design scenarios
pub const REFERENCE_RATINGS: [i32; 8] = [950, 980, 1000, 1010, 1020, 1030, 1040, 1060];
