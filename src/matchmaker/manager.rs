//! Matchmaking service orchestrator
//!
//! This module provides the core MatchmakingService that owns the queue
//! store and the match aggregates behind a single lock, so the grouping
//! pass, the accept-versus-deadline race, and vote resolution are each one
//! atomic decision point. External collaborators (bans, ratings, servers,
//! events) are called strictly outside that lock.

use crate::amqp::publisher::EventPublisher;
use crate::ban::BanLedger;
use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::game::{AcceptOutcome, MatchInstance, VoteOutcome};
use crate::matchmaker::composer::{GroupOutcome, MatchComposer, MmrBandComposer};
use crate::metrics::MetricsCollector;
use crate::player::PlayerRepository;
use crate::queue::QueueStore;
use crate::rating::RatingUpdater;
use crate::scheduler;
use crate::server::ServerAssigner;
use crate::types::{
    BanReason, MapSelected, MatchCancelled, MatchCompleted, MatchCreated, MatchId, MatchReady,
    MatchResult, MatchSnapshot, MatchStarted, MatchStatus, PlayerDequeued, PlayerId, PlayerQueued,
    QueueStatus, Team,
};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Terminal matches are kept around this long for late snapshot reads
const TERMINAL_RETENTION_MINUTES: i64 = 30;

/// Statistics about matchmaking operations
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MatchmakerStats {
    /// Total number of players queued
    pub players_queued: u64,
    /// Total number of players who left the queue voluntarily
    pub players_dequeued: u64,
    /// Total number of matches created
    pub matches_created: u64,
    /// Total number of matches completed
    pub matches_completed: u64,
    /// Total number of matches cancelled
    pub matches_cancelled: u64,
    /// Acceptance deadlines that expired with missing accepts
    pub acceptance_timeouts: u64,
    /// Total bans issued by the penalty path
    pub bans_issued: u64,
    /// Current number of active matches
    pub active_matches: usize,
    /// Current number of players waiting
    pub players_waiting: usize,
}

/// Queue and match state guarded by one lock: every multi-entity
/// transition commits or aborts as a unit
struct CoreState {
    queue: QueueStore,
    matches: HashMap<MatchId, MatchInstance>,
    /// Index from player to the active match claiming them
    active_by_player: HashMap<PlayerId, MatchId>,
}

/// The main matchmaking service
pub struct MatchmakingService {
    /// Shared mutable core state
    state: RwLock<CoreState>,
    /// Player repository collaborator
    players: Arc<dyn PlayerRepository>,
    /// Ban ledger collaborator
    bans: Arc<dyn BanLedger>,
    /// Server assignment collaborator
    servers: Arc<dyn ServerAssigner>,
    /// Rating update collaborator
    ratings: Arc<dyn RatingUpdater>,
    /// Event publisher for matchmaking events
    event_publisher: Arc<dyn EventPublisher>,
    /// Grouping algorithm
    composer: Arc<dyn MatchComposer>,
    /// Matchmaking policy knobs
    settings: MatchmakingSettings,
    /// Service statistics
    stats: RwLock<MatchmakerStats>,
    /// Metrics collector for recording performance data
    metrics: Arc<MetricsCollector>,
}

impl MatchmakingService {
    /// Create a new matchmaking service with the default composer
    pub fn new(
        settings: MatchmakingSettings,
        players: Arc<dyn PlayerRepository>,
        bans: Arc<dyn BanLedger>,
        servers: Arc<dyn ServerAssigner>,
        ratings: Arc<dyn RatingUpdater>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_composer(
            settings,
            players,
            bans,
            servers,
            ratings,
            event_publisher,
            metrics,
            Arc::new(MmrBandComposer::new()),
        )
    }

    /// Create a matchmaking service with a custom grouping algorithm
    #[allow(clippy::too_many_arguments)]
    pub fn with_composer(
        settings: MatchmakingSettings,
        players: Arc<dyn PlayerRepository>,
        bans: Arc<dyn BanLedger>,
        servers: Arc<dyn ServerAssigner>,
        ratings: Arc<dyn RatingUpdater>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
        composer: Arc<dyn MatchComposer>,
    ) -> Self {
        Self {
            state: RwLock::new(CoreState {
                queue: QueueStore::new(),
                matches: HashMap::new(),
                active_by_player: HashMap::new(),
            }),
            players,
            bans,
            servers,
            ratings,
            event_publisher,
            composer,
            settings,
            stats: RwLock::new(MatchmakerStats::default()),
            metrics,
        }
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }

    fn state_read(&self) -> Result<RwLockReadGuard<'_, CoreState>> {
        self.state.read().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire core state lock".to_string(),
            }
            .into()
        })
    }

    fn state_write(&self) -> Result<RwLockWriteGuard<'_, CoreState>> {
        self.state.write().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire core state lock".to_string(),
            }
            .into()
        })
    }

    fn stats_write(&self) -> Result<RwLockWriteGuard<'_, MatchmakerStats>> {
        self.stats.write().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            }
            .into()
        })
    }

    /// Put a player into the queue
    ///
    /// Checks, in order: effective ban, existing queue entry, membership in
    /// an active match. Triggers a matchmaking pass on success.
    pub async fn enqueue(self: &Arc<Self>, player_id: PlayerId) -> Result<QueueStatus> {
        let now = current_timestamp();

        // Ban check comes first, before any queue mutation
        if let Some(ban) = self.bans.active_ban(&player_id, now).await? {
            let error = match ban.expires_at {
                Some(expires_at) => MatchmakingError::AlreadyBanned {
                    player_id,
                    reason: ban.reason,
                    remaining_minutes: crate::utils::minutes_remaining(now, expires_at),
                },
                None => MatchmakingError::PermanentlyBanned {
                    player_id,
                    reason: ban.reason,
                },
            };
            return Err(error.into());
        }

        let mmr = self.players.get_rating(&player_id).await?;

        let (entry, total_waiting) = {
            let mut state = self.state_write()?;

            if state.queue.entry(&player_id, now).is_some() {
                return Err(MatchmakingError::AlreadyQueued { player_id }.into());
            }
            if let Some(match_id) = state.active_by_player.get(&player_id) {
                return Err(MatchmakingError::AlreadyInActiveMatch {
                    player_id,
                    match_id: *match_id,
                }
                .into());
            }

            let entry = state.queue.insert_waiting(
                player_id.clone(),
                mmr,
                now,
                self.settings.queue_ttl(),
            )?;
            (entry, state.queue.waiting_len(now))
        };

        info!(
            "Player '{}' queued with mmr {} ({} waiting)",
            player_id, mmr, total_waiting
        );

        {
            let mut stats = self.stats_write()?;
            stats.players_queued += 1;
            stats.players_waiting = total_waiting;
        }
        self.metrics.record_enqueue();
        self.metrics.set_players_waiting(total_waiting);

        self.event_publisher
            .publish_player_queued(PlayerQueued {
                player_id: player_id.clone(),
                mmr,
                total_waiting,
                timestamp: now,
            })
            .await?;

        // A failed pass must not fail the enqueue; the sweep retries it
        if let Err(e) = self.try_match().await {
            warn!("Matchmaking pass after enqueue failed: {}", e);
        }

        Ok(QueueStatus {
            entry: Some(entry),
            total_waiting,
            active_match: None,
        })
    }

    /// Remove a player's waiting entry
    ///
    /// Returns `false` when there was nothing to remove. A matched entry
    /// stays put: the player either plays or takes the penalty.
    pub async fn dequeue(&self, player_id: &str) -> Result<bool> {
        let now = current_timestamp();

        let (removed, total_waiting) = {
            let mut state = self.state_write()?;
            let removed = state.queue.dequeue(player_id, now).is_some();
            (removed, state.queue.waiting_len(now))
        };

        if removed {
            info!("Player '{}' left the queue", player_id);
            {
                let mut stats = self.stats_write()?;
                stats.players_dequeued += 1;
                stats.players_waiting = total_waiting;
            }
            self.metrics.record_dequeue();
            self.metrics.set_players_waiting(total_waiting);

            self.event_publisher
                .publish_player_dequeued(PlayerDequeued {
                    player_id: player_id.to_string(),
                    timestamp: now,
                })
                .await?;
        }

        Ok(removed)
    }

    /// Queue status poll for a single player
    pub async fn queue_status(&self, player_id: &str) -> Result<QueueStatus> {
        let now = current_timestamp();
        let state = self.state_read()?;

        let entry = state.queue.entry(player_id, now).map(|e| e.snapshot());
        let active_match = state
            .active_by_player
            .get(player_id)
            .and_then(|match_id| state.matches.get(match_id))
            .map(|game| game.snapshot());

        Ok(QueueStatus {
            entry,
            total_waiting: state.queue.waiting_len(now),
            active_match,
        })
    }

    /// Read-only match snapshot
    pub async fn get_match(&self, match_id: MatchId) -> Result<MatchSnapshot> {
        let state = self.state_read()?;
        state
            .matches
            .get(&match_id)
            .map(|game| game.snapshot())
            .ok_or_else(|| MatchmakingError::MatchNotFound { match_id }.into())
    }

    /// Current service statistics
    pub async fn get_stats(&self) -> Result<MatchmakerStats> {
        let stats = self.stats.read().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            }
        })?;
        Ok(stats.clone())
    }

    /// Run one matchmaking pass over the waiting pool
    ///
    /// Creating the match and flipping the consumed entries to matched
    /// happen under one lock, so no entry can be both consumed and still
    /// independently actionable. Safe to call concurrently from the
    /// enqueue path and the sweep.
    pub async fn try_match(self: &Arc<Self>) -> Result<Option<MatchSnapshot>> {
        let now = current_timestamp();

        let created = {
            let mut state = self.state_write()?;
            let waiting = state.queue.list_waiting(now);

            match self.composer.compose(&waiting, &self.settings) {
                GroupOutcome::InsufficientPlayers { waiting, needed } => {
                    debug!("Not enough players to match: {}/{}", waiting, needed);
                    None
                }
                GroupOutcome::SpreadTooWide { spread, limit } => {
                    debug!("MMR spread too wide: {} > {}", spread, limit);
                    None
                }
                GroupOutcome::Grouped(proposal) => {
                    let match_id = crate::utils::generate_match_id();
                    let deadline = now + self.settings.accept_deadline();
                    let spread = proposal.spread;

                    let game = MatchInstance::new(
                        match_id,
                        proposal.team_a,
                        proposal.team_b,
                        now,
                        deadline,
                    )?;
                    let roster = game.player_ids();

                    // All-or-nothing: a failure here aborts before the
                    // match is inserted
                    state.queue.mark_matched(&roster, match_id)?;
                    for player_id in &roster {
                        state.active_by_player.insert(player_id.clone(), match_id);
                    }

                    let snapshot = game.snapshot();
                    state.matches.insert(match_id, game);

                    let active = state
                        .matches
                        .values()
                        .filter(|g| g.status().is_active())
                        .count();
                    Some((snapshot, spread, active, state.queue.waiting_len(now)))
                }
            }
        };

        let Some((snapshot, spread, active_matches, total_waiting)) = created else {
            return Ok(None);
        };

        info!(
            "Match {} created with {} players (spread {})",
            snapshot.id,
            snapshot.players.len(),
            spread
        );

        {
            let mut stats = self.stats_write()?;
            stats.matches_created += 1;
            stats.active_matches = active_matches;
            stats.players_waiting = total_waiting;
        }
        self.metrics.record_match_created(spread);
        self.metrics.set_active_matches(active_matches);
        self.metrics.set_players_waiting(total_waiting);

        self.event_publisher
            .publish_match_created(MatchCreated {
                match_id: snapshot.id,
                players: snapshot.players.clone(),
                accept_deadline: snapshot.accept_deadline,
                timestamp: now,
            })
            .await?;

        // The in-memory watch is an optimization; the reconciliation sweep
        // re-checks persisted deadlines and is the durable fallback
        if snapshot.accept_deadline > now {
            scheduler::spawn_deadline_watch(self.clone(), snapshot.id, snapshot.accept_deadline);
        }

        Ok(Some(snapshot))
    }

    /// Record a player's acceptance of a pending match
    pub async fn player_accept(&self, match_id: MatchId, player_id: &str) -> Result<AcceptOutcome> {
        let outcome = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.accept(player_id)?
        };

        match outcome {
            AcceptOutcome::AllAccepted => {
                info!(
                    "Match {} fully accepted, map voting is open",
                    match_id
                );
            }
            AcceptOutcome::Recorded => {
                debug!("Player '{}' accepted match {}", player_id, match_id);
            }
            AcceptOutcome::AlreadyAccepted => {
                debug!(
                    "Player '{}' repeated accept for match {} ignored",
                    player_id, match_id
                );
            }
        }

        Ok(outcome)
    }

    /// Record a map vote, kicking off server assignment when the tally
    /// resolves
    pub async fn vote(
        &self,
        match_id: MatchId,
        player_id: &str,
        map: &str,
    ) -> Result<VoteOutcome> {
        let outcome = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.vote(player_id, map, &self.settings.map_pool)?
        };

        if let VoteOutcome::Resolved { map } = &outcome {
            info!("Match {} resolved map vote to {}", match_id, map);

            self.event_publisher
                .publish_map_selected(MapSelected {
                    match_id,
                    map: map.clone(),
                    timestamp: current_timestamp(),
                })
                .await?;

            // Assignment failure is transient; the sweep retries it
            self.request_server(match_id).await;
        }

        Ok(outcome)
    }

    /// Ask the server collaborator for capacity and report it back in
    async fn request_server(&self, match_id: MatchId) {
        let snapshot = {
            let state = match self.state_read() {
                Ok(state) => state,
                Err(e) => {
                    error!("Server request for match {} failed: {}", match_id, e);
                    return;
                }
            };
            match state.matches.get(&match_id) {
                Some(game) if game.awaiting_server() => game.snapshot(),
                _ => return,
            }
        };

        match self.servers.assign(&snapshot).await {
            Ok(Some(server)) => {
                if let Err(e) = self.report_server_assigned(match_id, server).await {
                    error!(
                        "Failed to apply server assignment for match {}: {}",
                        match_id, e
                    );
                }
            }
            Ok(None) => {
                debug!("No server available for match {}, will retry", match_id);
            }
            Err(e) => {
                warn!("Server assignment for match {} failed: {}", match_id, e);
            }
        }
    }

    /// Apply a server assignment report from the integration layer
    pub async fn report_server_assigned(
        &self,
        match_id: MatchId,
        server: crate::types::GameServer,
    ) -> Result<()> {
        let transitioned = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.assign_server(server.clone())?
        };

        if transitioned {
            info!(
                "Match {} is ready on {}:{}",
                match_id, server.ip, server.port
            );
            self.event_publisher
                .publish_match_ready(MatchReady {
                    match_id,
                    server,
                    timestamp: current_timestamp(),
                })
                .await?;
        }
        Ok(())
    }

    /// Apply a match start report from the game server
    pub async fn report_match_started(&self, match_id: MatchId) -> Result<()> {
        let transitioned = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.start()?
        };

        if transitioned {
            info!("Match {} is now in progress", match_id);
            self.event_publisher
                .publish_match_started(MatchStarted {
                    match_id,
                    timestamp: current_timestamp(),
                })
                .await?;
        }
        Ok(())
    }

    /// Apply a final result report from the game server
    ///
    /// Idempotent: a repeated report leaves the match completed with
    /// unchanged scores and does not re-apply rating changes.
    pub async fn report_match_completed(
        &self,
        match_id: MatchId,
        team_a_score: u32,
        team_b_score: u32,
        winner_team: Team,
    ) -> Result<()> {
        let applied = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;

            if !game.complete(team_a_score, team_b_score, winner_team)? {
                return Ok(());
            }
            let roster = game.player_ids();
            let result = MatchResult {
                match_id,
                players: game.players().to_vec(),
                team_a_score,
                team_b_score,
                winner_team,
            };

            // Cleanup inside the same critical section: the roster's
            // matched entries disappear with the match they pointed at
            state.queue.remove_for_match(match_id);
            for player_id in &roster {
                state.active_by_player.remove(player_id);
            }
            let active = state
                .matches
                .values()
                .filter(|g| g.status().is_active())
                .count();
            (result, active)
        };
        let (result, active_matches) = applied;

        info!(
            "Match {} completed {}:{} ({} wins)",
            match_id, team_a_score, team_b_score, winner_team
        );

        {
            let mut stats = self.stats_write()?;
            stats.matches_completed += 1;
            stats.active_matches = active_matches;
        }
        self.metrics.record_match_completed();
        self.metrics.set_active_matches(active_matches);

        if let Err(e) = self.servers.release(match_id).await {
            warn!("Failed to release server for match {}: {}", match_id, e);
        }

        // Rating application happens exactly once, on the first report
        if let Err(e) = self.ratings.apply(&result).await {
            error!("Rating update for match {} failed: {}", match_id, e);
        }

        self.event_publisher
            .publish_match_completed(MatchCompleted {
                match_id,
                team_a_score,
                team_b_score,
                winner_team,
                timestamp: current_timestamp(),
            })
            .await?;

        Ok(())
    }

    /// Apply a mid-match disconnect report
    pub async fn report_player_disconnected(
        &self,
        match_id: MatchId,
        player_id: &str,
    ) -> Result<()> {
        let paused = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.player_disconnected(player_id)?
        };

        if paused {
            warn!(
                "Match {} paused: player '{}' disconnected",
                match_id, player_id
            );
        }
        Ok(())
    }

    /// Apply a reconnect report
    pub async fn report_player_reconnected(
        &self,
        match_id: MatchId,
        player_id: &str,
    ) -> Result<()> {
        let resumed = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.player_reconnected(player_id)?
        };

        if resumed {
            info!(
                "Match {} resumed: player '{}' reconnected",
                match_id, player_id
            );
        }
        Ok(())
    }

    /// Manually abort a match, releasing its players
    ///
    /// No penalties are issued; the players' queue entries are simply
    /// removed so they can queue again.
    pub async fn cancel_match(&self, match_id: MatchId) -> Result<()> {
        let now = current_timestamp();
        let (roster, active_matches) = {
            let mut state = self.state_write()?;
            let game = state
                .matches
                .get_mut(&match_id)
                .ok_or(MatchmakingError::MatchNotFound { match_id })?;
            game.cancel()?;
            let roster = game.player_ids();

            state.queue.remove_for_match(match_id);
            for player_id in &roster {
                state.active_by_player.remove(player_id);
            }
            let active = state
                .matches
                .values()
                .filter(|g| g.status().is_active())
                .count();
            (roster, active)
        };

        info!("Match {} aborted ({} players released)", match_id, roster.len());

        {
            let mut stats = self.stats_write()?;
            stats.matches_cancelled += 1;
            stats.active_matches = active_matches;
        }
        self.metrics.record_match_cancelled("manual");
        self.metrics.set_active_matches(active_matches);

        if let Err(e) = self.servers.release(match_id).await {
            warn!("Failed to release server for match {}: {}", match_id, e);
        }

        self.event_publisher
            .publish_match_cancelled(MatchCancelled {
                match_id,
                banned: vec![],
                requeued: vec![],
                timestamp: now,
            })
            .await?;

        Ok(())
    }

    /// Run the acceptance-deadline check for one match
    ///
    /// No-ops unless the match is still awaiting acceptance past its
    /// deadline with players missing. The decision itself shares the state
    /// lock with `player_accept`, so a last-instant accept and the deadline
    /// cannot both win. Safe to re-run at any time.
    pub async fn finalize_acceptance(&self, match_id: MatchId) -> Result<()> {
        let now = current_timestamp();

        // Cheap peek before the expensive rating pre-fetch
        let roster = {
            let state = self.state_read()?;
            match state.matches.get(&match_id) {
                None => return Ok(()),
                Some(game) => {
                    if game.status() != MatchStatus::Veto
                        || game.all_accepted()
                        || !game.deadline_passed(now)
                    {
                        return Ok(());
                    }
                    game.player_ids()
                }
            }
        };

        // Re-queued players get their current rating, not the stale
        // snapshot; fetched before the decision lock is taken
        let mut current_ratings = HashMap::new();
        for player_id in &roster {
            current_ratings.insert(
                player_id.clone(),
                self.players.get_rating(player_id).await?,
            );
        }

        let decision = {
            let mut state = self.state_write()?;
            let game = match state.matches.get_mut(&match_id) {
                None => return Ok(()),
                Some(game) => game,
            };
            // The atomic decision point: whoever lost the race observes
            // the already-decided outcome and no-ops
            if game.status() != MatchStatus::Veto || game.all_accepted() {
                return Ok(());
            }
            if !game.deadline_passed(now) {
                return Ok(());
            }

            let banned: Vec<PlayerId> = game
                .non_accepting_players()
                .iter()
                .map(|m| m.player_id.clone())
                .collect();
            let requeued: Vec<PlayerId> = game
                .accepted_players()
                .iter()
                .map(|m| m.player_id.clone())
                .collect();

            game.cancel()?;
            state.queue.remove_for_match(match_id);
            for player_id in &roster {
                state.active_by_player.remove(player_id);
            }

            // Acceptors go to the back of consideration with a fresh TTL
            let ttl = self.settings.queue_ttl();
            for player_id in &requeued {
                if let Some(mmr) = current_ratings.get(player_id) {
                    state
                        .queue
                        .insert_waiting(player_id.clone(), *mmr, now, ttl)?;
                }
            }

            let active = state
                .matches
                .values()
                .filter(|g| g.status().is_active())
                .count();
            (banned, requeued, active, state.queue.waiting_len(now))
        };
        let (banned, requeued, active_matches, total_waiting) = decision;

        warn!(
            "Match {} cancelled at acceptance deadline: {} banned, {} requeued",
            match_id,
            banned.len(),
            requeued.len()
        );

        // Penalty writes sit outside the decision lock; the ledger
        // tolerates weaker isolation than the queue/match state
        for player_id in &banned {
            match self
                .bans
                .create_ban(
                    player_id,
                    BanReason::AfkAccept,
                    self.settings.afk_ban_minutes,
                    Some(match_id),
                )
                .await
            {
                Ok(_) => self.metrics.record_ban(BanReason::AfkAccept),
                Err(e) => error!("Failed to ban '{}': {}", player_id, e),
            }
            if let Err(e) = self.players.increment_ban_count(player_id).await {
                error!("Failed to bump ban count for '{}': {}", player_id, e);
            }
        }

        {
            let mut stats = self.stats_write()?;
            stats.matches_cancelled += 1;
            stats.acceptance_timeouts += 1;
            stats.bans_issued += banned.len() as u64;
            stats.active_matches = active_matches;
            stats.players_waiting = total_waiting;
        }
        self.metrics.record_acceptance_timeout();
        self.metrics.record_match_cancelled("acceptance_timeout");
        self.metrics.set_active_matches(active_matches);
        self.metrics.set_players_waiting(total_waiting);

        if let Err(e) = self.servers.release(match_id).await {
            warn!("Failed to release server for match {}: {}", match_id, e);
        }

        self.event_publisher
            .publish_match_cancelled(MatchCancelled {
                match_id,
                banned,
                requeued,
                timestamp: now,
            })
            .await?;

        Ok(())
    }

    /// One reconciliation pass: purge expired entries, re-check overdue
    /// deadlines, retry server assignments, drop stale terminal matches,
    /// and run the matchmaker
    pub async fn reconcile(self: &Arc<Self>) -> Result<()> {
        let now = current_timestamp();

        let (expired, overdue, unassigned, total_waiting) = {
            let mut state = self.state_write()?;

            let expired = state.queue.remove_expired(now);

            let retention = chrono::Duration::minutes(TERMINAL_RETENTION_MINUTES);
            state
                .matches
                .retain(|_, game| !(game.status().is_terminal() && now - game.created_at() > retention));

            let mut overdue = Vec::new();
            let mut unassigned = Vec::new();
            for game in state.matches.values() {
                if game.status() != MatchStatus::Veto {
                    continue;
                }
                if !game.all_accepted() && game.deadline_passed(now) {
                    overdue.push(game.id());
                } else if game.awaiting_server() {
                    unassigned.push(game.id());
                }
            }

            (expired, overdue, unassigned, state.queue.waiting_len(now))
        };

        if expired > 0 {
            info!("Expired {} stale queue entries", expired);
            self.metrics.record_expired_entries(expired);
        }
        self.metrics.set_players_waiting(total_waiting);
        {
            let mut stats = self.stats_write()?;
            stats.players_waiting = total_waiting;
        }

        for match_id in overdue {
            if let Err(e) = self.finalize_acceptance(match_id).await {
                error!("Deadline reconciliation for match {} failed: {}", match_id, e);
            }
        }
        for match_id in unassigned {
            self.request_server(match_id).await;
        }

        // Keep matching until the pool runs dry
        while self.try_match().await?.is_some() {}

        Ok(())
    }
}
