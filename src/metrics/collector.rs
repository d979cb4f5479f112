//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the scrim-room matchmaking
//! service using Prometheus metrics.

use crate::types::BanReason;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Instant;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Match-related metrics
    match_metrics: MatchMetrics,

    /// Ban-related metrics
    ban_metrics: BanMetrics,

    /// Service start time for uptime tracking
    started_at: Instant,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total commands processed by kind
    pub commands_total: IntCounterVec,

    /// Command processing errors by kind
    pub command_errors_total: IntCounterVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total players queued
    pub players_queued_total: IntCounter,

    /// Total players who left the queue voluntarily
    pub players_dequeued_total: IntCounter,

    /// Total queue entries dropped by TTL expiry
    pub entries_expired_total: IntCounter,

    /// Players currently waiting in queue
    pub players_waiting: IntGauge,
}

/// Match-related metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Total matches created
    pub matches_created_total: IntCounter,

    /// Total matches completed
    pub matches_completed_total: IntCounter,

    /// Total matches cancelled by cause
    pub matches_cancelled_total: IntCounterVec,

    /// Acceptance deadlines that expired with missing accepts
    pub acceptance_timeouts_total: IntCounter,

    /// Matches currently active (veto through paused)
    pub active_matches: IntGauge,

    /// MMR spread of created matches
    pub roster_mmr_spread: Histogram,
}

/// Ban-related metrics
#[derive(Clone)]
pub struct BanMetrics {
    /// Bans issued by reason
    pub bans_issued_total: IntCounterVec,
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::with_opts(Opts::new(
            "scrim_room_uptime_seconds",
            "Service uptime in seconds",
        ))?;
        let commands_total = IntCounterVec::new(
            Opts::new("scrim_room_commands_total", "Total commands processed"),
            &["command"],
        )?;
        let command_errors_total = IntCounterVec::new(
            Opts::new(
                "scrim_room_command_errors_total",
                "Command processing errors",
            ),
            &["command"],
        )?;

        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(command_errors_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            commands_total,
            command_errors_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_queued_total = IntCounter::with_opts(Opts::new(
            "scrim_room_players_queued_total",
            "Total players queued",
        ))?;
        let players_dequeued_total = IntCounter::with_opts(Opts::new(
            "scrim_room_players_dequeued_total",
            "Total players who left the queue voluntarily",
        ))?;
        let entries_expired_total = IntCounter::with_opts(Opts::new(
            "scrim_room_queue_entries_expired_total",
            "Queue entries dropped by TTL expiry",
        ))?;
        let players_waiting = IntGauge::with_opts(Opts::new(
            "scrim_room_players_waiting",
            "Players currently waiting in queue",
        ))?;

        registry.register(Box::new(players_queued_total.clone()))?;
        registry.register(Box::new(players_dequeued_total.clone()))?;
        registry.register(Box::new(entries_expired_total.clone()))?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            players_queued_total,
            players_dequeued_total,
            entries_expired_total,
            players_waiting,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total = IntCounter::with_opts(Opts::new(
            "scrim_room_matches_created_total",
            "Total matches created",
        ))?;
        let matches_completed_total = IntCounter::with_opts(Opts::new(
            "scrim_room_matches_completed_total",
            "Total matches completed",
        ))?;
        let matches_cancelled_total = IntCounterVec::new(
            Opts::new(
                "scrim_room_matches_cancelled_total",
                "Total matches cancelled",
            ),
            &["cause"],
        )?;
        let acceptance_timeouts_total = IntCounter::with_opts(Opts::new(
            "scrim_room_acceptance_timeouts_total",
            "Acceptance deadlines that expired with missing accepts",
        ))?;
        let active_matches = IntGauge::with_opts(Opts::new(
            "scrim_room_active_matches",
            "Matches currently active",
        ))?;
        let roster_mmr_spread = Histogram::with_opts(
            HistogramOpts::new(
                "scrim_room_roster_mmr_spread",
                "MMR spread of created matches",
            )
            .buckets(vec![25.0, 50.0, 100.0, 200.0, 300.0, 400.0, 500.0]),
        )?;

        registry.register(Box::new(matches_created_total.clone()))?;
        registry.register(Box::new(matches_completed_total.clone()))?;
        registry.register(Box::new(matches_cancelled_total.clone()))?;
        registry.register(Box::new(acceptance_timeouts_total.clone()))?;
        registry.register(Box::new(active_matches.clone()))?;
        registry.register(Box::new(roster_mmr_spread.clone()))?;

        Ok(Self {
            matches_created_total,
            matches_completed_total,
            matches_cancelled_total,
            acceptance_timeouts_total,
            active_matches,
            roster_mmr_spread,
        })
    }
}

impl BanMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let bans_issued_total = IntCounterVec::new(
            Opts::new("scrim_room_bans_issued_total", "Bans issued"),
            &["reason"],
        )?;

        registry.register(Box::new(bans_issued_total.clone()))?;

        Ok(Self { bans_issued_total })
    }
}

impl MetricsCollector {
    /// Create a new metrics collector with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let ban_metrics = BanMetrics::new(&registry)?;

        Ok(Self {
            registry: Arc::new(registry),
            service_metrics,
            queue_metrics,
            match_metrics,
            ban_metrics,
            started_at: Instant::now(),
        })
    }

    /// Get the Prometheus registry for scraping
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn game(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn ban(&self) -> &BanMetrics {
        &self.ban_metrics
    }

    /// Refresh the uptime gauge
    pub fn update_uptime(&self) {
        self.service_metrics
            .uptime_seconds
            .set(self.started_at.elapsed().as_secs() as i64);
    }

    /// Record a processed command and its outcome
    pub fn record_command(&self, command: &str, ok: bool) {
        self.service_metrics
            .commands_total
            .with_label_values(&[command])
            .inc();
        if !ok {
            self.service_metrics
                .command_errors_total
                .with_label_values(&[command])
                .inc();
        }
    }

    pub fn record_enqueue(&self) {
        self.queue_metrics.players_queued_total.inc();
    }

    pub fn record_dequeue(&self) {
        self.queue_metrics.players_dequeued_total.inc();
    }

    pub fn record_expired_entries(&self, count: usize) {
        self.queue_metrics
            .entries_expired_total
            .inc_by(count as u64);
    }

    pub fn set_players_waiting(&self, count: usize) {
        self.queue_metrics.players_waiting.set(count as i64);
    }

    pub fn record_match_created(&self, spread: i32) {
        self.match_metrics.matches_created_total.inc();
        self.match_metrics.roster_mmr_spread.observe(f64::from(spread));
    }

    pub fn record_match_completed(&self) {
        self.match_metrics.matches_completed_total.inc();
    }

    pub fn record_match_cancelled(&self, cause: &str) {
        self.match_metrics
            .matches_cancelled_total
            .with_label_values(&[cause])
            .inc();
    }

    pub fn record_acceptance_timeout(&self) {
        self.match_metrics.acceptance_timeouts_total.inc();
    }

    pub fn set_active_matches(&self, count: usize) {
        self.match_metrics.active_matches.set(count as i64);
    }

    pub fn record_ban(&self, reason: BanReason) {
        let label = match reason {
            BanReason::AfkAccept => "afk_accept",
            BanReason::NoJoin => "no_join",
            BanReason::Crash => "crash",
            BanReason::Manual => "manual",
            BanReason::Trolling => "trolling",
            BanReason::Cheating => "cheating",
        };
        self.ban_metrics
            .bans_issued_total
            .with_label_values(&[label])
            .inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector")
    }
}
