//! Health check reporting
//!
//! This module provides health check functionality for the scrim-room
//! matchmaking service, including readiness and liveness probes.

use crate::matchmaker::MatchmakingService;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
}

/// Service statistics included in health responses
#[derive(Debug, Clone, Serialize, Default)]
pub struct ServiceStats {
    pub active_matches: usize,
    pub matches_created: u64,
    pub matches_cancelled: u64,
    pub players_waiting: usize,
    pub players_queued: u64,
}

impl HealthCheck {
    /// Full health check over the matchmaking core
    pub async fn check(service: Arc<MatchmakingService>) -> Result<HealthCheck> {
        debug!("Running health check");

        let mut checks = Vec::new();
        let mut status = HealthStatus::Healthy;

        let stats = match service.get_stats().await {
            Ok(stats) => {
                checks.push(ComponentCheck {
                    name: "matchmaking-core".to_string(),
                    status: HealthStatus::Healthy,
                    message: None,
                });
                ServiceStats {
                    active_matches: stats.active_matches,
                    matches_created: stats.matches_created,
                    matches_cancelled: stats.matches_cancelled,
                    players_waiting: stats.players_waiting,
                    players_queued: stats.players_queued,
                }
            }
            Err(e) => {
                status = HealthStatus::Unhealthy;
                checks.push(ComponentCheck {
                    name: "matchmaking-core".to_string(),
                    status: HealthStatus::Unhealthy,
                    message: Some(e.to_string()),
                });
                ServiceStats::default()
            }
        };

        Ok(HealthCheck {
            status,
            service: "scrim-room".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Cheap liveness probe: the core answers a stats read
    pub async fn liveness_check(service: Arc<MatchmakingService>) -> Result<HealthStatus> {
        Ok(match service.get_stats().await {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        })
    }
}
