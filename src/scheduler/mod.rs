//! Acceptance scheduling: deadline watches and the reconciliation sweep
//!
//! The acceptance deadline lives as data on the match row. A per-match
//! watch task fires the check on time, and the periodic sweep re-runs the
//! same check for anything the watch missed (process restart, task death),
//! so a match can never sit in the acceptance phase past its deadline
//! indefinitely. Both paths funnel into the same idempotent service call.

use crate::matchmaker::MatchmakingService;
use crate::types::MatchId;
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info};

/// Watch a single match's acceptance deadline
///
/// Sleeps until the deadline and runs the finalize check once. The check
/// no-ops when the outcome was already decided by a faster path.
pub fn spawn_deadline_watch(
    service: Arc<MatchmakingService>,
    match_id: MatchId,
    deadline: DateTime<Utc>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let wait = (deadline - current_timestamp())
            .to_std()
            .unwrap_or(Duration::ZERO);
        debug!(
            "Watching acceptance deadline for match {} ({}s)",
            match_id,
            wait.as_secs()
        );
        sleep(wait).await;

        if let Err(e) = service.finalize_acceptance(match_id).await {
            error!(
                "Acceptance deadline check failed for match {}: {}",
                match_id, e
            );
        }
    })
}

/// Run the periodic reconciliation sweep
///
/// Each tick purges expired queue entries, re-checks overdue acceptance
/// deadlines, retries pending server assignments, and runs a matchmaking
/// pass. Every step is idempotent, so overlapping with the per-match
/// watches is harmless.
pub fn spawn_reconciliation_sweep(
    service: Arc<MatchmakingService>,
    period: Duration,
) -> JoinHandle<()> {
    info!("Starting reconciliation sweep every {:?}", period);
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if let Err(e) = service.reconcile().await {
                error!("Reconciliation sweep failed: {}", e);
            }
        }
    })
}
