//! Integration tests for the matchmaking core
//!
//! These drive the full queue → match → acceptance → vote → server →
//! completion flow through the public service surface, with in-memory
//! collaborators standing in for the external systems.

mod fixtures;

use fixtures::{
    create_test_environment, create_test_environment_with_assigner, enqueue_players,
    FlakyServerAssigner, TestEnvironment, REFERENCE_RATINGS,
};
use scrim_room::config::MatchmakingSettings;
use scrim_room::error::MatchmakingError;
use scrim_room::types::{MatchEvent, MatchId, MatchStatus, QueueEntryStatus, Team};
use std::sync::Arc;

fn default_settings() -> MatchmakingSettings {
    MatchmakingSettings::default()
}

/// Settings whose acceptance deadline is immediately overdue, so the
/// penalty path can be driven synchronously
fn overdue_deadline_settings() -> MatchmakingSettings {
    MatchmakingSettings {
        accept_deadline_seconds: 0,
        ..MatchmakingSettings::default()
    }
}

async fn active_match_id(env: &TestEnvironment, player: &str) -> MatchId {
    env.service
        .queue_status(player)
        .await
        .unwrap()
        .active_match
        .expect("player should be in a match")
        .id
}

#[tokio::test]
async fn test_happy_path_queue_to_ready() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Veto);
    assert_eq!(game.players.len(), 8);

    // Spread 110 is comfortably within the 500 limit; lower half is team A
    let team_a: Vec<i32> = game
        .players
        .iter()
        .filter(|m| m.team == Team::A)
        .map(|m| m.mmr)
        .collect();
    let team_b: Vec<i32> = game
        .players
        .iter()
        .filter(|m| m.team == Team::B)
        .map(|m| m.mmr)
        .collect();
    assert_eq!(team_a.len(), 4);
    assert_eq!(team_b.len(), 4);
    assert!(team_a.iter().max() <= team_b.iter().min());

    // Everyone accepts within the window, then votes the same map
    for i in 0..8 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
    }
    for i in 0..8 {
        env.service
            .vote(match_id, &format!("player{}", i), "de_inferno")
            .await
            .unwrap();
    }

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Ready);
    assert_eq!(game.selected_map.as_deref(), Some("de_inferno"));
    assert!(game.server.is_some());

    assert_eq!(env.publisher.count_events_of_type("MatchCreated"), 1);
    assert_eq!(env.publisher.count_events_of_type("MapSelected"), 1);
    assert_eq!(env.publisher.count_events_of_type("MatchReady"), 1);
}

#[tokio::test]
async fn test_full_lifecycle_with_idempotent_completion() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    for i in 0..8 {
        let player = format!("player{}", i);
        env.service.player_accept(match_id, &player).await.unwrap();
    }
    for i in 0..8 {
        let player = format!("player{}", i);
        env.service
            .vote(match_id, &player, "de_dust2")
            .await
            .unwrap();
    }

    env.service.report_match_started(match_id).await.unwrap();
    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::InProgress);

    env.service
        .report_match_completed(match_id, 16, 12, Team::B)
        .await
        .unwrap();

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Completed);
    assert_eq!(game.team_a_score, 16);
    assert_eq!(game.team_b_score, 12);
    assert_eq!(game.winner_team, Some(Team::B));

    // Winners gained rating, losers lost
    assert!(env.players.record("player7").unwrap().rating > 1060);
    assert!(env.players.record("player0").unwrap().rating < 950);
    let winner_rating = env.players.record("player7").unwrap().rating;

    // A duplicate report is a no-op: same scores, no double rating apply
    env.service
        .report_match_completed(match_id, 16, 12, Team::B)
        .await
        .unwrap();
    assert_eq!(env.players.record("player7").unwrap().rating, winner_rating);
    assert_eq!(env.publisher.count_events_of_type("MatchCompleted"), 1);

    // The roster is free again
    env.service.enqueue("player0".to_string()).await.unwrap();
}

#[tokio::test]
async fn test_spread_rejection_keeps_entries_waiting() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &[500, 520, 540, 560, 1800, 1820, 1840, 1860]).await;

    for i in 0..8 {
        let status = env
            .service
            .queue_status(&format!("player{}", i))
            .await
            .unwrap();
        assert!(status.active_match.is_none());
        assert_eq!(status.entry.unwrap().status, QueueEntryStatus::Waiting);
    }
    assert_eq!(env.publisher.count_events_of_type("MatchCreated"), 0);
}

#[tokio::test]
async fn test_acceptance_timeout_penalty_and_rollback() {
    let env = create_test_environment(overdue_deadline_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    // Six accept in time, two go missing
    for i in 0..6 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
    }

    // The reconciliation sweep enforces the overdue deadline
    env.service.reconcile().await.unwrap();

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Cancelled);

    // Non-acceptors: five-minute AFK ban, counter bumped, match linked
    for player in ["player6", "player7"] {
        let bans = env.bans.bans_for(player);
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].duration_minutes, 5);
        assert!(bans[0].active);
        assert_eq!(bans[0].match_id, Some(match_id));
        assert_eq!(env.players.record(player).unwrap().ban_count, 1);

        // And they hold no queue entry pointing anywhere
        let status = env.service.queue_status(player).await.unwrap();
        assert!(status.entry.is_none());
    }

    // Acceptors: fresh waiting entries, no match reference
    for i in 0..6 {
        let status = env
            .service
            .queue_status(&format!("player{}", i))
            .await
            .unwrap();
        let entry = status.entry.unwrap();
        assert_eq!(entry.status, QueueEntryStatus::Waiting);
        assert_eq!(entry.match_id, None);
    }

    // The cancellation event names both groups
    let cancelled = env
        .publisher
        .get_published_events()
        .into_iter()
        .find_map(|event| match event {
            MatchEvent::MatchCancelled(e) => Some(e),
            _ => None,
        })
        .expect("cancellation event");
    assert_eq!(cancelled.banned.len(), 2);
    assert_eq!(cancelled.requeued.len(), 6);
}

#[tokio::test]
async fn test_banned_player_blocked_with_remaining_time() {
    let env = create_test_environment(overdue_deadline_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;
    env.service.reconcile().await.unwrap();
    assert_eq!(
        env.service.get_match(match_id).await.unwrap().status,
        MatchStatus::Cancelled
    );

    // A freshly banned player bounces off the queue with the remaining time
    let error = env
        .service
        .enqueue("player7".to_string())
        .await
        .unwrap_err();
    let message = error.to_string();
    assert!(message.contains("banned"), "unexpected message: {}", message);
    assert!(
        message.contains("did not accept match"),
        "unexpected message: {}",
        message
    );
    let error = error.downcast::<MatchmakingError>().unwrap();
    match error {
        MatchmakingError::AlreadyBanned {
            remaining_minutes, ..
        } => assert!((1..=5).contains(&remaining_minutes) || remaining_minutes == 0),
        other => panic!("expected AlreadyBanned, got {:?}", other),
    }
}

#[tokio::test]
async fn test_map_vote_tie_breaks_to_first_at_count() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    for i in 0..8 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
    }

    // Interleaved 4-4: dust2 votes land at positions 1,3,5,7 and mirage at
    // 2,4,6,8, so dust2 reaches four votes first
    for pair in 0..4 {
        env.service
            .vote(match_id, &format!("player{}", pair * 2), "de_dust2")
            .await
            .unwrap();
        env.service
            .vote(match_id, &format!("player{}", pair * 2 + 1), "de_mirage")
            .await
            .unwrap();
    }

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.selected_map.as_deref(), Some("de_dust2"));
}

#[tokio::test]
async fn test_vote_preconditions() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    // Voting before the acceptance gate is closed
    let error = env
        .service
        .vote(match_id, "player0", "de_dust2")
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::NotAllAccepted { .. }));

    for i in 0..8 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
    }

    // Unknown map
    let error = env
        .service
        .vote(match_id, "player0", "de_atlantis")
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::UnknownMap { .. }));

    // Outsider
    let error = env
        .service
        .vote(match_id, "stranger", "de_dust2")
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::NotAPlayer { .. }));

    // Re-vote is rejected, not overwritten
    env.service
        .vote(match_id, "player0", "de_dust2")
        .await
        .unwrap();
    let error = env
        .service
        .vote(match_id, "player0", "de_mirage")
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::AlreadyVoted { .. }));
}

#[tokio::test]
async fn test_no_double_match_across_pool() {
    let env = create_test_environment(default_settings());

    // Sixteen compatible players: two full matches, nobody in both
    let ratings: Vec<i32> = (0..16).map(|i| 1000 + i * 10).collect();
    enqueue_players(&env, &ratings).await;

    let mut match_ids = std::collections::HashSet::new();
    for i in 0..16 {
        let status = env
            .service
            .queue_status(&format!("player{}", i))
            .await
            .unwrap();
        let game = status.active_match.expect("everyone should be matched");
        match_ids.insert(game.id);
    }
    assert_eq!(match_ids.len(), 2);

    // The two rosters are disjoint and cover all sixteen players
    let mut seen = std::collections::HashSet::new();
    for match_id in &match_ids {
        let game = env.service.get_match(*match_id).await.unwrap();
        assert_eq!(game.players.len(), 8);
        for member in &game.players {
            assert!(
                seen.insert(member.player_id.clone()),
                "{} appears in two rosters",
                member.player_id
            );
        }
    }
    assert_eq!(seen.len(), 16);

    // Queue exclusivity: a matched player cannot enqueue again
    let error = env
        .service
        .enqueue("player0".to_string())
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::AlreadyQueued { .. }));
}

#[tokio::test]
async fn test_server_assignment_retry_after_no_capacity() {
    let env = create_test_environment_with_assigner(
        default_settings(),
        Arc::new(FlakyServerAssigner::new(1)),
    );

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    for i in 0..8 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
        env.service
            .vote(match_id, &format!("player{}", i), "de_nuke")
            .await
            .unwrap();
    }

    // First assignment attempt found no capacity: map is resolved but the
    // match is still waiting
    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Veto);
    assert_eq!(game.selected_map.as_deref(), Some("de_nuke"));
    assert!(game.server.is_none());

    // The sweep retries and the second attempt succeeds
    env.service.reconcile().await.unwrap();

    let game = env.service.get_match(match_id).await.unwrap();
    assert_eq!(game.status, MatchStatus::Ready);
    assert!(game.server.is_some());
}

#[tokio::test]
async fn test_pause_and_resume_via_reports() {
    let env = create_test_environment(default_settings());

    enqueue_players(&env, &REFERENCE_RATINGS).await;
    let match_id = active_match_id(&env, "player0").await;

    for i in 0..8 {
        env.service
            .player_accept(match_id, &format!("player{}", i))
            .await
            .unwrap();
        env.service
            .vote(match_id, &format!("player{}", i), "de_train")
            .await
            .unwrap();
    }
    env.service.report_match_started(match_id).await.unwrap();

    env.service
        .report_player_disconnected(match_id, "player3")
        .await
        .unwrap();
    assert_eq!(
        env.service.get_match(match_id).await.unwrap().status,
        MatchStatus::Paused
    );

    env.service
        .report_player_reconnected(match_id, "player3")
        .await
        .unwrap();
    assert_eq!(
        env.service.get_match(match_id).await.unwrap().status,
        MatchStatus::InProgress
    );

    // A start report for a cancelled match is rejected with a typed error
    env.service.cancel_match(match_id).await.unwrap();
    let error = env
        .service
        .report_match_started(match_id)
        .await
        .unwrap_err()
        .downcast::<MatchmakingError>()
        .unwrap();
    assert!(matches!(error, MatchmakingError::InvalidTransition { .. }));
}
