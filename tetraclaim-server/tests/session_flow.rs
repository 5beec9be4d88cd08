//! Integration tests for the session engine
//!
//! Drives sessions through the registry with tokio's paused clock so turn
//! timers and AI thinking delays run in virtual time.

use std::sync::Arc;
use std::time::Duration;

use tetraclaim_core::{Difficulty, Pos};
use tetraclaim_server::{
    ChannelEvents, GamePhase, MoveSubmission, SeatConfig, SessionConfig, SessionEvent,
    SessionRegistry, TurnState,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn registry() -> (SessionRegistry, UnboundedReceiver<SessionEvent>) {
    let (events, rx) = ChannelEvents::new();
    (SessionRegistry::new(Arc::new(events)), rx)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn humans(count: usize) -> Vec<SeatConfig> {
    (0..count)
        .map(|i| SeatConfig::human(format!("p{}", i + 1), format!("Player {}", i + 1)))
        .collect()
}

fn bots(count: usize, difficulty: Difficulty) -> Vec<SeatConfig> {
    (0..count)
        .map(|i| SeatConfig::ai(format!("bot{}", i + 1), format!("Bot {}", i + 1), difficulty))
        .collect()
}

fn corner_i5() -> MoveSubmission {
    MoveSubmission {
        piece_id: "I5".to_string(),
        position: Pos::new(0, 0),
        shape: vec![vec![1, 1, 1, 1, 1]],
    }
}

/// Wait for the finish notification, counting AI moves along the way
async fn run_to_finish(rx: &mut UnboundedReceiver<SessionEvent>) -> usize {
    let mut moves = 0;
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::AiMoveCompleted { .. } => moves += 1,
            SessionEvent::GameFinished { .. } => return moves,
            _ => {}
        }
    }
    panic!("event stream closed before the game finished");
}

// ============================================================================
// MOVES
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_classic_corner_move() {
    let (registry, _rx) = registry();
    registry
        .start_session("g1", humans(4), SessionConfig::classic(60.0))
        .await
        .unwrap();

    let out = registry.submit_move("g1", "p1", &corner_i5()).await.unwrap();
    assert_eq!(out.state.board.count(1), 5);
    assert_eq!(out.state.score("p1"), 5);
    assert_eq!(out.state.current_seat, 1);
    assert_eq!(out.state.turn, 2);

    let err = registry.submit_move("g1", "p1", &corner_i5()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_YOUR_TURN");
    let err = registry.submit_move("nope", "p1", &corner_i5()).await.unwrap_err();
    assert_eq!(err.code(), "GAME_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn test_queries() {
    let (registry, _rx) = registry();
    registry
        .start_session("g1", humans(2), SessionConfig::classic(-5.0))
        .await
        .unwrap();
    registry.submit_move("g1", "p1", &corner_i5()).await.unwrap();

    assert_eq!(registry.turn_time_limit("g1", "p2").await.unwrap(), 60);
    let usage = registry.piece_usage("g1", "p1").await.unwrap();
    assert_eq!(usage.used, vec!["I5".to_string()]);
    assert_eq!(usage.remaining_cells, 84);

    let rankings = registry.rankings("g1").await.unwrap();
    assert_eq!(rankings[0].player_id, "p1");
    assert_eq!(rankings[0].rank, 1);
    assert_eq!(rankings[1].score, 0);
}

// ============================================================================
// TIMERS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_counts_down_and_passes_turn() {
    let (registry, mut rx) = registry();
    registry
        .start_session("g1", humans(2), SessionConfig::classic(3.0))
        .await
        .unwrap();
    sleep(Duration::from_millis(3500)).await;

    let events = drain(&mut rx);
    let updates: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::TimeUpdate { seconds_left, .. } => Some(*seconds_left),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec![2, 1, 0]);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::TurnTimeout { player_id, .. } if player_id == "p1")));

    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.current_seat, 1);
    assert_eq!(state.seats[0].timeouts, 1);
    assert!(state.settled.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_third_timeout_settles() {
    let (registry, mut rx) = registry();
    registry
        .start_session("g1", humans(2), SessionConfig::classic(1.0))
        .await
        .unwrap();

    // Timeouts alternate p1, p2; after four neither is settled
    sleep(Duration::from_millis(4500)).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.seats[0].timeouts, 2);
    assert!(state.settled.is_empty());

    sleep(Duration::from_secs(1)).await;
    let state = registry.get_state("g1").await.unwrap();
    assert!(state.settled.contains("p1"));
    assert_eq!(state.phase, GamePhase::Playing);

    run_to_finish(&mut rx).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.phase, GamePhase::Finished);
    assert_eq!(state.seats[1].timeouts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resumes_from_preserved_time() {
    let (registry, _rx) = registry();
    let mut seats = vec![SeatConfig::human("me", "Me")];
    seats.extend(bots(3, Difficulty::Easy));
    registry
        .start_session("g1", seats, SessionConfig::classic(30.0))
        .await
        .unwrap();

    sleep(Duration::from_millis(10_500)).await;
    let state = registry.set_offline("g1", "me").await.unwrap();
    assert!(state.is_paused);
    assert_eq!(state.phase, GamePhase::Playing);
    assert_eq!(state.time_left, 20);

    sleep(Duration::from_secs(120)).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.turn_state, TurnState::Paused);
    assert_eq!(state.time_left, 20);
    assert_eq!(state.seats[0].timeouts, 0);

    let state = registry.set_online("g1", "me").await.unwrap();
    assert!(!state.is_paused);
    assert_eq!(state.time_left, 20);
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(registry.get_state("g1").await.unwrap().time_left, 19);
}

#[tokio::test(start_paused = true)]
async fn test_removed_session_goes_quiet() {
    let (registry, mut rx) = registry();
    registry
        .start_session("g1", humans(2), SessionConfig::classic(5.0))
        .await
        .unwrap();
    sleep(Duration::from_millis(1500)).await;
    registry.remove_session("g1").await.unwrap();
    drain(&mut rx);

    sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(registry.session_count().await, 0);
}

// ============================================================================
// AI SCHEDULING
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_ai_waits_before_moving() {
    let (registry, _rx) = registry();
    let mut seats = bots(1, Difficulty::Hard);
    seats.extend(humans(1));
    let config = SessionConfig::classic(60.0).with_think_ms(1000, 2000);
    let state = registry.start_session("g1", seats, config).await.unwrap();
    assert_eq!(state.turn_state, TurnState::AiThinking);

    sleep(Duration::from_millis(500)).await;
    assert!(registry.get_state("g1").await.unwrap().moves.is_empty());

    sleep(Duration::from_millis(2000)).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.moves.len(), 1);
    assert_eq!(state.current_seat, 1);
    assert_eq!(state.turn_state, TurnState::AwaitingHumanMove);
}

#[tokio::test(start_paused = true)]
async fn test_stale_ai_callback_after_settle() {
    let (registry, mut rx) = registry();
    let mut seats = bots(1, Difficulty::Medium);
    seats.extend(humans(1));
    registry
        .start_session("g1", seats, SessionConfig::classic(60.0))
        .await
        .unwrap();

    sleep(Duration::from_millis(500)).await;
    registry.settle_player("g1", "bot1").await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let state = registry.get_state("g1").await.unwrap();
    assert!(state.moves.is_empty());
    assert_eq!(state.current_seat, 1);
    assert!(!drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::AiMoveCompleted { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_stand_in_plays_for_disconnected_human() {
    let (registry, mut rx) = registry();
    registry
        .start_session("g1", humans(2), SessionConfig::classic(60.0))
        .await
        .unwrap();

    let state = registry.set_offline("g1", "p1").await.unwrap();
    assert!(!state.is_paused);
    assert_eq!(state.turn_state, TurnState::AiThinking);

    sleep(Duration::from_millis(2500)).await;
    let state = registry.get_state("g1").await.unwrap();
    assert!(state.board.count(1) > 0);
    assert_eq!(state.current_seat, 1);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::AiMoveCompleted { .. })));

    let state = registry.set_online("g1", "p1").await.unwrap();
    assert!(!state.seats[0].ai_hosted);
    assert_eq!(state.current_seat, 1);
}

#[tokio::test(start_paused = true)]
async fn test_classic_ai_game_runs_to_completion() {
    let (registry, mut rx) = registry();
    let config = SessionConfig::classic(60.0).with_seed(11);
    registry
        .start_session("g1", bots(4, Difficulty::Hard), config)
        .await
        .unwrap();

    let moves = run_to_finish(&mut rx).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.phase, GamePhase::Finished);
    assert!(state.all_settled());
    assert_eq!(state.moves.len(), moves);

    let cells: i32 = (1..=4).map(|c| state.board.count(c) as i32).sum();
    let total: i32 = state.scores.values().sum();
    assert_eq!(cells, total);

    let rankings = registry.rankings("g1").await.unwrap();
    assert!(rankings.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test(start_paused = true)]
async fn test_creative_ai_game_respects_hand_limit() {
    let (registry, mut rx) = registry();
    let config = SessionConfig::creative(60.0).with_seed(5).with_think_ms(0, 0);
    registry
        .start_session("g1", bots(4, Difficulty::Medium), config)
        .await
        .unwrap();

    run_to_finish(&mut rx).await;
    let state = registry.get_state("g1").await.unwrap();
    assert_eq!(state.phase, GamePhase::Finished);
    let creative = state.creative.as_ref().unwrap();
    assert!(creative.players.iter().all(|p| p.cards.len() <= 3));
    assert!(creative
        .players
        .iter()
        .flat_map(|p| p.statuses.iter())
        .all(|s| s.remaining_turns > 0));
    assert!(state.all_settled());
    assert_eq!(registry.rankings("g1").await.unwrap().len(), 4);
}
