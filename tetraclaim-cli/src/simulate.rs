//! Simulate command - play all-AI sessions through the session registry
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_games(), report_results()
//! - Level 3: play_single_game(), compute_statistics()
//! - Level 4: formatting utilities

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use tetraclaim_core::{Difficulty, SEAT_COUNT};
use tetraclaim_server::{
    ChannelEvents, GameMode, RankingEntry, SeatConfig, SessionConfig, SessionEvent,
    SessionRegistry, SessionState,
};

use crate::render::render_board;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Classic,
    Creative,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Classic => GameMode::Classic,
            ModeArg::Creative => GameMode::Creative,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(difficulty: DifficultyArg) -> Self {
        match difficulty {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Ruleset to play
    #[arg(long, value_enum, default_value = "classic")]
    pub mode: ModeArg,

    /// AI difficulty for every seat
    #[arg(long, value_enum, default_value = "medium")]
    pub difficulty: DifficultyArg,

    /// Turn time limit in seconds
    #[arg(long, default_value = "60")]
    pub turn_limit: f64,

    /// AI thinking delay in milliseconds
    #[arg(long, default_value = "0")]
    pub think_ms: u64,

    /// Number of games to play
    #[arg(long, default_value = "1")]
    pub games: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of a single simulated session
#[derive(Clone, Debug, Serialize)]
struct GameRecord {
    game_number: usize,
    seed: u64,
    moves: usize,
    items_used: usize,
    rankings: Vec<RankingEntry>,
    state: SessionState,
}

/// Aggregated results over all games, indexed by seat
#[derive(Clone, Debug, Default, Serialize)]
struct SimulationStats {
    wins: [usize; SEAT_COUNT],
    avg_score: [f32; SEAT_COUNT],
    avg_moves: f32,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run simulate command
///
/// This function reads like a table of contents:
/// 1. Play the requested games on a tokio runtime
/// 2. Report results
pub fn run(args: SimulateArgs, seed: Option<u64>) -> Result<()> {
    tracing::info!(
        "Simulating {} {:?} game(s) at {:?} difficulty",
        args.games,
        args.mode,
        args.difficulty
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let games = runtime.block_on(play_games(&args, seed))?;

    report_results(&games, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Play every game on a shared registry, one session at a time
async fn play_games(args: &SimulateArgs, seed: Option<u64>) -> Result<Vec<GameRecord>> {
    let mut rng = create_rng(seed);
    let (events, mut rx) = ChannelEvents::new();
    let registry = SessionRegistry::new(Arc::new(events));
    let mut games = Vec::with_capacity(args.games);

    for game_number in 1..=args.games {
        let game_seed = rng.gen();
        let record = play_single_game(&registry, &mut rx, args, game_number, game_seed).await?;
        tracing::info!(
            "Game {}: {} moves, winner {}",
            record.game_number,
            record.moves,
            record
                .rankings
                .first()
                .map(|r| r.player_id.as_str())
                .unwrap_or("-")
        );
        games.push(record);
    }

    Ok(games)
}

/// Report simulation results
fn report_results(games: &[GameRecord], args: &SimulateArgs) -> Result<()> {
    let stats = compute_statistics(games);
    if args.json {
        print_json_results(games, &stats)
    } else {
        print_text_results(games, &stats);
        Ok(())
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Start one session, wait for its finish notification, then tear it down
async fn play_single_game(
    registry: &SessionRegistry,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
    args: &SimulateArgs,
    game_number: usize,
    seed: u64,
) -> Result<GameRecord> {
    let session_id = format!("sim-{}", game_number);
    let config = SessionConfig {
        turn_time_limit: args.turn_limit,
        ..SessionConfig::default()
    }
    .with_mode(args.mode.into())
    .with_seed(seed)
    .with_think_ms(args.think_ms, args.think_ms);

    registry
        .start_session(&session_id, seats(args.difficulty.into()), config)
        .await
        .with_context(|| format!("Failed to start session {}", session_id))?;

    let mut moves = 0;
    let mut items_used = 0;
    let rankings = loop {
        let event = rx
            .recv()
            .await
            .context("Event stream closed before the game finished")?;
        if event.session_id() != session_id {
            continue;
        }
        match event {
            SessionEvent::AiMoveCompleted { .. } => moves += 1,
            SessionEvent::AiItemUsed { .. } => items_used += 1,
            SessionEvent::GameFinished { rankings, .. } => break rankings,
            _ => {}
        }
    };

    let state = registry.get_state(&session_id).await?;
    registry.remove_session(&session_id).await?;

    Ok(GameRecord {
        game_number,
        seed,
        moves,
        items_used,
        rankings,
        state,
    })
}

fn seats(difficulty: Difficulty) -> Vec<SeatConfig> {
    (1..=SEAT_COUNT)
        .map(|n| SeatConfig::ai(format!("bot{}", n), format!("Bot {}", n), difficulty))
        .collect()
}

/// Compute per-seat wins and average scores; shared first places all count
fn compute_statistics(games: &[GameRecord]) -> SimulationStats {
    let mut stats = SimulationStats::default();
    if games.is_empty() {
        return stats;
    }

    let mut totals = [0i64; SEAT_COUNT];
    for game in games {
        for entry in &game.rankings {
            let Some(seat) = seat_of(&game.state, &entry.player_id) else {
                continue;
            };
            totals[seat] += entry.score as i64;
            if entry.rank == 1 {
                stats.wins[seat] += 1;
            }
        }
    }

    let count = games.len() as f32;
    for (avg, total) in stats.avg_score.iter_mut().zip(totals) {
        *avg = total as f32 / count;
    }
    stats.avg_moves = games.iter().map(|g| g.moves).sum::<usize>() as f32 / count;
    stats
}

fn seat_of(state: &SessionState, player_id: &str) -> Option<usize> {
    state.seats.iter().position(|s| s.player_id == player_id)
}

fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

fn print_json_results(games: &[GameRecord], stats: &SimulationStats) -> Result<()> {
    #[derive(Serialize)]
    struct Output<'a> {
        games: &'a [GameRecord],
        stats: &'a SimulationStats,
    }

    let json = serde_json::to_string_pretty(&Output { games, stats })?;
    println!("{}", json);
    Ok(())
}

fn print_text_results(games: &[GameRecord], stats: &SimulationStats) {
    for game in games {
        let tiles = game
            .state
            .creative
            .as_ref()
            .map(|c| c.tiles.as_slice())
            .unwrap_or(&[]);

        println!("\n=== Game {} (seed {}) ===", game.game_number, game.seed);
        print!("{}", render_board(&game.state.board, tiles));
        println!("Moves: {}  Items used: {}", game.moves, game.items_used);
        for entry in &game.rankings {
            println!(
                "  #{} {:<6} score {:>3}  cells left {:>2}",
                entry.rank, entry.name, entry.score, entry.remaining_cells
            );
        }
    }

    if games.len() > 1 {
        println!("\n=== Summary ===");
        println!("Avg moves: {:.1}", stats.avg_moves);
        for seat in 0..SEAT_COUNT {
            println!(
                "  Seat {}: {} win(s), avg score {:.1}",
                seat + 1,
                stats.wins[seat],
                stats.avg_score[seat]
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(mode: ModeArg) -> SimulateArgs {
        SimulateArgs {
            mode,
            difficulty: DifficultyArg::Hard,
            turn_limit: 60.0,
            think_ms: 0,
            games: 2,
            json: false,
        }
    }

    #[test]
    fn test_compute_statistics_empty() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.wins, [0; SEAT_COUNT]);
        assert_eq!(stats.avg_moves, 0.0);
    }

    #[test]
    fn test_create_rng_deterministic() {
        let mut rng1 = create_rng(Some(42));
        let mut rng2 = create_rng(Some(42));
        assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(GameMode::from(ModeArg::Creative), GameMode::Creative);
        assert_eq!(Difficulty::from(DifficultyArg::Easy), Difficulty::Easy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_games_finishes_each_session() {
        let games = play_games(&args(ModeArg::Classic), Some(3)).await.unwrap();
        assert_eq!(games.len(), 2);
        for game in &games {
            assert_eq!(game.rankings.len(), SEAT_COUNT);
            assert_eq!(game.state.moves.len(), game.moves);
        }

        let stats = compute_statistics(&games);
        assert!(stats.wins.iter().sum::<usize>() >= 2);
        assert!(stats.avg_moves > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creative_games_are_reproducible() {
        let first = play_games(&args(ModeArg::Creative), Some(9)).await.unwrap();
        let second = play_games(&args(ModeArg::Creative), Some(9)).await.unwrap();
        assert_eq!(first[0].seed, second[0].seed);
        assert_eq!(first[0].state.board, second[0].state.board);
        assert_eq!(first[1].rankings, second[1].rankings);
    }
}
