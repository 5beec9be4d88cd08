//! Run a four-bot creative session in-process and print the final standings
//!
//! Usage: cargo run -p tetraclaim-server --example local_session -- [seed]

use std::sync::Arc;

use tetraclaim_core::Difficulty;
use tetraclaim_server::{ChannelEvents, SeatConfig, SessionConfig, SessionEvent, SessionRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let seed = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u64>())
        .transpose()?
        .unwrap_or(42);

    let (events, mut rx) = ChannelEvents::new();
    let registry = SessionRegistry::new(Arc::new(events));
    let seats = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard, Difficulty::Medium]
        .into_iter()
        .enumerate()
        .map(|(i, difficulty)| SeatConfig::ai(format!("bot{}", i + 1), format!("Bot {}", i + 1), difficulty))
        .collect();
    let config = SessionConfig::creative(60.0).with_seed(seed).with_think_ms(0, 0);
    registry.start_session("local", seats, config).await?;

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::AiItemUsed { result, .. } => {
                println!("{} played {:?}", result.player_id, result.outcome.card);
            }
            SessionEvent::AiSettled { player_id, .. } => println!("{} settled", player_id),
            SessionEvent::GameFinished { rankings, .. } => {
                println!();
                for entry in rankings {
                    println!(
                        "#{} {:<6} score {:>3}  cells left {:>2}",
                        entry.rank, entry.name, entry.score, entry.remaining_cells
                    );
                }
                break;
            }
            _ => {}
        }
    }

    let state = registry.get_state("local").await?;
    println!("\n{} moves over {} turns", state.moves.len(), state.turn);
    Ok(())
}
