//! TETRACLAIM CLI - Command-line interface
//!
//! Commands:
//! - simulate: Run all-AI sessions through the session engine
//! - tiles: Show a creative-mode special tile layout

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod render;
mod simulate;
mod tiles;

#[derive(Parser)]
#[command(name = "tetraclaim")]
#[command(about = "TETRACLAIM session engine tools")]
struct Cli {
    /// RNG seed for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play four AI seats against each other
    Simulate(simulate::SimulateArgs),
    /// Print a generated special tile layout
    Tiles(tiles::TilesArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate::run(args, cli.seed),
        Commands::Tiles(args) => tiles::run(args, cli.seed),
    }
}
