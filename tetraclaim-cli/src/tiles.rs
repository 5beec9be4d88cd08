//! Tiles command - preview a creative-mode special tile layout
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: generate_layout(), report_layout()
//! - Level 3: count_kinds()

use anyhow::Result;
use clap::Args;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tetraclaim_core::creative::{generate_special_tiles, SpecialTile, TileKind};
use tetraclaim_core::Board;

use crate::render::{render_board, tile_glyph};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct TilesArgs {
    /// Output the layout as JSON
    #[arg(long)]
    pub json: bool,
}

const KINDS: [TileKind; 4] = [TileKind::Gold, TileKind::Purple, TileKind::Red, TileKind::Barrier];

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run tiles command
pub fn run(args: TilesArgs, seed: Option<u64>) -> Result<()> {
    let tiles = generate_layout(seed);
    tracing::info!("Generated {} special tiles", tiles.len());
    report_layout(&tiles, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn generate_layout(seed: Option<u64>) -> Vec<SpecialTile> {
    let mut rng = match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    };
    generate_special_tiles(&mut rng)
}

fn report_layout(tiles: &[SpecialTile], args: &TilesArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(tiles)?);
        return Ok(());
    }

    print!("{}", render_board(&Board::new(), tiles));
    println!();
    for (kind, count) in KINDS.iter().zip(count_kinds(tiles)) {
        println!("  {} {:?}: {}", tile_glyph(*kind), kind, count);
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn count_kinds(tiles: &[SpecialTile]) -> [usize; 4] {
    let mut counts = [0; 4];
    for tile in tiles {
        if let Some(i) = KINDS.iter().position(|k| *k == tile.kind) {
            counts[i] += 1;
        }
    }
    counts
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tetraclaim_core::creative::tiles::{MAX_BARRIERS, MAX_TILES, MIN_TILES};

    #[test]
    fn test_seeded_layout_is_stable() {
        assert_eq!(generate_layout(Some(8)), generate_layout(Some(8)));
    }

    #[test]
    fn test_layout_counts() {
        for seed in 0..20 {
            let tiles = generate_layout(Some(seed));
            let counts = count_kinds(&tiles);
            assert_eq!(counts.iter().sum::<usize>(), tiles.len());
            assert!((MIN_TILES..=MAX_TILES).contains(&tiles.len()));
            assert!(counts[3] <= MAX_BARRIERS);
        }
    }
}
