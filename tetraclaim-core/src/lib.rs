//! TETRACLAIM Core - Game rules and AI
//!
//! This crate provides the pure game logic for TETRACLAIM:
//! - Board geometry (20x20 grid, four starting corners)
//! - Polyomino piece catalog and shape transforms
//! - Placement legality and legal-position enumeration
//! - Creative ruleset: special tiles, effects, item cards, status effects
//! - Heuristic placement AI with difficulty tiers

pub mod board;
pub mod pieces;
pub mod placement;
pub mod creative;
pub mod ai;

// Re-exports for convenient access
pub use board::{starting_corner, Board, CellDelta, Pos, BOARD_SIZE, SEAT_COUNT};
pub use pieces::{piece_kind, player_catalog, unique_transforms, Piece, PieceKind, Shape, PIECE_KINDS};
pub use placement::{cell_deltas, footprint, is_legal, legal_positions};
pub use ai::{AiMove, Difficulty, ItemDecision, PlacementAI, SearchLimits};
