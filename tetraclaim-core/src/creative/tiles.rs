//! Special tiles: board generation, outcome tables and effect resolution

use std::cmp::Reverse;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::status::{StatusEffect, StatusKind};
use crate::board::{starting_corners, Board, Pos};
use crate::pieces::Piece;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const MIN_TILES: usize = 10;
pub const MAX_TILES: usize = 14;
pub const MAX_BARRIERS: usize = 3;

/// Tiles keep this Manhattan distance from every starting corner
const CORNER_SAFE_DISTANCE: i32 = 3;

/// Minimum Manhattan distance between two tiles
const TILE_SPACING: i32 = 2;

/// Tile type weights (percent)
const TILE_WEIGHTS: [(TileKind, u32); 4] = [
    (TileKind::Gold, 20),
    (TileKind::Purple, 40),
    (TileKind::Red, 25),
    (TileKind::Barrier, 15),
];

// ============================================================================
// TILE TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Gold,
    Purple,
    Red,
    Barrier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTile {
    pub pos: Pos,
    pub kind: TileKind,
    pub used: bool,
}

/// Draw a tile type; once the barrier cap is hit its weight is spread over the rest
fn draw_tile_kind<R: Rng>(rng: &mut R, barriers: usize) -> TileKind {
    let pool: Vec<(TileKind, u32)> = TILE_WEIGHTS
        .iter()
        .copied()
        .filter(|(kind, _)| *kind != TileKind::Barrier || barriers < MAX_BARRIERS)
        .collect();
    pool.choose_weighted(rng, |entry| entry.1)
        .map(|entry| entry.0)
        .unwrap_or(TileKind::Purple)
}

/// Lay out 10-14 special tiles away from the corners and from each other
pub fn generate_special_tiles<R: Rng>(rng: &mut R) -> Vec<SpecialTile> {
    let target = rng.gen_range(MIN_TILES..=MAX_TILES);
    let corners = starting_corners();

    let mut candidates: Vec<Pos> = Board::positions()
        .filter(|p| corners.iter().all(|c| p.manhattan(*c) >= CORNER_SAFE_DISTANCE))
        .collect();
    candidates.shuffle(rng);

    let mut tiles: Vec<SpecialTile> = Vec::with_capacity(target);
    let mut barriers = 0;
    for pos in candidates {
        if tiles.len() >= target {
            break;
        }
        if tiles.iter().any(|t| t.pos.manhattan(pos) < TILE_SPACING) {
            continue;
        }
        let kind = draw_tile_kind(rng, barriers);
        if kind == TileKind::Barrier {
            barriers += 1;
        }
        tiles.push(SpecialTile {
            pos,
            kind,
            used: false,
        });
    }
    tiles
}

// ============================================================================
// TILE EFFECTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileEffect {
    GoldBonusSmall,
    GoldBonusLarge,
    GoldExtraTurn,
    GoldScoreShield,
    GoldNextDouble,
    GoldExpand,
    GoldTerritoryBonus,
    GoldItemCard,
    PurpleScoreUp,
    PurpleScoreDown,
    PurpleItemCard,
    PurpleUpgrade,
    PurpleAverage,
    PurpleSwapLeader,
    PurpleTimePressure,
    RedScoreLoss,
    RedSkipTurn,
    RedHalfScore,
    RedBigPieceBan,
    RedRemoveLargest,
    RedRemoveRandom,
    RedUndoLast,
}

const GOLD_TABLE: &[(TileEffect, u32)] = &[
    (TileEffect::GoldBonusSmall, 30),
    (TileEffect::GoldBonusLarge, 15),
    (TileEffect::GoldExtraTurn, 15),
    (TileEffect::GoldScoreShield, 10),
    (TileEffect::GoldNextDouble, 10),
    (TileEffect::GoldExpand, 10),
    (TileEffect::GoldTerritoryBonus, 5),
    (TileEffect::GoldItemCard, 5),
];

const PURPLE_TABLE: &[(TileEffect, u32)] = &[
    (TileEffect::PurpleScoreUp, 20),
    (TileEffect::PurpleScoreDown, 20),
    (TileEffect::PurpleItemCard, 20),
    (TileEffect::PurpleUpgrade, 10),
    (TileEffect::PurpleAverage, 10),
    (TileEffect::PurpleSwapLeader, 10),
    (TileEffect::PurpleTimePressure, 10),
];

const RED_TABLE: &[(TileEffect, u32)] = &[
    (TileEffect::RedScoreLoss, 20),
    (TileEffect::RedSkipTurn, 15),
    (TileEffect::RedHalfScore, 15),
    (TileEffect::RedBigPieceBan, 15),
    (TileEffect::RedRemoveLargest, 10),
    (TileEffect::RedRemoveRandom, 10),
    (TileEffect::RedUndoLast, 15),
];

impl TileEffect {
    /// Hurts the mover outright
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            TileEffect::PurpleScoreDown
                | TileEffect::PurpleTimePressure
                | TileEffect::RedScoreLoss
                | TileEffect::RedSkipTurn
                | TileEffect::RedHalfScore
                | TileEffect::RedBigPieceBan
                | TileEffect::RedRemoveLargest
                | TileEffect::RedRemoveRandom
                | TileEffect::RedUndoLast
        )
    }

    /// Suppressed entirely by steel
    pub fn is_debuff(self) -> bool {
        self.is_negative() && !matches!(self, TileEffect::PurpleScoreDown | TileEffect::RedScoreLoss)
    }

    /// Grants an item card whether or not the effect itself lands
    pub fn grants_item_card(self) -> bool {
        match self {
            TileEffect::GoldItemCard | TileEffect::PurpleItemCard => true,
            TileEffect::RedScoreLoss => false,
            other => other.tile() == TileKind::Red,
        }
    }

    pub fn tile(self) -> TileKind {
        use TileEffect::*;
        match self {
            GoldBonusSmall | GoldBonusLarge | GoldExtraTurn | GoldScoreShield | GoldNextDouble
            | GoldExpand | GoldTerritoryBonus | GoldItemCard => TileKind::Gold,
            PurpleScoreUp | PurpleScoreDown | PurpleItemCard | PurpleUpgrade | PurpleAverage
            | PurpleSwapLeader | PurpleTimePressure => TileKind::Purple,
            RedScoreLoss | RedSkipTurn | RedHalfScore | RedBigPieceBan | RedRemoveLargest
            | RedRemoveRandom | RedUndoLast => TileKind::Red,
        }
    }
}

fn draw_effect<R: Rng>(table: &[(TileEffect, u32)], rng: &mut R) -> TileEffect {
    table
        .choose_weighted(rng, |entry| entry.1)
        .map(|entry| entry.0)
        .unwrap_or(table[0].0)
}

/// Roll an effect for a triggered tile; barriers never roll
///
/// A purple tile rolls from the gold table when the mover holds a purple upgrade.
pub fn roll_tile_effect<R: Rng>(kind: TileKind, upgraded: bool, rng: &mut R) -> Option<TileEffect> {
    match kind {
        TileKind::Gold => Some(draw_effect(GOLD_TABLE, rng)),
        TileKind::Purple if upgraded => Some(draw_effect(GOLD_TABLE, rng)),
        TileKind::Purple => Some(draw_effect(PURPLE_TABLE, rng)),
        TileKind::Red => Some(draw_effect(RED_TABLE, rng)),
        TileKind::Barrier => None,
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceRemoval {
    Largest,
    Random,
}

/// Structural consequence the session has to carry out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EffectAction {
    None,
    ExtraTurn,
    UndoMove,
    ExpandTerritory,
    RemovePiece { removal: PieceRemoval },
    /// Every seat's score becomes `score`
    AverageScores { score: i32 },
    /// Mover and `seat` exchange scores
    SwapScores { seat: usize },
}

/// What a tile effect does to the mover and the table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectOutcome {
    pub effect: TileEffect,
    pub score_delta: i32,
    pub status: Option<StatusEffect>,
    pub action: EffectAction,
    pub grant_item: bool,
    /// Shield or steel stopped the effect
    pub blocked: bool,
}

/// Mover-side facts an effect needs
#[derive(Clone, Copy, Debug)]
pub struct EffectContext<'a> {
    pub mover: usize,
    /// Scores by seat index
    pub scores: &'a [i32],
    pub placed_cells: u32,
    pub shielded: bool,
    pub steel: bool,
}

/// Floor mean of all scores
pub fn average_score(scores: &[i32]) -> i32 {
    if scores.is_empty() {
        return 0;
    }
    let sum: i64 = scores.iter().map(|&s| s as i64).sum();
    sum.div_euclid(scores.len() as i64) as i32
}

/// Highest-scoring seat other than `mover`, lowest index on ties
pub fn leader_excluding(scores: &[i32], mover: usize) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mover)
        .min_by_key(|(i, s)| (Reverse(**s), *i))
        .map(|(i, _)| i)
}

/// Turn a rolled effect into a concrete outcome for this mover
pub fn resolve_tile_effect(effect: TileEffect, ctx: &EffectContext<'_>) -> EffectOutcome {
    let grant = |kind: StatusKind| Some(StatusEffect::new(kind, true));
    let (score_delta, status, action) = match effect {
        TileEffect::GoldBonusSmall => (3, None, EffectAction::None),
        TileEffect::GoldBonusLarge => (6, None, EffectAction::None),
        TileEffect::GoldExtraTurn => (0, None, EffectAction::ExtraTurn),
        TileEffect::GoldScoreShield => (0, grant(StatusKind::ScoreShield), EffectAction::None),
        TileEffect::GoldNextDouble => (0, grant(StatusKind::NextDouble), EffectAction::None),
        TileEffect::GoldExpand => (0, None, EffectAction::ExpandTerritory),
        TileEffect::GoldTerritoryBonus => (ctx.placed_cells as i32, None, EffectAction::None),
        TileEffect::GoldItemCard => (0, None, EffectAction::None),
        TileEffect::PurpleScoreUp => (2, None, EffectAction::None),
        TileEffect::PurpleScoreDown => (-2, None, EffectAction::None),
        TileEffect::PurpleItemCard => (0, None, EffectAction::None),
        TileEffect::PurpleUpgrade => (0, grant(StatusKind::PurpleUpgrade), EffectAction::None),
        TileEffect::PurpleAverage => (
            0,
            None,
            EffectAction::AverageScores {
                score: average_score(ctx.scores),
            },
        ),
        TileEffect::PurpleSwapLeader => match leader_excluding(ctx.scores, ctx.mover) {
            Some(seat) => (0, None, EffectAction::SwapScores { seat }),
            None => (0, None, EffectAction::None),
        },
        TileEffect::PurpleTimePressure => (0, grant(StatusKind::TimePressure), EffectAction::None),
        TileEffect::RedScoreLoss => (-5, None, EffectAction::None),
        TileEffect::RedSkipTurn => (0, grant(StatusKind::SkipTurn), EffectAction::None),
        TileEffect::RedHalfScore => (0, grant(StatusKind::HalfScore), EffectAction::None),
        TileEffect::RedBigPieceBan => (0, grant(StatusKind::BigPieceBan), EffectAction::None),
        TileEffect::RedRemoveLargest => (
            0,
            None,
            EffectAction::RemovePiece {
                removal: PieceRemoval::Largest,
            },
        ),
        TileEffect::RedRemoveRandom => (
            0,
            None,
            EffectAction::RemovePiece {
                removal: PieceRemoval::Random,
            },
        ),
        TileEffect::RedUndoLast => (0, None, EffectAction::UndoMove),
    };

    let mut outcome = EffectOutcome {
        effect,
        score_delta,
        status,
        action,
        grant_item: effect.grants_item_card(),
        blocked: false,
    };

    let guarded = ctx.shielded || ctx.steel;
    if outcome.score_delta < 0 && guarded {
        outcome.score_delta = 0;
        outcome.blocked = true;
    }
    if effect.is_debuff() && ctx.steel {
        outcome.status = None;
        outcome.action = EffectAction::None;
        outcome.blocked = true;
    }

    // Table-wide rewrites only count against the mover when they lower its score
    let mover_score = ctx.scores.get(ctx.mover).copied().unwrap_or(0);
    let lowers_mover = match outcome.action {
        EffectAction::AverageScores { score } => score < mover_score,
        EffectAction::SwapScores { seat } => ctx.scores.get(seat).copied().unwrap_or(0) < mover_score,
        _ => false,
    };
    if lowers_mover && guarded {
        outcome.action = EffectAction::None;
        outcome.blocked = true;
    }

    outcome
}

/// Empty cells corner-adjacent but not edge-adjacent to `color`
pub fn expansion_candidates(board: &Board, color: u8, blocked: &[Pos]) -> Vec<Pos> {
    Board::positions()
        .filter(|p| board.is_empty(*p) && !blocked.contains(p))
        .filter(|p| p.diagonal_neighbors().any(|n| board.is_color(n, color)))
        .filter(|p| !p.orthogonal_neighbors().any(|n| board.is_color(n, color)))
        .collect()
}

/// Pick the cell a territory expansion claims, uniformly among candidates
pub fn choose_expansion<R: Rng>(board: &Board, color: u8, blocked: &[Pos], rng: &mut R) -> Option<Pos> {
    expansion_candidates(board, color, blocked).choose(rng).copied()
}

/// Index of the unused piece a removal effect takes
pub fn choose_piece_to_remove<R: Rng>(
    pieces: &[Piece],
    removal: PieceRemoval,
    rng: &mut R,
) -> Option<usize> {
    let unused: Vec<usize> = pieces
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.used)
        .map(|(i, _)| i)
        .collect();
    match removal {
        PieceRemoval::Largest => unused
            .iter()
            .copied()
            .min_by_key(|&i| (Reverse(pieces[i].size), i)),
        PieceRemoval::Random => unused.choose(rng).copied(),
    }
}
