//! Heuristic placement AI and item-card decisions

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::board::{Board, Pos};
use crate::creative::{CreativePlayerState, ItemCard};
use crate::pieces::{unique_transforms, Piece, Shape};
use crate::placement::{footprint, legal_positions};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Slightly beyond the corner-to-center distance so every cell scores positive
const CENTER_RADIUS: f32 = 13.5;

const EMPTY_NEIGHBOR: f32 = 5.0;
const OWN_NEIGHBOR: f32 = 2.0;
const OPPONENT_NEIGHBOR: f32 = -3.0;
const OWN_CORNER: f32 = 8.0;

/// Chance a medium AI passes on a worthwhile card
const MEDIUM_DECLINE_CHANCE: f64 = 0.15;

/// Chance an easy AI plays a card at all
const EASY_PLAY_CHANCE: f64 = 0.5;

// ============================================================================
// DIFFICULTY
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Multipliers on the three placement scoring terms
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weights {
    pub center: f32,
    pub neighborhood: f32,
    pub connectivity: f32,
}

impl Difficulty {
    pub fn weights(self) -> Weights {
        match self {
            Difficulty::Easy => Weights {
                center: 0.5,
                neighborhood: 0.3,
                connectivity: 0.2,
            },
            Difficulty::Medium => Weights {
                center: 1.0,
                neighborhood: 1.0,
                connectivity: 1.0,
            },
            Difficulty::Hard => Weights {
                center: 1.5,
                neighborhood: 1.3,
                connectivity: 1.2,
            },
        }
    }

    /// How many top candidates the final pick samples from
    pub fn pool_width(self) -> usize {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 3,
            Difficulty::Hard => 1,
        }
    }
}

// ============================================================================
// MOVE SELECTION
// ============================================================================

/// Extra restrictions the session imposes on the search
#[derive(Clone, Debug, Default)]
pub struct SearchLimits {
    /// Cells no footprint may cover (unused barrier tiles)
    pub blocked: Vec<Pos>,
    /// Largest piece size allowed, if banned from big pieces
    pub max_piece_size: Option<u8>,
}

/// A chosen placement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiMove {
    pub piece_index: usize,
    pub piece_id: String,
    pub shape: Shape,
    pub position: Pos,
    pub score: f32,
}

/// Weighted placement score for a footprint
pub fn score_placement(board: &Board, cells: &[Pos], color: u8, weights: &Weights) -> f32 {
    let own: FxHashSet<Pos> = cells.iter().copied().collect();

    let mut center = 0.0;
    let mut neighborhood = 0.0;
    let mut connectivity = 0.0;
    for cell in cells {
        center += CENTER_RADIUS - cell.distance_to_center();

        for n in cell.orthogonal_neighbors() {
            if own.contains(&n) {
                continue;
            }
            neighborhood += match board.get(n) {
                Some(0) => EMPTY_NEIGHBOR,
                Some(c) if c == color => OWN_NEIGHBOR,
                Some(_) => OPPONENT_NEIGHBOR,
                None => 0.0,
            };
        }

        connectivity += cell
            .diagonal_neighbors()
            .filter(|n| board.is_color(*n, color))
            .count() as f32
            * OWN_CORNER;
    }

    weights.center * center + weights.neighborhood * neighborhood + weights.connectivity * connectivity
}

/// Best legal placement of one piece across all its orientations
fn best_placement(
    board: &Board,
    piece_index: usize,
    piece: &Piece,
    color: u8,
    limits: &SearchLimits,
    weights: &Weights,
) -> Option<AiMove> {
    let mut best: Option<AiMove> = None;
    for shape in unique_transforms(&piece.shape) {
        for position in legal_positions(board, &shape, color) {
            let Some(cells) = footprint(&shape, position) else {
                continue;
            };
            if cells.iter().any(|c| limits.blocked.contains(c)) {
                continue;
            }
            let score = score_placement(board, &cells, color, weights);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(AiMove {
                    piece_index,
                    piece_id: piece.id.clone(),
                    shape: shape.clone(),
                    position,
                    score,
                });
            }
        }
    }
    best
}

/// Pick a move: largest playable size tier first, then sample per difficulty
///
/// Returns `None` when no unused piece fits anywhere; the caller settles the seat.
pub fn select_move<R: Rng>(
    board: &Board,
    pieces: &[Piece],
    color: u8,
    difficulty: Difficulty,
    limits: &SearchLimits,
    rng: &mut R,
) -> Option<AiMove> {
    let weights = difficulty.weights();
    let mut sizes: Vec<u8> = pieces
        .iter()
        .filter(|p| !p.used)
        .filter(|p| limits.max_piece_size.map_or(true, |max| p.size <= max))
        .map(|p| p.size)
        .collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes.dedup();

    for size in sizes {
        let mut tier: Vec<AiMove> = pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.used && p.size == size)
            .filter_map(|(i, p)| best_placement(board, i, p, color, limits, &weights))
            .collect();
        if tier.is_empty() {
            continue;
        }

        tier.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        tier.truncate(difficulty.pool_width());
        return Some(sample_candidate(tier, difficulty, rng));
    }
    None
}

fn sample_candidate<R: Rng>(mut pool: Vec<AiMove>, difficulty: Difficulty, rng: &mut R) -> AiMove {
    let idx = match difficulty {
        Difficulty::Hard => 0,
        Difficulty::Easy => rng.gen_range(0..pool.len()),
        Difficulty::Medium => {
            let floor = pool.iter().map(|m| m.score).fold(f32::INFINITY, f32::min);
            let weighted: Vec<(usize, f32)> = pool
                .iter()
                .enumerate()
                .map(|(i, m)| (i, m.score - floor + 1.0))
                .collect();
            weighted
                .choose_weighted(rng, |entry| entry.1)
                .map(|entry| entry.0)
                .unwrap_or(0)
        }
    };
    pool.swap_remove(idx)
}

// ============================================================================
// ITEM CARDS
// ============================================================================

/// What the AI can see of one seat when weighing a card
#[derive(Clone, Copy, Debug)]
pub struct SeatView {
    pub score: i32,
    pub settled: bool,
    pub steel: bool,
    /// Unused five-cell pieces
    pub big_unused: usize,
}

/// Everything an item decision needs
#[derive(Clone, Copy, Debug)]
pub struct ItemView<'a> {
    pub me: usize,
    pub state: &'a CreativePlayerState,
    pub seats: &'a [SeatView],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDecision {
    pub card_index: usize,
    pub target: Option<usize>,
}

impl ItemView<'_> {
    fn opponents(&self) -> Vec<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != self.me && !s.settled)
            .map(|(i, _)| i)
            .collect()
    }

    fn my_score(&self) -> i32 {
        self.seats.get(self.me).map_or(0, |s| s.score)
    }

    fn is_leader(&self) -> bool {
        let mine = self.my_score();
        self.seats
            .iter()
            .enumerate()
            .all(|(i, s)| i == self.me || s.score <= mine)
    }
}

/// Situational value of playing `card` at `target`; zero or less means pointless
fn card_value(card: ItemCard, view: &ItemView<'_>, target: Option<usize>) -> f32 {
    if card == ItemCard::SteelGuard {
        return if view.state.has_steel() {
            0.0
        } else if view.is_leader() {
            2.0
        } else {
            1.0
        };
    }

    let Some(seat) = target.and_then(|t| view.seats.get(t)) else {
        return 0.0;
    };
    if seat.steel {
        return 0.0;
    }
    let gap = (seat.score - view.my_score()).clamp(0, 12) as f32;
    match card {
        ItemCard::ScoreSteal => {
            let stolen = seat.score.clamp(0, crate::creative::items::MAX_STEAL) as f32;
            if stolen == 0.0 {
                0.0
            } else {
                stolen + 0.25 * gap
            }
        }
        ItemCard::SkipCurse => 2.0 + 0.2 * gap,
        ItemCard::TimeBomb => 1.0 + 0.1 * gap,
        ItemCard::Sabotage => {
            if seat.big_unused > 0 {
                2.5 + 0.1 * gap
            } else {
                0.5
            }
        }
        ItemCard::DebuffTransfer => {
            if view.state.first_negative().is_some() {
                4.0 + 0.1 * gap
            } else {
                0.0
            }
        }
        ItemCard::SteelGuard => 0.0,
    }
}

/// Decide whether and how to play a held card
pub fn select_item<R: Rng>(view: &ItemView<'_>, difficulty: Difficulty, rng: &mut R) -> Option<ItemDecision> {
    if view.state.cards.is_empty() {
        return None;
    }
    let opponents = view.opponents();

    if difficulty == Difficulty::Easy {
        if !rng.gen_bool(EASY_PLAY_CHANCE) {
            return None;
        }
        let card_index = rng.gen_range(0..view.state.cards.len());
        let card = view.state.cards[card_index];
        if card == ItemCard::DebuffTransfer && view.state.first_negative().is_none() {
            return None;
        }
        let target = if card.needs_target() {
            Some(*opponents.choose(rng)?)
        } else {
            None
        };
        return Some(ItemDecision { card_index, target });
    }

    let mut best: Option<(f32, ItemDecision)> = None;
    for (card_index, &card) in view.state.cards.iter().enumerate() {
        let targets: Vec<Option<usize>> = if card.needs_target() {
            opponents.iter().map(|&t| Some(t)).collect()
        } else {
            vec![None]
        };
        for target in targets {
            let value = card_value(card, view, target);
            if best.as_ref().map_or(true, |(v, _)| value > *v) {
                best = Some((value, ItemDecision { card_index, target }));
            }
        }
    }

    let (value, decision) = best?;
    if value <= 0.0 {
        return None;
    }
    if difficulty == Difficulty::Medium && rng.gen_bool(MEDIUM_DECLINE_CHANCE) {
        return None;
    }
    Some(decision)
}

// ============================================================================
// AI PLAYER
// ============================================================================

/// Seat AI with its own random stream
pub struct PlacementAI {
    pub difficulty: Difficulty,
    rng: ChaCha8Rng,
}

impl PlacementAI {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            rng: ChaCha8Rng::seed_from_u64(42),
        }
    }

    pub fn with_seed(difficulty: Difficulty, seed: u64) -> Self {
        Self {
            difficulty,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Get a placement for the current board
    pub fn choose_move(
        &mut self,
        board: &Board,
        pieces: &[Piece],
        color: u8,
        limits: &SearchLimits,
    ) -> Option<AiMove> {
        select_move(board, pieces, color, self.difficulty, limits, &mut self.rng)
    }

    /// Get an item-card play, `None` to pass
    pub fn choose_item(&mut self, view: &ItemView<'_>) -> Option<ItemDecision> {
        select_item(view, self.difficulty, &mut self.rng)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::starting_corner;
    use crate::creative::{StatusEffect, StatusKind};
    use crate::pieces::player_catalog;
    use crate::placement::{cell_deltas, is_legal};

    #[test]
    fn test_opening_uses_biggest_tier_and_covers_corner() {
        let board = Board::new();
        let pieces = player_catalog(1);
        let mut ai = PlacementAI::with_seed(Difficulty::Hard, 1);
        let mv = ai.choose_move(&board, &pieces, 1, &SearchLimits::default()).unwrap();
        assert_eq!(pieces[mv.piece_index].size, 5);
        assert!(is_legal(&board, &mv.shape, mv.position, 1));
        let cells = footprint(&mv.shape, mv.position).unwrap();
        assert!(cells.contains(&starting_corner(1)));
    }

    #[test]
    fn test_hard_is_deterministic() {
        let board = Board::new();
        let pieces = player_catalog(2);
        let a = PlacementAI::with_seed(Difficulty::Hard, 1)
            .choose_move(&board, &pieces, 2, &SearchLimits::default());
        let b = PlacementAI::with_seed(Difficulty::Hard, 99)
            .choose_move(&board, &pieces, 2, &SearchLimits::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_ban_limits_piece_size() {
        let board = Board::new();
        let pieces = player_catalog(3);
        let limits = SearchLimits {
            blocked: Vec::new(),
            max_piece_size: Some(4),
        };
        let mv = select_move(&board, &pieces, 3, Difficulty::Medium, &limits, &mut ChaCha8Rng::seed_from_u64(5))
            .unwrap();
        assert_eq!(mv.shape.iter().flatten().filter(|&&c| c != 0).count(), 4);
    }

    #[test]
    fn test_blocked_cells_are_avoided() {
        let board = Board::new();
        let mut pieces = player_catalog(1);
        for p in pieces.iter_mut() {
            p.used = p.id != "I1";
        }
        let limits = SearchLimits {
            blocked: vec![Pos::new(0, 0)],
            max_piece_size: None,
        };
        // The monomino can only ever cover the corner on the opening move
        let mv = select_move(&board, &pieces, 1, Difficulty::Hard, &limits, &mut ChaCha8Rng::seed_from_u64(0));
        assert!(mv.is_none());
    }

    #[test]
    fn test_none_when_everything_used() {
        let mut board = Board::new();
        let mut pieces = player_catalog(1);
        board.apply(&cell_deltas(&pieces[0].shape, Pos::new(0, 0), 1).unwrap());
        for p in pieces.iter_mut() {
            p.used = true;
        }
        let mut ai = PlacementAI::new(Difficulty::Easy);
        assert!(ai.choose_move(&board, &pieces, 1, &SearchLimits::default()).is_none());
    }

    #[test]
    fn test_corner_contact_scores_higher() {
        let mut board = Board::new();
        board.set(Pos::new(5, 5), 1);
        let w = Difficulty::Medium.weights();
        let touching = score_placement(&board, &[Pos::new(6, 6)], 1, &w);
        let alone = score_placement(&board, &[Pos::new(12, 12)], 1, &w);
        assert!(touching > alone);
        let opponent_side = score_placement(&board, &[Pos::new(6, 6)], 2, &w);
        assert!(touching > opponent_side);
    }

    fn seats(scores: &[i32]) -> Vec<SeatView> {
        scores
            .iter()
            .map(|&score| SeatView {
                score,
                settled: false,
                steel: false,
                big_unused: 3,
            })
            .collect()
    }

    #[test]
    fn test_hard_prefers_transfer_when_debuffed() {
        let mut state = CreativePlayerState::default();
        state.grant_card(ItemCard::TimeBomb);
        state.grant_card(ItemCard::DebuffTransfer);
        state.grant_status(StatusEffect::new(StatusKind::HalfScore, false));
        let table = seats(&[5, 9, 2, 1]);
        let view = ItemView { me: 0, state: &state, seats: &table };
        let decision = select_item(&view, Difficulty::Hard, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(decision.card_index, 1);
        assert_eq!(decision.target, Some(1));
    }

    #[test]
    fn test_hard_skips_steel_targets() {
        let mut state = CreativePlayerState::default();
        state.grant_card(ItemCard::ScoreSteal);
        let mut table = seats(&[0, 9, 2, 1]);
        for (i, s) in table.iter_mut().enumerate() {
            s.steel = i != 0;
        }
        let view = ItemView { me: 0, state: &state, seats: &table };
        assert_eq!(select_item(&view, Difficulty::Hard, &mut ChaCha8Rng::seed_from_u64(0)), None);
    }

    #[test]
    fn test_easy_never_targets_self_or_settled() {
        let mut state = CreativePlayerState::default();
        state.grant_card(ItemCard::SkipCurse);
        let mut table = seats(&[0, 1, 2, 3]);
        table[1].settled = true;
        table[2].settled = true;
        let view = ItemView { me: 0, state: &state, seats: &table };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            if let Some(d) = select_item(&view, Difficulty::Easy, &mut rng) {
                assert_eq!(d.target, Some(3));
            }
        }
    }
}
