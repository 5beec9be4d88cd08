//! Session state and the payloads the engine hands back to callers

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tetraclaim_core::creative::{
    CreativePlayerState, EffectOutcome, ItemCard, ItemOutcome, SpecialTile, StatusKind, TileKind,
};
use tetraclaim_core::{Board, CellDelta, Difficulty, Piece, Pos, Shape};

use crate::config::GameMode;

pub type SessionId = String;
pub type PlayerId = String;

// ============================================================================
// SEATS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatKind {
    Human,
    Ai,
}

/// Seat as requested by the lobby
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeatConfig {
    pub player_id: PlayerId,
    pub name: String,
    pub kind: SeatKind,
    /// Explicit color 1-4, else assigned by seat order
    pub color: Option<u8>,
    /// AI strength, also used by a stand-in for a disconnected human
    pub difficulty: Option<Difficulty>,
}

impl SeatConfig {
    pub fn human(player_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            kind: SeatKind::Human,
            color: None,
            difficulty: None,
        }
    }

    pub fn ai(player_id: impl Into<String>, name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            player_id: player_id.into(),
            name: name.into(),
            kind: SeatKind::Ai,
            color: None,
            difficulty: Some(difficulty),
        }
    }

    pub fn with_color(mut self, color: u8) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub player_id: PlayerId,
    pub name: String,
    pub color: u8,
    pub kind: SeatKind,
    pub difficulty: Difficulty,
    pub offline: bool,
    /// A local AI plays for this disconnected human
    pub ai_hosted: bool,
    pub timeouts: u32,
}

impl PlayerSeat {
    pub fn is_ai_controlled(&self) -> bool {
        self.kind == SeatKind::Ai || self.ai_hosted
    }
}

// ============================================================================
// PHASES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Playing,
    Finished,
}

/// Turn lifecycle of the current seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingHumanMove,
    AiThinking,
    ItemPhase,
    Paused,
    Finished,
}

// ============================================================================
// MOVES
// ============================================================================

/// A placement as sent by a client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSubmission {
    pub piece_id: String,
    pub position: Pos,
    /// Oriented occupancy matrix; must be a transform of the piece
    pub shape: Shape,
}

/// Accepted placement in the move log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub player_id: PlayerId,
    pub color: u8,
    pub piece_id: String,
    pub position: Pos,
    pub deltas: Vec<CellDelta>,
    /// Score the placement itself earned, after double/half modifiers
    pub score: i32,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// One special tile fired by a move
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredEffect {
    pub pos: Pos,
    pub tile: TileKind,
    pub outcome: EffectOutcome,
    pub granted_card: Option<ItemCard>,
    /// Oldest card pushed out of a full hand
    pub evicted_card: Option<ItemCard>,
    pub removed_piece: Option<String>,
    pub expanded_cell: Option<Pos>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub placed: Move,
    pub effects: Vec<TriggeredEffect>,
    pub extra_turn: bool,
    /// The placement was reverted by an undo effect
    pub undone: bool,
    pub state: SessionState,
}

/// A played item card and the table afterwards
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemResult {
    pub player_id: PlayerId,
    pub target_id: Option<PlayerId>,
    pub outcome: ItemOutcome,
    pub removed_piece: Option<String>,
    pub state: SessionState,
}

// ============================================================================
// SESSION STATE
// ============================================================================

/// Creative-mode extras; absent in classic sessions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeState {
    pub tiles: Vec<SpecialTile>,
    /// Indexed by seat
    pub players: Vec<CreativePlayerState>,
    pub item_phase: bool,
    /// Client-clocked, reported only
    pub item_phase_seconds: u32,
}

impl CreativeState {
    pub fn tile_at(&self, pos: Pos) -> Option<&SpecialTile> {
        self.tiles.iter().find(|t| t.pos == pos)
    }

    /// Unused barrier cells, closed to placement
    pub fn barriers(&self) -> Vec<Pos> {
        self.tiles
            .iter()
            .filter(|t| t.kind == TileKind::Barrier && !t.used)
            .map(|t| t.pos)
            .collect()
    }

    /// Cells still holding an unused tile of any kind
    pub fn unused_tile_cells(&self) -> Vec<Pos> {
        self.tiles.iter().filter(|t| !t.used).map(|t| t.pos).collect()
    }

    pub fn has_status(&self, seat: usize, kind: StatusKind) -> bool {
        self.players.get(seat).is_some_and(|p| p.has_status(kind))
    }
}

/// Full snapshot of one session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub mode: GameMode,
    pub board: Board,
    pub seats: Vec<PlayerSeat>,
    /// Piece catalogs by seat
    pub pieces: Vec<Vec<Piece>>,
    pub current_seat: usize,
    pub turn: u32,
    pub moves: Vec<Move>,
    pub scores: FxHashMap<PlayerId, i32>,
    pub settled: FxHashSet<PlayerId>,
    pub phase: GamePhase,
    pub turn_state: TurnState,
    pub is_paused: bool,
    /// Seconds left on the current seat's clock
    pub time_left: u32,
    pub turn_time_limit: u32,
    pub creative: Option<CreativeState>,
}

impl SessionState {
    pub fn seat_index(&self, player_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    pub fn current_player(&self) -> &PlayerSeat {
        &self.seats[self.current_seat]
    }

    pub fn score(&self, player_id: &str) -> i32 {
        self.scores.get(player_id).copied().unwrap_or(0)
    }

    pub fn is_settled(&self, seat: usize) -> bool {
        self.seats
            .get(seat)
            .is_some_and(|s| self.settled.contains(&s.player_id))
    }

    pub fn all_settled(&self) -> bool {
        self.seats.iter().all(|s| self.settled.contains(&s.player_id))
    }

    /// Scores by seat index
    pub fn seat_scores(&self) -> Vec<i32> {
        self.seats.iter().map(|s| self.score(&s.player_id)).collect()
    }

    pub fn remaining_cells(&self, seat: usize) -> u32 {
        self.pieces
            .get(seat)
            .map_or(0, |ps| ps.iter().filter(|p| !p.used).map(|p| p.size as u32).sum())
    }

    pub fn is_creative(&self) -> bool {
        self.creative.is_some()
    }
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based; equal scores share a rank
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub color: u8,
    pub score: i32,
    pub settled: bool,
    pub remaining_cells: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceUsage {
    pub player_id: PlayerId,
    pub used: Vec<String>,
    pub unused: Vec<String>,
    pub remaining_cells: u32,
}
