//! Authoritative session state machine
//!
//! `Session` is synchronous: every inbound call, timer tick and AI step is a
//! `&mut self` method. The registry serializes calls per session and turns
//! activation changes into timers or AI tasks.
//!
//! Turn lifecycle:
//! - the current seat is activated with a fresh clock (`AwaitingHumanMove`,
//!   `AiThinking` or `ItemPhase`), which bumps the activation counter
//! - a move, settle or timeout advances to the next eligible seat
//! - pausing stashes the turn state and keeps the remaining seconds
//! - when every seat has settled the session is `Finished`

use std::cmp::Reverse;
use std::time::Duration;

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use tetraclaim_core::ai::{ItemView, SeatView};
use tetraclaim_core::creative::{
    choose_expansion, choose_piece_to_remove, generate_special_tiles, random_item_card,
    resolve_item_card, resolve_tile_effect, roll_tile_effect, CreativePlayerState, EffectAction,
    EffectContext, EffectOutcome, ItemOutcome, ItemTarget, PieceRemoval, StatusKind, TileKind,
};
use tetraclaim_core::pieces::{normalize, SMALL_PIECE_MAX_CELLS};
use tetraclaim_core::{
    cell_deltas, footprint, is_legal, player_catalog, Board, Piece, PlacementAI, Pos,
    SearchLimits, Shape, BOARD_SIZE, SEAT_COUNT,
};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::state::{
    CreativeState, GamePhase, ItemResult, Move, MoveOutcome, MoveSubmission, PieceUsage,
    PlayerId, PlayerSeat, RankingEntry, SeatConfig, SeatKind, SessionId, SessionState,
    TriggeredEffect, TurnState,
};

// ============================================================================
// CALLBACK RESULTS
// ============================================================================

/// Result of one timer second
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer belongs to an earlier activation; stop it
    Stale,
    Remaining(u32),
    TimedOut(TimeoutReport),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeoutReport {
    pub player_id: String,
    pub timeouts: u32,
    /// The timeout limit was reached and the seat was settled
    pub settled: bool,
}

/// What an AI-controlled seat did on its turn
#[derive(Clone, Debug)]
pub enum AiAction {
    Moved(Box<MoveOutcome>),
    Settled,
}

#[derive(Clone, Debug)]
pub struct AiTurn {
    pub player_id: String,
    pub item: Option<ItemResult>,
    pub action: AiAction,
}

/// Tile triggers of one placement
#[derive(Default)]
struct TileRun {
    effects: Vec<TriggeredEffect>,
    extra_turn: bool,
    undone: bool,
}

/// Everything an undone placement restores, captured before the placement
struct Checkpoint {
    board: Board,
    scores: FxHashMap<PlayerId, i32>,
    pieces: Vec<Piece>,
    player: Option<CreativePlayerState>,
}

/// A tile claimed by the mover, with the mover flags its roll depends on
struct TileClaim {
    kind: TileKind,
    upgraded: bool,
    shielded: bool,
    steel: bool,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    state: SessionState,
    config: SessionConfig,
    rng: ChaCha8Rng,
    /// One agent per seat; humans use theirs only while a stand-in plays
    agents: Vec<PlacementAI>,
    /// Bumped whenever the schedule (timer or AI task) must change
    activation: u64,
    /// Turn state to restore when a pause ends
    resume_state: Option<TurnState>,
}

impl Session {
    /// Seat the players, deal catalogs and activate the first seat
    pub fn new(
        session_id: impl Into<SessionId>,
        seats: Vec<SeatConfig>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let session_id = session_id.into();
        let colors = assign_colors(&seats)?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let seats: Vec<PlayerSeat> = seats
            .into_iter()
            .zip(colors)
            .map(|(seat, color)| PlayerSeat {
                player_id: seat.player_id,
                name: seat.name,
                color,
                kind: seat.kind,
                difficulty: seat.difficulty.unwrap_or_default(),
                offline: false,
                ai_hosted: false,
                timeouts: 0,
            })
            .collect();

        let pieces = seats.iter().map(|s| player_catalog(s.color)).collect();
        let scores: FxHashMap<String, i32> = seats.iter().map(|s| (s.player_id.clone(), 0)).collect();
        let creative = if config.is_creative() {
            Some(CreativeState {
                tiles: generate_special_tiles(&mut rng),
                players: vec![CreativePlayerState::default(); seats.len()],
                item_phase: false,
                item_phase_seconds: 0,
            })
        } else {
            None
        };
        let agents = seats
            .iter()
            .map(|s| PlacementAI::with_seed(s.difficulty, rng.gen()))
            .collect();
        let turn_time_limit = config.effective_turn_limit();

        let state = SessionState {
            session_id,
            mode: config.mode,
            board: Board::new(),
            seats,
            pieces,
            current_seat: 0,
            turn: 1,
            moves: Vec::new(),
            scores,
            settled: FxHashSet::default(),
            phase: GamePhase::Playing,
            turn_state: TurnState::AwaitingHumanMove,
            is_paused: false,
            time_left: turn_time_limit,
            turn_time_limit,
            creative,
        };

        let mut session = Self {
            state,
            config,
            rng,
            agents,
            activation: 0,
            resume_state: None,
        };
        session.activate_current();
        info!(
            session_id = %session.state.session_id,
            seats = session.state.seats.len(),
            mode = ?session.config.mode,
            turn_time_limit,
            "session started"
        );
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.state.session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// Randomized AI "thinking" delay
    pub fn think_delay(&mut self) -> Duration {
        let (min, max) = self.config.ai_think_ms;
        Duration::from_millis(self.rng.gen_range(min..=max.max(min)))
    }

    /// Invalidate every scheduled callback ahead of removal
    pub fn teardown(&mut self) {
        self.activation += 1;
        debug!(session_id = %self.state.session_id, "session torn down");
    }

    // ========================================================================
    // MOVES
    // ========================================================================

    /// Validate and apply a human placement
    pub fn submit_move(&mut self, player_id: &str, submission: &MoveSubmission) -> SessionResult<MoveOutcome> {
        let result = self.try_submit(player_id, submission);
        if let Err(err) = &result {
            debug!(
                session_id = %self.state.session_id,
                player_id,
                code = err.code(),
                "move rejected"
            );
        }
        result
    }

    fn try_submit(&mut self, player_id: &str, submission: &MoveSubmission) -> SessionResult<MoveOutcome> {
        self.ensure_playing()?;
        if self.state.turn_state == TurnState::ItemPhase {
            return Err(SessionError::InItemPhase);
        }
        let seat = self.seat_of(player_id)?;
        self.ensure_turn(seat)?;
        if self.state.seats[seat].is_ai_controlled() {
            return Err(SessionError::NotYourTurn);
        }
        self.place(seat, submission)
    }

    /// Gate a placement through the legality rules, then apply it
    fn place(&mut self, seat: usize, submission: &MoveSubmission) -> SessionResult<MoveOutcome> {
        let color = self.state.seats[seat].color;
        let piece_index = self.state.pieces[seat]
            .iter()
            .position(|p| p.id == submission.piece_id && !p.used)
            .ok_or(SessionError::InvalidPiece)?;
        let piece = &self.state.pieces[seat][piece_index];
        if is_oversized(&submission.shape) || !piece.accepts_shape(&submission.shape) {
            return Err(SessionError::InvalidShape);
        }
        let size = piece.size;
        if !submission.position.is_valid() {
            return Err(SessionError::IllegalPlacement);
        }
        let shape = normalize(&submission.shape);
        let cells = footprint(&shape, submission.position).ok_or(SessionError::IllegalPlacement)?;

        if let Some(creative) = &self.state.creative {
            let barriers = creative.barriers();
            if cells.iter().any(|c| barriers.contains(c)) {
                return Err(SessionError::BarrierBlocked);
            }
            if size > SMALL_PIECE_MAX_CELLS && creative.has_status(seat, StatusKind::BigPieceBan) {
                return Err(SessionError::BigPieceBanned);
            }
        }
        if !is_legal(&self.state.board, &shape, submission.position, color) {
            return Err(SessionError::IllegalPlacement);
        }
        let deltas =
            cell_deltas(&shape, submission.position, color).ok_or(SessionError::IllegalPlacement)?;

        let player_id = self.state.seats[seat].player_id.clone();
        let checkpoint = self.state.is_creative().then(|| self.checkpoint(seat));
        self.state.pieces[seat][piece_index].used = true;
        self.state.board.apply(&deltas);
        let score = self.placement_score(seat, size);
        self.add_score(&player_id, score);

        let placed = Move {
            player_id: player_id.clone(),
            color,
            piece_id: submission.piece_id.clone(),
            position: submission.position,
            deltas,
            score,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.state.moves.push(placed.clone());
        debug!(
            session_id = %self.state.session_id,
            player_id = %player_id,
            seat,
            turn = self.state.turn,
            piece = %placed.piece_id,
            score,
            "move placed"
        );

        let mut run = TileRun::default();
        if let Some(checkpoint) = &checkpoint {
            run = self.trigger_tiles(seat, checkpoint, &placed);
            if let Some(player) = self.creative_player_mut(seat) {
                player.tick();
            }
        }

        if run.extra_turn {
            self.activate_current();
        } else {
            self.advance_turn();
        }

        Ok(MoveOutcome {
            placed,
            effects: run.effects,
            extra_turn: run.extra_turn,
            undone: run.undone,
            state: self.state.clone(),
        })
    }

    /// Cell count, doubled by next-double then halved (floor) by half-score
    fn placement_score(&self, seat: usize, size: u8) -> i32 {
        let mut score = size as i32;
        if let Some(creative) = &self.state.creative {
            if creative.has_status(seat, StatusKind::NextDouble) {
                score *= 2;
            }
            if creative.has_status(seat, StatusKind::HalfScore) {
                score /= 2;
            }
        }
        score
    }

    // ========================================================================
    // SPECIAL TILES
    // ========================================================================

    /// Resolve every unused tile the placement covers, in footprint order
    fn trigger_tiles(&mut self, seat: usize, checkpoint: &Checkpoint, placed: &Move) -> TileRun {
        let mut run = TileRun::default();
        for delta in &placed.deltas {
            let Some(claim) = self.claim_tile(seat, delta.pos) else {
                continue;
            };
            let Some(effect) = roll_tile_effect(claim.kind, claim.upgraded, &mut self.rng) else {
                continue;
            };
            let scores = self.state.seat_scores();
            let ctx = EffectContext {
                mover: seat,
                scores: &scores,
                placed_cells: self.state.board.count(placed.color) as u32,
                shielded: claim.shielded,
                steel: claim.steel,
            };
            let outcome = resolve_tile_effect(effect, &ctx);
            let triggered = self.apply_tile_outcome(seat, checkpoint, delta.pos, claim.kind, outcome, placed, &mut run);
            run.effects.push(triggered);
            if run.undone {
                break;
            }
        }
        run
    }

    /// Mark the tile at `pos` used if it can fire
    fn claim_tile(&mut self, seat: usize, pos: Pos) -> Option<TileClaim> {
        let creative = self.state.creative.as_mut()?;
        let tile = creative
            .tiles
            .iter_mut()
            .find(|t| t.pos == pos && !t.used && t.kind != TileKind::Barrier)?;
        tile.used = true;
        let kind = tile.kind;
        let mover = creative.players.get(seat)?;
        Some(TileClaim {
            kind,
            upgraded: mover.has_status(StatusKind::PurpleUpgrade),
            shielded: mover.is_shielded(),
            steel: mover.has_steel(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_tile_outcome(
        &mut self,
        seat: usize,
        checkpoint: &Checkpoint,
        pos: Pos,
        tile: TileKind,
        outcome: EffectOutcome,
        placed: &Move,
        run: &mut TileRun,
    ) -> TriggeredEffect {
        let player_id = self.state.seats[seat].player_id.clone();
        let color = self.state.seats[seat].color;
        let mut triggered = TriggeredEffect {
            pos,
            tile,
            outcome,
            granted_card: None,
            evicted_card: None,
            removed_piece: None,
            expanded_cell: None,
        };

        self.add_score(&player_id, outcome.score_delta);
        if let Some(status) = outcome.status {
            if let Some(player) = self.creative_player_mut(seat) {
                player.grant_status(status);
            }
        }
        if outcome.grant_item {
            let card = random_item_card(&mut self.rng);
            triggered.granted_card = Some(card);
            triggered.evicted_card = self.creative_player_mut(seat).and_then(|p| p.grant_card(card));
        }

        match outcome.action {
            EffectAction::None => {}
            EffectAction::ExtraTurn => run.extra_turn = true,
            EffectAction::UndoMove => {
                self.undo_placement(seat, checkpoint, placed);
                // The undo tile's own card survives the rollback
                if let Some(card) = triggered.granted_card {
                    triggered.evicted_card = self.creative_player_mut(seat).and_then(|p| p.grant_card(card));
                }
                run.undone = true;
                run.extra_turn = false;
            }
            EffectAction::ExpandTerritory => {
                let blocked = self
                    .state
                    .creative
                    .as_ref()
                    .map(|c| c.unused_tile_cells())
                    .unwrap_or_default();
                if let Some(cell) = choose_expansion(&self.state.board, color, &blocked, &mut self.rng) {
                    self.state.board.set(cell, color);
                    triggered.expanded_cell = Some(cell);
                }
            }
            EffectAction::RemovePiece { removal } => {
                triggered.removed_piece = self.remove_piece(seat, removal);
            }
            EffectAction::AverageScores { score } => {
                for value in self.state.scores.values_mut() {
                    *value = score;
                }
            }
            EffectAction::SwapScores { seat: other } => {
                if let Some(other_id) = self.state.seats.get(other).map(|s| s.player_id.clone()) {
                    let mine = self.state.score(&player_id);
                    let theirs = self.state.score(&other_id);
                    self.state.scores.insert(player_id.clone(), theirs);
                    self.state.scores.insert(other_id, mine);
                }
            }
        }

        debug!(
            session_id = %self.state.session_id,
            player_id = %player_id,
            effect = ?outcome.effect,
            blocked = outcome.blocked,
            "tile effect resolved"
        );
        triggered
    }

    fn checkpoint(&self, seat: usize) -> Checkpoint {
        Checkpoint {
            board: self.state.board.clone(),
            scores: self.state.scores.clone(),
            pieces: self.state.pieces[seat].clone(),
            player: self
                .state
                .creative
                .as_ref()
                .and_then(|c| c.players.get(seat).cloned()),
        }
    }

    /// Revert a placement and every effect it already fired: board, scores,
    /// the mover's pieces and creative state, and the log entry. Claimed
    /// tiles stay used.
    fn undo_placement(&mut self, seat: usize, checkpoint: &Checkpoint, placed: &Move) {
        self.state.board = checkpoint.board.clone();
        self.state.scores = checkpoint.scores.clone();
        self.state.pieces[seat] = checkpoint.pieces.clone();
        if let (Some(saved), Some(player)) = (&checkpoint.player, self.creative_player_mut(seat)) {
            *player = saved.clone();
        }
        if self.state.moves.last() == Some(placed) {
            self.state.moves.pop();
        }
    }

    fn remove_piece(&mut self, seat: usize, removal: PieceRemoval) -> Option<String> {
        let index = choose_piece_to_remove(&self.state.pieces[seat], removal, &mut self.rng)?;
        let piece = &mut self.state.pieces[seat][index];
        piece.used = true;
        Some(piece.id.clone())
    }

    // ========================================================================
    // TURN FLOW
    // ========================================================================

    /// Pass the turn to the next seat that is neither settled nor skip-blocked
    fn advance_turn(&mut self) {
        let count = self.state.seats.len();
        let mut fallback = None;
        for step in 1..=count {
            let seat = (self.state.current_seat + step) % count;
            if self.state.is_settled(seat) {
                continue;
            }
            if let Some(player) = self.creative_player_mut(seat) {
                if player.has_status(StatusKind::SkipTurn) {
                    player.consume_skip();
                    fallback.get_or_insert(seat);
                    debug!(session_id = %self.state.session_id, seat, "turn skipped");
                    continue;
                }
            }
            self.begin_turn(seat);
            return;
        }
        match fallback {
            Some(seat) => self.begin_turn(seat),
            None => self.finish(),
        }
    }

    fn begin_turn(&mut self, seat: usize) {
        self.state.current_seat = seat;
        self.state.turn += 1;
        self.activate_current();
    }

    /// Fresh clock and entry state for the current seat
    fn activate_current(&mut self) {
        let seat = self.state.current_seat;
        let next = self.entry_state(seat);
        self.state.time_left = self.allotment(seat);
        self.set_item_phase(next == TurnState::ItemPhase);
        if self.state.is_paused {
            self.resume_state = Some(next);
            self.state.turn_state = TurnState::Paused;
        } else {
            self.state.turn_state = next;
        }
        self.activation += 1;
        debug!(
            session_id = %self.state.session_id,
            seat,
            turn = self.state.turn,
            state = ?next,
            time_left = self.state.time_left,
            "seat activated"
        );
    }

    fn entry_state(&self, seat: usize) -> TurnState {
        let holds_cards = self
            .state
            .creative
            .as_ref()
            .is_some_and(|c| c.players.get(seat).is_some_and(|p| !p.cards.is_empty()));
        if self.state.seats[seat].is_ai_controlled() {
            TurnState::AiThinking
        } else if holds_cards {
            TurnState::ItemPhase
        } else {
            TurnState::AwaitingHumanMove
        }
    }

    /// Seconds a seat gets for its turn
    fn allotment(&self, seat: usize) -> u32 {
        let pressured = self
            .state
            .creative
            .as_ref()
            .is_some_and(|c| c.has_status(seat, StatusKind::TimePressure));
        if pressured {
            self.config.time_pressure_seconds
        } else {
            self.state.turn_time_limit
        }
    }

    fn set_item_phase(&mut self, active: bool) {
        let seconds = self.config.item_phase_seconds;
        if let Some(creative) = self.state.creative.as_mut() {
            creative.item_phase = active;
            creative.item_phase_seconds = if active { seconds } else { 0 };
        }
    }

    fn finish(&mut self) {
        self.state.phase = GamePhase::Finished;
        self.state.turn_state = TurnState::Finished;
        self.state.is_paused = false;
        self.state.time_left = 0;
        self.resume_state = None;
        self.set_item_phase(false);
        self.activation += 1;
        info!(
            session_id = %self.state.session_id,
            turn = self.state.turn,
            moves = self.state.moves.len(),
            "session finished"
        );
    }

    // ========================================================================
    // SETTLING AND TIMEOUTS
    // ========================================================================

    /// Retire a player for the rest of the session
    pub fn settle_player(&mut self, player_id: &str) -> SessionResult<SessionState> {
        if self.state.phase != GamePhase::Playing {
            return Err(SessionError::GameNotPlaying);
        }
        let seat = self.seat_of(player_id)?;
        if self.state.is_settled(seat) {
            return Err(SessionError::PlayerSettled);
        }
        self.settle_seat(seat);
        Ok(self.state.clone())
    }

    fn settle_seat(&mut self, seat: usize) {
        let player_id = self.state.seats[seat].player_id.clone();
        self.state.settled.insert(player_id.clone());
        info!(session_id = %self.state.session_id, player_id = %player_id, seat, "player settled");
        if self.state.all_settled() {
            self.finish();
        } else if seat == self.state.current_seat {
            self.advance_turn();
        }
    }

    /// One second of the current human's clock
    pub fn tick_second(&mut self, activation: u64) -> TickOutcome {
        if activation != self.activation
            || self.state.phase != GamePhase::Playing
            || self.state.is_paused
            || self.state.turn_state != TurnState::AwaitingHumanMove
        {
            return TickOutcome::Stale;
        }
        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.time_left > 0 {
            return TickOutcome::Remaining(self.state.time_left);
        }
        TickOutcome::TimedOut(self.handle_timeout())
    }

    fn handle_timeout(&mut self) -> TimeoutReport {
        let seat = self.state.current_seat;
        let timeouts = {
            let player = &mut self.state.seats[seat];
            player.timeouts += 1;
            player.timeouts
        };
        if let Some(player) = self.creative_player_mut(seat) {
            player.tick();
        }
        let player_id = self.state.seats[seat].player_id.clone();
        let settled = timeouts >= self.config.max_timeouts;
        info!(
            session_id = %self.state.session_id,
            player_id = %player_id,
            seat,
            timeouts,
            "turn timed out"
        );
        if settled {
            self.state.settled.insert(player_id.clone());
            info!(session_id = %self.state.session_id, player_id = %player_id, "player force-settled");
        }
        self.advance_turn();
        TimeoutReport {
            player_id,
            timeouts,
            settled,
        }
    }

    // ========================================================================
    // ITEM CARDS
    // ========================================================================

    /// Play a held card during the item phase, then start the move clock
    pub fn use_item_card(
        &mut self,
        player_id: &str,
        card_index: usize,
        target_id: Option<&str>,
    ) -> SessionResult<ItemResult> {
        let seat = self.item_phase_seat(player_id)?;
        let card = self
            .state
            .creative
            .as_ref()
            .and_then(|c| c.players[seat].cards.get(card_index).copied())
            .ok_or(SessionError::InvalidCard)?;
        let target = if card.needs_target() {
            Some(self.resolve_target(seat, target_id)?)
        } else {
            None
        };
        let (outcome, removed_piece) = self.play_card(seat, card_index, target)?;
        self.end_item_phase();
        Ok(self.item_result(seat, target, outcome, removed_piece))
    }

    /// Decline to play a card this turn
    pub fn skip_item_phase(&mut self, player_id: &str) -> SessionResult<SessionState> {
        self.item_phase_seat(player_id)?;
        self.end_item_phase();
        Ok(self.state.clone())
    }

    fn item_phase_seat(&self, player_id: &str) -> SessionResult<usize> {
        if self.state.creative.is_none() {
            return Err(SessionError::NotCreativeMode);
        }
        self.ensure_playing()?;
        if self.state.turn_state != TurnState::ItemPhase {
            return Err(SessionError::NotInItemPhase);
        }
        let seat = self.seat_of(player_id)?;
        self.ensure_turn(seat)?;
        Ok(seat)
    }

    fn resolve_target(&self, seat: usize, target_id: Option<&str>) -> SessionResult<usize> {
        let target = target_id
            .and_then(|id| self.state.seat_index(id))
            .ok_or(SessionError::InvalidTarget)?;
        if target == seat {
            return Err(SessionError::InvalidTarget);
        }
        if self.state.is_settled(target) {
            return Err(SessionError::TargetSettled);
        }
        Ok(target)
    }

    /// Resolve a card and apply its consequences; the card leaves the hand
    fn play_card(
        &mut self,
        seat: usize,
        card_index: usize,
        target: Option<usize>,
    ) -> SessionResult<(ItemOutcome, Option<String>)> {
        let creative = self.state.creative.as_ref().ok_or(SessionError::NotCreativeMode)?;
        let caster = &creative.players[seat];
        let card = caster.cards.get(card_index).copied().ok_or(SessionError::InvalidCard)?;
        let item_target = target.map(|t| ItemTarget {
            state: &creative.players[t],
            score: self.state.score(&self.state.seats[t].player_id),
        });
        let outcome = resolve_item_card(card, caster, item_target)?;

        let caster_id = self.state.seats[seat].player_id.clone();
        if let Some(player) = self.creative_player_mut(seat) {
            player.cards.remove(card_index);
            if let Some(kind) = outcome.transferred {
                player.remove_status(kind);
            }
            if let Some(status) = outcome.caster_status {
                player.grant_status(status);
            }
        }
        self.add_score(&caster_id, outcome.caster_score_delta);

        let mut removed_piece = None;
        if let Some(t) = target {
            let target_id = self.state.seats[t].player_id.clone();
            self.add_score(&target_id, outcome.target_score_delta);
            if let Some(status) = outcome.target_status {
                if let Some(player) = self.creative_player_mut(t) {
                    player.grant_status(status);
                }
            }
            if let Some(removal) = outcome.target_piece_removal {
                removed_piece = self.remove_piece(t, removal);
            }
        }

        info!(
            session_id = %self.state.session_id,
            player_id = %caster_id,
            card = ?card,
            target = ?target,
            nullified = outcome.nullified,
            "item card played"
        );
        Ok((outcome, removed_piece))
    }

    fn end_item_phase(&mut self) {
        let seat = self.state.current_seat;
        self.set_item_phase(false);
        self.state.turn_state = if self.state.seats[seat].is_ai_controlled() {
            TurnState::AiThinking
        } else {
            TurnState::AwaitingHumanMove
        };
        self.state.time_left = self.allotment(seat);
        self.activation += 1;
    }

    fn item_result(
        &self,
        seat: usize,
        target: Option<usize>,
        outcome: ItemOutcome,
        removed_piece: Option<String>,
    ) -> ItemResult {
        ItemResult {
            player_id: self.state.seats[seat].player_id.clone(),
            target_id: target.map(|t| self.state.seats[t].player_id.clone()),
            outcome,
            removed_piece,
            state: self.state.clone(),
        }
    }

    // ========================================================================
    // CONNECTIVITY
    // ========================================================================

    /// Mark a human seat disconnected: pause a solo-human session, else host a stand-in
    pub fn set_offline(&mut self, player_id: &str) -> SessionResult<SessionState> {
        if self.state.phase != GamePhase::Playing {
            return Err(SessionError::GameNotPlaying);
        }
        let seat = self.seat_of(player_id)?;
        let player = &mut self.state.seats[seat];
        if player.kind == SeatKind::Ai || player.offline {
            return Ok(self.state.clone());
        }
        player.offline = true;

        let humans = self
            .state
            .seats
            .iter()
            .filter(|s| s.kind == SeatKind::Human)
            .count();
        if humans <= 1 {
            self.pause();
        } else {
            self.state.seats[seat].ai_hosted = true;
            info!(session_id = %self.state.session_id, player_id, seat, "stand-in AI hosting seat");
            let waiting = matches!(
                self.state.turn_state,
                TurnState::AwaitingHumanMove | TurnState::ItemPhase
            );
            if seat == self.state.current_seat && waiting {
                self.set_item_phase(false);
                self.state.turn_state = TurnState::AiThinking;
                self.activation += 1;
            }
        }
        Ok(self.state.clone())
    }

    /// Return control to a reconnected human without changing whose turn it is
    pub fn set_online(&mut self, player_id: &str) -> SessionResult<SessionState> {
        if self.state.phase != GamePhase::Playing {
            return Err(SessionError::GameNotPlaying);
        }
        let seat = self.seat_of(player_id)?;
        let player = &mut self.state.seats[seat];
        if !player.offline {
            return Ok(self.state.clone());
        }
        player.offline = false;

        if player.ai_hosted {
            player.ai_hosted = false;
            info!(session_id = %self.state.session_id, player_id, seat, "stand-in AI released");
            if seat == self.state.current_seat && self.state.turn_state == TurnState::AiThinking {
                let next = self.entry_state(seat);
                self.set_item_phase(next == TurnState::ItemPhase);
                self.state.turn_state = next;
                if self.state.time_left == 0 {
                    self.state.time_left = self.allotment(seat);
                }
                self.activation += 1;
            }
        }
        if self.state.is_paused {
            self.resume();
        }
        Ok(self.state.clone())
    }

    fn pause(&mut self) {
        if self.state.is_paused {
            return;
        }
        self.resume_state = Some(self.state.turn_state);
        self.state.is_paused = true;
        self.state.turn_state = TurnState::Paused;
        self.activation += 1;
        info!(
            session_id = %self.state.session_id,
            time_left = self.state.time_left,
            "session paused"
        );
    }

    fn resume(&mut self) {
        self.state.is_paused = false;
        let seat = self.state.current_seat;
        self.state.turn_state = match self.resume_state.take() {
            Some(state) => state,
            None => self.entry_state(seat),
        };
        self.activation += 1;
        info!(
            session_id = %self.state.session_id,
            time_left = self.state.time_left,
            "session resumed"
        );
    }

    // ========================================================================
    // AI TURNS
    // ========================================================================

    /// Play the current AI-controlled seat's turn if `activation` is still live
    pub fn run_ai_turn(&mut self, activation: u64) -> Option<AiTurn> {
        let live = activation == self.activation
            && self.state.phase == GamePhase::Playing
            && !self.state.is_paused
            && self.state.turn_state == TurnState::AiThinking;
        let seat = self.state.current_seat;
        if !live || !self.state.seats[seat].is_ai_controlled() || self.state.is_settled(seat) {
            debug!(
                session_id = %self.state.session_id,
                activation,
                current = self.activation,
                "stale AI callback ignored"
            );
            return None;
        }

        let player_id = self.state.seats[seat].player_id.clone();
        let item = self.ai_item_step(seat);
        let action = match self.ai_choose_move(seat) {
            Some(submission) => match self.place(seat, &submission) {
                Ok(outcome) => AiAction::Moved(Box::new(outcome)),
                Err(err) => {
                    warn!(
                        session_id = %self.state.session_id,
                        player_id = %player_id,
                        code = err.code(),
                        "AI placement rejected, settling seat"
                    );
                    self.settle_seat(seat);
                    AiAction::Settled
                }
            },
            None => {
                info!(
                    session_id = %self.state.session_id,
                    player_id = %player_id,
                    "AI has no legal placement"
                );
                self.settle_seat(seat);
                AiAction::Settled
            }
        };
        Some(AiTurn {
            player_id,
            item,
            action,
        })
    }

    fn ai_item_step(&mut self, seat: usize) -> Option<ItemResult> {
        let creative = self.state.creative.as_ref()?;
        if creative.players[seat].cards.is_empty() {
            return None;
        }
        let views: Vec<SeatView> = self
            .state
            .seats
            .iter()
            .enumerate()
            .map(|(i, s)| SeatView {
                score: self.state.score(&s.player_id),
                settled: self.state.is_settled(i),
                steel: creative.players[i].has_steel(),
                big_unused: self.state.pieces[i]
                    .iter()
                    .filter(|p| !p.used && p.size > SMALL_PIECE_MAX_CELLS)
                    .count(),
            })
            .collect();
        let view = ItemView {
            me: seat,
            state: &creative.players[seat],
            seats: &views,
        };
        let decision = self.agents[seat].choose_item(&view)?;
        let card = creative.players[seat].cards.get(decision.card_index).copied()?;

        let target = match decision.target {
            Some(t) if t != seat && t < self.state.seats.len() && !self.state.is_settled(t) => Some(t),
            Some(_) => return None,
            None if card.needs_target() => return None,
            None => None,
        };
        match self.play_card(seat, decision.card_index, target) {
            Ok((outcome, removed_piece)) => Some(self.item_result(seat, target, outcome, removed_piece)),
            Err(err) => {
                debug!(session_id = %self.state.session_id, code = err.code(), "AI card play refused");
                None
            }
        }
    }

    fn ai_choose_move(&mut self, seat: usize) -> Option<MoveSubmission> {
        let limits = match &self.state.creative {
            Some(creative) => SearchLimits {
                blocked: creative.barriers(),
                max_piece_size: creative
                    .has_status(seat, StatusKind::BigPieceBan)
                    .then_some(SMALL_PIECE_MAX_CELLS),
            },
            None => SearchLimits::default(),
        };
        let color = self.state.seats[seat].color;
        let chosen = self.agents[seat].choose_move(&self.state.board, &self.state.pieces[seat], color, &limits)?;
        Some(MoveSubmission {
            piece_id: chosen.piece_id,
            position: chosen.position,
            shape: chosen.shape,
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Seats by score, ties broken by seat order
    pub fn rankings(&self) -> Vec<RankingEntry> {
        let scores = self.state.seat_scores();
        let mut order: Vec<usize> = (0..self.state.seats.len()).collect();
        order.sort_by_key(|&i| (Reverse(scores[i]), i));
        order
            .into_iter()
            .map(|i| {
                let seat = &self.state.seats[i];
                RankingEntry {
                    rank: 1 + scores.iter().filter(|&&s| s > scores[i]).count(),
                    player_id: seat.player_id.clone(),
                    name: seat.name.clone(),
                    color: seat.color,
                    score: scores[i],
                    settled: self.state.is_settled(i),
                    remaining_cells: self.state.remaining_cells(i),
                }
            })
            .collect()
    }

    /// Effective turn allotment for a player right now
    pub fn turn_time_limit(&self, player_id: &str) -> SessionResult<u32> {
        let seat = self.seat_of(player_id)?;
        Ok(self.allotment(seat))
    }

    pub fn piece_usage(&self, player_id: &str) -> SessionResult<PieceUsage> {
        let seat = self.seat_of(player_id)?;
        let (used, unused): (Vec<_>, Vec<_>) = self.state.pieces[seat].iter().partition(|p| p.used);
        Ok(PieceUsage {
            player_id: player_id.to_string(),
            used: used.into_iter().map(|p| p.id.clone()).collect(),
            unused: unused.into_iter().map(|p| p.id.clone()).collect(),
            remaining_cells: self.state.remaining_cells(seat),
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn ensure_playing(&self) -> SessionResult<()> {
        if self.state.phase != GamePhase::Playing {
            return Err(SessionError::GameNotPlaying);
        }
        if self.state.is_paused {
            return Err(SessionError::GamePaused);
        }
        Ok(())
    }

    fn seat_of(&self, player_id: &str) -> SessionResult<usize> {
        self.state
            .seat_index(player_id)
            .ok_or(SessionError::PlayerNotFound)
    }

    fn ensure_turn(&self, seat: usize) -> SessionResult<()> {
        if seat != self.state.current_seat || self.state.is_settled(seat) {
            return Err(SessionError::NotYourTurn);
        }
        Ok(())
    }

    fn add_score(&mut self, player_id: &str, delta: i32) {
        if delta != 0 {
            *self.state.scores.entry(player_id.to_string()).or_insert(0) += delta;
        }
    }

    fn creative_player_mut(&mut self, seat: usize) -> Option<&mut CreativePlayerState> {
        self.state.creative.as_mut().and_then(|c| c.players.get_mut(seat))
    }
}

/// Explicit colors first, remaining seats by seat order (lowest free color on clash)
fn assign_colors(seats: &[SeatConfig]) -> SessionResult<Vec<u8>> {
    if seats.len() < 2 || seats.len() > SEAT_COUNT {
        return Err(SessionError::InvalidSeats(format!(
            "expected 2 to {} seats, got {}",
            SEAT_COUNT,
            seats.len()
        )));
    }
    let mut ids = FxHashSet::default();
    for seat in seats {
        if !ids.insert(seat.player_id.as_str()) {
            return Err(SessionError::InvalidSeats(format!(
                "duplicate player id {}",
                seat.player_id
            )));
        }
    }

    let mut taken: Vec<u8> = Vec::with_capacity(seats.len());
    for color in seats.iter().filter_map(|s| s.color) {
        if !(1..=SEAT_COUNT as u8).contains(&color) || taken.contains(&color) {
            return Err(SessionError::InvalidSeats(format!("invalid or duplicate color {}", color)));
        }
        taken.push(color);
    }

    let mut colors = Vec::with_capacity(seats.len());
    for (i, seat) in seats.iter().enumerate() {
        let color = match seat.color {
            Some(color) => color,
            None => {
                let preferred = i as u8 + 1;
                let color = if taken.contains(&preferred) {
                    (1..=SEAT_COUNT as u8)
                        .find(|c| !taken.contains(c))
                        .ok_or_else(|| SessionError::InvalidSeats("no free color".to_string()))?
                } else {
                    preferred
                };
                taken.push(color);
                color
            }
        };
        colors.push(color);
    }
    Ok(colors)
}

/// Submitted matrices never exceed the board
fn is_oversized(shape: &Shape) -> bool {
    shape.len() > BOARD_SIZE || shape.iter().any(|row| row.len() > BOARD_SIZE)
}

// ============================================================================
// TESTS
// ============================================================================
