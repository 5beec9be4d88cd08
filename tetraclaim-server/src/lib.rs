//! TETRACLAIM Server - authoritative session engine
//!
//! This crate runs in-memory game sessions for a network layer:
//! - Turn state machine with moves, settling, item phases and timeouts
//! - Per-second turn timers and delayed AI turns as cancellable tokio tasks
//! - Pause on solo-human disconnect, AI stand-ins otherwise
//! - Session registry with per-session serialized access
//! - Outbound notifications through `SessionEvents`

mod config;
mod error;
mod events;
mod registry;
mod session;
mod state;

pub use config::{GameMode, SessionConfig, DEFAULT_TURN_SECONDS};
pub use error::{SessionError, SessionResult};
pub use events::{ChannelEvents, NoopEvents, SessionEvent, SessionEvents};
pub use registry::SessionRegistry;
pub use session::{AiAction, AiTurn, Session, TickOutcome, TimeoutReport};
pub use state::{
    CreativeState, GamePhase, ItemResult, Move, MoveOutcome, MoveSubmission, PieceUsage,
    PlayerId, PlayerSeat, RankingEntry, SeatConfig, SeatKind, SessionId, SessionState,
    TriggeredEffect, TurnState,
};
