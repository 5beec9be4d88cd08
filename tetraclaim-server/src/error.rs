//! Symbolic session errors
//!
//! Every inbound operation returns one of these for an expected rule
//! violation. None of them aborts the session for other seats.

use tetraclaim_core::creative::ItemCardError;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("game not found")]
    GameNotFound,
    #[error("game is not being played")]
    GameNotPlaying,
    #[error("game is paused")]
    GamePaused,
    #[error("an item phase is in progress")]
    InItemPhase,
    #[error("no item phase is in progress")]
    NotInItemPhase,
    #[error("it is not this player's turn")]
    NotYourTurn,
    #[error("piece is unknown or already used")]
    InvalidPiece,
    #[error("shape is not an orientation of the piece")]
    InvalidShape,
    #[error("placement violates the placement rules")]
    IllegalPlacement,
    #[error("placement covers a barrier tile")]
    BarrierBlocked,
    #[error("pieces larger than four cells are banned for this player")]
    BigPieceBanned,
    #[error("no item card at that index")]
    InvalidCard,
    #[error("invalid item card target")]
    InvalidTarget,
    #[error("target player has settled")]
    TargetSettled,
    #[error("no debuff to transfer")]
    NoDebuffToTransfer,
    #[error("player is not seated in this session")]
    PlayerNotFound,
    #[error("player has already settled")]
    PlayerSettled,
    #[error("invalid seats: {0}")]
    InvalidSeats(String),
    #[error("a session with this id already exists")]
    SessionExists,
    #[error("session is not in creative mode")]
    NotCreativeMode,
}

impl SessionError {
    /// Stable code surfaced to clients
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::GameNotFound => "GAME_NOT_FOUND",
            SessionError::GameNotPlaying => "GAME_NOT_PLAYING",
            SessionError::GamePaused => "GAME_PAUSED",
            SessionError::InItemPhase => "IN_ITEM_PHASE",
            SessionError::NotInItemPhase => "NOT_IN_ITEM_PHASE",
            SessionError::NotYourTurn => "NOT_YOUR_TURN",
            SessionError::InvalidPiece => "INVALID_PIECE",
            SessionError::InvalidShape => "INVALID_SHAPE",
            SessionError::IllegalPlacement => "ILLEGAL_PLACEMENT",
            SessionError::BarrierBlocked => "BARRIER_BLOCKED",
            SessionError::BigPieceBanned => "BIG_PIECE_BANNED",
            SessionError::InvalidCard => "INVALID_CARD",
            SessionError::InvalidTarget => "INVALID_TARGET",
            SessionError::TargetSettled => "TARGET_SETTLED",
            SessionError::NoDebuffToTransfer => "NO_DEBUFF_TO_TRANSFER",
            SessionError::PlayerNotFound => "PLAYER_NOT_FOUND",
            SessionError::PlayerSettled => "PLAYER_SETTLED",
            SessionError::InvalidSeats(_) => "INVALID_SEATS",
            SessionError::SessionExists => "SESSION_EXISTS",
            SessionError::NotCreativeMode => "NOT_CREATIVE_MODE",
        }
    }
}

impl From<ItemCardError> for SessionError {
    fn from(err: ItemCardError) -> Self {
        match err {
            ItemCardError::MissingTarget(_) => SessionError::InvalidTarget,
            ItemCardError::NoDebuffToTransfer => SessionError::NoDebuffToTransfer,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(SessionError::GameNotFound.code(), "GAME_NOT_FOUND");
        assert_eq!(SessionError::BigPieceBanned.code(), "BIG_PIECE_BANNED");
        assert_eq!(SessionError::InvalidSeats("x".into()).code(), "INVALID_SEATS");
    }

    #[test]
    fn test_item_error_mapping() {
        assert_eq!(
            SessionError::from(ItemCardError::NoDebuffToTransfer),
            SessionError::NoDebuffToTransfer
        );
    }
}
