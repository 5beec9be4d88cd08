//! Item cards and their resolution table

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::status::{CreativePlayerState, StatusEffect, StatusKind};
use super::tiles::PieceRemoval;

/// Most points a score steal can take
pub const MAX_STEAL: i32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCard {
    ScoreSteal,
    SkipCurse,
    TimeBomb,
    Sabotage,
    SteelGuard,
    DebuffTransfer,
}

impl ItemCard {
    pub const ALL: [ItemCard; 6] = [
        ItemCard::ScoreSteal,
        ItemCard::SkipCurse,
        ItemCard::TimeBomb,
        ItemCard::Sabotage,
        ItemCard::SteelGuard,
        ItemCard::DebuffTransfer,
    ];

    /// Every card but steel guard is aimed at an opponent
    pub fn needs_target(self) -> bool {
        self != ItemCard::SteelGuard
    }
}

/// Uniform draw used when a tile grants a card
pub fn random_item_card<R: Rng>(rng: &mut R) -> ItemCard {
    *ItemCard::ALL.choose(rng).unwrap_or(&ItemCard::ScoreSteal)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ItemCardError {
    #[error("{0:?} needs a target seat")]
    MissingTarget(ItemCard),
    #[error("caster holds no debuff to transfer")]
    NoDebuffToTransfer,
}

/// Target seat as seen by the resolver
#[derive(Clone, Copy, Debug)]
pub struct ItemTarget<'a> {
    pub state: &'a CreativePlayerState,
    pub score: i32,
}

/// Consequences of one played card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub card: ItemCard,
    pub caster_score_delta: i32,
    pub target_score_delta: i32,
    pub caster_status: Option<StatusEffect>,
    pub target_status: Option<StatusEffect>,
    /// Debuff removed from the caster
    pub transferred: Option<StatusKind>,
    pub target_piece_removal: Option<PieceRemoval>,
    /// Target's steel absorbed the card
    pub nullified: bool,
}

impl ItemOutcome {
    fn empty(card: ItemCard) -> Self {
        Self {
            card,
            caster_score_delta: 0,
            target_score_delta: 0,
            caster_status: None,
            target_status: None,
            transferred: None,
            target_piece_removal: None,
            nullified: false,
        }
    }
}

/// Resolve a card played by `caster` against an optional target
pub fn resolve_item_card(
    card: ItemCard,
    caster: &CreativePlayerState,
    target: Option<ItemTarget<'_>>,
) -> Result<ItemOutcome, ItemCardError> {
    let mut outcome = ItemOutcome::empty(card);

    if card == ItemCard::SteelGuard {
        outcome.caster_status = Some(StatusEffect::new(StatusKind::Steel, true));
        return Ok(outcome);
    }

    let target = target.ok_or(ItemCardError::MissingTarget(card))?;
    let debuff = caster.first_negative();
    if card == ItemCard::DebuffTransfer && debuff.is_none() {
        return Err(ItemCardError::NoDebuffToTransfer);
    }

    if target.state.has_steel() {
        outcome.nullified = true;
        return Ok(outcome);
    }

    match card {
        ItemCard::ScoreSteal => {
            let stolen = target.score.clamp(0, MAX_STEAL);
            outcome.target_score_delta = -stolen;
            outcome.caster_score_delta = stolen;
        }
        ItemCard::SkipCurse => {
            outcome.target_status = Some(StatusEffect::new(StatusKind::SkipTurn, false));
        }
        ItemCard::TimeBomb => {
            outcome.target_status = Some(StatusEffect::new(StatusKind::TimePressure, false));
        }
        ItemCard::Sabotage => {
            outcome.target_piece_removal = Some(PieceRemoval::Largest);
        }
        ItemCard::DebuffTransfer => {
            if let Some(status) = debuff {
                outcome.transferred = Some(status.kind);
                outcome.target_status = Some(StatusEffect {
                    is_new: false,
                    ..status
                });
            }
        }
        ItemCard::SteelGuard => {}
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> CreativePlayerState {
        CreativePlayerState::default()
    }

    fn with(kind: StatusKind) -> CreativePlayerState {
        let mut state = CreativePlayerState::default();
        state.grant_status(StatusEffect::new(kind, false));
        state
    }

    #[test]
    fn test_steal_caps_at_three() {
        let target = plain();
        let out = resolve_item_card(
            ItemCard::ScoreSteal,
            &plain(),
            Some(ItemTarget { state: &target, score: 10 }),
        )
        .unwrap();
        assert_eq!(out.caster_score_delta, 3);
        assert_eq!(out.target_score_delta, -3);

        let out = resolve_item_card(
            ItemCard::ScoreSteal,
            &plain(),
            Some(ItemTarget { state: &target, score: 2 }),
        )
        .unwrap();
        assert_eq!(out.caster_score_delta, 2);
    }

    #[test]
    fn test_steel_nullifies_target_cards() {
        let target = with(StatusKind::Steel);
        for card in [ItemCard::ScoreSteal, ItemCard::SkipCurse, ItemCard::Sabotage] {
            let out = resolve_item_card(card, &plain(), Some(ItemTarget { state: &target, score: 9 }))
                .unwrap();
            assert!(out.nullified);
            assert_eq!(out.target_score_delta, 0);
            assert_eq!(out.target_status, None);
            assert_eq!(out.target_piece_removal, None);
        }
    }

    #[test]
    fn test_transfer_requires_debuff() {
        let target = plain();
        let err = resolve_item_card(
            ItemCard::DebuffTransfer,
            &plain(),
            Some(ItemTarget { state: &target, score: 0 }),
        )
        .unwrap_err();
        assert_eq!(err, ItemCardError::NoDebuffToTransfer);

        let caster = with(StatusKind::BigPieceBan);
        let out = resolve_item_card(
            ItemCard::DebuffTransfer,
            &caster,
            Some(ItemTarget { state: &target, score: 0 }),
        )
        .unwrap();
        assert_eq!(out.transferred, Some(StatusKind::BigPieceBan));
        let moved = out.target_status.unwrap();
        assert_eq!(moved.remaining_turns, 2);
        assert!(!moved.is_new);
    }

    #[test]
    fn test_steel_guard_is_self_cast() {
        let out = resolve_item_card(ItemCard::SteelGuard, &plain(), None).unwrap();
        let steel = out.caster_status.unwrap();
        assert_eq!(steel.kind, StatusKind::Steel);
        assert!(steel.is_new);
    }

    #[test]
    fn test_missing_target() {
        assert_eq!(
            resolve_item_card(ItemCard::TimeBomb, &plain(), None),
            Err(ItemCardError::MissingTarget(ItemCard::TimeBomb))
        );
    }
}
