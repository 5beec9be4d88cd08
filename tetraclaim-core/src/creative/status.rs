//! Status effects and per-seat creative state

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::items::ItemCard;

/// Maximum item cards a seat can hold
pub const MAX_ITEM_CARDS: usize = 3;

/// Timed modifier attached to a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    SkipTurn,
    TimePressure,
    HalfScore,
    BigPieceBan,
    NextDouble,
    ScoreShield,
    Steel,
    PurpleUpgrade,
}

impl StatusKind {
    /// Debuffs; these are the statuses a debuff transfer can move
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            StatusKind::SkipTurn
                | StatusKind::TimePressure
                | StatusKind::HalfScore
                | StatusKind::BigPieceBan
        )
    }

    /// Turns a fresh grant lasts
    pub fn default_turns(self) -> u32 {
        match self {
            StatusKind::SkipTurn => 1,
            StatusKind::TimePressure => 1,
            StatusKind::HalfScore => 1,
            StatusKind::BigPieceBan => 2,
            StatusKind::NextDouble => 1,
            StatusKind::ScoreShield => 2,
            StatusKind::Steel => 2,
            StatusKind::PurpleUpgrade => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    pub remaining_turns: u32,
    /// Granted during the holder's own turn; survives that turn's tick untouched
    pub is_new: bool,
}

impl StatusEffect {
    pub fn new(kind: StatusKind, is_new: bool) -> Self {
        Self {
            kind,
            remaining_turns: kind.default_turns(),
            is_new,
        }
    }
}

/// Advance every status by one of the holder's turns
///
/// Fresh effects lose their `is_new` guard instead of decrementing; effects
/// that reach zero are dropped.
pub fn tick_status_effects(statuses: &mut Vec<StatusEffect>) {
    for status in statuses.iter_mut() {
        if status.is_new {
            status.is_new = false;
        } else {
            status.remaining_turns = status.remaining_turns.saturating_sub(1);
        }
    }
    statuses.retain(|s| s.remaining_turns > 0);
}

/// Creative-mode state held by one seat
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativePlayerState {
    pub cards: VecDeque<ItemCard>,
    pub statuses: Vec<StatusEffect>,
}

impl CreativePlayerState {
    pub fn has_status(&self, kind: StatusKind) -> bool {
        self.statuses
            .iter()
            .any(|s| s.kind == kind && s.remaining_turns > 0)
    }

    /// Negative score deltas are zeroed
    pub fn is_shielded(&self) -> bool {
        self.has_status(StatusKind::ScoreShield) || self.has_status(StatusKind::Steel)
    }

    pub fn has_steel(&self) -> bool {
        self.has_status(StatusKind::Steel)
    }

    /// Add a card, evicting the oldest when the hand is full
    pub fn grant_card(&mut self, card: ItemCard) -> Option<ItemCard> {
        self.cards.push_back(card);
        if self.cards.len() > MAX_ITEM_CARDS {
            self.cards.pop_front()
        } else {
            None
        }
    }

    /// Add a status; an existing one of the same kind is refreshed instead
    pub fn grant_status(&mut self, effect: StatusEffect) {
        match self.statuses.iter_mut().find(|s| s.kind == effect.kind) {
            Some(existing) => {
                existing.remaining_turns = existing.remaining_turns.max(effect.remaining_turns);
                existing.is_new = existing.is_new || effect.is_new;
            }
            None => self.statuses.push(effect),
        }
    }

    pub fn remove_status(&mut self, kind: StatusKind) -> Option<StatusEffect> {
        let idx = self.statuses.iter().position(|s| s.kind == kind)?;
        Some(self.statuses.remove(idx))
    }

    /// Oldest active debuff, if any
    pub fn first_negative(&self) -> Option<StatusEffect> {
        self.statuses
            .iter()
            .find(|s| s.kind.is_negative() && s.remaining_turns > 0)
            .copied()
    }

    /// Consume one turn of a skip-turn status as the seat is passed over
    pub fn consume_skip(&mut self) {
        if let Some(skip) = self.statuses.iter_mut().find(|s| s.kind == StatusKind::SkipTurn) {
            skip.is_new = false;
            skip.remaining_turns = skip.remaining_turns.saturating_sub(1);
        }
        self.statuses.retain(|s| s.remaining_turns > 0);
    }

    pub fn tick(&mut self) {
        tick_status_effects(&mut self.statuses);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_effect_survives_first_tick() {
        let mut statuses = vec![StatusEffect::new(StatusKind::NextDouble, true)];
        tick_status_effects(&mut statuses);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].remaining_turns, 1);
        assert!(!statuses[0].is_new);

        tick_status_effects(&mut statuses);
        assert!(statuses.is_empty());
    }

    #[test]
    fn test_old_effect_decrements() {
        let mut statuses = vec![StatusEffect::new(StatusKind::Steel, false)];
        tick_status_effects(&mut statuses);
        assert_eq!(statuses[0].remaining_turns, 1);
        tick_status_effects(&mut statuses);
        assert!(statuses.is_empty());
    }

    #[test]
    fn test_hand_is_capped_fifo() {
        let mut state = CreativePlayerState::default();
        assert_eq!(state.grant_card(ItemCard::ScoreSteal), None);
        assert_eq!(state.grant_card(ItemCard::SkipCurse), None);
        assert_eq!(state.grant_card(ItemCard::TimeBomb), None);
        assert_eq!(state.grant_card(ItemCard::Sabotage), Some(ItemCard::ScoreSteal));
        assert_eq!(state.cards.len(), MAX_ITEM_CARDS);
        assert_eq!(state.cards.front(), Some(&ItemCard::SkipCurse));
    }

    #[test]
    fn test_grant_refreshes_existing() {
        let mut state = CreativePlayerState::default();
        state.grant_status(StatusEffect {
            kind: StatusKind::BigPieceBan,
            remaining_turns: 1,
            is_new: false,
        });
        state.grant_status(StatusEffect::new(StatusKind::BigPieceBan, false));
        assert_eq!(state.statuses.len(), 1);
        assert_eq!(state.statuses[0].remaining_turns, 2);
    }

    #[test]
    fn test_consume_skip_only_touches_skip() {
        let mut state = CreativePlayerState::default();
        state.grant_status(StatusEffect::new(StatusKind::SkipTurn, false));
        state.grant_status(StatusEffect::new(StatusKind::Steel, false));
        state.consume_skip();
        assert!(!state.has_status(StatusKind::SkipTurn));
        assert!(state.has_steel());
    }
}
