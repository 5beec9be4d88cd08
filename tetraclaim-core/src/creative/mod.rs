//! Creative ruleset: special tiles, random effects, item cards and status effects
//!
//! Everything here is a stateless table or a pure transform; the session
//! applies the returned outcomes to its own state.

pub mod items;
pub mod status;
pub mod tiles;

pub use items::{random_item_card, resolve_item_card, ItemCard, ItemCardError, ItemOutcome, ItemTarget};
pub use status::{tick_status_effects, CreativePlayerState, StatusEffect, StatusKind, MAX_ITEM_CARDS};
pub use tiles::{
    average_score, choose_expansion, choose_piece_to_remove, expansion_candidates,
    generate_special_tiles, leader_excluding, resolve_tile_effect, roll_tile_effect,
    EffectAction, EffectContext, EffectOutcome, PieceRemoval, SpecialTile, TileEffect, TileKind,
};
