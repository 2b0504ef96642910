//! Loot tables and what each item does when used

use log::warn;
use rand::Rng;
use shared::ItemType;
use std::time::Duration;

/// One weighted entry of an item box loot table
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDrop {
    pub item: ItemType,
    /// Relative weight, higher is more common. Zero or negative never drops.
    pub weight: f32,
}

impl ItemDrop {
    pub fn new(item: ItemType, weight: f32) -> Self {
        Self { item, weight }
    }
}

/// Sum of all positive weights in the table
pub fn total_weight(drops: &[ItemDrop]) -> f32 {
    drops
        .iter()
        .filter(|drop| drop.weight > 0.0)
        .map(|drop| drop.weight)
        .sum()
}

/// Picks the entry whose cumulative bucket contains `draw`
///
/// `draw` is expected in `[0, total_weight)`. Entries with non-positive
/// weight are skipped entirely, so a draw of 0 lands on the first entry with
/// positive weight. A draw at or beyond the total falls back to the last
/// positive entry.
pub fn select_with_draw(drops: &[ItemDrop], draw: f32) -> ItemType {
    let mut cumulative = 0.0;
    let mut last_positive = ItemType::None;

    for drop in drops.iter().filter(|drop| drop.weight > 0.0) {
        cumulative += drop.weight;
        last_positive = drop.item;
        if draw < cumulative {
            return drop.item;
        }
    }

    last_positive
}

/// Draws a weighted random item, `ItemType::None` for an empty or all-zero table
pub fn select_weighted<R: Rng + ?Sized>(drops: &[ItemDrop], rng: &mut R) -> ItemType {
    if drops.is_empty() {
        warn!("No item drops configured");
        return ItemType::None;
    }

    let total = total_weight(drops);
    if total <= 0.0 {
        return ItemType::None;
    }

    let draw = rng.gen_range(0.0..total);
    select_with_draw(drops, draw)
}

/// Server-side consequence of using an item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEffect {
    FireProjectile,
    SpeedBoost { multiplier: f32, duration: Duration },
}

/// Maps a held item to its effect; an empty slot has none
pub fn effect_of(item: ItemType, boost_multiplier: f32, boost_duration: Duration) -> Option<ItemEffect> {
    match item {
        ItemType::None => None,
        ItemType::GreenShell => Some(ItemEffect::FireProjectile),
        ItemType::Mushroom => Some(ItemEffect::SpeedBoost {
            multiplier: boost_multiplier,
            duration: boost_duration,
        }),
    }
}
