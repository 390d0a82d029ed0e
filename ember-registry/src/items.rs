//! The minimal item table.
//!
//! Full item behaviour dispatch is an external collaborator; the engine only
//! needs the contract surface: which block an in-hand item places. Items that
//! place nothing map to `None`.

use rustc_hash::FxHashMap;

use crate::blocks::BlockId;
use crate::vanilla_blocks;

/// Index of an item in the registry. The default id is air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemId(pub u16);

/// One item entry.
#[derive(Debug)]
pub struct Item {
    /// Resource location path.
    pub key: &'static str,
    /// The block this item places, if any.
    pub places: Option<BlockId>,
}

/// The frozen item table.
pub struct ItemRegistry {
    items: Vec<Item>,
    by_key: FxHashMap<&'static str, ItemId>,
}

impl ItemRegistry {
    /// The empty-hand item.
    pub const AIR: ItemId = ItemId(0);

    /// Builds the vanilla item table.
    #[must_use]
    pub fn vanilla() -> Self {
        let items = vec![
            Item { key: "air", places: None },
            Item { key: "stone", places: Some(vanilla_blocks::STONE) },
            Item { key: "dirt", places: Some(vanilla_blocks::DIRT) },
            Item { key: "sand", places: Some(vanilla_blocks::SAND) },
            Item { key: "gravel", places: Some(vanilla_blocks::GRAVEL) },
            Item { key: "oak_planks", places: Some(vanilla_blocks::OAK_PLANKS) },
            Item { key: "glass", places: Some(vanilla_blocks::GLASS) },
            Item { key: "glowstone", places: Some(vanilla_blocks::GLOWSTONE) },
            Item { key: "torch", places: Some(vanilla_blocks::TORCH) },
            Item { key: "cactus", places: Some(vanilla_blocks::CACTUS) },
            Item { key: "sugar_cane", places: Some(vanilla_blocks::SUGAR_CANE) },
            Item { key: "oak_fence", places: Some(vanilla_blocks::OAK_FENCE) },
            Item { key: "glass_pane", places: Some(vanilla_blocks::GLASS_PANE) },
            Item { key: "cobblestone_wall", places: Some(vanilla_blocks::COBBLESTONE_WALL) },
            Item { key: "oak_stairs", places: Some(vanilla_blocks::OAK_STAIRS) },
            Item { key: "redstone", places: Some(vanilla_blocks::REDSTONE_WIRE) },
            Item { key: "lever", places: Some(vanilla_blocks::LEVER) },
            Item { key: "redstone_torch", places: Some(vanilla_blocks::REDSTONE_TORCH) },
            Item { key: "redstone_block", places: Some(vanilla_blocks::REDSTONE_BLOCK) },
            Item { key: "repeater", places: Some(vanilla_blocks::REPEATER) },
            Item { key: "stone_pressure_plate", places: Some(vanilla_blocks::STONE_PRESSURE_PLATE) },
            Item { key: "stone_button", places: Some(vanilla_blocks::STONE_BUTTON) },
            Item { key: "snow_block", places: Some(vanilla_blocks::SNOW_BLOCK) },
            Item { key: "slime_block", places: Some(vanilla_blocks::SLIME_BLOCK) },
        ];
        let by_key = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.key, ItemId(index as u16)))
            .collect();
        Self { items, by_key }
    }

    /// Returns an item by id; out-of-range ids resolve to air.
    #[must_use]
    pub fn item(&self, id: ItemId) -> &Item {
        self.items.get(id.0 as usize).unwrap_or(&self.items[0])
    }

    /// Looks up an item by resource location.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<ItemId> {
        let path = key.strip_prefix("minecraft:").unwrap_or(key);
        self.by_key.get(path).copied()
    }

    /// The block an item places.
    #[must_use]
    pub fn block_for_item(&self, id: ItemId) -> Option<BlockId> {
        self.item(id).places
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the table is empty (never true after construction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redstone_item_places_wire() {
        let items = ItemRegistry::vanilla();
        let id = items.by_key("minecraft:redstone").expect("registered");
        assert_eq!(items.block_for_item(id), Some(vanilla_blocks::REDSTONE_WIRE));
        assert_eq!(items.block_for_item(ItemRegistry::AIR), None);
    }
}
