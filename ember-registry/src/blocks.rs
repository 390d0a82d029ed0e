//! The block registry: block definitions, state arithmetic and the per-state
//! lookup tables the engine reads on hot paths.

use ember_utils::BlockStateId;
use ember_utils::math::BoxF;
use rustc_hash::FxHashMap;

use crate::behaviour::BehaviourKind;
use crate::properties::Property;
use crate::shapes::{BlockModel, ModelId};

/// Index of a block type in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u16);

bitflags::bitflags! {
    /// Tag bits carried by each block type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockTag: u32 {
        const STAIRS = 1 << 0;
        const WOODEN_FENCE = 1 << 1;
        const FENCE_GATE = 1 << 2;
        const WALL = 1 << 3;
        const PANE_LIKE = 1 << 4;
        const LEAVES = 1 << 5;
        const SHULKER_BOX = 1 << 6;
        const BEDS = 1 << 7;
        const DOORS = 1 << 8;
        const DIRT = 1 << 9;
        const ICE = 1 << 10;
        const AIR = 1 << 11;
        const FIRE = 1 << 12;
        const SAND = 1 << 13;
    }
}

/// How much light a block state emits.
#[derive(Debug, Clone, Copy)]
pub enum LightEmission {
    /// Never emits.
    None,
    /// Emits a fixed level in every state.
    Fixed(u8),
    /// Emits only while the `lit` property is true.
    WhenLit(u8),
}

/// Whether a block conducts redstone power through itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConductorRule {
    /// Conducts iff the collision model is a full cube.
    FullCube,
    /// Never conducts (glass, glowstone, observers, pistons, ...).
    Never,
    /// Always conducts (soul sand).
    Always,
}

/// Shape source for one of the three per-state model tables.
#[derive(Debug, Clone, Copy)]
pub enum ModelSpec {
    /// No boxes.
    Empty,
    /// The full unit cube.
    Full,
    /// A fixed list of boxes shared by every state.
    Boxes(&'static [BoxF]),
    /// Snow layers: height follows the `layers` property.
    SnowLayers,
}

/// One block type and its static configuration.
#[derive(Debug)]
pub struct Block {
    /// Resource location path (implicit `minecraft:` namespace).
    pub key: &'static str,
    /// Declared properties, in state-index order.
    pub properties: &'static [Property],
    /// Behaviours run on neighbour updates, in registration order.
    pub behaviours: &'static [BehaviourKind],
    /// Tag bits.
    pub tags: BlockTag,
    /// Emitted light.
    pub emission: LightEmission,
    /// Light reduction applied when propagating into this block.
    pub light_block: u8,
    /// Ground friction applied to entities resting on this block.
    pub friction: f32,
    /// Redstone conduction rule.
    pub conductor: ConductorRule,
    /// Collision shape source.
    pub collision: ModelSpec,
    /// Support shape source (face sturdiness tests).
    pub support: ModelSpec,
    /// Occlusion shape source (light blocking).
    pub occlusion: ModelSpec,

    /// First state index of this block; assigned when the registry freezes.
    pub base_state: u16,
    /// Number of states; the product of the property value counts.
    pub state_count: u16,
    /// Cached default state; assigned when the registry freezes.
    pub default_state: BlockStateId,
}

impl Block {
    /// Starts a new block definition. The default is a plain full opaque
    /// cube with no properties or behaviours.
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            properties: &[],
            behaviours: &[],
            tags: BlockTag::empty(),
            emission: LightEmission::None,
            light_block: 15,
            friction: 0.6,
            conductor: ConductorRule::FullCube,
            collision: ModelSpec::Full,
            support: ModelSpec::Full,
            occlusion: ModelSpec::Full,
            base_state: 0,
            state_count: 1,
            default_state: BlockStateId(0),
        }
    }

    /// Declares the property list.
    #[must_use]
    pub const fn props(mut self, properties: &'static [Property]) -> Self {
        self.properties = properties;
        self
    }

    /// Declares the behaviour list.
    #[must_use]
    pub const fn behaviours(mut self, behaviours: &'static [BehaviourKind]) -> Self {
        self.behaviours = behaviours;
        self
    }

    /// Adds tag bits.
    #[must_use]
    pub const fn tags(mut self, tags: BlockTag) -> Self {
        self.tags = tags;
        self
    }

    /// Marks the block as having no collision, support or occlusion shape
    /// and no light reduction.
    #[must_use]
    pub const fn no_shape(mut self) -> Self {
        self.collision = ModelSpec::Empty;
        self.support = ModelSpec::Empty;
        self.occlusion = ModelSpec::Empty;
        self.light_block = 0;
        self
    }

    /// Keeps the collision cube but lets light through (glass, ice).
    #[must_use]
    pub const fn transparent(mut self) -> Self {
        self.occlusion = ModelSpec::Empty;
        self.light_block = 0;
        self
    }

    /// Sets the collision and support shapes to the same box list.
    #[must_use]
    pub const fn shape(mut self, boxes: &'static [BoxF]) -> Self {
        self.collision = ModelSpec::Boxes(boxes);
        self.support = ModelSpec::Boxes(boxes);
        self.occlusion = ModelSpec::Empty;
        self.light_block = 0;
        self
    }

    /// Sets the emitted light.
    #[must_use]
    pub const fn emission(mut self, emission: LightEmission) -> Self {
        self.emission = emission;
        self
    }

    /// Overrides the light reduction.
    #[must_use]
    pub const fn light_block(mut self, reduction: u8) -> Self {
        self.light_block = reduction;
        self
    }

    /// Overrides the ground friction.
    #[must_use]
    pub const fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Overrides the redstone conduction rule.
    #[must_use]
    pub const fn conductor(mut self, rule: ConductorRule) -> Self {
        self.conductor = rule;
        self
    }

    /// Overrides the collision source only.
    #[must_use]
    pub const fn collision(mut self, spec: ModelSpec) -> Self {
        self.collision = spec;
        self
    }

    /// Whether the block declares the given property.
    #[must_use]
    pub fn has_property(&self, property: Property) -> bool {
        self.properties.contains(&property)
    }

    /// Whether the block declares the given behaviour.
    #[must_use]
    pub fn has_behaviour(&self, kind: BehaviourKind) -> bool {
        self.behaviours.contains(&kind)
    }
}

/// A decoded block state: the block type plus the value index of every
/// declared property. Undeclared properties read as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStateInfo {
    /// The block type.
    pub block: BlockId,
    values: [u8; Property::COUNT],
}

const ABSENT: u8 = u8::MAX;

impl BlockStateInfo {
    /// Creates an info with every property absent.
    #[must_use]
    pub fn new(block: BlockId) -> Self {
        Self {
            block,
            values: [ABSENT; Property::COUNT],
        }
    }

    /// Returns the stored value index, if the property is present.
    #[must_use]
    pub fn get(&self, property: Property) -> Option<u8> {
        let value = self.values[property as usize];
        (value != ABSENT).then_some(value)
    }

    /// Returns the stored value index, or the property default when absent.
    #[must_use]
    pub fn get_or_default(&self, property: Property) -> u8 {
        self.get(property).unwrap_or(property.spec().default_index)
    }

    /// Stores a value index.
    pub fn set(&mut self, property: Property, value_index: u8) {
        self.values[property as usize] = value_index;
    }

    /// Reads a boolean property. True is value index 0.
    #[must_use]
    pub fn get_bool(&self, property: Property) -> bool {
        self.get_or_default(property) == 0
    }

    /// Stores a boolean property.
    pub fn set_bool(&mut self, property: Property, value: bool) {
        self.set(property, u8::from(!value));
    }
}

/// The frozen content tables.
pub struct Registry {
    blocks: Vec<Block>,
    by_key: FxHashMap<&'static str, BlockId>,

    block_by_state: Vec<u16>,
    emission_by_state: Vec<u8>,
    light_block_by_state: Vec<u8>,
    collision_by_state: Vec<ModelId>,
    support_by_state: Vec<ModelId>,
    occlusion_by_state: Vec<ModelId>,
    models: Vec<BlockModel>,

    /// The item table (placement contract only).
    pub items: crate::items::ItemRegistry,
}

impl Registry {
    /// Builds and freezes the vanilla content tables.
    #[must_use]
    pub fn vanilla() -> Self {
        let mut blocks = Vec::new();
        crate::vanilla_blocks::register_blocks(&mut blocks);
        Self::freeze(blocks)
    }

    fn freeze(mut blocks: Vec<Block>) -> Self {
        let mut by_key = FxHashMap::default();
        let mut base = 0u16;
        for (id, block) in blocks.iter_mut().enumerate() {
            block.base_state = base;
            let mut count = 1u32;
            for property in block.properties {
                count *= u32::from(property.spec().value_count());
            }
            block.state_count = count as u16;

            let mut offset = 0u16;
            for property in block.properties {
                let spec = property.spec();
                offset = offset * spec.value_count() + u16::from(spec.default_index);
            }
            block.default_state = BlockStateId(base + offset);

            by_key.insert(block.key, BlockId(id as u16));
            base = base
                .checked_add(block.state_count)
                .expect("block state table overflows u16");
        }
        let total_states = base as usize;

        let mut registry = Self {
            blocks,
            by_key,
            block_by_state: Vec::with_capacity(total_states),
            emission_by_state: Vec::with_capacity(total_states),
            light_block_by_state: Vec::with_capacity(total_states),
            collision_by_state: Vec::with_capacity(total_states),
            support_by_state: Vec::with_capacity(total_states),
            occlusion_by_state: Vec::with_capacity(total_states),
            models: vec![BlockModel::empty(), BlockModel::full_cube()],
            items: crate::items::ItemRegistry::vanilla(),
        };
        registry.build_state_tables();
        registry
    }

    fn build_state_tables(&mut self) {
        let mut snow_models = [const { None }; 8];
        for block_index in 0..self.blocks.len() {
            let block_id = BlockId(block_index as u16);
            let (state_count, emission, light_block) = {
                let block = &self.blocks[block_index];
                (block.state_count, block.emission, block.light_block)
            };

            let collision = self.resolve_model(block_index, |b| b.collision);
            let support = self.resolve_model(block_index, |b| b.support);
            let occlusion = self.resolve_model(block_index, |b| b.occlusion);

            for state_offset in 0..state_count {
                self.block_by_state.push(block_id.0);

                let state = BlockStateId(self.blocks[block_index].base_state + state_offset);
                let info = self.describe_state(state);
                let emitted = match emission {
                    LightEmission::None => 0,
                    LightEmission::Fixed(level) => level,
                    LightEmission::WhenLit(level) => {
                        if info.get_bool(Property::Lit) {
                            level
                        } else {
                            0
                        }
                    }
                };
                self.emission_by_state.push(emitted);
                self.light_block_by_state.push(light_block);

                let mut pick = |spec: ModelSpec, fixed: ModelId, models: &mut Vec<BlockModel>| {
                    if let ModelSpec::SnowLayers = spec {
                        let layers = info.get_or_default(Property::Layers) as usize;
                        *snow_models[layers].get_or_insert_with(|| {
                            let height = (layers as f32 + 1.0) * 2.0 / 16.0;
                            models.push(BlockModel::from_boxes(&[BoxF::new(
                                0.0, 0.0, 0.0, 1.0, height, 1.0,
                            )]));
                            ModelId((models.len() - 1) as u16)
                        })
                    } else {
                        fixed
                    }
                };
                let spec = self.blocks[block_index].collision;
                let id = pick(spec, collision, &mut self.models);
                self.collision_by_state.push(id);
                let spec = self.blocks[block_index].support;
                let id = pick(spec, support, &mut self.models);
                self.support_by_state.push(id);
                let spec = self.blocks[block_index].occlusion;
                let id = pick(spec, occlusion, &mut self.models);
                self.occlusion_by_state.push(id);
            }
        }
    }

    fn resolve_model(&mut self, block_index: usize, pick: impl Fn(&Block) -> ModelSpec) -> ModelId {
        match pick(&self.blocks[block_index]) {
            ModelSpec::Empty => ModelId(0),
            ModelSpec::Full => ModelId(1),
            ModelSpec::Boxes(boxes) => {
                self.models.push(BlockModel::from_boxes(boxes));
                ModelId((self.models.len() - 1) as u16)
            }
            // Resolved per state in build_state_tables.
            ModelSpec::SnowLayers => ModelId(0),
        }
    }

    /// Total number of block states.
    #[must_use]
    pub fn state_count(&self) -> u16 {
        self.block_by_state.len() as u16
    }

    /// Returns a block by id.
    ///
    /// # Panics
    /// Panics on an out-of-range id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    /// Looks up a block by resource location, accepting both `stone` and
    /// `minecraft:stone`.
    #[must_use]
    pub fn block_by_key(&self, key: &str) -> Option<BlockId> {
        let path = key.strip_prefix("minecraft:").unwrap_or(key);
        self.by_key.get(path).copied()
    }

    /// The block type owning a state. Out-of-range states map to air.
    #[must_use]
    pub fn block_of_state(&self, state: BlockStateId) -> BlockId {
        BlockId(
            self.block_by_state
                .get(state.0 as usize)
                .copied()
                .unwrap_or(0),
        )
    }

    /// The default state of a block.
    #[must_use]
    pub fn default_state(&self, id: BlockId) -> BlockStateId {
        self.block(id).default_state
    }

    /// Light emitted by a state.
    #[must_use]
    pub fn emission(&self, state: BlockStateId) -> u8 {
        self.emission_by_state
            .get(state.0 as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Light reduction of a state.
    #[must_use]
    pub fn light_block(&self, state: BlockStateId) -> u8 {
        self.light_block_by_state
            .get(state.0 as usize)
            .copied()
            .unwrap_or(0)
    }

    /// The collision model of a state.
    #[must_use]
    pub fn collision_model(&self, state: BlockStateId) -> &BlockModel {
        self.model(self.collision_by_state[state.0 as usize])
    }

    /// The support model of a state.
    #[must_use]
    pub fn support_model(&self, state: BlockStateId) -> &BlockModel {
        self.model(self.support_by_state[state.0 as usize])
    }

    /// The occlusion model of a state.
    #[must_use]
    pub fn occlusion_model(&self, state: BlockStateId) -> &BlockModel {
        self.model(self.occlusion_by_state[state.0 as usize])
    }

    fn model(&self, id: ModelId) -> &BlockModel {
        &self.models[id.0 as usize]
    }

    /// Whether a state conducts redstone power.
    #[must_use]
    pub fn conducts_redstone(&self, state: BlockStateId) -> bool {
        let block = self.block(self.block_of_state(state));
        match block.conductor {
            ConductorRule::Always => true,
            ConductorRule::Never => false,
            ConductorRule::FullCube => self.collision_model(state).full_faces == 0x3F,
        }
    }

    /// Whether a block carries a tag.
    #[must_use]
    pub fn has_tag(&self, id: BlockId, tag: BlockTag) -> bool {
        self.block(id).tags.contains(tag)
    }

    /// Decodes a state into its property value indices.
    #[must_use]
    pub fn describe_state(&self, state: BlockStateId) -> BlockStateInfo {
        let block_id = self.block_of_state(state);
        let block = self.block(block_id);
        let mut info = BlockStateInfo::new(block_id);
        let mut index = state.0.saturating_sub(block.base_state);
        for property in block.properties.iter().rev() {
            let count = property.spec().value_count();
            info.set(*property, (index % count) as u8);
            index /= count;
        }
        info
    }

    /// Encodes a property assignment back into a state id. Properties the
    /// block does not declare are ignored; absent declared properties fall
    /// back to their defaults.
    #[must_use]
    pub fn make_state(&self, info: &BlockStateInfo) -> BlockStateId {
        let block = self.block(info.block);
        let mut offset = 0u16;
        for property in block.properties {
            let spec = property.spec();
            let value = info
                .get(*property)
                .filter(|v| u16::from(*v) < spec.value_count())
                .unwrap_or(spec.default_index);
            offset = offset * spec.value_count() + u16::from(value);
        }
        BlockStateId(block.base_state + offset)
    }

    /// Resolves a palette entry (resource location plus property name/value
    /// pairs) to a state id. Unknown property values fall back to the
    /// declared default; an unknown block is `None`.
    #[must_use]
    pub fn state_from_palette(
        &self,
        key: &str,
        mut lookup: impl FnMut(&str) -> Option<String>,
    ) -> Option<BlockStateId> {
        let block_id = self.block_by_key(key)?;
        let block = self.block(block_id);
        let mut offset = 0u16;
        for property in block.properties {
            let spec = property.spec();
            let value_index = lookup(spec.name)
                .and_then(|value| spec.value_index(&value))
                .unwrap_or(spec.default_index);
            offset = offset * spec.value_count() + u16::from(value_index);
        }
        Some(BlockStateId(block.base_state + offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vanilla_blocks;

    fn registry() -> Registry {
        Registry::vanilla()
    }

    #[test]
    fn air_is_state_zero() {
        let registry = registry();
        assert_eq!(registry.default_state(vanilla_blocks::AIR), BlockStateId(0));
        assert_eq!(registry.block_of_state(BlockStateId(0)), vanilla_blocks::AIR);
    }

    #[test]
    fn describe_make_roundtrip_every_state() {
        let registry = registry();
        for raw in 0..registry.state_count() {
            let state = BlockStateId(raw);
            let info = registry.describe_state(state);
            assert_eq!(registry.make_state(&info), state, "state {raw}");
        }
    }

    #[test]
    fn palette_resolution_defaults_unknown_values() {
        let registry = registry();
        let state = registry
            .state_from_palette("minecraft:redstone_wire", |name| match name {
                "power" => Some("7".to_owned()),
                "east" => Some("bogus".to_owned()),
                _ => None,
            })
            .expect("redstone wire registered");
        let info = registry.describe_state(state);
        assert_eq!(info.get_or_default(Property::Power), 7);
        assert_eq!(
            info.get_or_default(Property::RedstoneEast),
            Property::RedstoneEast.spec().default_index
        );
    }

    #[test]
    fn unknown_block_fails_resolution() {
        assert!(registry().state_from_palette("minecraft:no_such", |_| None).is_none());
    }

    #[test]
    fn lit_torch_emits() {
        let registry = registry();
        let torch = registry.default_state(vanilla_blocks::REDSTONE_TORCH);
        // Default redstone torch state is lit.
        assert!(registry.emission(torch) > 0);
        let mut info = registry.describe_state(torch);
        info.set_bool(Property::Lit, false);
        assert_eq!(registry.emission(registry.make_state(&info)), 0);
    }

    #[test]
    fn stone_conducts_glass_does_not() {
        let registry = registry();
        assert!(registry.conducts_redstone(registry.default_state(vanilla_blocks::STONE)));
        assert!(!registry.conducts_redstone(registry.default_state(vanilla_blocks::GLASS)));
        assert!(registry.conducts_redstone(registry.default_state(vanilla_blocks::SOUL_SAND)));
    }
}
