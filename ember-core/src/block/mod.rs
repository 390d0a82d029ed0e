//! The block-update engine: neighbour notification, behaviour dispatch,
//! scheduled updates and redstone signal propagation.

pub mod behaviours;
pub mod redstone;
pub mod update;

use ember_registry::blocks::BlockStateInfo;
use ember_registry::properties::Property;
use ember_registry::{BlockId, BlockTag, REGISTRY, vanilla_blocks};
use ember_utils::{BlockStateId, WorldBlockPos};

use crate::world::World;

/// Shorthand for the registry's state decode.
#[must_use]
pub fn describe(state: BlockStateId) -> BlockStateInfo {
    REGISTRY.describe_state(state)
}

/// Shorthand for the block type of a state.
#[must_use]
pub fn block_of(state: BlockStateId) -> BlockId {
    REGISTRY.block_of_state(state)
}

/// Water level carried by a state: 0 for sources, 1..=7 flowing, 8+ falling.
/// `None` when the state holds no water.
#[must_use]
pub fn water_level(state: BlockStateId) -> Option<u8> {
    let info = describe(state);
    if info.block == vanilla_blocks::WATER {
        return Some(info.get_or_default(Property::Level));
    }
    if REGISTRY.block(info.block).has_property(Property::Waterlogged)
        && info.get_bool(Property::Waterlogged)
    {
        return Some(0);
    }
    None
}

/// Whether the state holds a water source.
#[must_use]
pub fn is_water_source(state: BlockStateId) -> bool {
    water_level(state) == Some(0)
}

/// Plants accept dirt-like blocks and farmland.
#[must_use]
pub fn can_plant_survive_on(below: BlockId) -> bool {
    REGISTRY.has_tag(below, BlockTag::DIRT) || below == vanilla_blocks::FARMLAND
}

/// Carpets accept anything that is not air.
#[must_use]
pub fn can_carpet_survive_on(below: BlockId) -> bool {
    !REGISTRY.has_tag(below, BlockTag::AIR)
}

/// Bamboo accepts sand, dirt-like soil, gravel and other bamboo.
#[must_use]
pub fn is_bamboo_plantable_on(below: BlockId) -> bool {
    REGISTRY.has_tag(below, BlockTag::SAND)
        || REGISTRY.has_tag(below, BlockTag::DIRT)
        || below == vanilla_blocks::GRAVEL
        || below == vanilla_blocks::BAMBOO
        || below == vanilla_blocks::BAMBOO_SAPLING
}

/// Snow layers refuse ice and otherwise need a full top face; soul sand is
/// explicitly allowed despite its shorter model.
#[must_use]
pub fn can_snow_survive_on(below_state: BlockStateId) -> bool {
    let below = block_of(below_state);
    if REGISTRY.has_tag(below, BlockTag::ICE) {
        return false;
    }
    if below == vanilla_blocks::SOUL_SAND {
        return true;
    }
    REGISTRY
        .support_model(below_state)
        .is_face_full(ember_utils::Direction::Up)
}

/// Pressure plates stand on a centred pole face.
#[must_use]
pub fn can_pressure_plate_survive_on(below_state: BlockStateId) -> bool {
    REGISTRY
        .support_model(below_state)
        .is_face_pole(ember_utils::Direction::Up)
}

/// Redstone wire needs a full top face, or a hopper rim.
#[must_use]
pub fn can_redstone_wire_survive_on(below_state: BlockStateId) -> bool {
    REGISTRY
        .support_model(below_state)
        .is_face_full(ember_utils::Direction::Up)
        || block_of(below_state) == vanilla_blocks::HOPPER
}

/// Cacti grow on sand or stack on other cacti.
#[must_use]
pub fn can_cactus_survive_on(below: BlockId) -> bool {
    REGISTRY.has_tag(below, BlockTag::SAND) || below == vanilla_blocks::CACTUS
}

/// Sugar cane needs soil next to water, or another cane below.
#[must_use]
pub fn can_sugar_cane_survive_at(world: &World, pos: WorldBlockPos) -> bool {
    use ember_utils::Direction;

    let below_state = world.get_block_state(pos.relative(Direction::Down));
    let below = block_of(below_state);
    if below == vanilla_blocks::SUGAR_CANE {
        return true;
    }
    if !(REGISTRY.has_tag(below, BlockTag::DIRT) || REGISTRY.has_tag(below, BlockTag::SAND)) {
        return false;
    }

    // Any water (or frosted ice) next to the ground block will do.
    let ground = pos.relative(Direction::Down);
    for dir in [
        Direction::West,
        Direction::East,
        Direction::North,
        Direction::South,
    ] {
        let neighbour_state = world.get_block_state(ground.relative(dir));
        if block_of(neighbour_state) == vanilla_blocks::FROSTED_ICE
            || water_level(neighbour_state).is_some()
        {
            return true;
        }
    }
    false
}

/// Big dripleaf heads accept clay, soil, stems or other heads below.
#[must_use]
pub fn can_big_dripleaf_survive_on(below_state: BlockStateId) -> bool {
    let below = block_of(below_state);
    if below == vanilla_blocks::CLAY
        || below == vanilla_blocks::BIG_DRIPLEAF_STEM
        || below == vanilla_blocks::BIG_DRIPLEAF
        || can_plant_survive_on(below)
    {
        return true;
    }
    REGISTRY
        .support_model(below_state)
        .is_face_full(ember_utils::Direction::Up)
}

/// Stems need support (or another stem) below and a stem or head above.
#[must_use]
pub fn can_big_dripleaf_stem_survive_at(world: &World, pos: WorldBlockPos) -> bool {
    use ember_utils::Direction;

    let below_state = world.get_block_state(pos.relative(Direction::Down));
    let below = block_of(below_state);
    let above = block_of(world.get_block_state(pos.relative(Direction::Up)));

    let supported = below == vanilla_blocks::BIG_DRIPLEAF_STEM
        || REGISTRY.support_model(below_state).is_face_full(Direction::Up);
    let capped =
        above == vanilla_blocks::BIG_DRIPLEAF_STEM || above == vanilla_blocks::BIG_DRIPLEAF;
    supported && capped
}
