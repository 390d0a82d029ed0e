//! Vanilla block definitions.
//!
//! Blocks are registered in a fixed order so their ids are compile-time
//! constants; `register_blocks` must push definitions in exactly the order
//! the constants below declare. Air is first so that block state 0 is the
//! default air state.

use ember_utils::math::BoxF;

use crate::behaviour::BehaviourKind as B;
use crate::blocks::{Block, BlockId, BlockTag, ConductorRule, LightEmission, ModelSpec};
use crate::properties::Property as P;

macro_rules! block_ids {
    ($($name:ident = $index:literal;)+) => {
        $(
            #[allow(missing_docs)]
            pub const $name: BlockId = BlockId($index);
        )+
    };
}

block_ids! {
    AIR = 0;
    VOID_AIR = 1;
    CAVE_AIR = 2;
    UNKNOWN = 3;
    STONE = 4;
    BEDROCK = 5;
    DIRT = 6;
    GRASS_BLOCK = 7;
    FARMLAND = 8;
    SAND = 9;
    RED_SAND = 10;
    GRAVEL = 11;
    OAK_PLANKS = 12;
    OAK_LEAVES = 13;
    GLASS = 14;
    GLASS_PANE = 15;
    IRON_BARS = 16;
    GLOWSTONE = 17;
    TORCH = 18;
    WALL_TORCH = 19;
    WATER = 20;
    LAVA = 21;
    SNOW = 22;
    SNOW_BLOCK = 23;
    ICE = 24;
    PACKED_ICE = 25;
    BLUE_ICE = 26;
    FROSTED_ICE = 27;
    SLIME_BLOCK = 28;
    SOUL_SAND = 29;
    HOPPER = 30;
    CLAY = 31;
    MOSS_BLOCK = 32;
    CACTUS = 33;
    SUGAR_CANE = 34;
    BAMBOO = 35;
    BAMBOO_SAPLING = 36;
    BIG_DRIPLEAF = 37;
    BIG_DRIPLEAF_STEM = 38;
    DANDELION = 39;
    TALL_GRASS = 40;
    WHEAT = 41;
    WHITE_CARPET = 42;
    OAK_FENCE = 43;
    NETHER_BRICK_FENCE = 44;
    OAK_FENCE_GATE = 45;
    COBBLESTONE_WALL = 46;
    OAK_STAIRS = 47;
    STONE_STAIRS = 48;
    OAK_DOOR = 49;
    RED_BED = 50;
    WHITE_BED = 51;
    REDSTONE_WIRE = 52;
    LEVER = 53;
    REDSTONE_TORCH = 54;
    REDSTONE_WALL_TORCH = 55;
    REDSTONE_BLOCK = 56;
    REPEATER = 57;
    OBSERVER = 58;
    STONE_PRESSURE_PLATE = 59;
    STONE_BUTTON = 60;
    SCAFFOLDING = 61;
    POWDER_SNOW = 62;
    MOVING_PISTON = 63;
    PISTON = 64;
    STICKY_PISTON = 65;
    FIRE = 66;
    SOUL_FIRE = 67;
    TRAPPED_CHEST = 68;
    TARGET = 69;
    DAYLIGHT_DETECTOR = 70;
    TRIPWIRE_HOOK = 71;
    COMPARATOR = 72;
    DETECTOR_RAIL = 73;
    LECTERN = 74;
}

const FENCE_POST: &[BoxF] = &[BoxF::from_pixels(6.0, 0.0, 6.0, 10.0, 24.0, 10.0)];
const PANE_POST: &[BoxF] = &[BoxF::from_pixels(7.0, 0.0, 7.0, 9.0, 16.0, 9.0)];
const WALL_POST: &[BoxF] = &[BoxF::from_pixels(4.0, 0.0, 4.0, 12.0, 24.0, 12.0)];
const GATE_BODY: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 6.0, 16.0, 24.0, 10.0)];
const STAIRS_BASE: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 8.0, 16.0)];
const DOOR_PANEL: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 16.0, 3.0)];
const BED_BODY: &[BoxF] = &[BoxF::from_pixels(0.0, 3.0, 0.0, 16.0, 9.0, 16.0)];
const CACTUS_COLUMN: &[BoxF] = &[BoxF::from_pixels(1.0, 0.0, 1.0, 15.0, 16.0, 15.0)];
const BAMBOO_STALK: &[BoxF] = &[BoxF::from_pixels(6.5, 0.0, 6.5, 9.5, 16.0, 9.5)];
const DRIPLEAF_PAD: &[BoxF] = &[BoxF::from_pixels(0.0, 11.0, 0.0, 16.0, 15.0, 16.0)];
const CARPET_SHEET: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 1.0, 16.0)];
const FARMLAND_TOP: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 15.0, 16.0)];
const HOPPER_RIM: &[BoxF] = &[BoxF::from_pixels(0.0, 10.0, 0.0, 16.0, 16.0, 16.0)];
const PLATE_SLAB: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 2.0, 16.0)];
const DETECTOR_SLAB: &[BoxF] = &[BoxF::from_pixels(0.0, 0.0, 0.0, 16.0, 6.0, 16.0)];
const CHEST_BODY: &[BoxF] = &[BoxF::from_pixels(1.0, 0.0, 1.0, 15.0, 14.0, 15.0)];

/// Pushes every vanilla block definition in constant-id order.
#[allow(clippy::too_many_lines)]
pub fn register_blocks(blocks: &mut Vec<Block>) {
    blocks.push(Block::new("air").no_shape().tags(BlockTag::AIR));
    blocks.push(Block::new("void_air").no_shape().tags(BlockTag::AIR));
    blocks.push(Block::new("cave_air").no_shape().tags(BlockTag::AIR));
    // Placeholder reported for reads of chunks that are not loaded.
    blocks.push(Block::new("unknown").conductor(ConductorRule::Never));
    blocks.push(Block::new("stone"));
    blocks.push(Block::new("bedrock"));
    blocks.push(Block::new("dirt").tags(BlockTag::DIRT));
    blocks.push(
        Block::new("grass_block")
            .tags(BlockTag::DIRT)
            .props(&[P::Snowy])
            .behaviours(&[B::SnowyTop]),
    );
    blocks.push(
        Block::new("farmland")
            .props(&[P::Moisture])
            .shape(FARMLAND_TOP),
    );
    blocks.push(Block::new("sand").tags(BlockTag::SAND));
    blocks.push(Block::new("red_sand").tags(BlockTag::SAND));
    blocks.push(Block::new("gravel"));
    blocks.push(Block::new("oak_planks"));
    blocks.push(
        Block::new("oak_leaves")
            .tags(BlockTag::LEAVES)
            .props(&[P::Distance, P::Persistent, P::Waterlogged])
            .transparent()
            .light_block(1)
            .conductor(ConductorRule::Never),
    );
    blocks.push(Block::new("glass").transparent().conductor(ConductorRule::Never));
    blocks.push(
        Block::new("glass_pane")
            .tags(BlockTag::PANE_LIKE)
            .props(&[P::East, P::North, P::South, P::West, P::Waterlogged])
            .behaviours(&[B::PaneConnect])
            .shape(PANE_POST)
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("iron_bars")
            .tags(BlockTag::PANE_LIKE)
            .props(&[P::East, P::North, P::South, P::West, P::Waterlogged])
            .behaviours(&[B::PaneConnect])
            .shape(PANE_POST)
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("glowstone")
            .emission(LightEmission::Fixed(15))
            .transparent()
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("torch")
            .no_shape()
            .emission(LightEmission::Fixed(14))
            .behaviours(&[B::NeedPoleSupportBelow]),
    );
    blocks.push(
        Block::new("wall_torch")
            .no_shape()
            .emission(LightEmission::Fixed(14))
            .props(&[P::HorizontalFacing])
            .behaviours(&[B::NeedFullSupportBehindHorizontal]),
    );
    blocks.push(
        Block::new("water")
            .no_shape()
            .light_block(1)
            .props(&[P::Level]),
    );
    blocks.push(
        Block::new("lava")
            .no_shape()
            .light_block(1)
            .emission(LightEmission::Fixed(15))
            .props(&[P::Level]),
    );
    blocks.push(
        Block::new("snow")
            .props(&[P::Layers])
            .behaviours(&[B::SnowLayer])
            .collision(ModelSpec::SnowLayers)
            .transparent()
            .conductor(ConductorRule::Never),
    );
    blocks.push(Block::new("snow_block"));
    blocks.push(
        Block::new("ice")
            .tags(BlockTag::ICE)
            .transparent()
            .friction(0.98)
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("packed_ice")
            .tags(BlockTag::ICE)
            .transparent()
            .friction(0.98)
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("blue_ice")
            .tags(BlockTag::ICE)
            .transparent()
            .friction(0.989)
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("frosted_ice")
            .tags(BlockTag::ICE)
            .transparent()
            .friction(0.98)
            .conductor(ConductorRule::Never),
    );
    blocks.push(Block::new("slime_block").transparent().friction(0.8));
    blocks.push(Block::new("soul_sand").conductor(ConductorRule::Always));
    blocks.push(Block::new("hopper").shape(HOPPER_RIM).conductor(ConductorRule::Never));
    blocks.push(Block::new("clay"));
    blocks.push(Block::new("moss_block").tags(BlockTag::DIRT));
    blocks.push(
        Block::new("cactus")
            .props(&[P::Age15])
            .behaviours(&[B::Cactus])
            .shape(CACTUS_COLUMN),
    );
    blocks.push(
        Block::new("sugar_cane")
            .no_shape()
            .props(&[P::Age15])
            .behaviours(&[B::SugarCane]),
    );
    blocks.push(
        Block::new("bamboo")
            .props(&[P::Age1, P::BambooLeaves, P::Stage])
            .behaviours(&[B::Bamboo])
            .shape(BAMBOO_STALK),
    );
    blocks.push(
        Block::new("bamboo_sapling")
            .no_shape()
            .behaviours(&[B::BambooSapling]),
    );
    blocks.push(
        Block::new("big_dripleaf")
            .props(&[P::HorizontalFacing, P::Tilt, P::Waterlogged])
            .behaviours(&[B::BigDripleaf])
            .shape(DRIPLEAF_PAD),
    );
    blocks.push(
        Block::new("big_dripleaf_stem")
            .no_shape()
            .props(&[P::HorizontalFacing, P::Waterlogged])
            .behaviours(&[B::BigDripleafStem]),
    );
    blocks.push(Block::new("dandelion").no_shape().behaviours(&[B::NeedSoilBelow]));
    blocks.push(
        Block::new("tall_grass")
            .no_shape()
            .props(&[P::DoubleBlockHalf])
            .behaviours(&[B::TallPlant]),
    );
    blocks.push(
        Block::new("wheat")
            .no_shape()
            .props(&[P::Age7])
            .behaviours(&[B::NeedFarmlandBelow]),
    );
    blocks.push(
        Block::new("white_carpet")
            .shape(CARPET_SHEET)
            .behaviours(&[B::NeedNonAirBelow]),
    );
    blocks.push(
        Block::new("oak_fence")
            .tags(BlockTag::WOODEN_FENCE)
            .props(&[P::East, P::North, P::South, P::West, P::Waterlogged])
            .behaviours(&[B::FenceConnect])
            .shape(FENCE_POST),
    );
    blocks.push(
        Block::new("nether_brick_fence")
            .props(&[P::East, P::North, P::South, P::West, P::Waterlogged])
            .behaviours(&[B::FenceConnect])
            .shape(FENCE_POST),
    );
    blocks.push(
        Block::new("oak_fence_gate")
            .tags(BlockTag::FENCE_GATE)
            .props(&[P::HorizontalFacing, P::InWall, P::Open, P::Powered])
            .behaviours(&[B::FenceGateConnect])
            .shape(GATE_BODY),
    );
    blocks.push(
        Block::new("cobblestone_wall")
            .tags(BlockTag::WALL)
            .props(&[P::WallEast, P::WallNorth, P::WallSouth, P::Up, P::Waterlogged, P::WallWest])
            .behaviours(&[B::WallConnect])
            .shape(WALL_POST),
    );
    blocks.push(
        Block::new("oak_stairs")
            .tags(BlockTag::STAIRS)
            .props(&[P::HorizontalFacing, P::Half, P::StairsShape, P::Waterlogged])
            .behaviours(&[B::Stairs])
            .shape(STAIRS_BASE),
    );
    blocks.push(
        Block::new("stone_stairs")
            .tags(BlockTag::STAIRS)
            .props(&[P::HorizontalFacing, P::Half, P::StairsShape, P::Waterlogged])
            .behaviours(&[B::Stairs])
            .shape(STAIRS_BASE),
    );
    blocks.push(
        Block::new("oak_door")
            .tags(BlockTag::DOORS)
            .props(&[P::HorizontalFacing, P::DoubleBlockHalf, P::Hinge, P::Open, P::Powered])
            .behaviours(&[B::DoorMatchOtherPart])
            .shape(DOOR_PANEL),
    );
    blocks.push(
        Block::new("red_bed")
            .tags(BlockTag::BEDS)
            .props(&[P::HorizontalFacing, P::Occupied, P::BedPart])
            .behaviours(&[B::Bed])
            .shape(BED_BODY),
    );
    blocks.push(
        Block::new("white_bed")
            .tags(BlockTag::BEDS)
            .props(&[P::HorizontalFacing, P::Occupied, P::BedPart])
            .behaviours(&[B::Bed])
            .shape(BED_BODY),
    );
    blocks.push(
        Block::new("redstone_wire")
            .no_shape()
            .props(&[P::RedstoneEast, P::RedstoneNorth, P::Power, P::RedstoneSouth, P::RedstoneWest])
            .behaviours(&[B::RedstoneWire]),
    );
    blocks.push(
        Block::new("lever")
            .no_shape()
            .props(&[P::AttachFace, P::HorizontalFacing, P::Powered])
            .behaviours(&[B::NeedFullSupportAttached]),
    );
    blocks.push(
        Block::new("redstone_torch")
            .no_shape()
            .props(&[P::Lit])
            .emission(LightEmission::WhenLit(7))
            .behaviours(&[B::NeedPoleSupportBelow]),
    );
    blocks.push(
        Block::new("redstone_wall_torch")
            .no_shape()
            .props(&[P::HorizontalFacing, P::Lit])
            .emission(LightEmission::WhenLit(7))
            .behaviours(&[B::NeedFullSupportBehindHorizontal]),
    );
    blocks.push(Block::new("redstone_block").conductor(ConductorRule::Never));
    blocks.push(
        Block::new("repeater")
            .props(&[P::Delay, P::HorizontalFacing, P::Locked, P::Powered])
            .shape(PLATE_SLAB),
    );
    blocks.push(
        Block::new("observer")
            .props(&[P::Facing, P::Powered])
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("stone_pressure_plate")
            .no_shape()
            .props(&[P::Powered])
            .behaviours(&[B::NeedPlateSupportBelow]),
    );
    blocks.push(
        Block::new("stone_button")
            .no_shape()
            .props(&[P::AttachFace, P::HorizontalFacing, P::Powered])
            .behaviours(&[B::NeedFullSupportAttached]),
    );
    blocks.push(
        Block::new("scaffolding")
            .no_shape()
            .props(&[P::Bottom, P::Distance, P::Waterlogged])
            .conductor(ConductorRule::Never),
    );
    blocks.push(Block::new("powder_snow").no_shape());
    blocks.push(
        Block::new("moving_piston")
            .no_shape()
            .props(&[P::Facing])
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("piston")
            .props(&[P::Facing])
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("sticky_piston")
            .props(&[P::Facing])
            .conductor(ConductorRule::Never),
    );
    blocks.push(
        Block::new("fire")
            .no_shape()
            .tags(BlockTag::FIRE)
            .emission(LightEmission::Fixed(15)),
    );
    blocks.push(
        Block::new("soul_fire")
            .no_shape()
            .tags(BlockTag::FIRE)
            .emission(LightEmission::Fixed(10)),
    );
    blocks.push(
        Block::new("trapped_chest")
            .props(&[P::HorizontalFacing])
            .shape(CHEST_BODY)
            .conductor(ConductorRule::Never),
    );
    blocks.push(Block::new("target").props(&[P::Power]));
    blocks.push(
        Block::new("daylight_detector")
            .props(&[P::Power])
            .shape(DETECTOR_SLAB),
    );
    blocks.push(
        Block::new("tripwire_hook")
            .no_shape()
            .props(&[P::HorizontalFacing, P::Powered]),
    );
    blocks.push(
        Block::new("comparator")
            .props(&[P::HorizontalFacing, P::Powered])
            .shape(PLATE_SLAB),
    );
    blocks.push(
        Block::new("detector_rail")
            .no_shape()
            .props(&[P::Powered]),
    );
    blocks.push(
        Block::new("lectern")
            .props(&[P::HorizontalFacing, P::Powered])
            .shape(DETECTOR_SLAB),
    );

    debug_assert_eq!(blocks[0].key, "air");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::REGISTRY;

    #[test]
    fn constants_match_registration_order() {
        let pairs = [
            (AIR, "air"),
            (UNKNOWN, "unknown"),
            (STONE, "stone"),
            (GRASS_BLOCK, "grass_block"),
            (OAK_LEAVES, "oak_leaves"),
            (SNOW, "snow"),
            (CACTUS, "cactus"),
            (SUGAR_CANE, "sugar_cane"),
            (OAK_FENCE, "oak_fence"),
            (COBBLESTONE_WALL, "cobblestone_wall"),
            (OAK_DOOR, "oak_door"),
            (REDSTONE_WIRE, "redstone_wire"),
            (LEVER, "lever"),
            (OBSERVER, "observer"),
            (LECTERN, "lectern"),
        ];
        for (id, key) in pairs {
            assert_eq!(REGISTRY.block(id).key, key);
            assert_eq!(REGISTRY.block_by_key(key), Some(id));
        }
    }

    #[test]
    fn fence_extends_past_unit_cube() {
        let fence = REGISTRY.default_state(OAK_FENCE);
        let model = REGISTRY.collision_model(fence);
        assert!(model.boxes.iter().any(|b| b.max_y > 1.0));
    }

    #[test]
    fn snow_layers_grow_with_property() {
        use crate::properties::Property;
        let snow = REGISTRY.default_state(SNOW);
        let mut info = REGISTRY.describe_state(snow);
        info.set(Property::Layers, 7);
        let tall = REGISTRY.make_state(&info);
        let short_height = REGISTRY.collision_model(snow).boxes[0].max_y;
        let tall_height = REGISTRY.collision_model(tall).boxes[0].max_y;
        assert!(tall_height > short_height);
    }
}
