//! Behaviour handlers.
//!
//! Each handler receives the update's origin direction and decides whether
//! the block survives, changes shape, mirrors its paired half, or breaks.
//! Handlers that change the world push further neighbour updates themselves.

use ember_registry::blocks::BlockStateInfo;
use ember_registry::properties::{
    Property, horizontal_facing_from_index, horizontal_facing_to_index,
};
use ember_registry::{BehaviourKind, BlockTag, REGISTRY, vanilla_blocks};
use ember_utils::{BlockStateId, Direction, WorldBlockPos};

use crate::block::update::BlockUpdateContext;
use crate::block::{
    block_of, can_big_dripleaf_stem_survive_at, can_big_dripleaf_survive_on,
    can_cactus_survive_on, can_carpet_survive_on, can_plant_survive_on,
    can_pressure_plate_survive_on, can_redstone_wire_survive_on, can_snow_survive_on,
    can_sugar_cane_survive_at, describe, is_bamboo_plantable_on, water_level,
};
use crate::world::World;

/// Dispatches one behaviour kind.
pub fn run_behaviour(
    kind: BehaviourKind,
    world: &mut World,
    pos: WorldBlockPos,
    from_direction: Direction,
    is_delayed: bool,
    ctx: &mut BlockUpdateContext,
) -> bool {
    let cur_state = world.get_block_state(pos);
    let cur_info = describe(cur_state);
    let from_pos = pos.relative(from_direction);
    let from_state = world.get_block_state(from_pos);
    let from_info = describe(from_state);

    match kind {
        BehaviourKind::SnowyTop => {
            if from_direction != Direction::Up {
                return false;
            }
            let snowy = from_info.block == vanilla_blocks::SNOW
                || from_info.block == vanilla_blocks::SNOW_BLOCK;
            let mut info = cur_info;
            info.set_bool(Property::Snowy, snowy);
            write_if_changed(world, pos, cur_state, &info, ctx)
        }
        BehaviourKind::NeedSoilBelow => {
            require_below(world, pos, from_direction, ctx, can_plant_survive_on(from_info.block))
        }
        BehaviourKind::NeedFarmlandBelow => require_below(
            world,
            pos,
            from_direction,
            ctx,
            from_info.block == vanilla_blocks::FARMLAND,
        ),
        BehaviourKind::NeedPoleSupportBelow => require_below(
            world,
            pos,
            from_direction,
            ctx,
            REGISTRY.support_model(from_state).is_face_pole(Direction::Up),
        ),
        BehaviourKind::NeedFullSupportBehindHorizontal => {
            let facing = horizontal_facing_from_index(cur_info.get_or_default(Property::HorizontalFacing));
            if from_direction != facing.opposite() {
                return false;
            }
            if REGISTRY.support_model(from_state).is_face_full(facing) {
                return false;
            }
            break_and_update(world, pos, ctx)
        }
        BehaviourKind::NeedFullSupportAttached => {
            let wall_dir = match cur_info.get_or_default(Property::AttachFace) {
                0 => Direction::Down,
                2 => Direction::Up,
                _ => horizontal_facing_from_index(cur_info.get_or_default(Property::HorizontalFacing))
                    .opposite(),
            };
            if from_direction != wall_dir {
                return false;
            }
            if REGISTRY
                .support_model(from_state)
                .is_face_full(from_direction.opposite())
            {
                return false;
            }
            break_and_update(world, pos, ctx)
        }
        BehaviourKind::NeedPlateSupportBelow => require_below(
            world,
            pos,
            from_direction,
            ctx,
            can_pressure_plate_survive_on(from_state),
        ),
        BehaviourKind::NeedNonAirBelow => {
            require_below(world, pos, from_direction, ctx, can_carpet_survive_on(from_info.block))
        }
        BehaviourKind::SnowLayer => {
            require_below(world, pos, from_direction, ctx, can_snow_survive_on(from_state))
        }
        BehaviourKind::Cactus => {
            require_below(world, pos, from_direction, ctx, can_cactus_survive_on(from_info.block))
        }
        BehaviourKind::SugarCane => {
            if can_sugar_cane_survive_at(world, pos) {
                return false;
            }
            if is_delayed {
                break_and_update(world, pos, ctx)
            } else {
                world.schedule_block_update(pos, from_direction, 1);
                false
            }
        }
        BehaviourKind::Bamboo => {
            if from_direction == Direction::Down {
                if !is_bamboo_plantable_on(from_info.block) {
                    if is_delayed {
                        return break_and_update(world, pos, ctx);
                    }
                    world.schedule_block_update(pos, from_direction, 1);
                }
                false
            } else if from_direction == Direction::Up
                && from_info.block == vanilla_blocks::BAMBOO
                && from_info.get_or_default(Property::Age1) > cur_info.get_or_default(Property::Age1)
            {
                // Growth propagates down the stalk one age step at a time.
                let mut info = cur_info;
                info.set(Property::Age1, cur_info.get_or_default(Property::Age1) + 1);
                set_and_update(world, pos, REGISTRY.make_state(&info), ctx);
                true
            } else {
                false
            }
        }
        BehaviourKind::BambooSapling => {
            if from_direction == Direction::Down {
                if is_bamboo_plantable_on(from_info.block) {
                    return false;
                }
                break_and_update(world, pos, ctx)
            } else if from_direction == Direction::Up && from_info.block == vanilla_blocks::BAMBOO {
                let bamboo = REGISTRY.default_state(vanilla_blocks::BAMBOO);
                set_and_update(world, pos, bamboo, ctx);
                true
            } else {
                false
            }
        }
        BehaviourKind::Bed => {
            let facing = horizontal_facing_from_index(cur_info.get_or_default(Property::HorizontalFacing));
            // The head lies toward `facing` from the foot.
            let (expected_dir, other_part) = if cur_info.get_or_default(Property::BedPart) == 1 {
                (facing, 0u8)
            } else {
                (facing.opposite(), 1u8)
            };
            if from_direction != expected_dir {
                return false;
            }
            let new_state = if from_info.block == cur_info.block
                && from_info.get_or_default(Property::BedPart) == other_part
            {
                let mut info = cur_info;
                info.set(Property::Occupied, from_info.get_or_default(Property::Occupied));
                let state = REGISTRY.make_state(&info);
                if state == cur_state {
                    return false;
                }
                state
            } else {
                BlockStateId::AIR
            };
            set_and_update(world, pos, new_state, ctx);
            true
        }
        BehaviourKind::DoorMatchOtherPart => {
            door_match_other_part(world, pos, from_direction, &cur_info, cur_state, &from_info, from_state, ctx)
        }
        BehaviourKind::TallPlant => {
            let is_upper = cur_info.get_or_default(Property::DoubleBlockHalf) == 0;
            if is_upper {
                if from_direction == Direction::Down
                    && (from_info.block != cur_info.block
                        || from_info.get_or_default(Property::DoubleBlockHalf) != 1)
                {
                    set_and_update(world, pos, break_replacement(cur_state), ctx);
                    return true;
                }
            } else if from_direction == Direction::Down {
                if !can_plant_survive_on(from_info.block) {
                    set_and_update(world, pos, break_replacement(cur_state), ctx);
                    return true;
                }
            } else if from_direction == Direction::Up
                && (from_info.block != cur_info.block
                    || from_info.get_or_default(Property::DoubleBlockHalf) != 0)
            {
                set_and_update(world, pos, break_replacement(cur_state), ctx);
                return true;
            }
            false
        }
        BehaviourKind::BigDripleaf => {
            if from_direction == Direction::Down {
                if !can_big_dripleaf_survive_on(from_state) {
                    return break_and_update(world, pos, ctx);
                }
                false
            } else if from_direction == Direction::Up && from_info.block == cur_info.block {
                // A new head grew above: this one becomes a stem with the
                // same orientation.
                let mut info = BlockStateInfo::new(vanilla_blocks::BIG_DRIPLEAF_STEM);
                info.set(
                    Property::HorizontalFacing,
                    cur_info.get_or_default(Property::HorizontalFacing),
                );
                info.set(Property::Waterlogged, cur_info.get_or_default(Property::Waterlogged));
                set_and_update(world, pos, REGISTRY.make_state(&info), ctx);
                true
            } else {
                false
            }
        }
        BehaviourKind::BigDripleafStem => {
            if from_direction != Direction::Down && from_direction != Direction::Up {
                return false;
            }
            if can_big_dripleaf_stem_survive_at(world, pos) {
                return false;
            }
            if is_delayed {
                break_and_update(world, pos, ctx)
            } else {
                world.schedule_block_update(pos, from_direction, 1);
                false
            }
        }
        BehaviourKind::Stairs => {
            if !from_direction.is_horizontal() {
                return false;
            }
            let mut info = cur_info;
            update_stairs_shape(world, pos, &mut info);
            write_if_changed(world, pos, cur_state, &info, ctx)
        }
        BehaviourKind::FenceConnect => {
            if !from_direction.is_horizontal() {
                return false;
            }
            let mut info = cur_info;
            update_fence_shape(world, pos, &mut info, from_direction);
            write_if_changed(world, pos, cur_state, &info, ctx)
        }
        BehaviourKind::PaneConnect => {
            if !from_direction.is_horizontal() {
                return false;
            }
            let mut info = cur_info;
            update_pane_shape(world, pos, &mut info, from_direction);
            write_if_changed(world, pos, cur_state, &info, ctx)
        }
        BehaviourKind::WallConnect => {
            if from_direction == Direction::Down {
                return false;
            }
            let mut info = cur_info;
            update_wall_shape(world, pos, &mut info, from_direction);
            write_if_changed(world, pos, cur_state, &info, ctx)
        }
        BehaviourKind::FenceGateConnect => {
            fence_gate_connect(world, pos, from_direction, &cur_info, cur_state, ctx)
        }
        BehaviourKind::RedstoneWire => {
            if from_direction == Direction::Down {
                if !can_redstone_wire_survive_on(from_state) {
                    world.set_block_state(pos, BlockStateId::AIR);
                    ctx.push_direct_neighbour_updates(pos);
                    return true;
                }
                false
            } else {
                let mut info = cur_info;
                let changed =
                    crate::block::redstone::update_redstone_wire(world, pos, cur_state, &mut info, ctx);
                crate::block::redstone::update_redstone_line(world, pos);
                changed
            }
        }
    }
}

/// Breaks the block unless `survives`, for below-only support checks.
fn require_below(
    world: &mut World,
    pos: WorldBlockPos,
    from_direction: Direction,
    ctx: &mut BlockUpdateContext,
    survives: bool,
) -> bool {
    if from_direction != Direction::Down || survives {
        return false;
    }
    break_and_update(world, pos, ctx)
}

fn break_and_update(world: &mut World, pos: WorldBlockPos, ctx: &mut BlockUpdateContext) -> bool {
    world.break_block(pos);
    ctx.push_direct_neighbour_updates(pos);
    true
}

fn set_and_update(
    world: &mut World,
    pos: WorldBlockPos,
    state: BlockStateId,
    ctx: &mut BlockUpdateContext,
) {
    world.set_block_state(pos, state);
    ctx.push_direct_neighbour_updates(pos);
}

fn write_if_changed(
    world: &mut World,
    pos: WorldBlockPos,
    cur_state: BlockStateId,
    info: &BlockStateInfo,
    ctx: &mut BlockUpdateContext,
) -> bool {
    let new_state = REGISTRY.make_state(info);
    if new_state == cur_state {
        return false;
    }
    set_and_update(world, pos, new_state, ctx);
    true
}

/// What a broken plant leaves behind: its water, if it held any.
fn break_replacement(cur_state: BlockStateId) -> BlockStateId {
    if water_level(cur_state).is_some() {
        REGISTRY.default_state(vanilla_blocks::WATER)
    } else {
        BlockStateId::AIR
    }
}

#[allow(clippy::too_many_arguments)]
fn door_match_other_part(
    world: &mut World,
    pos: WorldBlockPos,
    from_direction: Direction,
    cur_info: &BlockStateInfo,
    cur_state: BlockStateId,
    from_info: &BlockStateInfo,
    from_state: BlockStateId,
    ctx: &mut BlockUpdateContext,
) -> bool {
    let is_lower = cur_info.get_or_default(Property::DoubleBlockHalf) == 1;
    if from_direction == Direction::Up {
        if !is_lower {
            return false;
        }
        let new_state = if from_info.block == cur_info.block
            && from_info.get_or_default(Property::DoubleBlockHalf) == 0
        {
            // Copy the upper half's state onto the lower half.
            let mut info = *from_info;
            info.set(Property::DoubleBlockHalf, 1);
            let state = REGISTRY.make_state(&info);
            if state == cur_state {
                return false;
            }
            state
        } else {
            BlockStateId::AIR
        };
        set_and_update(world, pos, new_state, ctx);
        true
    } else if from_direction == Direction::Down {
        if is_lower {
            // The lower half stands on the block below.
            if REGISTRY.support_model(from_state).is_face_full(Direction::Up) {
                return false;
            }
            set_and_update(world, pos, BlockStateId::AIR, ctx);
            true
        } else {
            let new_state = if from_info.block == cur_info.block
                && from_info.get_or_default(Property::DoubleBlockHalf) == 1
            {
                let mut info = *from_info;
                info.set(Property::DoubleBlockHalf, 0);
                let state = REGISTRY.make_state(&info);
                if state == cur_state {
                    return false;
                }
                state
            } else {
                BlockStateId::AIR
            };
            set_and_update(world, pos, new_state, ctx);
            true
        }
    } else {
        false
    }
}

fn fence_gate_connect(
    world: &mut World,
    pos: WorldBlockPos,
    from_direction: Direction,
    cur_info: &BlockStateInfo,
    cur_state: BlockStateId,
    ctx: &mut BlockUpdateContext,
) -> bool {
    let facing = horizontal_facing_from_index(cur_info.get_or_default(Property::HorizontalFacing));
    let rotated = facing.rotate_clockwise();
    if rotated != from_direction && rotated != from_direction.opposite() {
        return false;
    }

    // The gate is lowered into walls flanking its hinge axis.
    let (side_a, side_b) = if matches!(facing, Direction::East | Direction::West) {
        (Direction::South, Direction::North)
    } else {
        (Direction::East, Direction::West)
    };
    let wall_a = block_of(world.get_block_state(pos.relative(side_a)));
    let wall_b = block_of(world.get_block_state(pos.relative(side_b)));
    let in_wall =
        REGISTRY.has_tag(wall_a, BlockTag::WALL) || REGISTRY.has_tag(wall_b, BlockTag::WALL);

    let mut info = *cur_info;
    info.set_bool(Property::InWall, in_wall);
    write_if_changed(world, pos, cur_state, &info, ctx)
}

/// Whether fences, panes and walls may connect to a generic neighbour: the
/// neighbour presents a full face toward us and is not one of the full-faced
/// exceptions (leaves and similar decoration).
#[must_use]
pub fn can_cross_connect_to_generic(neighbour_state: BlockStateId, from_dir: Direction) -> bool {
    let support = REGISTRY.support_model(neighbour_state);
    if !support.is_face_full(from_dir.opposite()) {
        return false;
    }
    let neighbour = block_of(neighbour_state);
    !REGISTRY.has_tag(neighbour, BlockTag::LEAVES)
        && !REGISTRY.has_tag(neighbour, BlockTag::SHULKER_BOX)
}

fn update_fence_shape(
    world: &World,
    pos: WorldBlockPos,
    info: &mut BlockStateInfo,
    from_direction: Direction,
) {
    let neighbour_state = world.get_block_state(pos.relative(from_direction));
    let neighbour_info = describe(neighbour_state);

    let both_wooden = REGISTRY.has_tag(neighbour_info.block, BlockTag::WOODEN_FENCE)
        && REGISTRY.has_tag(info.block, BlockTag::WOODEN_FENCE);
    let connect = both_wooden
        || neighbour_info.block == info.block
        || can_cross_connect_to_generic(neighbour_state, from_direction);

    info.set_bool(Property::cross_connection(from_direction), connect);
}

fn update_pane_shape(
    world: &World,
    pos: WorldBlockPos,
    info: &mut BlockStateInfo,
    from_direction: Direction,
) {
    let neighbour_state = world.get_block_state(pos.relative(from_direction));
    let neighbour = block_of(neighbour_state);

    let connect = REGISTRY.has_tag(neighbour, BlockTag::PANE_LIKE)
        || REGISTRY.has_tag(neighbour, BlockTag::WALL)
        || can_cross_connect_to_generic(neighbour_state, from_direction);

    info.set_bool(Property::cross_connection(from_direction), connect);
}

fn update_wall_shape(
    world: &World,
    pos: WorldBlockPos,
    info: &mut BlockStateInfo,
    from_direction: Direction,
) {
    if from_direction == Direction::Up {
        // Post raising depends on the whole neighbourhood; left to the
        // placement path.
        return;
    }

    let neighbour_state = world.get_block_state(pos.relative(from_direction));
    let neighbour_info = describe(neighbour_state);

    let connect = if REGISTRY.has_tag(neighbour_info.block, BlockTag::FENCE_GATE) {
        // Gates join a wall when their hinge axis runs along it.
        let gate_facing =
            horizontal_facing_from_index(neighbour_info.get_or_default(Property::HorizontalFacing));
        let rotated = gate_facing.rotate_clockwise();
        rotated == from_direction || rotated == from_direction.opposite()
    } else {
        REGISTRY.has_tag(neighbour_info.block, BlockTag::WALL)
            || can_cross_connect_to_generic(neighbour_state, from_direction)
    };

    // Tall sides need the block above; low is enough for connectivity.
    let side = if connect { 1 } else { 0 };
    info.set(Property::wall_side(from_direction), side);
}

fn update_stairs_shape(world: &World, pos: WorldBlockPos, info: &mut BlockStateInfo) {
    const STRAIGHT: u8 = 0;
    const INNER_LEFT: u8 = 1;
    const INNER_RIGHT: u8 = 2;
    const OUTER_LEFT: u8 = 3;
    const OUTER_RIGHT: u8 = 4;

    let facing = horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing));
    let half = info.get_or_default(Property::Half);
    info.set(Property::StairsShape, STRAIGHT);

    let stairs_like = |state: BlockStateId| -> Option<BlockStateInfo> {
        let other = describe(state);
        REGISTRY
            .has_tag(other.block, BlockTag::STAIRS)
            .then_some(other)
    };

    // Matching stairs to the left or right pin the shape straight.
    let right = stairs_like(world.get_block_state(pos.relative(facing.rotate_clockwise())));
    let force_right = right.is_some_and(|other| {
        other.get_or_default(Property::Half) == half
            && other.get_or_default(Property::HorizontalFacing)
                == horizontal_facing_to_index(facing)
    });
    let left = stairs_like(world.get_block_state(pos.relative(facing.rotate_counter_clockwise())));
    let force_left = left.is_some_and(|other| {
        other.get_or_default(Property::Half) == half
            && other.get_or_default(Property::HorizontalFacing)
                == horizontal_facing_to_index(facing)
    });

    if let Some(front) = stairs_like(world.get_block_state(pos.relative(facing.opposite()))) {
        if front.get_or_default(Property::Half) == half {
            let front_facing =
                horizontal_facing_from_index(front.get_or_default(Property::HorizontalFacing));
            if facing == front_facing.rotate_clockwise() {
                if !force_left {
                    info.set(Property::StairsShape, INNER_LEFT);
                }
            } else if facing.rotate_clockwise() == front_facing && !force_right {
                info.set(Property::StairsShape, INNER_RIGHT);
            }
        }
    }

    if let Some(behind) = stairs_like(world.get_block_state(pos.relative(facing))) {
        if behind.get_or_default(Property::Half) == half {
            let behind_facing =
                horizontal_facing_from_index(behind.get_or_default(Property::HorizontalFacing));
            if facing == behind_facing.rotate_clockwise() {
                if !force_right {
                    info.set(Property::StairsShape, OUTER_LEFT);
                }
            } else if facing.rotate_clockwise() == behind_facing && !force_left {
                info.set(Property::StairsShape, OUTER_RIGHT);
            }
        }
    }
}
