//! Redstone signal propagation.
//!
//! A wire's power is recomputed from a transient environment built from the
//! twelve candidate connections (four horizontal directions, each with an
//! up/level/down wire candidate) plus the emitted and conducted power of
//! every adjacent component. Power increases spread with a plain BFS along
//! wire-out edges; decreases first zero out the line being lowered while
//! collecting the wires that still have an independent source, then re-spread
//! from those.

use ember_registry::blocks::BlockStateInfo;
use ember_registry::properties::{
    Property, RedstoneSide, facing_from_index, horizontal_facing_from_index,
};
use ember_registry::{REGISTRY, vanilla_blocks as blocks};
use ember_utils::{BlockStateId, Direction, WorldBlockPos};

use crate::block::update::BlockUpdateContext;
use crate::block::{block_of, describe};
use crate::world::World;

/// Wires touched per propagation step before the cascade is cut short.
const MAX_WIRES_PER_STEP: usize = 500;
/// Independent power sources collected per lowering pass.
const MAX_SOURCES_PER_STEP: usize = 50;

/// Whether redstone power travels through this block. Also gates whether a
/// wire may connect diagonally past it.
#[must_use]
pub fn conducts_redstone(state: BlockStateId) -> bool {
    REGISTRY.conducts_redstone(state)
}

/// Whether a wire at a position connects horizontally to this neighbour.
#[must_use]
pub fn can_connect_horizontally(state: BlockStateId, to_dir: Direction) -> bool {
    let info = describe(state);
    match info.block {
        b if b == blocks::REDSTONE_WIRE => true,
        b if b == blocks::REPEATER => {
            let facing = horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing));
            facing == to_dir || facing == to_dir.opposite()
        }
        b if b == blocks::OBSERVER => {
            facing_from_index(info.get_or_default(Property::Facing)) == to_dir
        }
        b if b == blocks::STONE_PRESSURE_PLATE
            || b == blocks::STONE_BUTTON
            || b == blocks::DAYLIGHT_DETECTOR
            || b == blocks::DETECTOR_RAIL
            || b == blocks::COMPARATOR
            || b == blocks::LECTERN
            || b == blocks::LEVER
            || b == blocks::REDSTONE_BLOCK
            || b == blocks::REDSTONE_TORCH
            || b == blocks::REDSTONE_WALL_TORCH
            || b == blocks::TARGET
            || b == blocks::TRAPPED_CHEST
            || b == blocks::TRIPWIRE_HOOK =>
        {
            true
        }
        _ => false,
    }
}

/// Power a component radiates directly into `dir` (from the component's
/// point of view, `dir` points back toward the receiver).
fn emitted_power(state: BlockStateId, dir: Direction, to_wire: bool, ignore_wires: bool) -> u8 {
    let info = describe(state);
    let powered = info.get_bool(Property::Powered);
    match info.block {
        b if b == blocks::STONE_PRESSURE_PLATE
            || b == blocks::STONE_BUTTON
            || b == blocks::DETECTOR_RAIL
            || b == blocks::LECTERN
            || b == blocks::LEVER
            || b == blocks::TRIPWIRE_HOOK =>
        {
            if powered { 15 } else { 0 }
        }
        b if b == blocks::DAYLIGHT_DETECTOR || b == blocks::TARGET => {
            info.get_or_default(Property::Power)
        }
        // Stored container power needs block entity integration.
        b if b == blocks::COMPARATOR || b == blocks::TRAPPED_CHEST => 0,
        b if b == blocks::REPEATER => {
            let facing = horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing));
            if powered && facing == dir.opposite() { 15 } else { 0 }
        }
        b if b == blocks::OBSERVER => {
            let facing = facing_from_index(info.get_or_default(Property::Facing));
            if powered && facing == dir.opposite() { 15 } else { 0 }
        }
        b if b == blocks::REDSTONE_BLOCK => 15,
        b if b == blocks::REDSTONE_WIRE => {
            if ignore_wires || dir == Direction::Up {
                return 0;
            }
            let power = info.get_or_default(Property::Power);
            if dir == Direction::Down {
                return if to_wire { 0 } else { power };
            }
            let side = RedstoneSide::from_index(
                info.get_or_default(RedstoneSide::property(dir.horizontal_index())),
            );
            if side == RedstoneSide::None {
                return 0;
            }
            // Wire-to-wire transfer loses one level.
            if to_wire { power.max(1) - 1 } else { power }
        }
        b if b == blocks::REDSTONE_TORCH => {
            if info.get_bool(Property::Lit) && dir != Direction::Down {
                15
            } else {
                0
            }
        }
        b if b == blocks::REDSTONE_WALL_TORCH => {
            let facing = horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing));
            if info.get_bool(Property::Lit) && facing != dir.opposite() {
                15
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Power a component pushes through a conductor it rests against.
fn conducted_power(state: BlockStateId, dir: Direction, to_wire: bool, ignore_wires: bool) -> u8 {
    let info = describe(state);
    let powered = info.get_bool(Property::Powered);
    match info.block {
        b if b == blocks::STONE_PRESSURE_PLATE
            || b == blocks::DETECTOR_RAIL
            || b == blocks::LECTERN =>
        {
            if powered && dir == Direction::Down { 15 } else { 0 }
        }
        b if b == blocks::STONE_BUTTON || b == blocks::LEVER => {
            if !powered {
                return 0;
            }
            let back_side = match info.get_or_default(Property::AttachFace) {
                0 => Direction::Down,
                2 => Direction::Up,
                _ => horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing))
                    .opposite(),
            };
            if back_side == dir { 15 } else { 0 }
        }
        b if b == blocks::TRIPWIRE_HOOK || b == blocks::REPEATER => {
            let facing = horizontal_facing_from_index(info.get_or_default(Property::HorizontalFacing));
            if powered && facing == dir.opposite() { 15 } else { 0 }
        }
        b if b == blocks::DAYLIGHT_DETECTOR => {
            if dir == Direction::Down {
                info.get_or_default(Property::Power)
            } else {
                0
            }
        }
        b if b == blocks::COMPARATOR || b == blocks::TRAPPED_CHEST => 0,
        b if b == blocks::OBSERVER => {
            let facing = facing_from_index(info.get_or_default(Property::Facing));
            if powered && facing == dir.opposite() { 15 } else { 0 }
        }
        b if b == blocks::REDSTONE_WIRE => {
            if to_wire || ignore_wires || dir == Direction::Up {
                // Wire power does not conduct through blocks into other
                // wires.
                return 0;
            }
            let power = info.get_or_default(Property::Power);
            if dir == Direction::Down {
                return power;
            }
            let side = RedstoneSide::from_index(
                info.get_or_default(RedstoneSide::property(dir.horizontal_index())),
            );
            if side == RedstoneSide::None { 0 } else { power }
        }
        b if b == blocks::REDSTONE_TORCH || b == blocks::REDSTONE_WALL_TORCH => {
            if info.get_bool(Property::Lit) && dir != Direction::Up {
                15
            } else {
                0
            }
        }
        _ => 0,
    }
}

/// Power arriving at `pos` from its neighbour in `dir`, including power that
/// neighbour conducts from its own surroundings.
fn side_power(world: &World, pos: WorldBlockPos, dir: Direction, to_wire: bool, ignore_wires: bool) -> u8 {
    let side_pos = pos.relative(dir);
    let side_state = world.get_block_state(side_pos);
    let mut power = emitted_power(side_state, dir.opposite(), to_wire, ignore_wires);

    if conducts_redstone(side_state) {
        for dir_on_side in Direction::ALL {
            if dir_on_side == dir.opposite() {
                // The receiver's own power must not feed back.
                continue;
            }
            if power == 15 {
                break;
            }
            let state = world.get_block_state(side_pos.relative(dir_on_side));
            power = power.max(conducted_power(
                state,
                dir_on_side.opposite(),
                to_wire,
                ignore_wires,
            ));
        }
    }
    power
}

/// The transient per-evaluation wire environment. First index is the
/// horizontal direction in redstone order; second index is the vertical
/// candidate: 0 above, 1 level, 2 below.
#[derive(Debug, Default, Clone)]
pub struct RedstoneWireEnv {
    /// Visual-ish connectivity; connected does not imply power flows.
    pub connected: [[bool; 3]; 4],
    /// Resulting visual side states (value indices of [`RedstoneSide`]).
    pub sides: [u8; 4],
    /// Computed incoming power, 0..=15.
    pub power: u8,
    /// Edges power can leave through.
    pub wire_out: [[bool; 3]; 4],
    /// Edges power can arrive through.
    pub wire_in: [[bool; 3]; 4],
}

const SIDE_UP: u8 = 0;
const SIDE_SIDE: u8 = 1;
const SIDE_NONE: u8 = 2;

fn is_wire_dot(info: &BlockStateInfo) -> bool {
    (0..4).all(|index| {
        RedstoneSide::from_index(info.get_or_default(RedstoneSide::property(index)))
            == RedstoneSide::None
    })
}

/// Applies the dot beautification rules: a wire with connections on one axis
/// only gets stub sides on the other.
fn beautify_sides(sides: &mut [u8; 4]) {
    let [east, north, south, west] = *sides;
    if east == SIDE_NONE && west == SIDE_NONE {
        if north == SIDE_NONE {
            sides[1] = SIDE_SIDE;
        }
        if south == SIDE_NONE {
            sides[2] = SIDE_SIDE;
        }
    }
    if north == SIDE_NONE && south == SIDE_NONE {
        if west == SIDE_NONE {
            sides[3] = SIDE_SIDE;
        }
        if east == SIDE_NONE {
            sides[0] = SIDE_SIDE;
        }
    }
}

/// Recomputes the full wire environment at `pos`. With
/// `ignore_same_line_power` the power of other wires is excluded, which
/// reveals whether this wire is powered independently of its own line.
#[must_use]
pub fn calculate_wire_env(
    world: &World,
    pos: WorldBlockPos,
    info: &BlockStateInfo,
    ignore_same_line_power: bool,
) -> RedstoneWireEnv {
    let conductor_above = conducts_redstone(world.get_block_state(pos.relative(Direction::Up)));
    let conductor_below = conducts_redstone(world.get_block_state(pos.relative(Direction::Down)));

    let mut env = RedstoneWireEnv::default();
    let mut powers = [[0u8; 3]; 4];

    for (index, dir) in Direction::REDSTONE_ORDER.into_iter().enumerate() {
        let side_pos = pos.relative(dir);
        let side_state = world.get_block_state(side_pos);
        let conductor_side = conducts_redstone(side_state);
        let mut new_side = SIDE_NONE;

        if !conductor_above {
            // Diagonally up: only to another wire, and only when nothing
            // conducts above us.
            let dest_state = world.get_block_state(side_pos.relative(Direction::Up));
            if block_of(dest_state) == blocks::REDSTONE_WIRE {
                env.connected[index][0] = true;
                new_side = if REGISTRY.support_model(side_state).is_face_full(dir.opposite()) {
                    SIDE_UP
                } else {
                    SIDE_SIDE
                };
                if conductor_side {
                    let dest_info = describe(dest_state);
                    powers[index][0] = dest_info.get_or_default(Property::Power).max(1) - 1;
                    env.wire_in[index][0] = true;
                }
                env.wire_out[index][0] = true;
            }
        }

        if can_connect_horizontally(side_state, dir) {
            env.connected[index][1] = true;
            if new_side == SIDE_NONE {
                new_side = SIDE_SIDE;
            }
        }
        if block_of(side_state) == blocks::REDSTONE_WIRE {
            env.wire_in[index][1] = true;
            env.wire_out[index][1] = true;
        }
        powers[index][1] = side_power(world, pos, dir, true, ignore_same_line_power);

        if !conductor_side {
            // Diagonally down past a non-conductor.
            let dest_state = world.get_block_state(side_pos.relative(Direction::Down));
            if block_of(dest_state) == blocks::REDSTONE_WIRE {
                env.connected[index][2] = true;
                if new_side == SIDE_NONE {
                    new_side = SIDE_SIDE;
                }
                env.wire_in[index][2] = true;
                if conductor_below {
                    env.wire_out[index][2] = true;
                }
                if !ignore_same_line_power || !conductor_below {
                    let dest_info = describe(dest_state);
                    powers[index][2] = dest_info.get_or_default(Property::Power).max(1) - 1;
                }
            }
        }

        env.sides[index] = new_side;
    }

    let was_dot = is_wire_dot(info);
    let is_dot = env.sides.iter().all(|side| *side == SIDE_NONE);
    if !(was_dot && is_dot) {
        beautify_sides(&mut env.sides);
    }

    let mut power = powers.iter().flatten().copied().max().unwrap_or(0);
    power = power.max(side_power(world, pos, Direction::Down, true, ignore_same_line_power));
    power = power.max(side_power(world, pos, Direction::Up, true, ignore_same_line_power));
    env.power = power;
    env
}

/// Recomputes a wire's connection visuals after a neighbour change. Pushes
/// updates to the diagonal wires it connects to. Power is handled separately
/// by [`update_redstone_line`].
pub fn update_redstone_wire(
    world: &mut World,
    pos: WorldBlockPos,
    in_world_state: BlockStateId,
    info: &mut BlockStateInfo,
    ctx: &mut BlockUpdateContext,
) -> bool {
    let conductor_above = conducts_redstone(world.get_block_state(pos.relative(Direction::Up)));
    let was_dot = is_wire_dot(info);

    let mut env = RedstoneWireEnv::default();

    for (index, dir) in Direction::REDSTONE_ORDER.into_iter().enumerate() {
        let side_pos = pos.relative(dir);
        let side_state = world.get_block_state(side_pos);
        let mut new_side = SIDE_NONE;

        if !conductor_above {
            let dest_state = world.get_block_state(side_pos.relative(Direction::Up));
            if block_of(dest_state) == blocks::REDSTONE_WIRE {
                env.connected[index][0] = true;
                new_side = if REGISTRY.support_model(side_state).is_face_full(dir.opposite()) {
                    SIDE_UP
                } else {
                    SIDE_SIDE
                };
            }
        }

        if can_connect_horizontally(side_state, dir) {
            env.connected[index][1] = true;
            if new_side == SIDE_NONE {
                new_side = SIDE_SIDE;
            }
        }

        if !conducts_redstone(side_state) {
            let dest_state = world.get_block_state(side_pos.relative(Direction::Down));
            if block_of(dest_state) == blocks::REDSTONE_WIRE {
                env.connected[index][2] = true;
                if new_side == SIDE_NONE {
                    new_side = SIDE_SIDE;
                }
            }
        }

        env.sides[index] = new_side;
    }

    let is_dot = env.sides.iter().all(|side| *side == SIDE_NONE);
    if !(was_dot && is_dot) {
        beautify_sides(&mut env.sides);
        for (index, side) in env.sides.iter().enumerate() {
            info.set(RedstoneSide::property(index), *side);
        }
    }

    let new_state = REGISTRY.make_state(info);
    if new_state == in_world_state {
        return false;
    }
    world.set_block_state(pos, new_state);

    // Wake the diagonal wires this one connects to; the direct neighbours
    // follow below in the global update order.
    for (index, dir) in Direction::REDSTONE_ORDER.into_iter().enumerate() {
        let side_pos = pos.relative(dir);
        if env.connected[index][0] {
            ctx.push_update(side_pos.relative(Direction::Up), dir.opposite());
        }
        if env.connected[index][2] {
            ctx.push_update(side_pos.relative(Direction::Down), dir.opposite());
        }
    }
    ctx.push_direct_neighbour_updates(pos);
    true
}

fn set_wire_power(world: &mut World, pos: WorldBlockPos, power: u8) {
    let mut info = describe(world.get_block_state(pos));
    info.set(Property::Power, power);
    world.set_block_state(pos, REGISTRY.make_state(&info));
}

/// Collects the twelve outgoing wire positions of `env` around `pos`.
fn wire_out_positions(pos: WorldBlockPos, env: &RedstoneWireEnv) -> Vec<WorldBlockPos> {
    let mut out = Vec::new();
    for (index, dir) in Direction::REDSTONE_ORDER.into_iter().enumerate() {
        let side = pos.relative(dir);
        for (candidate, rel) in [
            (0usize, side.relative(Direction::Up)),
            (1, side),
            (2, side.relative(Direction::Down)),
        ] {
            if env.wire_out[index][candidate] {
                out.push(rel);
            }
        }
    }
    out
}

/// Recomputes the power of the wire at `start_pos` and spreads the change
/// along its line.
pub fn update_redstone_line(world: &mut World, start_pos: WorldBlockPos) {
    let start_state = world.get_block_state(start_pos);
    if block_of(start_state) != blocks::REDSTONE_WIRE {
        return;
    }
    let start_info = describe(start_state);
    let start_power = start_info.get_or_default(Property::Power);
    let start_env = calculate_wire_env(world, start_pos, &start_info, false);

    if start_env.power == start_power {
        return;
    }

    if start_env.power > start_power {
        // Power went up: plain BFS raising every reachable wire whose
        // environment now reports more power than it stores.
        let mut wires = vec![start_pos];
        set_wire_power(world, start_pos, start_env.power);

        let mut index = 0;
        while index < wires.len() {
            let wire_pos = wires[index];
            index += 1;
            let info = describe(world.get_block_state(wire_pos));
            let env = calculate_wire_env(world, wire_pos, &info, false);
            for out_pos in wire_out_positions(wire_pos, &env) {
                if wires.len() >= MAX_WIRES_PER_STEP {
                    break;
                }
                let out_state = world.get_block_state(out_pos);
                if block_of(out_state) != blocks::REDSTONE_WIRE {
                    continue;
                }
                let out_info = describe(out_state);
                let out_env = calculate_wire_env(world, out_pos, &out_info, false);
                if out_env.power > out_info.get_or_default(Property::Power) {
                    set_wire_power(world, out_pos, out_env.power);
                    wires.push(out_pos);
                }
            }
        }
        return;
    }

    // Power went down. First pass: walk the line we are part of (wires whose
    // power matches start_power minus distance), zero it out, and collect
    // every wire that still has an independent source.
    let mut wires: Vec<(WorldBlockPos, u8)> = vec![(start_pos, 0)];
    let mut sources: Vec<WorldBlockPos> = Vec::new();

    let lineless = calculate_wire_env(world, start_pos, &start_info, true);
    if lineless.power > 0 {
        sources.push(start_pos);
    }

    let mut index = 0;
    while index < wires.len() {
        let (wire_pos, distance) = wires[index];
        index += 1;
        let info = describe(world.get_block_state(wire_pos));
        let cur_power = info.get_or_default(Property::Power);
        let env = calculate_wire_env(world, wire_pos, &info, true);

        set_wire_power(world, wire_pos, 0);

        if start_power.saturating_sub(distance) < cur_power {
            // Powered by something other than the lowered line; restore it
            // in the second pass.
            if sources.len() < MAX_SOURCES_PER_STEP {
                sources.push(wire_pos);
            }
            continue;
        }
        if env.power > 0 && sources.len() < MAX_SOURCES_PER_STEP {
            sources.push(wire_pos);
        }

        for out_pos in wire_out_positions(wire_pos, &env) {
            if wires.len() >= MAX_WIRES_PER_STEP {
                break;
            }
            let out_state = world.get_block_state(out_pos);
            if block_of(out_state) != blocks::REDSTONE_WIRE {
                continue;
            }
            let out_power = describe(out_state).get_or_default(Property::Power);
            if out_power > 0 && !wires.iter().any(|(pos, _)| *pos == out_pos) {
                wires.push((out_pos, distance + 1));
            }
        }
    }

    // Second pass: re-spread from every wire that kept an independent
    // source.
    for source in sources {
        update_redstone_line(world, source);
    }
}
