//! End-to-end engine scenarios: chunk lifecycle, block-update cascades,
//! redstone lines, swept collision and cross-chunk lighting, all driven
//! through the public world interface with real worker threads.

use std::time::{Duration, Instant};

use ember_core::TaskQueue;
use ember_core::block::update::{
    BlockUpdateContext, propagate_block_updates, propagate_delayed_block_updates, update_block,
};
use ember_core::chunk::map::ChunkMap;
use ember_core::entity::{Entity, EntityFlags, EntityKind};
use ember_core::light::light_chunk_and_exchange;
use ember_core::physics::move_entity;
use ember_core::world::World;
use ember_registry::properties::Property;
use ember_registry::{REGISTRY, vanilla_blocks};
use ember_utils::types::MIN_WORLD_Y;
use ember_utils::{BlockPos, BlockStateId, WorldBlockPos, WorldChunkPos};

fn test_world() -> World {
    let tasks = TaskQueue::start(2);
    // The world root does not exist: every chunk load fails soft and the
    // world comes up as empty air.
    let map = ChunkMap::new(tasks, std::env::temp_dir().join("ember-engine-test-missing"));
    World::new(map)
}

/// Adds interest and drives the lifecycle until every chunk is ready.
fn make_ready(world: &mut World, positions: &[WorldChunkPos]) {
    for pos in positions {
        world.chunks.add_chunk_interest(*pos, 1);
    }
    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        world.chunks.tick_chunk_loader(world.current_tick, Instant::now());
        if positions
            .iter()
            .all(|pos| world.chunks.get_chunk_if_loaded(*pos).is_some())
        {
            return;
        }
        assert!(Instant::now() < deadline, "chunks never became ready");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn state_of(block: ember_registry::BlockId) -> BlockStateId {
    REGISTRY.default_state(block)
}

fn dig(world: &mut World, pos: WorldBlockPos) {
    let mut ctx = BlockUpdateContext::new();
    world.break_block(pos);
    ctx.push_direct_neighbour_updates(pos);
    propagate_block_updates(world, &mut ctx);
}

/// Places a block the way the item-use path does: write the state, let the
/// block shape itself against its surroundings, then notify the neighbours.
fn place_and_update(world: &mut World, pos: WorldBlockPos, state: BlockStateId) {
    let result = world.set_block_state(pos, state);
    assert!(!result.failed, "placement failed at {pos:?}");
    let mut ctx = BlockUpdateContext::new();
    for dir in ember_utils::Direction::UPDATE_ORDER {
        update_block(world, pos, dir, false, &mut ctx);
    }
    ctx.push_direct_neighbour_updates(pos);
    propagate_block_updates(world, &mut ctx);
}

#[test]
fn set_then_get_roundtrip() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let pos = WorldBlockPos::new(1, 5, 100, 5);
    let stone = state_of(vanilla_blocks::STONE);
    assert!(!world.set_block_state(pos, stone).failed);
    assert_eq!(world.get_block_state(pos), stone);

    // Writes outside ready chunks fail soft and report unknown.
    let far = WorldBlockPos::new(1, 1000, 64, 1000);
    let result = world.set_block_state(far, stone);
    assert!(result.failed);
    assert_eq!(world.get_block_state(far), World::unknown_state());
}

#[test]
fn cactus_breaks_when_sand_removed() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let sand_pos = WorldBlockPos::new(1, 5, 59, 5);
    let cactus_pos = WorldBlockPos::new(1, 5, 60, 5);
    assert!(!world.set_block_state(sand_pos, state_of(vanilla_blocks::SAND)).failed);
    assert!(!world.set_block_state(cactus_pos, state_of(vanilla_blocks::CACTUS)).failed);

    dig(&mut world, sand_pos);

    assert_eq!(world.get_block_state(cactus_pos), BlockStateId::AIR);
    assert_eq!(world.get_block_state(sand_pos), BlockStateId::AIR);
}

#[test]
fn torch_breaks_without_pole_support() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let base = WorldBlockPos::new(1, 8, 70, 8);
    let torch = WorldBlockPos::new(1, 8, 71, 8);
    assert!(!world.set_block_state(base, state_of(vanilla_blocks::STONE)).failed);
    assert!(!world.set_block_state(torch, state_of(vanilla_blocks::TORCH)).failed);

    dig(&mut world, base);
    assert_eq!(world.get_block_state(torch), BlockStateId::AIR);
}

#[test]
fn sugar_cane_breaks_one_tick_delayed() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let sand = WorldBlockPos::new(1, 4, 64, 4);
    let cane = WorldBlockPos::new(1, 4, 65, 4);
    assert!(!world.set_block_state(sand, state_of(vanilla_blocks::SAND)).failed);
    assert!(!world.set_block_state(cane, state_of(vanilla_blocks::SUGAR_CANE)).failed);

    // Losing the ground schedules the break instead of applying it
    // immediately.
    dig(&mut world, sand);
    assert_eq!(
        world.get_block_state(cane),
        state_of(vanilla_blocks::SUGAR_CANE)
    );

    world.current_tick += 1;
    propagate_delayed_block_updates(&mut world);
    assert_eq!(world.get_block_state(cane), BlockStateId::AIR);
}

#[test]
fn redstone_line_powers_on_and_off() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    // Flat stone floor at y = 64.
    let stone = state_of(vanilla_blocks::STONE);
    for x in 2..12 {
        for z in 2..6 {
            assert!(!world.set_block_state(WorldBlockPos::new(1, x, 64, z), stone).failed);
        }
    }

    // Five wires in a row along +x, lever on the floor west of them.
    let wire_xs = [4, 5, 6, 7, 8];
    for x in wire_xs {
        place_and_update(
            &mut world,
            WorldBlockPos::new(1, x, 65, 3),
            state_of(vanilla_blocks::REDSTONE_WIRE),
        );
    }
    // Lever on the floor: attach face 0 so its support is the stone below.
    let lever_pos = WorldBlockPos::new(1, 3, 65, 3);
    let mut lever_info = REGISTRY.describe_state(state_of(vanilla_blocks::LEVER));
    lever_info.set(Property::AttachFace, 0);
    place_and_update(&mut world, lever_pos, REGISTRY.make_state(&lever_info));

    let wire_power = |world: &World, x: i32| {
        let state = world.get_block_state(WorldBlockPos::new(1, x, 65, 3));
        assert_eq!(
            REGISTRY.block_of_state(state),
            vanilla_blocks::REDSTONE_WIRE,
            "wire at x={x} disappeared"
        );
        REGISTRY
            .describe_state(state)
            .get_or_default(Property::Power)
    };

    for x in wire_xs {
        assert_eq!(wire_power(&world, x), 0);
    }

    // Flip the lever on.
    let lever_state = world.get_block_state(lever_pos);
    let mut lever_info = REGISTRY.describe_state(lever_state);
    lever_info.set_bool(Property::Powered, true);
    place_and_update(&mut world, lever_pos, REGISTRY.make_state(&lever_info));

    let expected = [15, 14, 13, 12, 11];
    for (x, power) in wire_xs.into_iter().zip(expected) {
        assert_eq!(wire_power(&world, x), power, "wire at x={x}");
    }

    // Flip it back off: the whole line drops to zero.
    let mut lever_info = REGISTRY.describe_state(world.get_block_state(lever_pos));
    lever_info.set_bool(Property::Powered, false);
    place_and_update(&mut world, lever_pos, REGISTRY.make_state(&lever_info));

    for x in wire_xs {
        assert_eq!(wire_power(&world, x), 0, "wire at x={x} after power-off");
    }
}

#[test]
fn chunk_interest_is_symmetric_and_releases() {
    let mut world = test_world();
    let centre = WorldChunkPos::new(1, 10, 10);
    world.chunks.add_chunk_interest(centre, 1);

    assert_eq!(world.chunks.len(), 9);
    let chunk = world.chunks.get_chunk_internal(centre).expect("centre");
    assert_eq!(chunk.interest_count, 1);
    assert_eq!(chunk.neighbour_interest_count, 0);
    for dx in -1..=1 {
        for dz in -1..=1 {
            if dx == 0 && dz == 0 {
                continue;
            }
            let neighbour = world
                .chunks
                .get_chunk_internal(centre.offset(dx, dz))
                .expect("neighbour");
            assert_eq!(neighbour.interest_count, 0);
            assert_eq!(neighbour.neighbour_interest_count, 1);
        }
    }

    world.chunks.add_chunk_interest(centre, -1);
    let deadline = Instant::now() + Duration::from_secs(60);
    while !world.chunks.is_empty() {
        assert!(Instant::now() < deadline, "chunks never unloaded");
        world.chunks.tick_chunk_loader(world.current_tick, Instant::now());
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn height_map_follows_vertical_edits() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let pos = WorldBlockPos::new(1, 3, 100, 7);
    assert!(!world.set_block_state(pos, state_of(vanilla_blocks::STONE)).failed);
    {
        let chunk = world
            .chunks
            .get_chunk_if_loaded(WorldChunkPos::new(1, 0, 0))
            .expect("ready");
        assert_eq!(chunk.motion_blocking_height_map[(7 << 4) | 3], 101);
    }

    assert!(!world.set_block_state(pos, BlockStateId::AIR).failed);
    let chunk = world
        .chunks
        .get_chunk_if_loaded(WorldChunkPos::new(1, 0, 0))
        .expect("ready");
    assert_eq!(
        chunk.motion_blocking_height_map[(7 << 4) | 3],
        MIN_WORLD_Y as i16
    );
}

#[test]
fn swept_collision_stops_at_wall() {
    let mut world = test_world();
    make_ready(
        &mut world,
        &[
            WorldChunkPos::new(1, 0, 0),
            WorldChunkPos::new(1, -1, 0),
            WorldChunkPos::new(1, 0, -1),
            WorldChunkPos::new(1, -1, -1),
        ],
    );

    assert!(
        !world
            .set_block_state(WorldBlockPos::new(1, 2, 65, 0), state_of(vanilla_blocks::STONE))
            .failed
    );

    let mut entity = Entity {
        kind: EntityKind::Item,
        world_id: 1,
        x: 0.5,
        y: 65.0,
        z: 0.5,
        vx: 2.0,
        collision_width: 1.0,
        collision_height: 1.0,
        ..Entity::default()
    };
    move_entity(&world, &mut entity);

    assert_eq!(entity.vx, 0.0, "x velocity zeroed on impact");
    assert!(
        (entity.x - 1.499).abs() < 0.01,
        "entity stopped at x={}",
        entity.x
    );
    assert_eq!(entity.y, 65.0);
    assert!(!entity.flags.contains(EntityFlags::ON_GROUND));
}

#[test]
fn item_settles_onto_ground() {
    let mut world = test_world();
    make_ready(
        &mut world,
        &[
            WorldChunkPos::new(1, 0, 0),
            WorldChunkPos::new(1, -1, 0),
            WorldChunkPos::new(1, 0, -1),
            WorldChunkPos::new(1, -1, -1),
        ],
    );
    for x in -1..2 {
        for z in -1..2 {
            assert!(
                !world
                    .set_block_state(
                        WorldBlockPos::new(1, x, 64, z),
                        state_of(vanilla_blocks::STONE)
                    )
                    .failed
            );
        }
    }

    let mut entity = Entity {
        kind: EntityKind::Item,
        world_id: 1,
        x: 0.5,
        y: 65.8,
        z: 0.5,
        vy: -1.0,
        collision_width: 0.25,
        collision_height: 0.25,
        ..Entity::default()
    };
    move_entity(&world, &mut entity);

    assert!(entity.flags.contains(EntityFlags::ON_GROUND));
    assert_eq!(entity.vy, 0.0);
    assert!((entity.y - 65.0).abs() < 0.01, "rests on top at y={}", entity.y);
}

#[test]
fn cross_chunk_light_exchange() {
    let mut world = test_world();
    let a = WorldChunkPos::new(1, 0, 0);
    let b = WorldChunkPos::new(1, 1, 0);
    make_ready(&mut world, &[a, b]);

    // The empty world is fully sky lit.
    {
        let chunk = world.chunks.get_chunk_if_loaded(a).expect("ready");
        assert_eq!(chunk.sky_light(BlockPos::new(5, 65, 5)), 15);
    }

    // Drop an emitter on the shared border and relight both chunks.
    let emitter = WorldBlockPos::new(1, 15, 65, 0);
    assert!(
        !world
            .set_block_state(emitter, state_of(vanilla_blocks::GLOWSTONE))
            .failed
    );
    light_chunk_and_exchange(&mut world.chunks, a);
    light_chunk_and_exchange(&mut world.chunks, b);

    let chunk_b = world.chunks.get_chunk_if_loaded(b).expect("ready");
    assert_eq!(chunk_b.block_light(BlockPos::new(16, 65, 0)), 14);
    assert_eq!(chunk_b.block_light(BlockPos::new(17, 65, 0)), 13);
    assert_eq!(chunk_b.block_light(BlockPos::new(29, 65, 0)), 1);
    assert_eq!(chunk_b.block_light(BlockPos::new(30, 65, 0)), 0);

    // Light decays with every step of distance in the source chunk too.
    let chunk_a = world.chunks.get_chunk_if_loaded(a).expect("ready");
    assert_eq!(chunk_a.block_light(BlockPos::new(15, 65, 0)), 15);
    assert_eq!(chunk_a.block_light(BlockPos::new(14, 65, 0)), 14);
    assert_eq!(chunk_a.block_light(BlockPos::new(15, 67, 0)), 13);

    // Re-running the pass is idempotent.
    light_chunk_and_exchange(&mut world.chunks, a);
    let chunk_a = world.chunks.get_chunk_if_loaded(a).expect("ready");
    assert_eq!(chunk_a.block_light(BlockPos::new(14, 65, 0)), 14);
}

#[test]
fn fence_connects_to_placed_neighbour() {
    let mut world = test_world();
    make_ready(&mut world, &[WorldChunkPos::new(1, 0, 0)]);

    let left = WorldBlockPos::new(1, 6, 70, 6);
    let right = WorldBlockPos::new(1, 7, 70, 6);
    place_and_update(&mut world, left, state_of(vanilla_blocks::OAK_FENCE));
    place_and_update(&mut world, right, state_of(vanilla_blocks::OAK_FENCE));

    let left_info = REGISTRY.describe_state(world.get_block_state(left));
    assert!(left_info.get_bool(Property::East), "left fence links east");
    let right_info = REGISTRY.describe_state(world.get_block_state(right));
    assert!(right_info.get_bool(Property::West), "right fence links west");
    assert!(!right_info.get_bool(Property::East));
}
