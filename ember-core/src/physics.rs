//! Entity motion: swept axis-aligned collision against the block store,
//! then gravity, drag and ground friction.

use ember_registry::shapes::BlockModel;
use ember_registry::{BlockTag, REGISTRY, vanilla_blocks};
use ember_utils::{BlockStateId, Direction, WorldBlockPos};

use crate::entity::{Entity, EntityFlags, EntityKind};
use crate::world::World;

/// Swept iterations per tick; each consumes the time until the first hit.
const MOVE_ITERATIONS: usize = 4;
/// Pull-back applied to a hit time so the entity never ends inside a face.
const HIT_EPSILON: f64 = 0.001;

/// The collision model of a state at a position. Bamboo stalks are offset by
/// a position-derived hash; fluids, scaffolding, powder snow and moving
/// pistons fall through to their static models until their entity-dependent
/// shapes are modelled.
#[must_use]
pub fn collision_model_at(state: BlockStateId, pos: WorldBlockPos) -> BlockModel {
    let block = REGISTRY.block_of_state(state);
    let model = REGISTRY.collision_model(state);
    if block == vanilla_blocks::BAMBOO {
        let mut seed = (pos.pos.x as u64)
            .wrapping_mul(3_129_871)
            ^ (pos.pos.z as u64).wrapping_mul(116_129_781);
        seed = seed.wrapping_mul(seed).wrapping_mul(42_317_861).wrapping_add(seed.wrapping_mul(11));
        seed >>= 16;
        let dx = ((seed & 0xF) as f32 / 15.0 - 0.5) * 0.5;
        let dz = (((seed >> 8) & 0xF) as f32 / 15.0 - 0.5) * 0.5;
        return model.translated(dx, 0.0, dz);
    }
    model.clone()
}

struct SweptHit {
    face: Direction,
    state: BlockStateId,
}

/// Advances the entity by one tick of its velocity, resolving collisions.
pub fn move_entity(world: &World, entity: &mut Entity) {
    let world_id = entity.world_id;
    let mut x = entity.x;
    let mut y = entity.y;
    let mut z = entity.z;
    let mut vx = entity.vx;
    let mut vy = entity.vy;
    let mut vz = entity.vz;

    let width = entity.collision_width;
    let height = entity.collision_height;

    let mut remaining_dt = 1.0f64;
    let mut on_ground = false;

    for _ in 0..MOVE_ITERATIONS {
        let dx = remaining_dt * vx;
        let dy = remaining_dt * vy;
        let dz = remaining_dt * vz;

        // Scan volume: the swept box, grown by the entity's size and one
        // extra block, because some block models extend past their cell
        // (fences, shulker boxes).
        let min_x = (x.min(x + dx) - width / 2.0 - 1.0).floor() as i32;
        let max_x = (x.max(x + dx) + width / 2.0 + 1.0).floor() as i32;
        let min_y = (y.min(y + dy) - 1.0).floor() as i32;
        let max_y = (y.max(y + dy) + height + 1.0).floor() as i32;
        let min_z = (z.min(z + dz) - width / 2.0 - 1.0).floor() as i32;
        let max_z = (z.max(z + dz) + width / 2.0 + 1.0).floor() as i32;

        let mut hit: Option<SweptHit> = None;
        let mut dt = 1.0f64;

        for block_x in min_x..=max_x {
            for block_y in min_y..=max_y {
                for block_z in min_z..=max_z {
                    let block_pos = WorldBlockPos::new(world_id, block_x, block_y, block_z);
                    let state = world.get_block_state(block_pos);
                    if state.is_air() {
                        continue;
                    }
                    let model = collision_model_at(state, block_pos);

                    for bx in &model.boxes {
                        // Minkowski-expand the box by the entity's size so
                        // the entity reduces to its anchor point.
                        let test_min_x = f64::from(bx.min_x) + f64::from(block_x) - width / 2.0;
                        let test_max_x = f64::from(bx.max_x) + f64::from(block_x) + width / 2.0;
                        let test_min_y = f64::from(bx.min_y) + f64::from(block_y) - height;
                        let test_max_y = f64::from(bx.max_y) + f64::from(block_y);
                        let test_min_z = f64::from(bx.min_z) + f64::from(block_z) - width / 2.0;
                        let test_max_z = f64::from(bx.max_z) + f64::from(block_z) + width / 2.0;

                        let tests = [
                            (test_min_x, test_min_y, test_max_y, test_min_z, test_max_z, dx, dy, dz, x, y, z, Direction::West),
                            (test_max_x, test_min_y, test_max_y, test_min_z, test_max_z, dx, dy, dz, x, y, z, Direction::East),
                            (test_min_y, test_min_x, test_max_x, test_min_z, test_max_z, dy, dx, dz, y, x, z, Direction::Down),
                            (test_max_y, test_min_x, test_max_x, test_min_z, test_max_z, dy, dx, dz, y, x, z, Direction::Up),
                            (test_min_z, test_min_y, test_max_y, test_min_x, test_max_x, dz, dy, dx, z, y, x, Direction::North),
                            (test_max_z, test_min_y, test_max_y, test_min_x, test_max_x, dz, dy, dx, z, y, x, Direction::South),
                        ];

                        for (wall_a, min_b, max_b, min_c, max_c, da, db, dc, a, b, c, face) in tests
                        {
                            if da == 0.0 {
                                continue;
                            }
                            let hit_time = (wall_a - a) / da;
                            if hit_time < 0.0 || dt <= hit_time {
                                continue;
                            }
                            let hit_b = b + hit_time * db;
                            if hit_b < min_b || hit_b > max_b {
                                continue;
                            }
                            let hit_c = c + hit_time * dc;
                            if hit_c < min_c || hit_c > max_c {
                                continue;
                            }
                            dt = (hit_time - HIT_EPSILON).max(0.0);
                            hit = Some(SweptHit { face, state });
                        }
                    }
                }
            }
        }

        x += dt * dx;
        y += dt * dy;
        z += dt * dz;

        if let Some(hit) = &hit {
            let hit_block = REGISTRY.block_of_state(hit.state);
            match hit.face {
                Direction::West | Direction::East => vx = 0.0,
                Direction::North | Direction::South => vz = 0.0,
                Direction::Down => vy = 0.0,
                Direction::Up => {
                    let bounce_factor = match entity.kind {
                        EntityKind::Player => {
                            if entity.flags.contains(EntityFlags::SHIFTING) {
                                0.0
                            } else {
                                -1.0
                            }
                        }
                        _ => -0.8,
                    };
                    if hit_block == vanilla_blocks::SLIME_BLOCK {
                        vy *= bounce_factor;
                    } else if REGISTRY.has_tag(hit_block, BlockTag::BEDS) {
                        vy *= bounce_factor * 0.66;
                    } else {
                        vy = 0.0;
                        on_ground = true;
                    }
                }
            }
        }

        remaining_dt -= dt * remaining_dt;
    }

    entity.x = x;
    entity.y = y;
    entity.z = z;
    entity.vx = vx;
    entity.vy = vy;
    entity.vz = vz;
    entity.flags.set(EntityFlags::ON_GROUND, on_ground);
}

/// Ticks one entity. Returns `true` when the entity should be evicted.
#[must_use]
pub fn tick_entity(world: &World, entity: &mut Entity) -> bool {
    match entity.kind {
        EntityKind::Item => {
            if entity.item == ember_registry::items::ItemRegistry::AIR {
                return true;
            }
            if entity.pickup_timeout > 0 && entity.pickup_timeout != 32_767 {
                entity.pickup_timeout -= 1;
            }

            entity.vy -= 0.04;
            let before = (entity.x, entity.y, entity.z);
            move_entity(world, entity);
            if before != (entity.x, entity.y, entity.z) {
                entity.changed_data |= crate::entity::ChangedData::POSITION;
            }

            let mut drag = 0.98f64;
            if entity.flags.contains(EntityFlags::ON_GROUND) {
                // Friction comes from the block just below the entity, so
                // items keep sliding across slabs resting on ice.
                let ground = WorldBlockPos::new(
                    entity.world_id,
                    entity.x.floor() as i32,
                    (entity.y - 0.99).floor() as i32,
                    entity.z.floor() as i32,
                );
                let ground_state = world.get_block_state(ground);
                let ground_block = REGISTRY.block_of_state(ground_state);
                drag *= f64::from(REGISTRY.block(ground_block).friction);
            }

            entity.vx *= drag;
            entity.vy *= 0.98;
            entity.vz *= drag;

            if entity.flags.contains(EntityFlags::ON_GROUND) {
                entity.vy *= -0.5;
            }
            false
        }
        EntityKind::Player | EntityKind::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bamboo_offset_is_deterministic() {
        let state = REGISTRY.default_state(vanilla_blocks::BAMBOO);
        let pos = WorldBlockPos::new(1, 12, 64, -7);
        let first = collision_model_at(state, pos);
        let second = collision_model_at(state, pos);
        assert_eq!(first.boxes, second.boxes);
        // A different column lands elsewhere almost surely.
        let other = collision_model_at(state, WorldBlockPos::new(1, 13, 64, -7));
        assert_ne!(first.boxes, other.boxes);
    }
}
