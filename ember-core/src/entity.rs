//! The entity pool.
//!
//! Entities live in a fixed array and are addressed by generational ids:
//! `generation(12) | index(20)`. Index 0 is the reserved null entity; every
//! failed lookup resolves to it, so callers never observe a dangling entity.

use ember_registry::items::ItemId;
use uuid::Uuid;

/// Capacity of the pool, including the null entity.
pub const MAX_ENTITIES: usize = 1024;

const ENTITY_INDEX_BITS: u32 = 20;
const ENTITY_INDEX_MASK: u32 = (1 << ENTITY_INDEX_BITS) - 1;

/// A generational entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The null entity's id.
    pub const NULL: EntityId = EntityId(0);

    /// The pool index part of the id.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0 & ENTITY_INDEX_MASK) as usize
    }
}

bitflags::bitflags! {
    /// Per-entity flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntityFlags: u32 {
        /// The slot holds a live entity.
        const IN_USE = 1 << 0;
        /// Resting on the ground after the last move.
        const ON_GROUND = 1 << 1;
        /// Sneaking; dampens slime bounces.
        const SHIFTING = 1 << 2;
    }
}

/// Entity kinds the engine ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityKind {
    /// The reserved null entity.
    #[default]
    Null,
    /// A player-controlled entity.
    Player,
    /// A dropped item.
    Item,
}

bitflags::bitflags! {
    /// Which parts of an entity changed this tick, for the delta encoders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChangedData: u32 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const VELOCITY = 1 << 2;
    }
}

/// One pooled entity.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct Entity {
    /// The entity's current id; compared on lookup to catch stale ids.
    pub id: EntityId,
    /// Stable unique id shown to clients.
    pub uuid: Uuid,
    /// The kind tag.
    pub kind: EntityKind,
    /// Flags.
    pub flags: EntityFlags,
    /// World the entity lives in.
    pub world_id: i32,
    /// Position.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Velocity in blocks per tick.
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    /// Rotation in degrees.
    pub y_rot: f32,
    pub x_rot: f32,
    /// Collision box width (x and z).
    pub collision_width: f64,
    /// Collision box height.
    pub collision_height: f64,
    /// Parts changed this tick.
    pub changed_data: ChangedData,
    /// Item entities: the carried item, air means evict.
    pub item: ItemId,
    /// Item entities: ticks until pickup is allowed; 32767 means never.
    pub pickup_timeout: u16,
}

/// The fixed entity pool.
pub struct EntityPool {
    entities: Vec<Entity>,
    next_generations: Vec<u16>,
    live_count: usize,
}

impl Default for EntityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityPool {
    /// Creates the pool with the null entity reserved.
    #[must_use]
    pub fn new() -> Self {
        let mut entities = vec![Entity::default(); MAX_ENTITIES];
        entities[0].flags = EntityFlags::IN_USE;
        Self {
            entities,
            next_generations: vec![1; MAX_ENTITIES],
            live_count: 1,
        }
    }

    /// Number of live entities, the null entity included.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Reserves a slot for a new entity. Returns the null entity when the
    /// pool is exhausted.
    pub fn reserve(&mut self, kind: EntityKind) -> &mut Entity {
        for index in 1..MAX_ENTITIES {
            if self.entities[index].flags.contains(EntityFlags::IN_USE) {
                continue;
            }
            let generation = self.next_generations[index];
            let id = EntityId((u32::from(generation) << ENTITY_INDEX_BITS) | index as u32);
            self.next_generations[index] = (generation + 1) & 0xFFF;

            let entity = &mut self.entities[index];
            *entity = Entity {
                id,
                uuid: Uuid::from_u64_pair(0, u64::from(id.0)),
                kind,
                flags: EntityFlags::IN_USE,
                ..Entity::default()
            };
            self.live_count += 1;
            return entity;
        }
        &mut self.entities[0]
    }

    /// Resolves an id. Stale or unknown ids resolve to the null entity.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> &Entity {
        let index = id.index();
        let entity = self.entities.get(index).unwrap_or(&self.entities[0]);
        if entity.id != id || !entity.flags.contains(EntityFlags::IN_USE) {
            return &self.entities[0];
        }
        entity
    }

    /// Mutable id resolution with the same staleness rules.
    pub fn resolve_mut(&mut self, id: EntityId) -> &mut Entity {
        let index = id.index();
        let valid = self
            .entities
            .get(index)
            .is_some_and(|entity| entity.id == id && entity.flags.contains(EntityFlags::IN_USE));
        let index = if valid && index != 0 { index } else { 0 };
        &mut self.entities[index]
    }

    /// Releases an entity. The null entity is never evicted.
    pub fn evict(&mut self, id: EntityId) {
        let index = id.index();
        if index == 0 {
            return;
        }
        let entity = self.resolve_mut(id);
        if entity.kind != EntityKind::Null && entity.flags.contains(EntityFlags::IN_USE) {
            entity.flags -= EntityFlags::IN_USE;
            self.live_count -= 1;
        }
    }

    /// Iterates the live entities (null excluded) by pool index order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .skip(1)
            .filter(|entity| entity.flags.contains(EntityFlags::IN_USE))
    }

    /// Indices of live entities, for iteration that needs `&mut` access.
    #[must_use]
    pub fn live_indices(&self) -> Vec<usize> {
        (1..MAX_ENTITIES)
            .filter(|&index| self.entities[index].flags.contains(EntityFlags::IN_USE))
            .collect()
    }

    /// Direct slot access.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> &mut Entity {
        &mut self.entities[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_resolve() {
        let mut pool = EntityPool::new();
        let id = pool.reserve(EntityKind::Item).id;
        assert_ne!(id, EntityId::NULL);
        assert_eq!(pool.resolve(id).kind, EntityKind::Item);
    }

    #[test]
    fn stale_id_resolves_to_null() {
        let mut pool = EntityPool::new();
        let id = pool.reserve(EntityKind::Item).id;
        pool.evict(id);
        assert_eq!(pool.resolve(id).kind, EntityKind::Null);

        // The slot may be reused, but the old id must never alias the new
        // entity.
        let new_id = pool.reserve(EntityKind::Player).id;
        assert_eq!(new_id.index(), id.index());
        assert_ne!(new_id, id);
        assert_eq!(pool.resolve(id).kind, EntityKind::Null);
        assert_eq!(pool.resolve(new_id).kind, EntityKind::Player);
    }

    #[test]
    fn evicting_null_is_a_no_op() {
        let mut pool = EntityPool::new();
        pool.evict(EntityId::NULL);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn generation_wraps_into_twelve_bits() {
        let mut pool = EntityPool::new();
        let mut last = EntityId::NULL;
        for _ in 0..5000 {
            let id = pool.reserve(EntityKind::Item).id;
            assert_ne!(id, last);
            pool.evict(id);
            last = id;
        }
    }
}
