//! The chunk index and lifecycle.
//!
//! The index is an open-addressed hash table keyed by the packed chunk
//! position (Jenkins one-at-a-time hash, linear probing, backward-shift
//! deletion, load factor at most one half). The zero key doubles as the
//! empty-slot marker, which is sound because world id 0 is invalid.
//!
//! Interest drives everything: adding interest to a position touches the
//! whole 3x3 around it, creating shells and queueing lifecycle updates; a
//! chunk whose interest counts both reach zero is freed once no load is in
//! flight.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use ember_utils::{PackedChunkPos, WorldChunkPos};

use crate::chunk::{
    ATOMIC_FINISHED_LOAD, ATOMIC_LOAD_SUCCESS, Chunk, LoaderFlags, loader, section_memory_usage,
};
use crate::task::TaskQueue;

/// Lifecycle updates drained per `tick_chunk_loader` call.
const MAX_CHUNK_UPDATES_PER_TICK: i32 = 64;
/// Wall-clock budget measured from the tick start; lighting is expensive and
/// must not eat the next tick.
const CHUNK_LOADER_TIME_BUDGET: Duration = Duration::from_millis(40);

struct Slot {
    key: u64,
    chunk: Option<Box<Chunk>>,
}

impl Slot {
    const EMPTY: Slot = Slot {
        key: 0,
        chunk: None,
    };

    fn is_empty(&self) -> bool {
        self.key == 0
    }
}

// Jenkins one-at-a-time over the 8 key bytes.
fn hash_packed_pos(pos: PackedChunkPos) -> u32 {
    let mut hash = 0u32;
    for byte in pos.0.to_le_bytes() {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// The chunk index plus its lifecycle queues.
pub struct ChunkMap {
    slots: Vec<Slot>,
    mask: usize,
    use_count: usize,

    /// Pending lifecycle updates; membership is tracked by the
    /// `REQUESTING_UPDATE` flag so a chunk is queued at most once.
    update_requests: VecDeque<PackedChunkPos>,

    /// Chunks that received their first block change this tick.
    changed_chunks: Vec<PackedChunkPos>,

    /// Background workers running load tasks.
    tasks: Arc<TaskQueue>,
    /// Region root of world id 1.
    world_root: PathBuf,
}

impl ChunkMap {
    /// Creates an empty index.
    #[must_use]
    pub fn new(tasks: Arc<TaskQueue>, world_root: PathBuf) -> Self {
        const INITIAL_SIZE: usize = 128;
        Self {
            slots: (0..INITIAL_SIZE).map(|_| Slot::EMPTY).collect(),
            mask: INITIAL_SIZE - 1,
            use_count: 0,
            update_requests: VecDeque::new(),
            changed_chunks: Vec::new(),
            tasks,
            world_root,
        }
    }

    /// Number of chunks in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.use_count
    }

    /// Whether the index holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.use_count == 0
    }

    fn probe(&self, key: u64) -> usize {
        let mut index = hash_packed_pos(PackedChunkPos(key)) as usize & self.mask;
        loop {
            let slot = &self.slots[index];
            if slot.is_empty() || slot.key == key {
                return index;
            }
            index = (index + 1) & self.mask;
        }
    }

    fn grow(&mut self) {
        let old_slots = std::mem::take(&mut self.slots);
        let new_size = (old_slots.len() * 2).max(128);
        self.slots = (0..new_size).map(|_| Slot::EMPTY).collect();
        self.mask = new_size - 1;
        for slot in old_slots {
            if !slot.is_empty() {
                let index = self.probe(slot.key);
                self.slots[index] = slot;
            }
        }
    }

    // Backward-shift deletion keeps probe chains intact without tombstones.
    fn remove_slot(&mut self, removed: usize) {
        self.use_count -= 1;
        self.slots[removed] = Slot::EMPTY;
        let mut to_fill = removed;
        let mut current = (removed + 1) & self.mask;
        loop {
            if self.slots[current].is_empty() {
                return;
            }
            let desired =
                hash_packed_pos(PackedChunkPos(self.slots[current].key)) as usize & self.mask;
            let should_fill = if to_fill < current {
                desired <= to_fill || current < desired
            } else {
                desired <= to_fill && current < desired
            };
            if should_fill {
                self.slots.swap(to_fill, current);
                to_fill = current;
            }
            current = (current + 1) & self.mask;
        }
    }

    fn get_or_create(&mut self, pos: WorldChunkPos) -> usize {
        if self.use_count >= self.slots.len() / 2 {
            self.grow();
        }
        let key = pos.pack().0;
        debug_assert_ne!(pos.world_id, 0, "world id 0 is reserved");
        let index = self.probe(key);
        if self.slots[index].is_empty() {
            self.slots[index] = Slot {
                key,
                chunk: Some(Box::new(Chunk::shell(pos))),
            };
            self.use_count += 1;
        }
        index
    }

    /// A chunk in any lifecycle state. Lighting and the lifecycle use this;
    /// gameplay must go through [`Self::get_chunk_if_loaded`].
    #[must_use]
    pub fn get_chunk_internal(&self, pos: WorldChunkPos) -> Option<&Chunk> {
        let index = self.probe(pos.pack().0);
        self.slots[index].chunk.as_deref()
    }

    /// Mutable access to a chunk in any lifecycle state.
    pub fn get_chunk_internal_mut(&mut self, pos: WorldChunkPos) -> Option<&mut Chunk> {
        let index = self.probe(pos.pack().0);
        self.slots[index].chunk.as_deref_mut()
    }

    /// A chunk visible to gameplay: present and `READY`.
    #[must_use]
    pub fn get_chunk_if_loaded(&self, pos: WorldChunkPos) -> Option<&Chunk> {
        self.get_chunk_internal(pos)
            .filter(|chunk| chunk.loader_flags.contains(LoaderFlags::READY))
    }

    /// Mutable gameplay access.
    pub fn get_chunk_if_loaded_mut(&mut self, pos: WorldChunkPos) -> Option<&mut Chunk> {
        self.get_chunk_internal_mut(pos)
            .filter(|chunk| chunk.loader_flags.contains(LoaderFlags::READY))
    }

    /// Mutable access to several distinct chunks at once, in any state.
    /// Missing chunks yield `None`.
    ///
    /// # Panics
    /// Panics (debug) when positions are not pairwise distinct.
    pub fn get_disjoint_internal_mut<const N: usize>(
        &mut self,
        positions: [WorldChunkPos; N],
    ) -> [Option<&mut Chunk>; N] {
        for a in 0..N {
            for b in a + 1..N {
                debug_assert_ne!(
                    positions[a].pack().0,
                    positions[b].pack().0,
                    "positions must be distinct"
                );
            }
        }
        let mut result: [Option<&mut Chunk>; N] = std::array::from_fn(|_| None);
        for (out, pos) in result.iter_mut().zip(positions) {
            let index = self.probe(pos.pack().0);
            if let Some(chunk) = self.slots[index].chunk.as_deref_mut() {
                let pointer: *mut Chunk = chunk;
                // SAFETY: distinct keys occupy distinct slots and each boxed
                // chunk is uniquely owned by its slot, so the N mutable
                // references never alias. Their lifetime is tied to the
                // `&mut self` borrow of this call.
                *out = Some(unsafe { &mut *pointer });
            }
        }
        result
    }

    /// Adjusts interest on `pos` and neighbour interest on the 8 chunks
    /// around it, creating shells as needed, and queues lifecycle updates
    /// for every touched chunk.
    pub fn add_chunk_interest(&mut self, pos: WorldChunkPos, interest: i32) {
        for dx in -1..=1 {
            for dz in -1..=1 {
                let index = self.get_or_create(pos.offset(dx, dz));
                let chunk = self.slots[index]
                    .chunk
                    .as_deref_mut()
                    .expect("slot was just created");
                if dx == 0 && dz == 0 {
                    chunk.interest_count += interest;
                    debug_assert!(chunk.interest_count >= 0);
                } else {
                    chunk.neighbour_interest_count += interest;
                    debug_assert!(chunk.neighbour_interest_count >= 0);
                }
                self.push_update_request(index);
            }
        }
    }

    fn push_update_request(&mut self, slot_index: usize) {
        let key = self.slots[slot_index].key;
        let chunk = self.slots[slot_index]
            .chunk
            .as_deref_mut()
            .expect("occupied slot has a chunk");
        if chunk.loader_flags.contains(LoaderFlags::REQUESTING_UPDATE) {
            return;
        }
        chunk.loader_flags |= LoaderFlags::REQUESTING_UPDATE;
        self.update_requests.push_back(PackedChunkPos(key));
    }

    fn push_update_request_for(&mut self, pos: WorldChunkPos) {
        let index = self.probe(pos.pack().0);
        if !self.slots[index].is_empty() {
            self.push_update_request(index);
        }
    }

    /// Records a chunk's first block change of the tick.
    pub fn mark_chunk_changed(&mut self, pos: WorldChunkPos) {
        self.changed_chunks.push(pos.pack());
    }

    /// Clears the per-tick changed list. Called once per tick.
    pub fn clear_changed_chunks(&mut self) {
        self.changed_chunks.clear();
    }

    /// Positions of chunks changed this tick within the inclusive rectangle,
    /// restricted to `READY` chunks.
    pub fn collect_changed_chunks(
        &self,
        from: WorldChunkPos,
        to: WorldChunkPos,
        out: &mut Vec<WorldChunkPos>,
    ) {
        for packed in &self.changed_chunks {
            let pos = packed.unpack();
            if pos.world_id == from.world_id
                && from.x <= pos.x
                && pos.x <= to.x
                && from.z <= pos.z
                && pos.z <= to.z
                && self.get_chunk_if_loaded(pos).is_some()
            {
                out.push(pos);
            }
        }
    }

    /// Collects the `READY` chunks of an inclusive rectangle into `out`,
    /// indexed as zx; absent or unready chunks are `None`.
    pub fn collect_loaded_chunks(
        &self,
        from: WorldChunkPos,
        to: WorldChunkPos,
        out: &mut Vec<Option<WorldChunkPos>>,
    ) {
        for z in from.z..=to.z {
            for x in from.x..=to.x {
                let pos = WorldChunkPos::new(from.world_id, x, z);
                out.push(self.get_chunk_if_loaded(pos).map(|chunk| chunk.pos));
            }
        }
    }

    /// Drains pending lifecycle updates, bounded by a count and by wall
    /// clock, then logs memory usage once every ten seconds of ticks.
    pub fn tick_chunk_loader(&mut self, current_tick: i64, tick_start: Instant) {
        let mut remaining = MAX_CHUNK_UPDATES_PER_TICK;
        while remaining > 0 {
            let Some(packed) = self.update_requests.pop_front() else {
                break;
            };
            let index = self.probe(packed.0);
            if self.slots[index].is_empty() {
                continue;
            }
            if let Some(chunk) = self.slots[index].chunk.as_deref_mut() {
                chunk.loader_flags -= LoaderFlags::REQUESTING_UPDATE;
            }
            self.update_chunk(index);
            remaining -= 1;

            if tick_start.elapsed() > CHUNK_LOADER_TIME_BUDGET {
                break;
            }
        }

        if current_tick % (10 * 20) == 0 {
            let (blocks, light) = section_memory_usage();
            log::info!(
                "Section memory usage: {:.0}MB (blocks), {:.0}MB (light)",
                blocks as f64 / 1e6,
                light as f64 / 1e6
            );
        }
    }

    fn update_chunk(&mut self, slot_index: usize) {
        let key = self.slots[slot_index].key;
        let pos = PackedChunkPos(key).unpack();
        let chunk = self.slots[slot_index]
            .chunk
            .as_deref_mut()
            .expect("occupied slot has a chunk");

        if chunk.interest_count == 0 && chunk.neighbour_interest_count == 0 {
            let load_in_flight = chunk.loader_flags.contains(LoaderFlags::STARTED_LOAD)
                && !chunk.loader_flags.contains(LoaderFlags::FINISHED_LOAD);
            if load_in_flight {
                // Cannot free while the worker may still write; retry later.
                self.push_update_request(slot_index);
            } else {
                chunk.free_storage();
                self.remove_slot(slot_index);
                return;
            }
        }

        let chunk = self.slots[slot_index]
            .chunk
            .as_deref_mut()
            .expect("occupied slot has a chunk");

        if (chunk.interest_count > 0 || chunk.neighbour_interest_count > 0)
            && !chunk.loader_flags.contains(LoaderFlags::STARTED_LOAD)
        {
            chunk.loader_flags |= LoaderFlags::STARTED_LOAD;
            let slot = Arc::clone(&chunk.load_slot);
            let chunk_pos = chunk.pos;
            let world_root = self.world_root.clone();
            let queued = self.tasks.push(move || {
                loader::load_chunk_async(chunk_pos, &world_root, &slot);
            });
            if !queued {
                // Task queue full: retry the whole lifecycle step later.
                let chunk = self.slots[slot_index]
                    .chunk
                    .as_deref_mut()
                    .expect("occupied slot has a chunk");
                chunk.loader_flags -= LoaderFlags::STARTED_LOAD;
                self.push_update_request(slot_index);
                return;
            }
        }

        let chunk = self.slots[slot_index]
            .chunk
            .as_deref_mut()
            .expect("occupied slot has a chunk");

        if chunk.loader_flags.contains(LoaderFlags::STARTED_LOAD)
            && !chunk.loader_flags.contains(LoaderFlags::FINISHED_LOAD)
        {
            let atomic_flags = chunk.load_slot.flags.load(Ordering::Acquire);
            if atomic_flags & ATOMIC_FINISHED_LOAD != 0 {
                chunk.loader_flags |= LoaderFlags::FINISHED_LOAD;
                if atomic_flags & ATOMIC_LOAD_SUCCESS != 0 {
                    chunk.loader_flags |= LoaderFlags::LOAD_SUCCESS;
                } else {
                    log::info!("Failed to load chunk {pos}");
                }
                let data = chunk.load_slot.result.lock().take();
                if let Some(data) = data {
                    chunk.install_load(data);
                }
            } else {
                // Not yet loaded; poll again later.
                self.push_update_request(slot_index);
            }
        }

        let chunk = self.slots[slot_index]
            .chunk
            .as_deref_mut()
            .expect("occupied slot has a chunk");

        // A failed load still lights itself (on empty data) so neighbours
        // are not stuck waiting for it.
        if chunk.loader_flags.contains(LoaderFlags::FINISHED_LOAD)
            && !chunk.loader_flags.contains(LoaderFlags::LIT_SELF)
        {
            crate::light::light_chunk_and_exchange(self, pos);
            let chunk = self.slots[slot_index]
                .chunk
                .as_deref_mut()
                .expect("occupied slot has a chunk");
            chunk.loader_flags |= LoaderFlags::LIT_SELF;
            // Re-check readiness of the whole 3x3, including this chunk.
            for dx in -1..=1 {
                for dz in -1..=1 {
                    self.push_update_request_for(pos.offset(dx, dz));
                }
            }
        }

        let chunk = self.slots[slot_index]
            .chunk
            .as_deref()
            .expect("occupied slot has a chunk");

        if chunk.loader_flags.contains(LoaderFlags::LIT_SELF)
            && !chunk.loader_flags.contains(LoaderFlags::FULLY_LIT)
        {
            let all_lit = (-1..=1).all(|dx| {
                (-1..=1).all(|dz| {
                    self.get_chunk_internal(pos.offset(dx, dz))
                        .is_some_and(|neighbour| {
                            neighbour.loader_flags.contains(LoaderFlags::LIT_SELF)
                        })
                })
            });
            if all_lit {
                let chunk = self.slots[slot_index]
                    .chunk
                    .as_deref_mut()
                    .expect("occupied slot has a chunk");
                chunk.loader_flags |= LoaderFlags::FULLY_LIT | LoaderFlags::READY;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_map() -> ChunkMap {
        ChunkMap::new(TaskQueue::start(2), std::env::temp_dir().join("ember-missing-world"))
    }

    fn drive(map: &mut ChunkMap, ticks: i64) {
        for tick in 0..ticks {
            map.tick_chunk_loader(1 + tick, Instant::now());
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn interest_creates_three_by_three() {
        let mut map = test_map();
        let centre = WorldChunkPos::new(1, 10, 10);
        map.add_chunk_interest(centre, 1);
        assert_eq!(map.len(), 9);

        let chunk = map.get_chunk_internal(centre).expect("centre exists");
        assert_eq!(chunk.interest_count, 1);
        assert_eq!(chunk.neighbour_interest_count, 0);

        for dx in -1..=1 {
            for dz in -1..=1 {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let chunk = map
                    .get_chunk_internal(centre.offset(dx, dz))
                    .expect("neighbour exists");
                assert_eq!(chunk.interest_count, 0);
                assert_eq!(chunk.neighbour_interest_count, 1);
            }
        }
    }

    #[test]
    fn release_unloads_everything() {
        let mut map = test_map();
        let centre = WorldChunkPos::new(1, 10, 10);
        map.add_chunk_interest(centre, 1);
        drive(&mut map, 50);
        map.add_chunk_interest(centre, -1);
        drive(&mut map, 50);
        assert!(map.is_empty());
    }

    #[test]
    fn centre_becomes_ready_without_region_files() {
        let mut map = test_map();
        let centre = WorldChunkPos::new(1, 0, 0);
        map.add_chunk_interest(centre, 1);
        drive(&mut map, 100);
        let chunk = map.get_chunk_if_loaded(centre).expect("centre ready");
        assert!(chunk.loader_flags.contains(LoaderFlags::READY));
        // A corner neighbour misses parts of its own 3x3, so it self-lit but
        // never became ready.
        let corner = map
            .get_chunk_internal(centre.offset(1, 1))
            .expect("corner exists");
        assert!(corner.loader_flags.contains(LoaderFlags::LIT_SELF));
        assert!(!corner.loader_flags.contains(LoaderFlags::READY));
    }

    #[test]
    fn collect_loaded_scans_rectangles() {
        let mut map = test_map();
        let centre = WorldChunkPos::new(1, 0, 0);
        map.add_chunk_interest(centre, 1);
        drive(&mut map, 100);

        let mut out = Vec::new();
        map.collect_loaded_chunks(centre.offset(-1, -1), centre.offset(1, 1), &mut out);
        assert_eq!(out.len(), 9);
        // Only the centre is ready; the zx-indexed middle slot holds it.
        assert_eq!(out[4], Some(centre));
        assert_eq!(out.iter().flatten().count(), 1);

        let mut changed = Vec::new();
        map.collect_changed_chunks(centre.offset(-1, -1), centre.offset(1, 1), &mut changed);
        assert!(changed.is_empty());
    }

    #[test]
    fn many_chunks_probe_and_remove_cleanly() {
        let mut map = test_map();
        for x in 0..20 {
            for z in 0..20 {
                map.add_chunk_interest(WorldChunkPos::new(1, x * 3, z * 3), 1);
            }
        }
        assert!(map.len() >= 400);
        for x in 0..20 {
            for z in 0..20 {
                assert!(
                    map.get_chunk_internal(WorldChunkPos::new(1, x * 3, z * 3))
                        .is_some()
                );
            }
        }
        for x in 0..20 {
            for z in 0..20 {
                map.add_chunk_interest(WorldChunkPos::new(1, x * 3, z * 3), -1);
            }
        }
        drive(&mut map, 500);
        assert!(map.is_empty(), "still {} chunks", map.len());
    }
}
