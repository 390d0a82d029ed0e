//! Chunk storage: block sections, light sections, the motion-blocking height
//! map, per-tick change tracking and the cross-thread load handshake.

pub mod change_set;
pub mod loader;
pub mod map;

use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use ember_utils::locks::SyncMutex;
use ember_utils::types::{
    LIGHT_SECTIONS_PER_CHUNK, MAX_WORLD_Y, MIN_WORLD_Y, SECTIONS_PER_CHUNK, section_index,
};
use ember_utils::{BlockPos, BlockStateId, WorldChunkPos};

use crate::chunk::change_set::ChangeSet;

/// Set by the loader task once the chunk data is in place (release store).
pub const ATOMIC_FINISHED_LOAD: u32 = 1 << 0;
/// Set together with the finished bit when the load parsed successfully.
pub const ATOMIC_LOAD_SUCCESS: u32 = 1 << 1;

bitflags::bitflags! {
    /// Main-thread-only lifecycle flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoaderFlags: u32 {
        /// The chunk already sits in the update-request queue.
        const REQUESTING_UPDATE = 1 << 0;
        /// A load task has been submitted.
        const STARTED_LOAD = 1 << 1;
        /// The tick thread observed the atomic finished bit.
        const FINISHED_LOAD = 1 << 2;
        /// The load parsed successfully.
        const LOAD_SUCCESS = 1 << 3;
        /// The chunk ran its own light pass.
        const LIT_SELF = 1 << 4;
        /// All 8 neighbours (and the chunk itself) are self-lit.
        const FULLY_LIT = 1 << 5;
        /// Visible to gameplay lookups.
        const READY = 1 << 6;
    }
}

/// Block storage of one 16x16x16 section: either the null section (all air,
/// no heap storage) or an owned 4096-entry buffer of state indices in yzx
/// order.
#[derive(Debug, Default)]
pub struct SectionBlocks(Option<Box<[u16; 4096]>>);

impl SectionBlocks {
    /// Whether this is the null section.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Reads a state by yzx index. The null section reads as air.
    #[must_use]
    pub fn get(&self, index: usize) -> BlockStateId {
        match &self.0 {
            Some(blocks) => BlockStateId(blocks[index]),
            None => BlockStateId::AIR,
        }
    }

    /// Writes a state by yzx index, allocating the buffer on the first
    /// non-air write.
    pub fn set(&mut self, index: usize, state: BlockStateId) {
        debug_assert!(index < 4096);
        if self.0.is_none() {
            if state.is_air() {
                return;
            }
            self.0 = Some(alloc_section_blocks());
        }
        if let Some(blocks) = &mut self.0 {
            blocks[index] = state.0;
        }
    }

    /// Drops the backing buffer, returning the section to null.
    pub fn free(&mut self) {
        if self.0.take().is_some() {
            note_section_blocks_freed();
        }
    }

    /// Direct access to the raw buffer, if allocated.
    #[must_use]
    pub fn raw(&self) -> Option<&[u16; 4096]> {
        self.0.as_deref()
    }
}

/// One block section plus its bookkeeping.
#[derive(Debug, Default)]
pub struct ChunkSection {
    /// The block states.
    pub blocks: SectionBlocks,
    /// Number of non-air cells; zero iff the section is null.
    pub non_air_count: u16,
    /// Tick-scoped set of changed in-section indices.
    pub changed_set: Option<ChangeSet>,
}

/// Light storage of one section: sky and block nibble arrays, yzx order.
#[derive(Debug)]
pub struct LightSection {
    /// Sky light, 4 bits per cell.
    pub sky: Box<[u8; 2048]>,
    /// Block light, 4 bits per cell.
    pub block: Box<[u8; 2048]>,
}

impl LightSection {
    /// Allocates an all-zero light section.
    #[must_use]
    pub fn zeroed() -> Self {
        note_section_light_allocated();
        Self {
            sky: Box::new([0; 2048]),
            block: Box::new([0; 2048]),
        }
    }
}

/// Reads a 4-bit light value from a nibble array.
#[must_use]
pub fn get_nibble(array: &[u8; 2048], index: usize) -> u8 {
    let shift = (index & 1) * 4;
    (array[index / 2] >> shift) & 0xF
}

/// Writes a 4-bit light value into a nibble array.
pub fn set_nibble(array: &mut [u8; 2048], index: usize, value: u8) {
    let shift = (index & 1) * 4;
    let mask = 0xF0 >> shift;
    array[index / 2] = (array[index / 2] & mask) | (value << shift);
}

/// An in-chunk event emitted this tick, flushed to nearby clients.
#[derive(Debug, Clone, Copy)]
pub struct LocalEvent {
    /// Wire-level event id.
    pub kind: i32,
    /// World block position.
    pub pos: BlockPos,
    /// Event payload (block state for destroy particles).
    pub data: i32,
}

/// Capacity of the per-chunk local event ring.
pub const MAX_LOCAL_EVENTS: usize = 64;

/// Capacity of the inline block-entity table.
pub const MAX_BLOCK_ENTITIES: usize = 10;

/// Kinds of block entities the engine recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockEntityKind {
    /// Empty slot marker.
    #[default]
    Null,
    /// A container whose stored power is not yet modelled.
    Container,
}

/// One inline block-entity slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockEntitySlot {
    /// Whether the slot is occupied.
    pub in_use: bool,
    /// In-chunk x, 0..16.
    pub x: u8,
    /// Absolute y.
    pub y: i32,
    /// In-chunk z, 0..16.
    pub z: u8,
    /// The stored kind.
    pub kind: BlockEntityKind,
}

/// The cross-thread load handshake. The loader fills `result` and then
/// release-stores the finished bit; the tick thread acquires the bit and
/// takes the result.
#[derive(Debug)]
pub struct LoadSlot {
    /// `ATOMIC_FINISHED_LOAD` and `ATOMIC_LOAD_SUCCESS`.
    pub flags: AtomicU32,
    /// The populated data, present once the finished bit is observable.
    pub result: SyncMutex<Option<Box<LoadedChunkData>>>,
}

impl LoadSlot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            flags: AtomicU32::new(0),
            result: SyncMutex::new(None),
        })
    }
}

/// Everything a load task produces. Built entirely on the worker thread;
/// no other thread sees it before publication.
#[derive(Debug)]
pub struct LoadedChunkData {
    /// Block state buffers plus their non-air counts.
    pub sections: Vec<(SectionBlocks, u16)>,
    /// Zeroed (or future: stored) light sections.
    pub light_sections: Vec<LightSection>,
    /// Motion-blocking height map, zx order.
    pub height_map: [i16; 256],
}

impl LoadedChunkData {
    /// Empty data used for absent or failed chunks.
    #[must_use]
    pub fn empty() -> Box<Self> {
        Box::new(Self {
            sections: (0..SECTIONS_PER_CHUNK)
                .map(|_| (SectionBlocks::default(), 0))
                .collect(),
            light_sections: (0..LIGHT_SECTIONS_PER_CHUNK)
                .map(|_| LightSection::zeroed())
                .collect(),
            height_map: [MIN_WORLD_Y as i16; 256],
        })
    }
}

/// The outcome of a block write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBlockResult {
    /// The state before the write.
    pub old_state: BlockStateId,
    /// The state after the write.
    pub new_state: BlockStateId,
    /// Whether the write was rejected.
    pub failed: bool,
}

/// One chunk column.
pub struct Chunk {
    /// The chunk position.
    pub pos: WorldChunkPos,
    /// Block sections, bottom up.
    pub sections: Vec<ChunkSection>,
    /// Light sections including the two padding sections; empty until the
    /// load publishes.
    pub light_sections: Vec<LightSection>,
    /// Height of the highest non-air block plus one per column, zx order.
    pub motion_blocking_height_map: [i16; 256],
    /// Inline block-entity table.
    pub block_entities: [BlockEntitySlot; MAX_BLOCK_ENTITIES],
    /// Events emitted this tick.
    pub local_events: Vec<LocalEvent>,
    /// Tick of the newest local event; stale events are discarded lazily.
    pub last_local_event_tick: i64,
    /// Tick of the newest block change.
    pub last_block_change_tick: i64,
    /// Bitmap of sections with changes this tick.
    pub changed_sections: u32,
    /// The async load handshake.
    pub load_slot: Arc<LoadSlot>,
    /// Main-thread lifecycle flags.
    pub loader_flags: LoaderFlags,
    /// Players and other actors wanting this chunk.
    pub interest_count: i32,
    /// Propagated interest from the 8 surrounding chunks.
    pub neighbour_interest_count: i32,
}

impl Chunk {
    /// Creates an empty shell for the given position.
    #[must_use]
    pub fn shell(pos: WorldChunkPos) -> Self {
        Self {
            pos,
            sections: (0..SECTIONS_PER_CHUNK).map(|_| ChunkSection::default()).collect(),
            light_sections: Vec::new(),
            motion_blocking_height_map: [MIN_WORLD_Y as i16; 256],
            block_entities: [BlockEntitySlot::default(); MAX_BLOCK_ENTITIES],
            local_events: Vec::new(),
            last_local_event_tick: 0,
            last_block_change_tick: 0,
            changed_sections: 0,
            load_slot: LoadSlot::new(),
            loader_flags: LoaderFlags::empty(),
            interest_count: 0,
            neighbour_interest_count: 0,
        }
    }

    /// Installs published load data.
    pub fn install_load(&mut self, data: Box<LoadedChunkData>) {
        let LoadedChunkData {
            sections,
            light_sections,
            height_map,
        } = *data;
        for (section, (blocks, non_air)) in self.sections.iter_mut().zip(sections) {
            section.blocks = blocks;
            section.non_air_count = non_air;
        }
        self.light_sections = light_sections;
        self.motion_blocking_height_map = height_map;
    }

    /// Reads a block. Below the world reads as void air, above as air.
    #[must_use]
    pub fn get_block_state(&self, pos: BlockPos) -> BlockStateId {
        use ember_registry::{REGISTRY, vanilla_blocks};
        if pos.y < MIN_WORLD_Y {
            return REGISTRY.default_state(vanilla_blocks::VOID_AIR);
        }
        if pos.y > MAX_WORLD_Y {
            return BlockStateId::AIR;
        }
        let section = &self.sections[((pos.y - MIN_WORLD_Y) >> 4) as usize];
        section.blocks.get(section_index(pos.x, pos.y, pos.z))
    }

    /// Writes a block, maintaining the non-air count, height map and change
    /// tracking. Returns the result plus whether this is the chunk's first
    /// change of the tick (the caller appends it to the changed list).
    pub fn set_block_state(
        &mut self,
        pos: BlockPos,
        state: BlockStateId,
        current_tick: i64,
    ) -> (SetBlockResult, bool) {
        use ember_registry::REGISTRY;

        if pos.y < MIN_WORLD_Y || pos.y > MAX_WORLD_Y || state.0 >= REGISTRY.state_count() {
            let old = self.get_block_state(pos);
            return (
                SetBlockResult {
                    old_state: old,
                    new_state: old,
                    failed: true,
                },
                false,
            );
        }
        debug_assert!(self.loader_flags.contains(LoaderFlags::READY));

        let section_idx = ((pos.y - MIN_WORLD_Y) >> 4) as usize;
        let index = section_index(pos.x, pos.y, pos.z);
        let section = &mut self.sections[section_idx];

        let old_state = section.blocks.get(index);
        if old_state.is_air() && !state.is_air() {
            section.non_air_count += 1;
        }
        if !old_state.is_air() && state.is_air() {
            section.non_air_count -= 1;
        }
        section.blocks.set(index, state);
        if section.non_air_count == 0 {
            section.blocks.free();
        }

        self.update_height_map(pos, state);

        // Change tracking. The sets are tick-scoped: the first change of a
        // new tick resets the section bitmap and every set is re-created on
        // first touch.
        let newly_changed = self.last_block_change_tick != current_tick;
        if newly_changed {
            self.last_block_change_tick = current_tick;
            self.changed_sections = 0;
        }
        let section = &mut self.sections[section_idx];
        if self.changed_sections & (1 << section_idx) == 0 {
            self.changed_sections |= 1 << section_idx;
            section.changed_set = Some(ChangeSet::new());
        }
        if let Some(set) = &mut section.changed_set {
            set.insert(index as u16);
        }

        (
            SetBlockResult {
                old_state,
                new_state: state,
                failed: false,
            },
            newly_changed,
        )
    }

    fn update_height_map(&mut self, pos: BlockPos, state: BlockStateId) {
        let column = (((pos.z & 0xF) << 4) | (pos.x & 0xF)) as usize;
        let stored = i32::from(self.motion_blocking_height_map[column]);
        if pos.y + 1 == stored {
            if state.is_air() {
                let mut new_height = MIN_WORLD_Y;
                for lower_y in (MIN_WORLD_Y..pos.y).rev() {
                    if !self
                        .get_block_state(BlockPos::new(pos.x, lower_y, pos.z))
                        .is_air()
                    {
                        new_height = lower_y + 1;
                        break;
                    }
                }
                self.motion_blocking_height_map[column] = new_height as i16;
            }
        } else if pos.y >= stored && !state.is_air() {
            self.motion_blocking_height_map[column] = (pos.y + 1) as i16;
        }
    }

    /// Recomputes the whole height map from the sections, skipping empty
    /// sections from the top.
    pub fn recalculate_height_map(&mut self) {
        recalculate_height_map(&self.sections, &mut self.motion_blocking_height_map);
    }

    /// Records a local event, dropping it when the ring is full. Events of a
    /// previous tick are discarded first.
    pub fn push_local_event(&mut self, event: LocalEvent, current_tick: i64) {
        if self.last_local_event_tick != current_tick {
            self.last_local_event_tick = current_tick;
            self.local_events.clear();
        }
        if self.local_events.len() < MAX_LOCAL_EVENTS {
            self.local_events.push(event);
        }
    }

    /// Finds or claims the block-entity slot at an in-chunk position.
    pub fn block_entity_at(&mut self, x: u8, y: i32, z: u8) -> Option<&mut BlockEntitySlot> {
        let mut free = None;
        for index in 0..self.block_entities.len() {
            let slot = &self.block_entities[index];
            if slot.in_use {
                if slot.x == x && slot.y == y && slot.z == z {
                    return Some(&mut self.block_entities[index]);
                }
            } else if free.is_none() {
                free = Some(index);
            }
        }
        let index = free?;
        let slot = &mut self.block_entities[index];
        slot.x = x;
        slot.y = y;
        slot.z = z;
        slot.kind = BlockEntityKind::Null;
        Some(slot)
    }

    /// Sky light at a world-space block position, 0 when unlit.
    #[must_use]
    pub fn sky_light(&self, pos: BlockPos) -> u8 {
        self.light_at(pos, true)
    }

    /// Block light at a world-space block position, 0 when unlit.
    #[must_use]
    pub fn block_light(&self, pos: BlockPos) -> u8 {
        self.light_at(pos, false)
    }

    fn light_at(&self, pos: BlockPos, sky: bool) -> u8 {
        if pos.y < MIN_WORLD_Y - 16 || pos.y > MAX_WORLD_Y + 16 {
            return 0;
        }
        let section_idx = ((pos.y - (MIN_WORLD_Y - 16)) >> 4) as usize;
        match self.light_sections.get(section_idx) {
            Some(section) => {
                let array = if sky { &section.sky } else { &section.block };
                get_nibble(array, section_index(pos.x, pos.y, pos.z))
            }
            None => 0,
        }
    }

    /// Frees all owned section storage. Called on unload.
    pub fn free_storage(&mut self) {
        for section in &mut self.sections {
            section.blocks.free();
            section.non_air_count = 0;
        }
        for _ in &self.light_sections {
            note_section_light_freed();
        }
        self.light_sections.clear();
    }
}

/// Height-map recomputation shared by the chunk and the loader.
pub fn recalculate_height_map(sections: &[ChunkSection], map: &mut [i16; 256]) {
    let mut highest = SECTIONS_PER_CHUNK as i32 - 1;
    while highest >= 0 && sections[highest as usize].non_air_count == 0 {
        highest -= 1;
    }

    for zx in 0..256 {
        map[zx] = MIN_WORLD_Y as i16;
        'column: for section_idx in (0..=highest).rev() {
            let section = &sections[section_idx as usize];
            if section.non_air_count == 0 {
                continue;
            }
            for y in (0..16).rev() {
                if !section.blocks.get(((y as usize) << 8) | zx).is_air() {
                    map[zx] = (MIN_WORLD_Y + (section_idx << 4) + y + 1) as i16;
                    break 'column;
                }
            }
        }
    }
}

// Section memory accounting, logged periodically by the chunk loader tick.
use std::sync::atomic::{AtomicI64, Ordering};

static SECTION_BLOCKS_MEMORY: AtomicI64 = AtomicI64::new(0);
static SECTION_LIGHT_MEMORY: AtomicI64 = AtomicI64::new(0);

fn alloc_section_blocks() -> Box<[u16; 4096]> {
    SECTION_BLOCKS_MEMORY.fetch_add(2 * 4096, Ordering::Relaxed);
    Box::new([0; 4096])
}

fn note_section_blocks_freed() {
    SECTION_BLOCKS_MEMORY.fetch_sub(2 * 4096, Ordering::Relaxed);
}

fn note_section_light_allocated() {
    SECTION_LIGHT_MEMORY.fetch_add(2 * 2048, Ordering::Relaxed);
}

fn note_section_light_freed() {
    SECTION_LIGHT_MEMORY.fetch_sub(2 * 2048, Ordering::Relaxed);
}

/// Current section memory usage in bytes: `(blocks, light)`.
#[must_use]
pub fn section_memory_usage() -> (i64, i64) {
    (
        SECTION_BLOCKS_MEMORY.load(Ordering::Relaxed),
        SECTION_LIGHT_MEMORY.load(Ordering::Relaxed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_chunk() -> Chunk {
        let mut chunk = Chunk::shell(WorldChunkPos::new(1, 0, 0));
        chunk.install_load(LoadedChunkData::empty());
        chunk.loader_flags |= LoaderFlags::READY;
        chunk
    }

    #[test]
    fn nibble_roundtrip() {
        let mut array = [0u8; 2048];
        for (index, value) in [(0usize, 15u8), (1, 7), (4095, 1), (2048, 9)] {
            set_nibble(&mut array, index, value);
            assert_eq!(get_nibble(&array, index), value);
        }
        // Neighbouring nibbles stay untouched.
        set_nibble(&mut array, 10, 0xF);
        set_nibble(&mut array, 11, 0x3);
        assert_eq!(get_nibble(&array, 10), 0xF);
        assert_eq!(get_nibble(&array, 11), 0x3);
    }

    #[test]
    fn null_section_reads_air() {
        let section = SectionBlocks::default();
        assert!(section.is_null());
        assert_eq!(section.get(123), BlockStateId::AIR);
    }

    #[test]
    fn set_then_get() {
        let mut chunk = ready_chunk();
        let pos = BlockPos::new(3, 100, 7);
        let state = BlockStateId(42);
        let (result, newly) = chunk.set_block_state(pos, state, 10);
        assert!(!result.failed);
        assert!(newly);
        assert_eq!(chunk.get_block_state(pos), state);
        // Second write in the same tick is not "newly changed".
        let (_, newly) = chunk.set_block_state(pos.offset(1, 0, 0), state, 10);
        assert!(!newly);
    }

    #[test]
    fn non_air_count_frees_section() {
        let mut chunk = ready_chunk();
        let pos = BlockPos::new(0, 0, 0);
        chunk.set_block_state(pos, BlockStateId(42), 10);
        let idx = ((0 - MIN_WORLD_Y) >> 4) as usize;
        assert_eq!(chunk.sections[idx].non_air_count, 1);
        assert!(!chunk.sections[idx].blocks.is_null());
        chunk.set_block_state(pos, BlockStateId::AIR, 10);
        assert_eq!(chunk.sections[idx].non_air_count, 0);
        assert!(chunk.sections[idx].blocks.is_null());
    }

    #[test]
    fn height_map_raises_and_rescans() {
        let mut chunk = ready_chunk();
        let column = ((7 & 0xF) << 4 | 3) as usize;
        chunk.set_block_state(BlockPos::new(3, 100, 7), BlockStateId(42), 10);
        assert_eq!(chunk.motion_blocking_height_map[column], 101);
        chunk.set_block_state(BlockPos::new(3, 100, 7), BlockStateId::AIR, 10);
        assert_eq!(chunk.motion_blocking_height_map[column], MIN_WORLD_Y as i16);
    }

    #[test]
    fn height_map_recompute_matches_incremental() {
        let mut chunk = ready_chunk();
        for (pos, state) in [
            (BlockPos::new(0, -64, 0), BlockStateId(42)),
            (BlockPos::new(0, 319, 0), BlockStateId(42)),
            (BlockPos::new(5, 64, 9), BlockStateId(7)),
            (BlockPos::new(5, 70, 9), BlockStateId(7)),
            (BlockPos::new(5, 70, 9), BlockStateId::AIR),
        ] {
            chunk.set_block_state(pos, state, 10);
        }
        let incremental = chunk.motion_blocking_height_map;
        chunk.recalculate_height_map();
        assert_eq!(incremental, chunk.motion_blocking_height_map);
        // Recomputing again is idempotent.
        let first = chunk.motion_blocking_height_map;
        chunk.recalculate_height_map();
        assert_eq!(first, chunk.motion_blocking_height_map);
    }

    #[test]
    fn out_of_range_write_fails_soft() {
        let mut chunk = ready_chunk();
        let (result, _) = chunk.set_block_state(
            BlockPos::new(0, MIN_WORLD_Y - 1, 0),
            BlockStateId(1),
            10,
        );
        assert!(result.failed);
        let (result, _) =
            chunk.set_block_state(BlockPos::new(0, MIN_WORLD_Y, 0), BlockStateId(1), 10);
        assert!(!result.failed);
    }

    #[test]
    fn block_entity_slots_reuse_by_position() {
        let mut chunk = ready_chunk();
        let slot = chunk.block_entity_at(3, 64, 9).expect("free slot");
        slot.in_use = true;
        slot.kind = BlockEntityKind::Container;

        let again = chunk.block_entity_at(3, 64, 9).expect("same slot");
        assert!(again.in_use);
        assert_eq!(again.kind, BlockEntityKind::Container);

        // The table is small and fixed; exhausting it fails soft.
        for index in 0..MAX_BLOCK_ENTITIES as u8 {
            if let Some(slot) = chunk.block_entity_at(index, 70, 0) {
                slot.in_use = true;
            }
        }
        assert!(chunk.block_entity_at(15, 80, 15).is_none());
    }

    #[test]
    fn local_events_reset_per_tick() {
        let mut chunk = ready_chunk();
        let event = LocalEvent {
            kind: 2001,
            pos: BlockPos::new(0, 0, 0),
            data: 0,
        };
        for _ in 0..100 {
            chunk.push_local_event(event, 5);
        }
        assert_eq!(chunk.local_events.len(), MAX_LOCAL_EVENTS);
        chunk.push_local_event(event, 6);
        assert_eq!(chunk.local_events.len(), 1);
    }
}
