//! World-level block access: chunk resolution plus the authoritative
//! get/set wrappers gameplay code uses. Reads of unloaded chunks report the
//! unknown-block placeholder; writes to them fail soft.

use ember_protocol::packets::clientbound::LEVEL_EVENT_DESTROY_BLOCK;
use ember_registry::{BlockTag, REGISTRY, vanilla_blocks};
use ember_utils::{BlockStateId, Direction, WorldBlockPos};

use crate::block::update::ScheduledUpdate;
use crate::chunk::map::ChunkMap;
use crate::chunk::{LocalEvent, SetBlockResult};

/// The world state owned by the tick thread.
pub struct World {
    /// The chunk index and lifecycle.
    pub chunks: ChunkMap,
    /// Pending scheduled block updates, drained by `for_tick`.
    pub scheduled_updates: Vec<ScheduledUpdate>,
    /// The current tick number. Starts above zero so tick-scoped state never
    /// collides with the zero-initialised change tracking.
    pub current_tick: i64,
}

impl World {
    /// Creates a world around a chunk map.
    #[must_use]
    pub fn new(chunks: ChunkMap) -> Self {
        Self {
            chunks,
            scheduled_updates: Vec::new(),
            current_tick: 10,
        }
    }

    /// The placeholder state reported for unloaded chunks.
    #[must_use]
    pub fn unknown_state() -> BlockStateId {
        REGISTRY.default_state(vanilla_blocks::UNKNOWN)
    }

    /// Reads a block. Never fails: unloaded chunks read as unknown, out of
    /// range reads as the air variants.
    #[must_use]
    pub fn get_block_state(&self, pos: WorldBlockPos) -> BlockStateId {
        match self.chunks.get_chunk_if_loaded(pos.chunk()) {
            Some(chunk) => chunk.get_block_state(pos.pos),
            None => Self::unknown_state(),
        }
    }

    /// Writes a block. Fails soft when the chunk is not ready.
    pub fn set_block_state(&mut self, pos: WorldBlockPos, state: BlockStateId) -> SetBlockResult {
        let chunk_pos = pos.chunk();
        let current_tick = self.current_tick;
        let Some(chunk) = self.chunks.get_chunk_if_loaded_mut(chunk_pos) else {
            let unknown = Self::unknown_state();
            return SetBlockResult {
                old_state: unknown,
                new_state: unknown,
                failed: true,
            };
        };
        let (result, newly_changed) = chunk.set_block_state(pos.pos, state, current_tick);
        if newly_changed {
            self.chunks.mark_chunk_changed(chunk_pos);
        }
        result
    }

    /// Breaks a block to air, emitting destroy particles for everything but
    /// fire.
    pub fn break_block(&mut self, pos: WorldBlockPos) -> SetBlockResult {
        let old_state = self.get_block_state(pos);
        let block = REGISTRY.block_of_state(old_state);
        if !REGISTRY.has_tag(block, BlockTag::FIRE) {
            let current_tick = self.current_tick;
            if let Some(chunk) = self.chunks.get_chunk_if_loaded_mut(pos.chunk()) {
                chunk.push_local_event(
                    LocalEvent {
                        kind: LEVEL_EVENT_DESTROY_BLOCK,
                        pos: pos.pos,
                        data: i32::from(old_state.0),
                    },
                    current_tick,
                );
            }
        }
        self.set_block_state(pos, BlockStateId::AIR)
    }

    /// Schedules a future block update. The list grows as needed; delays
    /// below one tick are rejected.
    pub fn schedule_block_update(&mut self, pos: WorldBlockPos, from_direction: Direction, delay: i64) {
        debug_assert!(delay >= 1);
        let delay = delay.max(1);
        self.scheduled_updates.push(ScheduledUpdate {
            pos,
            from_direction,
            for_tick: self.current_tick + delay,
        });
    }
}
