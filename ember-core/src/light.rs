//! The lighting engine.
//!
//! Operates on a 3x3 grid of chunks around a target: a 4x4 column grid times
//! 32 vertical slots, addressed with the same bit layout as the in-section
//! index so the BFS needs no coordinate conversions. Slots without a backing
//! chunk (or above the padding sections) read as full light and all-air;
//! since propagation refuses to raise a value that is not an improvement,
//! those slots are never written, which keeps light from leaking into or out
//! of unloaded terrain.
//!
//! Sky light 15 falls straight down without attenuation; every other step
//! costs one, plus the per-state reduction of the block entered. Whether a
//! face passes light at all is decided by the occlusion models on both sides.

use std::collections::VecDeque;

use ember_registry::{REGISTRY, shapes};
use ember_utils::types::{LIGHT_SECTIONS_PER_CHUNK, WORLD_HEIGHT};
use ember_utils::{BlockStateId, Direction, WorldChunkPos};

use crate::chunk::map::ChunkMap;
use crate::chunk::{Chunk, LoaderFlags, get_nibble, set_nibble};

/// 4x4 chunk columns times 32 vertical sections.
const GRID_SLOTS: usize = 16 * 32;

type LightRefs<'a> = [Option<&'a mut [u8; 2048]>; GRID_SLOTS];
type StateRefs<'a> = [Option<&'a [u16; 4096]>; GRID_SLOTS];

/// Grid slot for a position: `(y & 0x1F0) | ((z & 0x30) >> 2) | ((x & 0x30) >> 4)`.
#[inline]
fn grid_index(x: i32, y: i32, z: i32) -> usize {
    ((y & 0x1F0) | ((z & 0x30) >> 2) | ((x & 0x30) >> 4)) as usize
}

/// In-section nibble index, yzx.
#[inline]
fn pos_index(x: i32, y: i32, z: i32) -> usize {
    (((y & 0xF) << 8) | ((z & 0xF) << 4) | (x & 0xF)) as usize
}

/// Grid column of a chunk offset, both axes wrapped to two bits.
#[inline]
fn column_index(dx: i32, dz: i32) -> usize {
    (((dz & 0x3) << 2) | (dx & 0x3)) as usize
}

#[inline]
fn get_light(light: &LightRefs<'_>, x: i32, y: i32, z: i32) -> u8 {
    match &light[grid_index(x, y, z)] {
        Some(array) => get_nibble(array, pos_index(x, y, z)),
        // Missing slots are full light so nothing propagates into them.
        None => 15,
    }
}

#[inline]
fn get_state(states: &StateRefs<'_>, x: i32, y: i32, z: i32) -> BlockStateId {
    match &states[grid_index(x, y, z)] {
        Some(array) => BlockStateId(array[pos_index(x, y, z)]),
        None => BlockStateId::AIR,
    }
}

struct LightPass<'a, 'b> {
    light: &'b mut LightRefs<'a>,
    states: &'b StateRefs<'a>,
    queue: VecDeque<(u8, u16, u8)>,
}

impl LightPass<'_, '_> {
    /// Updates a neighbour's light and queues it when further propagation is
    /// needed.
    #[allow(clippy::too_many_arguments)]
    fn propagate(
        &mut self,
        from_x: i32,
        from_y: i32,
        from_z: i32,
        dx: i32,
        dy: i32,
        dz: i32,
        dir: Direction,
        from_state: BlockStateId,
        from_value: u8,
        reduction: u8,
    ) {
        let to_x = (from_x + dx) & 0x3F;
        let to_y = (from_y + dy) & 0x1FF;
        let to_z = (from_z + dz) & 0x3F;

        let stored = get_light(self.light, to_x, to_y, to_z);
        let spread = from_value.saturating_sub(reduction);
        // Early exit before the block lookup; this also refuses writes into
        // missing slots, which always store 15.
        if stored >= spread {
            return;
        }

        let to_state = get_state(self.states, to_x, to_y, to_z);
        let spread = from_value.saturating_sub(reduction.max(REGISTRY.light_block(to_state)));
        if stored >= spread {
            return;
        }

        if !shapes::light_can_propagate(
            REGISTRY.occlusion_model(from_state),
            REGISTRY.occlusion_model(to_state),
            dir,
        ) {
            return;
        }

        if let Some(array) = &mut self.light[grid_index(to_x, to_y, to_z)] {
            set_nibble(array, pos_index(to_x, to_y, to_z), spread);
        }
        self.queue.push_back((to_x as u8, to_y as u16, to_z as u8));
    }

    /// Drains the queue. Sky light keeps full strength straight down.
    fn run_to_quiescence(&mut self, sky: bool) {
        while let Some((x, y, z)) = self.queue.pop_front() {
            let (x, y, z) = (i32::from(x), i32::from(y), i32::from(z));
            let state = get_state(self.states, x, y, z);
            let value = get_light(self.light, x, y, z);

            self.propagate(x, y, z, -1, 0, 0, Direction::West, state, value, 1);
            self.propagate(x, y, z, 1, 0, 0, Direction::East, state, value, 1);
            self.propagate(x, y, z, 0, 0, -1, Direction::North, state, value, 1);
            self.propagate(x, y, z, 0, 0, 1, Direction::South, state, value, 1);
            let down_cost = if sky && value == 15 { 0 } else { 1 };
            self.propagate(x, y, z, 0, -1, 0, Direction::Down, state, value, down_cost);
            self.propagate(x, y, z, 0, 1, 0, Direction::Up, state, value, 1);
        }
    }

    /// Walks the shared edge column of a self-lit neighbour and propagates
    /// inward. Diagonal neighbours are reached transitively through the
    /// sides.
    #[allow(clippy::too_many_arguments)]
    fn exchange_border(
        &mut self,
        present: &[bool; 16],
        base_x: i32,
        base_z: i32,
        add_x: i32,
        add_z: i32,
        chunk_dx: i32,
        chunk_dz: i32,
        dir: Direction,
    ) {
        if !present[column_index(chunk_dx, chunk_dz)] {
            // Absent chunks read full light; that must not leak inward.
            return;
        }
        let top = LIGHT_SECTIONS_PER_CHUNK as i32 * 16 - 1;
        for y in (0..=top).rev() {
            let mut x = (16 * chunk_dx + base_x) & 0x3F;
            let mut z = (16 * chunk_dz + base_z) & 0x3F;
            for _ in 0..16 {
                let value = get_light(self.light, x, y, z);
                let state = get_state(self.states, x, y, z);
                self.propagate(
                    x,
                    y,
                    z,
                    -chunk_dx,
                    0,
                    -chunk_dz,
                    dir.opposite(),
                    state,
                    value,
                    1,
                );
                x = (x + add_x) & 0x3F;
                z = (z + add_z) & 0x3F;
            }
        }
    }
}

struct LightBuffers<'a> {
    sky: LightRefs<'a>,
    block: LightRefs<'a>,
    states: StateRefs<'a>,
    present: [bool; 16],
}

/// Runs the full self-light pass for `pos` and exchanges light with every
/// self-lit neighbour. Idempotent for unchanged terrain; re-running after a
/// new emitter appears raises the affected values.
pub fn light_chunk_and_exchange(map: &mut ChunkMap, pos: WorldChunkPos) {
    let positions: [WorldChunkPos; 9] = {
        let mut all = [pos; 9];
        let mut index = 0;
        for dz in -1..=1 {
            for dx in -1..=1 {
                all[index] = pos.offset(dx, dz);
                index += 1;
            }
        }
        all
    };
    let chunks = map.get_disjoint_internal_mut(positions);

    let mut buffers = LightBuffers {
        sky: std::array::from_fn(|_| None),
        block: std::array::from_fn(|_| None),
        states: std::array::from_fn(|_| None),
        present: [false; 16],
    };

    for (slot, chunk_pos) in chunks.into_iter().zip(positions) {
        let Some(chunk) = slot else { continue };
        let is_target = chunk_pos == pos;
        // Only the target and self-lit neighbours join the grid; everything
        // else stays missing so light cannot cross into it.
        if !is_target && !chunk.loader_flags.contains(LoaderFlags::LIT_SELF) {
            continue;
        }
        if chunk.light_sections.len() != LIGHT_SECTIONS_PER_CHUNK {
            if is_target {
                // Nothing to light yet; the lifecycle will come back.
                return;
            }
            continue;
        }

        let dx = chunk_pos.x - pos.x;
        let dz = chunk_pos.z - pos.z;
        let column = column_index(dx, dz);
        buffers.present[column] = true;

        let Chunk {
            sections,
            light_sections,
            ..
        } = chunk;
        for (section_index, section) in sections.iter().enumerate() {
            if let Some(blocks) = section.blocks.raw() {
                // Block sections sit one light section above the bottom pad.
                buffers.states[((section_index + 1) << 4) | column] = Some(blocks);
            }
        }
        for (section_index, light) in light_sections.iter_mut().enumerate() {
            buffers.sky[(section_index << 4) | column] = Some(&mut light.sky);
            buffers.block[(section_index << 4) | column] = Some(&mut light.block);
        }
    }

    if !buffers.present[column_index(0, 0)] {
        return;
    }

    // Sky light: seed every column from above the top padding section, where
    // the missing slots read 15, and let it fall.
    let mut pass = LightPass {
        light: &mut buffers.sky,
        states: &buffers.states,
        queue: VecDeque::with_capacity(1 << 16),
    };
    let seed_y = (WORLD_HEIGHT + 32) as u16;
    for zx in 0..256u16 {
        pass.queue
            .push_back(((zx & 0xF) as u8, seed_y, (zx >> 4) as u8));
    }
    pass.run_to_quiescence(true);

    pass.exchange_border(&buffers.present, 15, 0, 0, 1, -1, 0, Direction::West);
    pass.exchange_border(&buffers.present, 0, 0, 0, 1, 1, 0, Direction::East);
    pass.exchange_border(&buffers.present, 0, 15, 1, 0, 0, -1, Direction::North);
    pass.exchange_border(&buffers.present, 0, 0, 1, 0, 0, 1, Direction::South);
    pass.run_to_quiescence(true);
    let queue = std::mem::take(&mut pass.queue);

    // Block light: seed every emitting state of the target chunk.
    let mut pass = LightPass {
        light: &mut buffers.block,
        states: &buffers.states,
        queue,
    };
    for y in 16..16 + WORLD_HEIGHT {
        for zx in 0..256 {
            let (x, z) = (zx & 0xF, zx >> 4);
            let state = get_state(pass.states, x, y, z);
            let emitted = REGISTRY.emission(state);
            if emitted > 0 {
                if let Some(array) = &mut pass.light[grid_index(x, y, z)] {
                    set_nibble(array, pos_index(x, y, z), emitted);
                }
                pass.queue.push_back((x as u8, y as u16, z as u8));
            }
        }
    }
    pass.run_to_quiescence(false);

    pass.exchange_border(&buffers.present, 15, 0, 0, 1, -1, 0, Direction::West);
    pass.exchange_border(&buffers.present, 0, 0, 0, 1, 1, 0, Direction::East);
    pass.exchange_border(&buffers.present, 0, 15, 1, 0, 0, -1, Direction::North);
    pass.exchange_border(&buffers.present, 0, 0, 1, 0, 0, 1, Direction::South);
    pass.run_to_quiescence(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_utils::types::SECTIONS_PER_CHUNK;

    #[test]
    fn grid_index_layout() {
        // Centre chunk, bottom section.
        assert_eq!(grid_index(0, 0, 0), 0);
        // dx = +1 neighbour occupies column 1.
        assert_eq!(grid_index(16, 0, 0), 1);
        // dx = -1 wraps to column 3.
        assert_eq!(grid_index(-1 & 0x3F, 0, 0), 3);
        // One section up adds 16.
        assert_eq!(grid_index(0, 16, 0), 16);
        // Top seeding row sits in vertical slot 26, above the padding.
        let seed_y = WORLD_HEIGHT + 32;
        assert_eq!(grid_index(0, seed_y, 0) >> 4, 26);
        assert!(grid_index(0, seed_y, 0) < GRID_SLOTS);
    }

    #[test]
    fn seed_section_is_above_real_sections() {
        assert_eq!(LIGHT_SECTIONS_PER_CHUNK, SECTIONS_PER_CHUNK + 2);
        assert_eq!((WORLD_HEIGHT + 32) >> 4, LIGHT_SECTIONS_PER_CHUNK as i32);
    }
}
