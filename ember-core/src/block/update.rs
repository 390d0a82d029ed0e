//! The neighbour-update queue and behaviour dispatch.
//!
//! Updates flow through a bounded FIFO: entries are appended while the drain
//! walks the list front to back, so a cascade naturally proceeds in breadth
//! order. Pushing onto a full context silently drops the update; this trades
//! completeness of very large cascades for a bounded tick. Scheduled updates
//! live on the world and are drained when their tick arrives.

use ember_registry::REGISTRY;
use ember_utils::{Direction, WorldBlockPos};

use crate::block::behaviours;
use crate::world::World;

/// Default capacity of a per-cascade update context.
pub const MAX_BLOCK_UPDATES: usize = 512;

/// One pending neighbour update.
#[derive(Debug, Clone, Copy)]
pub struct BlockUpdate {
    /// The block to update.
    pub pos: WorldBlockPos,
    /// Direction from the updated block toward the neighbour that changed.
    pub from_direction: Direction,
}

/// A block update scheduled for a future tick.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledUpdate {
    /// The block to update.
    pub pos: WorldBlockPos,
    /// Direction recorded when the update was scheduled.
    pub from_direction: Direction,
    /// The tick the update runs in.
    pub for_tick: i64,
}

/// The bounded per-cascade update FIFO.
pub struct BlockUpdateContext {
    updates: Vec<BlockUpdate>,
    max_updates: usize,
}

impl Default for BlockUpdateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockUpdateContext {
    /// Creates a context with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_BLOCK_UPDATES)
    }

    /// Creates a context with an explicit capacity.
    #[must_use]
    pub fn with_capacity(max_updates: usize) -> Self {
        Self {
            updates: Vec::with_capacity(max_updates),
            max_updates,
        }
    }

    /// Number of queued updates (processed entries included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether nothing was queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Queues an update for `pos`. Dropped silently when full.
    pub fn push_update(&mut self, pos: WorldBlockPos, from_direction: Direction) {
        if self.updates.len() >= self.max_updates {
            return;
        }
        self.updates.push(BlockUpdate {
            pos,
            from_direction,
        });
    }

    /// Queues an update for the neighbour of `pos` in `dir`.
    pub fn push_neighbour_update(&mut self, pos: WorldBlockPos, dir: Direction) {
        self.push_update(pos.relative(dir), dir.opposite());
    }

    /// Queues updates for all six neighbours in the fixed update order.
    /// Either all six fit or none are queued.
    pub fn push_direct_neighbour_updates(&mut self, pos: WorldBlockPos) {
        if self.max_updates - self.updates.len() < 6 {
            return;
        }
        for dir in Direction::UPDATE_ORDER {
            self.updates.push(BlockUpdate {
                pos: pos.relative(dir),
                from_direction: dir.opposite(),
            });
        }
    }
}

/// Runs every behaviour of the block at `pos`, in registration order. All
/// behaviours run even when an earlier one changed the state; each fetches
/// the then-current state for itself. Returns the number of behaviours that
/// changed something.
pub fn update_block(
    world: &mut World,
    pos: WorldBlockPos,
    from_direction: Direction,
    is_delayed: bool,
    ctx: &mut BlockUpdateContext,
) -> u32 {
    let state = world.get_block_state(pos);
    let kinds = REGISTRY.block(REGISTRY.block_of_state(state)).behaviours;

    let mut changed = 0;
    for kind in kinds {
        if behaviours::run_behaviour(*kind, world, pos, from_direction, is_delayed, ctx) {
            changed += 1;
        }
    }
    changed
}

/// Drains the FIFO, dispatching each entry. Entries queued by the dispatched
/// behaviours are processed in the same drain.
pub fn propagate_block_updates(world: &mut World, ctx: &mut BlockUpdateContext) {
    let mut index = 0;
    while index < ctx.updates.len() {
        let update = ctx.updates[index];
        update_block(world, update.pos, update.from_direction, false, ctx);
        index += 1;
    }
}

/// Removes every scheduled update due this tick, runs each as a delayed
/// update, then drains the resulting cascade as ordinary updates.
pub fn propagate_delayed_block_updates(world: &mut World) {
    let mut ctx = BlockUpdateContext::new();

    let mut index = 0;
    while index < world.scheduled_updates.len() {
        let due = world.scheduled_updates[index];
        if due.for_tick != world.current_tick {
            index += 1;
            continue;
        }
        world.scheduled_updates.swap_remove(index);
        update_block(world, due.pos, due.from_direction, true, &mut ctx);
    }

    propagate_block_updates(world, &mut ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_utils::WorldBlockPos;

    #[test]
    fn full_context_drops_silently() {
        let mut ctx = BlockUpdateContext::with_capacity(8);
        let pos = WorldBlockPos::new(1, 0, 64, 0);
        for index in 0..20 {
            ctx.push_update(pos.relative(Direction::Up), Direction::ALL[index % 6]);
        }
        assert_eq!(ctx.len(), 8);
    }

    #[test]
    fn direct_neighbours_all_or_nothing() {
        let mut ctx = BlockUpdateContext::with_capacity(8);
        let pos = WorldBlockPos::new(1, 0, 64, 0);
        ctx.push_update(pos, Direction::Up);
        ctx.push_update(pos, Direction::Up);
        ctx.push_update(pos, Direction::Up);
        // 5 slots left: the six-way push refuses entirely.
        ctx.push_direct_neighbour_updates(pos);
        assert_eq!(ctx.len(), 3);
        let mut roomy = BlockUpdateContext::with_capacity(8);
        roomy.push_direct_neighbour_updates(pos);
        assert_eq!(roomy.len(), 6);
        // The first queued neighbour lies in -x, per the update order.
        assert_eq!(roomy.updates[0].pos, pos.relative(Direction::West));
        assert_eq!(roomy.updates[0].from_direction, Direction::East);
    }
}
