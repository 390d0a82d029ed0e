//! Player controllers: the per-client chunk cache, inbound action handling
//! and outbound packet production. The network front-end hands fully
//! handshaken sessions to the tick thread through the join queue; from then
//! on the tick thread owns the session and the network tasks only shuttle
//! bytes.

use ember_protocol::frame::CompressionSettings;
use ember_protocol::packets::clientbound::{
    CBlockChangedAck, CBlockUpdate, CForgetLevelChunk, CKeepAlive, CLevelChunkWithLight,
    CLevelEvent, CMoveEntityPos, CMoveEntityPosRot, CMoveEntityRot, CPlayerPosition,
    CSectionBlocksUpdate, CSetChunkCacheCentre, CSetChunkCacheRadius, CSetDefaultSpawn,
    CTeleportEntity, ChunkSectionData, SectionBlockChange, SectionStates,
};
use ember_protocol::packets::serverbound::{PlayerActionKind, ServerboundPacket};
use ember_protocol::{ClientPacket, encode_frame, encode_packet};
use ember_registry::REGISTRY;
use ember_registry::items::ItemId;
use ember_utils::types::{MIN_WORLD_Y, SECTIONS_PER_CHUNK};
use ember_utils::{BlockPos, BlockStateId, WorldBlockPos, WorldChunkPos};
use uuid::Uuid;

use crate::block::update::{BlockUpdateContext, propagate_block_updates, update_block};
use crate::chunk::{Chunk, LoaderFlags};
use crate::entity::{ChangedData, EntityId, EntityKind, EntityPool, MAX_ENTITIES};
use crate::world::World;

/// Upper bound on the client render distance.
pub const MAX_RENDER_DISTANCE: i32 = 32;
/// Server-side cache radius cap: render distance plus the lighting border.
pub const MAX_CHUNK_CACHE_RADIUS: i32 = MAX_RENDER_DISTANCE + 1;
/// Diameter of the per-player chunk cache bitmap.
pub const MAX_CHUNK_CACHE_DIAM: i32 = 2 * MAX_CHUNK_CACHE_RADIUS + 1;

/// Full chunk packets sent to one player per tick.
const CHUNK_SEND_BUDGET: usize = 16;
/// Keep-alive interval in ticks.
const KEEP_ALIVE_INTERVAL: i64 = 10 * 20;
/// Ticks after which a tracked entity is teleport-synced regardless of
/// accumulated error.
const TRACKED_UPDATE_INTERVAL: i64 = 60;

/// The hotbar every player carries; inventory is not modelled, but placement
/// needs a held item.
pub const DEMO_HOTBAR: [&str; 9] = [
    "stone",
    "redstone",
    "lever",
    "torch",
    "oak_fence",
    "glass",
    "glowstone",
    "cactus",
    "sugar_cane",
];

/// Fixed world spawn.
pub const SPAWN: (f64, f64, f64) = (8.5, 80.0, 8.5);
/// The world players join.
pub const SPAWN_WORLD_ID: i32 = 1;

bitflags::bitflags! {
    /// Per-chunk cache entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CacheFlags: u8 {
        /// The full chunk packet went out.
        const SENT = 1 << 0;
        /// Interest is held on the chunk.
        const ADDED_INTEREST = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Controller state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerFlags: u32 {
        /// The play-state init packets went out.
        const DID_INIT_PACKETS = 1 << 0;
        /// The client answered the last keep-alive.
        const GOT_ALIVE_RESPONSE = 1 << 1;
        /// A teleport awaits client confirmation.
        const AWAITING_TELEPORT = 1 << 2;
        /// The session is dead and will be reaped this tick.
        const SHOULD_DISCONNECT = 1 << 3;
    }
}

/// A fully handshaken session handed over by the network thread.
#[allow(missing_docs)]
pub struct JoinRequest {
    pub uuid: Uuid,
    pub username: String,
    pub locale: String,
    /// The client's requested render distance.
    pub view_distance: i32,
    pub compression: Option<CompressionSettings>,
    /// Framed bytes out to the connection's writer task.
    pub outbound: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    /// Decoded play packets in from the reader task.
    pub inbound: tokio::sync::mpsc::UnboundedReceiver<ServerboundPacket>,
}

/// The join queue: network producers, tick-thread consumer. Pushes fail when
/// the queue is full.
pub type JoinQueue = crossbeam::queue::ArrayQueue<JoinRequest>;

/// Last state sent to the client for one entity.
#[derive(Debug, Clone, Copy, Default)]
struct TrackedEntity {
    entity_id: EntityId,
    last_sent_x: f64,
    last_sent_y: f64,
    last_sent_z: f64,
    last_sent_y_rot: u8,
    last_sent_x_rot: u8,
    last_update_tick: i64,
}

/// One connected player.
#[allow(missing_docs)]
pub struct PlayerController {
    pub uuid: Uuid,
    pub username: String,
    pub locale: String,
    pub entity_id: EntityId,
    pub flags: PlayerFlags,

    compression: Option<CompressionSettings>,
    outbound: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    inbound: tokio::sync::mpsc::UnboundedReceiver<ServerboundPacket>,

    /// Render distance plus one, capped.
    pub chunk_cache_radius: i32,
    /// Applied on the next cache shift.
    pub next_chunk_cache_radius: i32,
    pub chunk_cache_centre: WorldChunkPos,
    chunk_cache: Box<[CacheFlags]>,

    /// Blocks this client changed this tick, echoed back authoritatively.
    changed_blocks: Vec<WorldBlockPos>,
    /// Newest action sequence number to acknowledge; -1 when none.
    last_acked_block_change: i32,

    tracked_entities: Box<[TrackedEntity]>,
    last_keep_alive_tick: i64,
    sent_keep_alive: bool,
    next_teleport_id: i32,
    /// Selected hotbar slot.
    pub held_slot: usize,
}

fn cache_index(centre: WorldChunkPos, pos: WorldChunkPos) -> Option<usize> {
    let dx = pos.x - centre.x + MAX_CHUNK_CACHE_RADIUS;
    let dz = pos.z - centre.z + MAX_CHUNK_CACHE_RADIUS;
    if pos.world_id != centre.world_id
        || !(0..MAX_CHUNK_CACHE_DIAM).contains(&dx)
        || !(0..MAX_CHUNK_CACHE_DIAM).contains(&dz)
    {
        return None;
    }
    Some((dz * MAX_CHUNK_CACHE_DIAM + dx) as usize)
}

/// Ring offsets of the square of radius `radius`, centre outward.
fn spiral_offsets(radius: i32) -> impl Iterator<Item = (i32, i32)> {
    (0..=radius).flat_map(move |ring| {
        (-ring..=ring).flat_map(move |dx| {
            (-ring..=ring).filter_map(move |dz| {
                (dx.abs().max(dz.abs()) == ring).then_some((dx, dz))
            })
        })
    })
}

impl PlayerController {
    /// Builds a controller from a join request plus its freshly reserved
    /// player entity.
    #[must_use]
    pub fn new(request: JoinRequest, entity_id: EntityId, current_tick: i64) -> Self {
        let radius = (request.view_distance.clamp(2, MAX_RENDER_DISTANCE)) + 1;
        Self {
            uuid: request.uuid,
            username: request.username,
            locale: request.locale,
            entity_id,
            flags: PlayerFlags::default(),
            compression: request.compression,
            outbound: request.outbound,
            inbound: request.inbound,
            chunk_cache_radius: radius,
            next_chunk_cache_radius: radius,
            chunk_cache_centre: WorldChunkPos::new(0, 0, 0),
            chunk_cache: vec![
                CacheFlags::default();
                (MAX_CHUNK_CACHE_DIAM * MAX_CHUNK_CACHE_DIAM) as usize
            ]
            .into_boxed_slice(),
            changed_blocks: Vec::with_capacity(8),
            last_acked_block_change: -1,
            tracked_entities: vec![TrackedEntity::default(); MAX_ENTITIES].into_boxed_slice(),
            last_keep_alive_tick: current_tick,
            sent_keep_alive: false,
            next_teleport_id: 0,
            held_slot: 0,
        }
    }

    /// Serializes, frames and queues one packet. A dead connection marks the
    /// session for reaping.
    pub fn send_packet<P: ClientPacket>(&mut self, packet: &P) {
        let Ok(payload) = encode_packet(packet) else {
            self.flags |= PlayerFlags::SHOULD_DISCONNECT;
            return;
        };
        match encode_frame(&payload, self.compression) {
            Ok(frame) => {
                if self.outbound.send(frame).is_err() {
                    self.flags |= PlayerFlags::SHOULD_DISCONNECT;
                }
            }
            Err(_) => self.flags |= PlayerFlags::SHOULD_DISCONNECT,
        }
    }

    /// The item currently in hand.
    #[must_use]
    pub fn held_item(&self) -> ItemId {
        DEMO_HOTBAR
            .get(self.held_slot)
            .and_then(|key| REGISTRY.items.by_key(key))
            .unwrap_or(ember_registry::items::ItemRegistry::AIR)
    }

    /// Records a block change caused by this client's own action.
    fn note_own_block_change(&mut self, pos: WorldBlockPos, sequence: i32) {
        if self.changed_blocks.len() < 8 {
            self.changed_blocks.push(pos);
        }
        self.last_acked_block_change = self.last_acked_block_change.max(sequence);
    }

    /// Drains and applies the tick's inbound packets.
    pub fn handle_inbound(&mut self, world: &mut World, entities: &mut EntityPool) {
        loop {
            let packet = match self.inbound.try_recv() {
                Ok(packet) => packet,
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => break,
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
                    self.flags |= PlayerFlags::SHOULD_DISCONNECT;
                    break;
                }
            };
            match packet {
                ServerboundPacket::AcceptTeleportation { .. } => {
                    self.flags -= PlayerFlags::AWAITING_TELEPORT;
                }
                ServerboundPacket::KeepAlive { .. } => {
                    self.flags |= PlayerFlags::GOT_ALIVE_RESPONSE;
                }
                ServerboundPacket::MovePlayerPos { x, y, z, .. } => {
                    if !self.flags.contains(PlayerFlags::AWAITING_TELEPORT) {
                        let entity = entities.resolve_mut(self.entity_id);
                        entity.x = x;
                        entity.y = y;
                        entity.z = z;
                    }
                }
                ServerboundPacket::MovePlayerPosRot {
                    x,
                    y,
                    z,
                    y_rot,
                    x_rot,
                    ..
                } => {
                    if !self.flags.contains(PlayerFlags::AWAITING_TELEPORT) {
                        let entity = entities.resolve_mut(self.entity_id);
                        entity.x = x;
                        entity.y = y;
                        entity.z = z;
                        entity.y_rot = y_rot;
                        entity.x_rot = x_rot;
                    }
                }
                ServerboundPacket::MovePlayerRot { y_rot, x_rot, .. } => {
                    let entity = entities.resolve_mut(self.entity_id);
                    entity.y_rot = y_rot;
                    entity.x_rot = x_rot;
                }
                ServerboundPacket::MovePlayerStatus { .. } => {}
                ServerboundPacket::SetCarriedItem { slot } => {
                    if (0..DEMO_HOTBAR.len() as i16).contains(&slot) {
                        self.held_slot = slot as usize;
                    }
                }
                ServerboundPacket::PlayerAction {
                    action,
                    pos,
                    sequence,
                    ..
                } => {
                    if action == PlayerActionKind::StartDestroyBlock {
                        let pos = WorldBlockPos {
                            world_id: SPAWN_WORLD_ID,
                            pos,
                        };
                        let mut ctx = BlockUpdateContext::new();
                        world.break_block(pos);
                        ctx.push_direct_neighbour_updates(pos);
                        propagate_block_updates(world, &mut ctx);
                        self.note_own_block_change(pos, sequence);
                    } else {
                        self.last_acked_block_change = self.last_acked_block_change.max(sequence);
                    }
                }
                ServerboundPacket::UseItemOn {
                    pos,
                    face,
                    sequence,
                    ..
                } => {
                    let clicked = WorldBlockPos {
                        world_id: SPAWN_WORLD_ID,
                        pos,
                    };
                    self.place_held_item(world, clicked, face, sequence);
                }
                ServerboundPacket::Ignored { .. } => {}
            }
        }
    }

    /// The item-action contract with the block engine: resolve the target
    /// position, write the item's block, then run the update cascade.
    fn place_held_item(
        &mut self,
        world: &mut World,
        clicked: WorldBlockPos,
        face: ember_utils::Direction,
        sequence: i32,
    ) {
        let Some(block) = REGISTRY.items.block_for_item(self.held_item()) else {
            self.last_acked_block_change = self.last_acked_block_change.max(sequence);
            return;
        };
        let target = clicked.relative(face);
        if !world.get_block_state(target).is_air() {
            self.last_acked_block_change = self.last_acked_block_change.max(sequence);
            return;
        }
        let state = REGISTRY.default_state(block);
        let result = world.set_block_state(target, state);
        if !result.failed {
            let mut ctx = BlockUpdateContext::new();
            // The placed block shapes itself against its surroundings first,
            // then the neighbours react.
            for dir in ember_utils::Direction::UPDATE_ORDER {
                update_block(world, target, dir, false, &mut ctx);
            }
            ctx.push_direct_neighbour_updates(target);
            propagate_block_updates(world, &mut ctx);
        }
        self.note_own_block_change(target, sequence);
    }

    /// Moves the cache centre, releasing interest on chunks that left the
    /// ring and acquiring it on chunks that entered.
    pub fn shift_chunk_cache(&mut self, world: &mut World, new_centre: WorldChunkPos) {
        let old_centre = self.chunk_cache_centre;
        let old_radius = self.chunk_cache_radius;
        let new_radius = self.next_chunk_cache_radius;
        if old_centre == new_centre && old_radius == new_radius {
            return;
        }

        let mut new_cache = vec![
            CacheFlags::default();
            (MAX_CHUNK_CACHE_DIAM * MAX_CHUNK_CACHE_DIAM) as usize
        ]
        .into_boxed_slice();

        // Walk the union of both rings once; a chunk either moves between
        // the caches, gets dropped, or gets added.
        let in_ring = |centre: WorldChunkPos, radius: i32, pos: WorldChunkPos| {
            centre.world_id == pos.world_id
                && (pos.x - centre.x).abs() <= radius
                && (pos.z - centre.z).abs() <= radius
        };

        if old_centre.world_id != 0 {
            for dz in -old_radius..=old_radius {
                for dx in -old_radius..=old_radius {
                    let pos = old_centre.offset(dx, dz);
                    let Some(old_index) = cache_index(old_centre, pos) else {
                        continue;
                    };
                    let flags = self.chunk_cache[old_index];
                    if !flags.contains(CacheFlags::ADDED_INTEREST) {
                        continue;
                    }
                    if in_ring(new_centre, new_radius, pos) {
                        let new_index = cache_index(new_centre, pos).expect("pos is in ring");
                        new_cache[new_index] = flags;
                    } else {
                        world.chunks.add_chunk_interest(pos, -1);
                        if flags.contains(CacheFlags::SENT) {
                            self.send_packet(&CForgetLevelChunk { x: pos.x, z: pos.z });
                        }
                    }
                }
            }
        }

        for dz in -new_radius..=new_radius {
            for dx in -new_radius..=new_radius {
                let pos = new_centre.offset(dx, dz);
                let index = cache_index(new_centre, pos).expect("pos is in ring");
                if !new_cache[index].contains(CacheFlags::ADDED_INTEREST) {
                    world.chunks.add_chunk_interest(pos, 1);
                    new_cache[index] |= CacheFlags::ADDED_INTEREST;
                }
            }
        }

        self.chunk_cache = new_cache;
        self.chunk_cache_centre = new_centre;
        self.chunk_cache_radius = new_radius;
        self.send_packet(&CSetChunkCacheCentre {
            x: new_centre.x,
            z: new_centre.z,
        });
    }

    /// Releases everything the controller holds. Called when the session is
    /// reaped.
    pub fn release_all_interest(&mut self, world: &mut World) {
        let centre = self.chunk_cache_centre;
        if centre.world_id == 0 {
            return;
        }
        let radius = self.chunk_cache_radius;
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let pos = centre.offset(dx, dz);
                if let Some(index) = cache_index(centre, pos) {
                    if self.chunk_cache[index].contains(CacheFlags::ADDED_INTEREST) {
                        self.chunk_cache[index] = CacheFlags::default();
                        world.chunks.add_chunk_interest(pos, -1);
                    }
                }
            }
        }
    }

    /// Sends the one-time play-state init packets.
    pub fn send_init_packets(&mut self, max_players: i32) {
        use ember_protocol::packets::clientbound::CLogin;
        if self.flags.contains(PlayerFlags::DID_INIT_PACKETS) {
            return;
        }
        self.flags |= PlayerFlags::DID_INIT_PACKETS;

        self.send_packet(&CLogin {
            entity_id: self.entity_id.0 as i32,
            hardcore: false,
            game_mode: 1,
            dimension_name: "minecraft:overworld".to_owned(),
            hashed_seed: 0,
            max_players,
            view_distance: self.chunk_cache_radius - 1,
            simulation_distance: self.chunk_cache_radius - 1,
            reduced_debug_info: false,
            show_respawn_screen: true,
            is_debug: false,
            is_flat: false,
        });
        self.send_packet(&CSetChunkCacheRadius {
            radius: self.chunk_cache_radius - 1,
        });
        self.send_packet(&CSetDefaultSpawn {
            pos: BlockPos::new(SPAWN.0 as i32, SPAWN.1 as i32, SPAWN.2 as i32),
            angle: 0.0,
        });
        let teleport_id = self.next_teleport_id;
        self.next_teleport_id += 1;
        self.flags |= PlayerFlags::AWAITING_TELEPORT;
        self.send_packet(&CPlayerPosition {
            x: SPAWN.0,
            y: SPAWN.1,
            z: SPAWN.2,
            y_rot: 0.0,
            x_rot: 0.0,
            teleport_id,
        });
    }

    /// Produces this tick's outbound packets for the player.
    pub fn send_tick_packets(&mut self, world: &mut World, entities: &EntityPool, current_tick: i64) {
        // Keep alives; a client that never answered the previous probe is
        // dropped when the next one is due.
        if current_tick - self.last_keep_alive_tick >= KEEP_ALIVE_INTERVAL {
            if self.sent_keep_alive && !self.flags.contains(PlayerFlags::GOT_ALIVE_RESPONSE) {
                self.flags |= PlayerFlags::SHOULD_DISCONNECT;
                return;
            }
            self.sent_keep_alive = true;
            self.flags -= PlayerFlags::GOT_ALIVE_RESPONSE;
            self.last_keep_alive_tick = current_tick;
            self.send_packet(&CKeepAlive { id: current_tick });
        }

        // Follow the player's entity across chunk borders.
        let entity = entities.resolve(self.entity_id);
        let new_centre = WorldChunkPos::new(
            SPAWN_WORLD_ID,
            (entity.x.floor() as i32) >> 4,
            (entity.z.floor() as i32) >> 4,
        );
        self.shift_chunk_cache(world, new_centre);

        self.stream_new_chunks(world);
        self.send_block_changes(world);
        self.send_entity_deltas(entities, current_tick);

        // Echo the client's own changes authoritatively, then ack.
        let changed: Vec<WorldBlockPos> = self.changed_blocks.drain(..).collect();
        for pos in changed {
            let state = world.get_block_state(pos);
            self.send_packet(&CBlockUpdate {
                pos: pos.pos,
                state,
            });
        }
        if self.last_acked_block_change >= 0 {
            let sequence = self.last_acked_block_change;
            self.last_acked_block_change = -1;
            self.send_packet(&CBlockChangedAck { sequence });
        }
    }

    /// Streams not-yet-sent ready chunks in a spiral around the centre.
    fn stream_new_chunks(&mut self, world: &World) {
        let centre = self.chunk_cache_centre;
        let mut budget = CHUNK_SEND_BUDGET;
        for (dx, dz) in spiral_offsets(self.chunk_cache_radius) {
            if budget == 0 {
                break;
            }
            let pos = centre.offset(dx, dz);
            let Some(index) = cache_index(centre, pos) else {
                continue;
            };
            let flags = self.chunk_cache[index];
            if !flags.contains(CacheFlags::ADDED_INTEREST) || flags.contains(CacheFlags::SENT) {
                continue;
            }
            let Some(chunk) = world.chunks.get_chunk_if_loaded(pos) else {
                continue;
            };
            let packet = build_chunk_packet(chunk);
            self.send_packet(&packet);
            self.chunk_cache[index] |= CacheFlags::SENT;
            budget -= 1;
        }
    }

    /// Sends per-section change packets and local events for sent chunks
    /// touched this tick.
    fn send_block_changes(&mut self, world: &World) {
        let centre = self.chunk_cache_centre;
        let radius = self.chunk_cache_radius;
        let from = centre.offset(-radius, -radius);
        let to = centre.offset(radius, radius);

        let mut changed = Vec::new();
        world.chunks.collect_changed_chunks(from, to, &mut changed);

        for pos in changed {
            let Some(index) = cache_index(centre, pos) else {
                continue;
            };
            if !self.chunk_cache[index].contains(CacheFlags::SENT) {
                continue;
            }
            let Some(chunk) = world.chunks.get_chunk_if_loaded(pos) else {
                continue;
            };

            if chunk.last_block_change_tick == world.current_tick {
                for section_index in 0..SECTIONS_PER_CHUNK {
                    if chunk.changed_sections & (1 << section_index) == 0 {
                        continue;
                    }
                    let section = &chunk.sections[section_index];
                    let Some(set) = &section.changed_set else {
                        continue;
                    };
                    let changes: Vec<SectionBlockChange> = set
                        .iter()
                        .map(|block_index| SectionBlockChange {
                            index: block_index,
                            state: section.blocks.get(block_index as usize),
                        })
                        .collect();
                    if changes.is_empty() {
                        continue;
                    }
                    self.send_packet(&CSectionBlocksUpdate {
                        section_x: pos.x,
                        section_y: (MIN_WORLD_Y >> 4) + section_index as i32,
                        section_z: pos.z,
                        changes,
                    });
                }
            }

            if chunk.last_local_event_tick == world.current_tick {
                let events: Vec<CLevelEvent> = chunk
                    .local_events
                    .iter()
                    .map(|event| CLevelEvent {
                        event: event.kind,
                        pos: event.pos,
                        data: event.data,
                        global: false,
                    })
                    .collect();
                for event in events {
                    self.send_packet(&event);
                }
            }
        }
    }

    /// Emits move/teleport/rotation deltas for every live entity except the
    /// player's own.
    fn send_entity_deltas(&mut self, entities: &EntityPool, current_tick: i64) {
        let own = self.entity_id;
        let snapshots: Vec<_> = entities
            .iter_live()
            .filter(|entity| entity.id != own && entity.kind != EntityKind::Null)
            .map(|entity| {
                (
                    entity.id,
                    entity.x,
                    entity.y,
                    entity.z,
                    entity.y_rot,
                    entity.x_rot,
                    entity.flags.contains(crate::entity::EntityFlags::ON_GROUND),
                    entity.changed_data,
                )
            })
            .collect();

        for (id, x, y, z, y_rot, x_rot, on_ground, changed) in snapshots {
            let slot = &mut self.tracked_entities[id.index()];
            let fresh = slot.entity_id != id;
            if fresh {
                *slot = TrackedEntity {
                    entity_id: id,
                    last_update_tick: current_tick - TRACKED_UPDATE_INTERVAL,
                    ..TrackedEntity::default()
                };
            }

            let y_rot_angle = (y_rot / 360.0 * 256.0) as i32 as u8;
            let x_rot_angle = (x_rot / 360.0 * 256.0) as i32 as u8;
            let dx = x - slot.last_sent_x;
            let dy = y - slot.last_sent_y;
            let dz = z - slot.last_sent_z;
            let moved = changed.contains(ChangedData::POSITION)
                || dx.abs() > 1.0 / 4096.0
                || dy.abs() > 1.0 / 4096.0
                || dz.abs() > 1.0 / 4096.0;
            let rotated =
                y_rot_angle != slot.last_sent_y_rot || x_rot_angle != slot.last_sent_x_rot;

            let delta_fits =
                dx.abs() < 7.999 && dy.abs() < 7.999 && dz.abs() < 7.999 && !fresh;
            let stale = current_tick - slot.last_update_tick >= TRACKED_UPDATE_INTERVAL;

            let entity_id = id.0 as i32;
            if moved && (!delta_fits || stale) {
                self.send_packet(&CTeleportEntity {
                    entity_id,
                    x,
                    y,
                    z,
                    y_rot: y_rot_angle,
                    x_rot: x_rot_angle,
                    on_ground,
                });
            } else if moved && rotated {
                self.send_packet(&CMoveEntityPosRot {
                    entity_id,
                    dx: (dx * 4096.0) as i16,
                    dy: (dy * 4096.0) as i16,
                    dz: (dz * 4096.0) as i16,
                    y_rot: y_rot_angle,
                    x_rot: x_rot_angle,
                    on_ground,
                });
            } else if moved {
                self.send_packet(&CMoveEntityPos {
                    entity_id,
                    dx: (dx * 4096.0) as i16,
                    dy: (dy * 4096.0) as i16,
                    dz: (dz * 4096.0) as i16,
                    on_ground,
                });
            } else if rotated {
                self.send_packet(&CMoveEntityRot {
                    entity_id,
                    y_rot: y_rot_angle,
                    x_rot: x_rot_angle,
                    on_ground,
                });
            }

            if moved || rotated {
                let slot = &mut self.tracked_entities[id.index()];
                slot.last_sent_x = x;
                slot.last_sent_y = y;
                slot.last_sent_z = z;
                slot.last_sent_y_rot = y_rot_angle;
                slot.last_sent_x_rot = x_rot_angle;
                slot.last_update_tick = current_tick;
            }
        }
    }
}

/// Builds the full chunk packet from a ready chunk.
#[must_use]
pub fn build_chunk_packet(chunk: &Chunk) -> CLevelChunkWithLight {
    debug_assert!(chunk.loader_flags.contains(LoaderFlags::READY));

    let sections = chunk
        .sections
        .iter()
        .map(|section| ChunkSectionData {
            non_air_count: section.non_air_count as i16,
            states: match section.blocks.raw() {
                Some(blocks) => SectionStates::Direct(Box::new(*blocks)),
                None => SectionStates::Single(BlockStateId::AIR),
            },
        })
        .collect();

    let mut motion_blocking = [0u16; 256];
    for (out, height) in motion_blocking
        .iter_mut()
        .zip(chunk.motion_blocking_height_map)
    {
        *out = (i32::from(height) - MIN_WORLD_Y) as u16;
    }

    CLevelChunkWithLight {
        x: chunk.pos.x,
        z: chunk.pos.z,
        motion_blocking,
        sections,
        sky_light: chunk
            .light_sections
            .iter()
            .map(|section| Some(section.sky.clone()))
            .collect(),
        block_light: chunk
            .light_sections
            .iter()
            .map(|section| Some(section.block.clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spiral_starts_at_centre_and_covers_ring() {
        let offsets: Vec<(i32, i32)> = spiral_offsets(2).collect();
        assert_eq!(offsets[0], (0, 0));
        assert_eq!(offsets.len(), 25);
        // Ring order: every radius-1 offset precedes every radius-2 offset.
        let first_ring_two = offsets
            .iter()
            .position(|(dx, dz)| dx.abs().max(dz.abs()) == 2)
            .expect("ring 2 exists");
        assert!(
            offsets[..first_ring_two]
                .iter()
                .all(|(dx, dz)| dx.abs().max(dz.abs()) < 2)
        );
    }

    #[test]
    fn cache_index_rejects_out_of_ring() {
        let centre = WorldChunkPos::new(1, 100, -50);
        assert!(cache_index(centre, centre).is_some());
        assert!(cache_index(centre, centre.offset(MAX_CHUNK_CACHE_RADIUS, 0)).is_some());
        assert!(cache_index(centre, centre.offset(MAX_CHUNK_CACHE_RADIUS + 1, 0)).is_none());
        assert!(cache_index(centre, WorldChunkPos::new(2, 100, -50)).is_none());
    }
}
