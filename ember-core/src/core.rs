//! The single owned server context and the per-tick control flow.

use std::sync::Arc;
use std::time::Instant;

use ember_protocol::packets::clientbound::{CPlayerInfoRemove, CPlayerInfoUpdate, PlayerInfoEntry};
use ember_utils::locks::SyncRwLock;
use uuid::Uuid;

use crate::block::update::propagate_delayed_block_updates;
use crate::chunk::map::ChunkMap;
use crate::entity::{EntityKind, EntityPool};
use crate::physics;
use crate::player::{JoinQueue, PlayerController, PlayerFlags, SPAWN, SPAWN_WORLD_ID};
use crate::task::TaskQueue;
use crate::world::World;

/// One row of the shared player-list snapshot read by the status handler.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct PlayerListEntry {
    pub uuid: Uuid,
    pub name: String,
}

/// The snapshot handle shared with the network thread.
pub type PlayerListSnapshot = Arc<SyncRwLock<Vec<PlayerListEntry>>>;

/// Everything the tick thread owns, passed explicitly instead of living in
/// globals.
pub struct Core {
    /// The world: chunks, scheduled updates, the tick counter.
    pub world: World,
    /// The entity pool.
    pub entities: EntityPool,
    /// Connected players.
    pub players: Vec<PlayerController>,
    /// Sessions handed over by the network thread.
    pub join_queue: Arc<JoinQueue>,
    /// Background workers.
    pub tasks: Arc<TaskQueue>,
    /// Snapshot for the status handler.
    pub player_list: PlayerListSnapshot,
    /// Configured player cap.
    pub max_players: i32,
    /// Wall-clock start of the current tick, for the loader budget.
    pub tick_start: Instant,

    tab_added: Vec<PlayerListEntry>,
    tab_removed: Vec<Uuid>,
}

impl Core {
    /// Builds the context around a chunk map and its worker pool.
    #[must_use]
    pub fn new(chunks: ChunkMap, tasks: Arc<TaskQueue>, max_players: i32) -> Self {
        Self {
            world: World::new(chunks),
            entities: EntityPool::new(),
            players: Vec::new(),
            join_queue: Arc::new(JoinQueue::new(64)),
            tasks,
            player_list: Arc::new(SyncRwLock::new(Vec::new())),
            max_players,
            tick_start: Instant::now(),
            tab_added: Vec::new(),
            tab_removed: Vec::new(),
        }
    }

    /// Runs exactly one tick.
    pub fn tick(&mut self) {
        // Scheduled block updates fire first so their cascades are visible
        // to everything below.
        propagate_delayed_block_updates(&mut self.world);

        self.accept_joins();

        // Player input, in arrival order per player.
        for index in 0..self.players.len() {
            self.players[index].handle_inbound(&mut self.world, &mut self.entities);
        }

        // Entities advance in pool-index order.
        for index in self.entities.live_indices() {
            let world = &self.world;
            let entity = self.entities.get_mut(index);
            if entity.kind == EntityKind::Null {
                continue;
            }
            let id = entity.id;
            if physics::tick_entity(world, entity) {
                self.entities.evict(id);
            }
        }

        self.fold_tab_list();

        // Outbound packets per player, then reap dead sessions.
        let max_players = self.max_players;
        let current_tick = self.world.current_tick;
        for index in 0..self.players.len() {
            let player = &mut self.players[index];
            if player.flags.contains(PlayerFlags::SHOULD_DISCONNECT) {
                continue;
            }
            player.send_init_packets(max_players);
            player.send_tick_packets(&mut self.world, &self.entities, current_tick);
        }
        self.reap_disconnected();

        // Per-tick state resets.
        for index in self.entities.live_indices() {
            self.entities.get_mut(index).changed_data = crate::entity::ChangedData::default();
        }
        self.world.chunks.clear_changed_chunks();

        // Chunk lifecycle last, under its own time budget.
        self.world
            .chunks
            .tick_chunk_loader(self.world.current_tick, self.tick_start);

        self.world.current_tick += 1;
    }

    fn accept_joins(&mut self) {
        while let Some(request) = self.join_queue.pop() {
            let entity = self.entities.reserve(EntityKind::Player);
            if entity.kind == EntityKind::Null {
                log::warn!("Entity pool exhausted, dropping join of {}", request.username);
                continue;
            }
            entity.uuid = request.uuid;
            entity.world_id = SPAWN_WORLD_ID;
            entity.x = SPAWN.0;
            entity.y = SPAWN.1;
            entity.z = SPAWN.2;
            entity.collision_width = 0.6;
            entity.collision_height = 1.8;
            let entity_id = entity.id;

            let player = PlayerController::new(request, entity_id, self.world.current_tick);
            log::info!("Player {} joined", player.username);
            self.tab_added.push(PlayerListEntry {
                uuid: player.uuid,
                name: player.username.clone(),
            });
            self.players.push(player);
            self.refresh_player_list();
        }
    }

    fn fold_tab_list(&mut self) {
        if !self.tab_removed.is_empty() {
            let packet = CPlayerInfoRemove {
                uuids: std::mem::take(&mut self.tab_removed),
            };
            for player in &mut self.players {
                player.send_packet(&packet);
            }
        }
        if !self.tab_added.is_empty() {
            let added = std::mem::take(&mut self.tab_added);
            let packet = CPlayerInfoUpdate {
                entries: added
                    .iter()
                    .map(|entry| PlayerInfoEntry {
                        uuid: entry.uuid,
                        name: entry.name.clone(),
                    })
                    .collect(),
            };
            // Newcomers additionally get everyone who joined earlier.
            let full: Vec<PlayerInfoEntry> = self
                .players
                .iter()
                .map(|player| PlayerInfoEntry {
                    uuid: player.uuid,
                    name: player.username.clone(),
                })
                .collect();
            for player in &mut self.players {
                if added.iter().any(|entry| entry.uuid == player.uuid) {
                    player.send_packet(&CPlayerInfoUpdate {
                        entries: full.clone(),
                    });
                } else {
                    player.send_packet(&packet);
                }
            }
        }
    }

    fn reap_disconnected(&mut self) {
        let mut index = 0;
        while index < self.players.len() {
            if !self.players[index]
                .flags
                .contains(PlayerFlags::SHOULD_DISCONNECT)
            {
                index += 1;
                continue;
            }
            let mut player = self.players.swap_remove(index);
            log::info!("Player {} disconnected", player.username);
            player.release_all_interest(&mut self.world);
            self.entities.evict(player.entity_id);
            self.tab_removed.push(player.uuid);
            self.refresh_player_list();
        }
    }

    fn refresh_player_list(&self) {
        *self.player_list.write() = self
            .players
            .iter()
            .filter(|player| !player.flags.contains(PlayerFlags::SHOULD_DISCONNECT))
            .map(|player| PlayerListEntry {
                uuid: player.uuid,
                name: player.username.clone(),
            })
            .collect();
    }
}
