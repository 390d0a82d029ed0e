//! Clientbound play packets produced by the tick engine.
#![allow(missing_docs)]

use std::io::{self, Write};

use ember_utils::{BlockPos, BlockStateId};
use uuid::Uuid;

use crate::ClientPacket;
use crate::ids::play;
use crate::ser::{VarInt, VarLong, WriteTo};

/// Play-state login, sent by the tick thread right after the session handoff.
#[derive(Debug, Clone)]
pub struct CLogin {
    pub entity_id: i32,
    pub hardcore: bool,
    pub game_mode: u8,
    pub dimension_name: String,
    pub hashed_seed: i64,
    pub max_players: i32,
    pub view_distance: i32,
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub show_respawn_screen: bool,
    pub is_debug: bool,
    pub is_flat: bool,
}

impl ClientPacket for CLogin {
    const ID: i32 = play::C_LOGIN;
}

impl WriteTo for CLogin {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.entity_id.write(writer)?;
        self.hardcore.write(writer)?;
        self.game_mode.write(writer)?;
        self.dimension_name.write(writer)?;
        self.hashed_seed.write(writer)?;
        VarInt(self.max_players).write(writer)?;
        VarInt(self.view_distance).write(writer)?;
        VarInt(self.simulation_distance).write(writer)?;
        self.reduced_debug_info.write(writer)?;
        self.show_respawn_screen.write(writer)?;
        self.is_debug.write(writer)?;
        self.is_flat.write(writer)
    }
}

/// Recentres the client's chunk cache.
#[derive(Debug, Clone, Copy)]
pub struct CSetChunkCacheCentre {
    pub x: i32,
    pub z: i32,
}

impl ClientPacket for CSetChunkCacheCentre {
    const ID: i32 = play::C_SET_CHUNK_CACHE_CENTRE;
}

impl WriteTo for CSetChunkCacheCentre {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.x).write(writer)?;
        VarInt(self.z).write(writer)
    }
}

/// Announces the server-side chunk cache radius.
#[derive(Debug, Clone, Copy)]
pub struct CSetChunkCacheRadius {
    pub radius: i32,
}

impl ClientPacket for CSetChunkCacheRadius {
    const ID: i32 = play::C_SET_CHUNK_CACHE_RADIUS;
}

impl WriteTo for CSetChunkCacheRadius {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.radius).write(writer)
    }
}

/// The world spawn position shown on compasses and used before respawn.
#[derive(Debug, Clone, Copy)]
pub struct CSetDefaultSpawn {
    pub pos: BlockPos,
    pub angle: f32,
}

impl ClientPacket for CSetDefaultSpawn {
    const ID: i32 = play::C_SET_DEFAULT_SPAWN;
}

impl WriteTo for CSetDefaultSpawn {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.pos.write(writer)?;
        self.angle.write(writer)
    }
}

/// Synchronises the player position and opens a teleport transaction.
#[derive(Debug, Clone, Copy)]
pub struct CPlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub y_rot: f32,
    pub x_rot: f32,
    pub teleport_id: i32,
}

impl ClientPacket for CPlayerPosition {
    const ID: i32 = play::C_PLAYER_POSITION;
}

impl WriteTo for CPlayerPosition {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.x.write(writer)?;
        self.y.write(writer)?;
        self.z.write(writer)?;
        self.y_rot.write(writer)?;
        self.x_rot.write(writer)?;
        0u8.write(writer)?; // relative-movement flags
        VarInt(self.teleport_id).write(writer)?;
        false.write(writer) // dismount vehicle
    }
}

/// Keep-alive probe; the client echoes the id back.
#[derive(Debug, Clone, Copy)]
pub struct CKeepAlive {
    pub id: i64,
}

impl ClientPacket for CKeepAlive {
    const ID: i32 = play::C_KEEP_ALIVE;
}

impl WriteTo for CKeepAlive {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.id.write(writer)
    }
}

/// A single authoritative block change.
#[derive(Debug, Clone, Copy)]
pub struct CBlockUpdate {
    pub pos: BlockPos,
    pub state: BlockStateId,
}

impl ClientPacket for CBlockUpdate {
    const ID: i32 = play::C_BLOCK_UPDATE;
}

impl WriteTo for CBlockUpdate {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.pos.write(writer)?;
        VarInt(i32::from(self.state.0)).write(writer)
    }
}

/// Acknowledges the newest client action sequence number.
#[derive(Debug, Clone, Copy)]
pub struct CBlockChangedAck {
    pub sequence: i32,
}

impl ClientPacket for CBlockChangedAck {
    const ID: i32 = play::C_BLOCK_CHANGED_ACK;
}

impl WriteTo for CBlockChangedAck {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.sequence).write(writer)
    }
}

/// A chunk-local event: break particles, sounds and similar.
#[derive(Debug, Clone, Copy)]
pub struct CLevelEvent {
    pub event: i32,
    pub pos: BlockPos,
    pub data: i32,
    pub global: bool,
}

/// Level event id for block destruction particles.
pub const LEVEL_EVENT_DESTROY_BLOCK: i32 = 2001;

impl ClientPacket for CLevelEvent {
    const ID: i32 = play::C_LEVEL_EVENT;
}

impl WriteTo for CLevelEvent {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.event.write(writer)?;
        self.pos.write(writer)?;
        self.data.write(writer)?;
        self.global.write(writer)
    }
}

/// All block changes of one section in one tick.
#[derive(Debug, Clone)]
pub struct CSectionBlocksUpdate {
    /// Packed section position: `x(22) | z(22) | y(20)`.
    pub section_x: i32,
    pub section_y: i32,
    pub section_z: i32,
    pub changes: Vec<SectionBlockChange>,
}

/// One changed block within the section.
#[derive(Debug, Clone, Copy)]
pub struct SectionBlockChange {
    /// In-section yzx index, 12 bits.
    pub index: u16,
    pub state: BlockStateId,
}

impl ClientPacket for CSectionBlocksUpdate {
    const ID: i32 = play::C_SECTION_BLOCKS_UPDATE;
}

impl WriteTo for CSectionBlocksUpdate {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        let packed_section = ((i64::from(self.section_x) & 0x3F_FFFF) << 42)
            | ((i64::from(self.section_z) & 0x3F_FFFF) << 20)
            | (i64::from(self.section_y) & 0xF_FFFF);
        packed_section.write(writer)?;
        VarInt(self.changes.len() as i32).write(writer)?;
        for change in &self.changes {
            // The wire wants x(4) z(4) y(4); the stored index is yzx.
            let y = i64::from(change.index >> 8);
            let z = i64::from((change.index >> 4) & 0xF);
            let x = i64::from(change.index & 0xF);
            let packed = (i64::from(change.state.0) << 12) | (x << 8) | (z << 4) | y;
            VarLong(packed).write(writer)?;
        }
        Ok(())
    }
}

/// Tells the client to drop a chunk from its cache.
#[derive(Debug, Clone, Copy)]
pub struct CForgetLevelChunk {
    pub x: i32,
    pub z: i32,
}

impl ClientPacket for CForgetLevelChunk {
    const ID: i32 = play::C_FORGET_LEVEL_CHUNK;
}

impl WriteTo for CForgetLevelChunk {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.x.write(writer)?;
        self.z.write(writer)
    }
}

/// Block state payload of one chunk section.
#[derive(Debug, Clone)]
pub enum SectionStates {
    /// Every cell holds the same state.
    Single(BlockStateId),
    /// Direct palette, one entry per cell in yzx order.
    Direct(Box<[u16; 4096]>),
}

/// One chunk section for the chunk packet.
#[derive(Debug, Clone)]
pub struct ChunkSectionData {
    pub non_air_count: i16,
    pub states: SectionStates,
}

/// Bits per entry of the direct block-state palette.
const DIRECT_BITS: usize = 15;

impl WriteTo for ChunkSectionData {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.non_air_count.write(writer)?;
        match &self.states {
            SectionStates::Single(state) => {
                0u8.write(writer)?;
                VarInt(i32::from(state.0)).write(writer)?;
                VarInt(0).write(writer)?;
            }
            SectionStates::Direct(states) => {
                (DIRECT_BITS as u8).write(writer)?;
                let per_long = 64 / DIRECT_BITS;
                let longs = 4096usize.div_ceil(per_long);
                VarInt(longs as i32).write(writer)?;
                let mut iter = states.iter();
                for _ in 0..longs {
                    let mut word = 0u64;
                    for slot in 0..per_long {
                        let Some(&state) = iter.next() else { break };
                        word |= u64::from(state) << (slot * DIRECT_BITS);
                    }
                    (word as i64).write(writer)?;
                }
            }
        }
        // Biomes: single-value palette, biome 0.
        0u8.write(writer)?;
        VarInt(0).write(writer)?;
        VarInt(0).write(writer)
    }
}

/// A full chunk with its light data.
#[derive(Debug, Clone)]
pub struct CLevelChunkWithLight {
    pub x: i32,
    pub z: i32,
    /// Motion-blocking heights relative to the world bottom, zx order.
    pub motion_blocking: [u16; 256],
    /// One entry per block section, bottom up.
    pub sections: Vec<ChunkSectionData>,
    /// One entry per light section; `None` sections are omitted from the wire.
    pub sky_light: Vec<Option<Box<[u8; 2048]>>>,
    pub block_light: Vec<Option<Box<[u8; 2048]>>>,
}

impl ClientPacket for CLevelChunkWithLight {
    const ID: i32 = play::C_LEVEL_CHUNK_WITH_LIGHT;
}

/// Bits needed to store a height within the world (0..=384 needs 9).
const HEIGHTMAP_BITS: usize = 9;

fn write_heightmap_nbt(heights: &[u16; 256], writer: &mut impl Write) -> io::Result<()> {
    let per_long = 64 / HEIGHTMAP_BITS;
    let longs = 256usize.div_ceil(per_long);

    // Network NBT: unnamed root compound holding one long array.
    0x0Au8.write(writer)?;
    0x0Cu8.write(writer)?;
    let name = b"MOTION_BLOCKING";
    (name.len() as u16).write(writer)?;
    writer.write_all(name)?;
    (longs as i32).write(writer)?;
    let mut iter = heights.iter();
    for _ in 0..longs {
        let mut word = 0u64;
        for slot in 0..per_long {
            let Some(&height) = iter.next() else { break };
            word |= u64::from(height) << (slot * HEIGHTMAP_BITS);
        }
        (word as i64).write(writer)?;
    }
    0x00u8.write(writer)
}

fn write_light_arrays(
    arrays: &[Option<Box<[u8; 2048]>>],
    writer: &mut impl Write,
) -> io::Result<()> {
    let mut mask = 0i64;
    let mut count = 0;
    for (index, section) in arrays.iter().enumerate() {
        if section.is_some() {
            mask |= 1 << index;
            count += 1;
        }
    }
    // Populated-sections bitset.
    VarInt(1).write(writer)?;
    mask.write(writer)?;
    // Empty-sections bitset: everything not populated.
    VarInt(1).write(writer)?;
    (!mask).write(writer)?;

    VarInt(count).write(writer)?;
    for section in arrays.iter().flatten() {
        VarInt(2048).write(writer)?;
        writer.write_all(section.as_ref())?;
    }
    Ok(())
}

impl WriteTo for CLevelChunkWithLight {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.x.write(writer)?;
        self.z.write(writer)?;
        write_heightmap_nbt(&self.motion_blocking, writer)?;

        let mut section_buf = Vec::with_capacity(1 << 14);
        for section in &self.sections {
            section.write(&mut section_buf)?;
        }
        VarInt(section_buf.len() as i32).write(writer)?;
        writer.write_all(&section_buf)?;

        // Block entities.
        VarInt(0).write(writer)?;

        // Light: trust edges, then sky and block arrays with their masks.
        true.write(writer)?;
        write_light_arrays(&self.sky_light, writer)?;
        write_light_arrays(&self.block_light, writer)?;
        Ok(())
    }
}

/// Relative entity movement, used when the delta fits in 1/4096 block units.
#[derive(Debug, Clone, Copy)]
pub struct CMoveEntityPos {
    pub entity_id: i32,
    pub dx: i16,
    pub dy: i16,
    pub dz: i16,
    pub on_ground: bool,
}

impl ClientPacket for CMoveEntityPos {
    const ID: i32 = play::C_MOVE_ENTITY_POS;
}

impl WriteTo for CMoveEntityPos {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.entity_id).write(writer)?;
        self.dx.write(writer)?;
        self.dy.write(writer)?;
        self.dz.write(writer)?;
        self.on_ground.write(writer)
    }
}

/// Relative movement plus rotation.
#[derive(Debug, Clone, Copy)]
pub struct CMoveEntityPosRot {
    pub entity_id: i32,
    pub dx: i16,
    pub dy: i16,
    pub dz: i16,
    pub y_rot: u8,
    pub x_rot: u8,
    pub on_ground: bool,
}

impl ClientPacket for CMoveEntityPosRot {
    const ID: i32 = play::C_MOVE_ENTITY_POS_ROT;
}

impl WriteTo for CMoveEntityPosRot {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.entity_id).write(writer)?;
        self.dx.write(writer)?;
        self.dy.write(writer)?;
        self.dz.write(writer)?;
        self.y_rot.write(writer)?;
        self.x_rot.write(writer)?;
        self.on_ground.write(writer)
    }
}

/// Rotation-only entity update.
#[derive(Debug, Clone, Copy)]
pub struct CMoveEntityRot {
    pub entity_id: i32,
    pub y_rot: u8,
    pub x_rot: u8,
    pub on_ground: bool,
}

impl ClientPacket for CMoveEntityRot {
    const ID: i32 = play::C_MOVE_ENTITY_ROT;
}

impl WriteTo for CMoveEntityRot {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.entity_id).write(writer)?;
        self.y_rot.write(writer)?;
        self.x_rot.write(writer)?;
        self.on_ground.write(writer)
    }
}

/// Absolute entity teleport, used when the delta overflows the move packet.
#[derive(Debug, Clone, Copy)]
pub struct CTeleportEntity {
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub y_rot: u8,
    pub x_rot: u8,
    pub on_ground: bool,
}

impl ClientPacket for CTeleportEntity {
    const ID: i32 = play::C_TELEPORT_ENTITY;
}

impl WriteTo for CTeleportEntity {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.entity_id).write(writer)?;
        self.x.write(writer)?;
        self.y.write(writer)?;
        self.z.write(writer)?;
        self.y_rot.write(writer)?;
        self.x_rot.write(writer)?;
        self.on_ground.write(writer)
    }
}

/// Adds players to the tab list.
#[derive(Debug, Clone)]
pub struct CPlayerInfoUpdate {
    pub entries: Vec<PlayerInfoEntry>,
}

/// One tab-list entry.
#[derive(Debug, Clone)]
pub struct PlayerInfoEntry {
    pub uuid: Uuid,
    pub name: String,
}

impl ClientPacket for CPlayerInfoUpdate {
    const ID: i32 = play::C_PLAYER_INFO_UPDATE;
}

impl WriteTo for CPlayerInfoUpdate {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        // Action set: add player only.
        0x01u8.write(writer)?;
        VarInt(self.entries.len() as i32).write(writer)?;
        for entry in &self.entries {
            entry.uuid.write(writer)?;
            entry.name.write(writer)?;
            VarInt(0).write(writer)?; // profile properties
        }
        Ok(())
    }
}

/// Removes players from the tab list.
#[derive(Debug, Clone)]
pub struct CPlayerInfoRemove {
    pub uuids: Vec<Uuid>,
}

impl ClientPacket for CPlayerInfoRemove {
    const ID: i32 = play::C_PLAYER_INFO_REMOVE;
}

impl WriteTo for CPlayerInfoRemove {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.uuids.len() as i32).write(writer)?;
        for uuid in &self.uuids {
            uuid.write(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_packet;

    #[test]
    fn section_update_packs_position_and_state() {
        let packet = CSectionBlocksUpdate {
            section_x: -2,
            section_y: 4,
            section_z: 7,
            changes: vec![SectionBlockChange {
                index: 0x0F5, // y=0, z=15, x=5
                state: BlockStateId(100),
            }],
        };
        let body = encode_packet(&packet).unwrap();
        // id, section i64, count, then the VarLong payload.
        assert_eq!(body[0], play::C_SECTION_BLOCKS_UPDATE as u8);
        assert!(body.len() > 11);
    }

    #[test]
    fn single_value_section_is_tiny() {
        let section = ChunkSectionData {
            non_air_count: 0,
            states: SectionStates::Single(BlockStateId::AIR),
        };
        let mut buf = Vec::new();
        section.write(&mut buf).unwrap();
        assert!(buf.len() < 16);
    }

    #[test]
    fn direct_section_has_expected_word_count() {
        let section = ChunkSectionData {
            non_air_count: 4096,
            states: SectionStates::Direct(Box::new([1u16; 4096])),
        };
        let mut buf = Vec::new();
        section.write(&mut buf).unwrap();
        // 15 bits per entry, 4 entries per long -> 1024 longs.
        assert!(buf.len() > 1024 * 8);
    }
}
