//! Packet id constants, stable for the supported protocol version.

/// Clientbound play packet ids.
pub mod play {
    #![allow(missing_docs)]

    pub const C_BLOCK_CHANGED_ACK: i32 = 0x05;
    pub const C_BLOCK_UPDATE: i32 = 0x09;
    pub const C_KEEP_ALIVE: i32 = 0x20;
    pub const C_LEVEL_CHUNK_WITH_LIGHT: i32 = 0x21;
    pub const C_LEVEL_EVENT: i32 = 0x22;
    pub const C_LOGIN: i32 = 0x25;
    pub const C_MOVE_ENTITY_POS: i32 = 0x28;
    pub const C_MOVE_ENTITY_POS_ROT: i32 = 0x29;
    pub const C_MOVE_ENTITY_ROT: i32 = 0x2A;
    pub const C_PLAYER_INFO_REMOVE: i32 = 0x36;
    pub const C_PLAYER_INFO_UPDATE: i32 = 0x37;
    pub const C_PLAYER_POSITION: i32 = 0x39;
    pub const C_FORGET_LEVEL_CHUNK: i32 = 0x1C;
    pub const C_SECTION_BLOCKS_UPDATE: i32 = 0x40;
    pub const C_SET_CHUNK_CACHE_CENTRE: i32 = 0x4B;
    pub const C_SET_CHUNK_CACHE_RADIUS: i32 = 0x4C;
    pub const C_SET_DEFAULT_SPAWN: i32 = 0x4D;
    pub const C_TELEPORT_ENTITY: i32 = 0x66;
}

/// Serverbound play packet ids.
pub mod serverbound {
    #![allow(missing_docs)]

    pub const S_ACCEPT_TELEPORTATION: i32 = 0x00;
    pub const S_KEEP_ALIVE: i32 = 0x12;
    pub const S_MOVE_PLAYER_POS: i32 = 0x14;
    pub const S_MOVE_PLAYER_POS_ROT: i32 = 0x15;
    pub const S_MOVE_PLAYER_ROT: i32 = 0x16;
    pub const S_MOVE_PLAYER_STATUS: i32 = 0x17;
    pub const S_PLAYER_ACTION: i32 = 0x1D;
    pub const S_SET_CARRIED_ITEM: i32 = 0x28;
    pub const S_USE_ITEM_ON: i32 = 0x31;
}
