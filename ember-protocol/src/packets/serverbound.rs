//! Serverbound play packets the tick thread consumes.
//!
//! Decoding happens on the network task; the tick thread receives the
//! already-typed [`ServerboundPacket`] values in arrival order.
#![allow(missing_docs)]

use std::io::{self, Cursor, Read};

use ember_utils::{BlockPos, Direction};

use crate::ids::serverbound as ids;
use crate::ser::{ReadFrom, VarInt};

/// A player action kind from the player-action packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerActionKind {
    StartDestroyBlock,
    AbortDestroyBlock,
    StopDestroyBlock,
    Other,
}

/// One decoded serverbound play packet.
#[derive(Debug, Clone)]
pub enum ServerboundPacket {
    AcceptTeleportation {
        teleport_id: i32,
    },
    KeepAlive {
        id: i64,
    },
    MovePlayerPos {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    MovePlayerPosRot {
        x: f64,
        y: f64,
        z: f64,
        y_rot: f32,
        x_rot: f32,
        on_ground: bool,
    },
    MovePlayerRot {
        y_rot: f32,
        x_rot: f32,
        on_ground: bool,
    },
    MovePlayerStatus {
        on_ground: bool,
    },
    PlayerAction {
        action: PlayerActionKind,
        pos: BlockPos,
        face: Direction,
        sequence: i32,
    },
    SetCarriedItem {
        slot: i16,
    },
    UseItemOn {
        hand: i32,
        pos: BlockPos,
        face: Direction,
        cursor_x: f32,
        cursor_y: f32,
        cursor_z: f32,
        inside: bool,
        sequence: i32,
    },
    /// Any packet the tick thread does not act on.
    Ignored {
        id: i32,
    },
}

fn read_direction(reader: &mut impl Read) -> io::Result<Direction> {
    let raw = VarInt::read(reader)?.0;
    Direction::ALL
        .get(raw as usize)
        .copied()
        .ok_or_else(|| io::Error::other("direction id out of range"))
}

impl ServerboundPacket {
    /// Decodes one unframed play packet (id plus body).
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut reader = Cursor::new(payload);
        let id = VarInt::read(&mut reader)?.0;
        let packet = match id {
            ids::S_ACCEPT_TELEPORTATION => Self::AcceptTeleportation {
                teleport_id: VarInt::read(&mut reader)?.0,
            },
            ids::S_KEEP_ALIVE => Self::KeepAlive {
                id: i64::read(&mut reader)?,
            },
            ids::S_MOVE_PLAYER_POS => Self::MovePlayerPos {
                x: f64::read(&mut reader)?,
                y: f64::read(&mut reader)?,
                z: f64::read(&mut reader)?,
                on_ground: bool::read(&mut reader)?,
            },
            ids::S_MOVE_PLAYER_POS_ROT => Self::MovePlayerPosRot {
                x: f64::read(&mut reader)?,
                y: f64::read(&mut reader)?,
                z: f64::read(&mut reader)?,
                y_rot: f32::read(&mut reader)?,
                x_rot: f32::read(&mut reader)?,
                on_ground: bool::read(&mut reader)?,
            },
            ids::S_MOVE_PLAYER_ROT => Self::MovePlayerRot {
                y_rot: f32::read(&mut reader)?,
                x_rot: f32::read(&mut reader)?,
                on_ground: bool::read(&mut reader)?,
            },
            ids::S_MOVE_PLAYER_STATUS => Self::MovePlayerStatus {
                on_ground: bool::read(&mut reader)?,
            },
            ids::S_PLAYER_ACTION => {
                let action = match VarInt::read(&mut reader)?.0 {
                    0 => PlayerActionKind::StartDestroyBlock,
                    1 => PlayerActionKind::AbortDestroyBlock,
                    2 => PlayerActionKind::StopDestroyBlock,
                    _ => PlayerActionKind::Other,
                };
                let pos = BlockPos::read(&mut reader)?;
                let face_raw = u8::read(&mut reader)?;
                let face = Direction::ALL
                    .get(face_raw as usize)
                    .copied()
                    .ok_or_else(|| io::Error::other("face out of range"))?;
                Self::PlayerAction {
                    action,
                    pos,
                    face,
                    sequence: VarInt::read(&mut reader)?.0,
                }
            }
            ids::S_SET_CARRIED_ITEM => Self::SetCarriedItem {
                slot: i16::read(&mut reader)?,
            },
            ids::S_USE_ITEM_ON => Self::UseItemOn {
                hand: VarInt::read(&mut reader)?.0,
                pos: BlockPos::read(&mut reader)?,
                face: read_direction(&mut reader)?,
                cursor_x: f32::read(&mut reader)?,
                cursor_y: f32::read(&mut reader)?,
                cursor_z: f32::read(&mut reader)?,
                inside: bool::read(&mut reader)?,
                sequence: VarInt::read(&mut reader)?.0,
            },
            other => Self::Ignored { id: other },
        };
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::WriteTo;

    #[test]
    fn decode_use_item_on() {
        let mut payload = Vec::new();
        VarInt(ids::S_USE_ITEM_ON).write(&mut payload).unwrap();
        VarInt(0).write(&mut payload).unwrap();
        BlockPos::new(5, 64, -3).write(&mut payload).unwrap();
        VarInt(1).write(&mut payload).unwrap();
        0.5f32.write(&mut payload).unwrap();
        1.0f32.write(&mut payload).unwrap();
        0.5f32.write(&mut payload).unwrap();
        false.write(&mut payload).unwrap();
        VarInt(7).write(&mut payload).unwrap();

        match ServerboundPacket::decode(&payload).unwrap() {
            ServerboundPacket::UseItemOn {
                pos,
                face,
                sequence,
                ..
            } => {
                assert_eq!(pos, BlockPos::new(5, 64, -3));
                assert_eq!(face, Direction::Up);
                assert_eq!(sequence, 7);
            }
            other => panic!("wrong packet: {other:?}"),
        }
    }

    #[test]
    fn unknown_packet_is_ignored() {
        let mut payload = Vec::new();
        VarInt(0x7F).write(&mut payload).unwrap();
        match ServerboundPacket::decode(&payload).unwrap() {
            ServerboundPacket::Ignored { id } => assert_eq!(id, 0x7F),
            other => panic!("wrong packet: {other:?}"),
        }
    }
}
