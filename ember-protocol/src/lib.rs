//! Wire protocol support: serialization primitives, packet framing with
//! optional zlib compression, and the game packets the tick engine produces
//! and consumes. The handshake/status/login state machines live in the
//! server binary; this crate only supplies the encoding layer they share.

pub mod frame;
pub mod ids;
pub mod packets;
pub mod ser;

pub use frame::{CompressionSettings, decode_frame, encode_frame};
pub use ser::{CodecError, ReadFrom, VarInt, VarLong, WriteTo};

use std::io;

/// A clientbound packet with a fixed id in its protocol state.
pub trait ClientPacket: WriteTo {
    /// The packet id.
    const ID: i32;
}

/// Encodes a packet body prefixed with its id (unframed).
pub fn encode_packet<P: ClientPacket>(packet: &P) -> io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(64);
    VarInt(P::ID).write(&mut payload)?;
    packet.write(&mut payload)?;
    Ok(payload)
}
