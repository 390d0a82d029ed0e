//! Serialization primitives: `WriteTo`/`ReadFrom` over std IO traits,
//! variable-length integers and the packed block position encoding.
//! Integer fields are big-endian on the wire.

use std::io::{self, Read, Write};

use ember_utils::BlockPos;
use uuid::Uuid;

/// Maximum UTF-8 byte length accepted for an incoming string.
pub const MAX_STRING_BYTES: usize = 32_767;

/// Protocol decode failures that should terminate the client.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed or truncated data.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Types that can serialize themselves to a writer.
pub trait WriteTo {
    /// Writes the value.
    fn write(&self, writer: &mut impl Write) -> io::Result<()>;
}

/// Types that can deserialize themselves from a reader.
pub trait ReadFrom: Sized {
    /// Reads the value.
    fn read(reader: &mut impl Read) -> io::Result<Self>;
}

macro_rules! int_impls {
    ($($ty:ty),+) => {
        $(
            impl WriteTo for $ty {
                fn write(&self, writer: &mut impl Write) -> io::Result<()> {
                    writer.write_all(&self.to_be_bytes())
                }
            }

            impl ReadFrom for $ty {
                fn read(reader: &mut impl Read) -> io::Result<Self> {
                    let mut buf = [0u8; size_of::<$ty>()];
                    reader.read_exact(&mut buf)?;
                    Ok(<$ty>::from_be_bytes(buf))
                }
            }
        )+
    };
}

int_impls!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl WriteTo for bool {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        u8::from(*self).write(writer)
    }
}

impl ReadFrom for bool {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        Ok(u8::read(reader)? != 0)
    }
}

impl WriteTo for Uuid {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

impl ReadFrom for Uuid {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        let mut buf = [0u8; 16];
        reader.read_exact(&mut buf)?;
        Ok(Uuid::from_bytes(buf))
    }
}

/// A protocol variable-length i32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub i32);

impl VarInt {
    /// Maximum encoded size in bytes.
    pub const MAX_SIZE: usize = 5;

    /// The exact number of bytes `write` will produce.
    #[must_use]
    pub fn written_size(value: i32) -> usize {
        match value {
            0 => 1,
            n => (31 - n.leading_zeros() as usize) / 7 + 1,
        }
    }

    /// Decodes a VarInt from a byte slice, returning the value and the number
    /// of bytes consumed. `None` means more bytes are needed.
    pub fn decode_partial(data: &[u8]) -> Result<Option<(i32, usize)>, CodecError> {
        let mut value = 0i32;
        for i in 0..Self::MAX_SIZE {
            let Some(&byte) = data.get(i) else {
                return Ok(None);
            };
            value |= (i32::from(byte) & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(Some((value, i + 1)));
            }
        }
        Err(CodecError::Malformed("VarInt too long"))
    }
}

impl WriteTo for VarInt {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut value = self.0;
        loop {
            let byte = value as u8 & 0x7F;
            value = ((value as u32) >> 7) as i32;
            if value == 0 {
                byte.write(writer)?;
                return Ok(());
            }
            (byte | 0x80).write(writer)?;
        }
    }
}

impl ReadFrom for VarInt {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        let mut value = 0i32;
        for i in 0..Self::MAX_SIZE {
            let byte = u8::read(reader)?;
            value |= (i32::from(byte) & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(Self(value));
            }
        }
        Err(io::Error::other("VarInt too long"))
    }
}

/// A protocol variable-length i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLong(pub i64);

impl VarLong {
    /// Maximum encoded size in bytes.
    pub const MAX_SIZE: usize = 10;
}

impl WriteTo for VarLong {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut value = self.0;
        loop {
            let byte = value as u8 & 0x7F;
            value = ((value as u64) >> 7) as i64;
            if value == 0 {
                byte.write(writer)?;
                return Ok(());
            }
            (byte | 0x80).write(writer)?;
        }
    }
}

impl ReadFrom for VarLong {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        let mut value = 0i64;
        for i in 0..Self::MAX_SIZE {
            let byte = u8::read(reader)?;
            value |= (i64::from(byte) & 0x7F) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(Self(value));
            }
        }
        Err(io::Error::other("VarLong too long"))
    }
}

impl WriteTo for str {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        VarInt(self.len() as i32).write(writer)?;
        writer.write_all(self.as_bytes())
    }
}

impl WriteTo for String {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.as_str().write(writer)
    }
}

impl ReadFrom for String {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        let length = VarInt::read(reader)?.0;
        if length < 0 || length as usize > MAX_STRING_BYTES {
            return Err(io::Error::other("string length out of range"));
        }
        let mut buf = vec![0u8; length as usize];
        reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| io::Error::other("string is not UTF-8"))
    }
}

impl WriteTo for BlockPos {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        self.as_i64().write(writer)
    }
}

impl ReadFrom for BlockPos {
    fn read(reader: &mut impl Read) -> io::Result<Self> {
        Ok(BlockPos::from_i64(i64::read(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_varint(value: i32) {
        let mut buf = Vec::new();
        VarInt(value).write(&mut buf).unwrap();
        assert_eq!(buf.len(), VarInt::written_size(value));
        assert_eq!(VarInt::read(&mut Cursor::new(&buf)).unwrap().0, value);
        assert_eq!(
            VarInt::decode_partial(&buf).unwrap(),
            Some((value, buf.len()))
        );
    }

    #[test]
    fn varint_roundtrip() {
        for value in [0, 1, 127, 128, 255, 25_565, 2_097_151, i32::MAX, -1, i32::MIN] {
            roundtrip_varint(value);
        }
    }

    #[test]
    fn varint_partial_needs_more() {
        assert_eq!(VarInt::decode_partial(&[0x80]).unwrap(), None);
        assert!(VarInt::decode_partial(&[0x80; 6]).is_err());
    }

    #[test]
    fn varlong_roundtrip() {
        for value in [0i64, 1, -1, i64::MAX, i64::MIN, 1 << 40] {
            let mut buf = Vec::new();
            VarLong(value).write(&mut buf).unwrap();
            assert_eq!(VarLong::read(&mut Cursor::new(&buf)).unwrap().0, value);
        }
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        "hello world".write(&mut buf).unwrap();
        assert_eq!(String::read(&mut Cursor::new(&buf)).unwrap(), "hello world");
    }

    #[test]
    fn block_pos_wire_roundtrip() {
        let pos = BlockPos::new(-30_000_000, -64, 29_999_999);
        let mut buf = Vec::new();
        pos.write(&mut buf).unwrap();
        assert_eq!(BlockPos::read(&mut Cursor::new(&buf)).unwrap(), pos);
    }
}
