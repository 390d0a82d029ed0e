//! Packet framing.
//!
//! Without compression a frame is `VarInt(size) | payload`. With compression
//! enabled it is `VarInt(total) | VarInt(uncompressed_size) | zlib(payload)`,
//! where payloads under the threshold are sent uncompressed with an
//! uncompressed-size field of 0.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::ser::{CodecError, VarInt, WriteTo};

/// Upper bound accepted for a single frame, compressed or not.
pub const MAX_FRAME_BYTES: usize = 1 << 21;

/// Compression parameters negotiated at login time.
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    /// Packets at least this large are compressed.
    pub threshold: usize,
    /// zlib level, 1..=9.
    pub level: u32,
}

/// Encodes one packet payload into a framed byte vector.
pub fn encode_frame(
    payload: &[u8],
    compression: Option<CompressionSettings>,
) -> Result<Vec<u8>, CodecError> {
    let mut frame = Vec::with_capacity(payload.len() + 6);
    match compression {
        None => {
            VarInt(payload.len() as i32).write(&mut frame)?;
            frame.extend_from_slice(payload);
        }
        Some(settings) if payload.len() < settings.threshold => {
            VarInt((payload.len() + 1) as i32).write(&mut frame)?;
            VarInt(0).write(&mut frame)?;
            frame.extend_from_slice(payload);
        }
        Some(settings) => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(settings.level));
            encoder.write_all(payload)?;
            let compressed = encoder.finish()?;
            let size_prefix = VarInt::written_size(payload.len() as i32);
            VarInt((compressed.len() + size_prefix) as i32).write(&mut frame)?;
            VarInt(payload.len() as i32).write(&mut frame)?;
            frame.extend_from_slice(&compressed);
        }
    }
    Ok(frame)
}

/// Attempts to decode one frame from the front of `data`.
///
/// Returns the decoded payload and the number of bytes consumed, or `None`
/// when the buffer does not yet hold a whole frame.
pub fn decode_frame(
    data: &[u8],
    compression: Option<CompressionSettings>,
) -> Result<Option<(Vec<u8>, usize)>, CodecError> {
    let Some((frame_size, header)) = VarInt::decode_partial(data)? else {
        return Ok(None);
    };
    if frame_size < 0 || frame_size as usize > MAX_FRAME_BYTES {
        return Err(CodecError::Malformed("frame size out of range"));
    }
    let frame_size = frame_size as usize;
    if data.len() < header + frame_size {
        return Ok(None);
    }
    let body = &data[header..header + frame_size];
    let consumed = header + frame_size;

    if compression.is_none() {
        return Ok(Some((body.to_vec(), consumed)));
    }

    let Some((uncompressed_size, prefix)) = VarInt::decode_partial(body)? else {
        return Err(CodecError::Malformed("truncated compression header"));
    };
    let compressed = &body[prefix..];
    if uncompressed_size == 0 {
        return Ok(Some((compressed.to_vec(), consumed)));
    }
    if uncompressed_size < 0 || uncompressed_size as usize > MAX_FRAME_BYTES {
        return Err(CodecError::Malformed("uncompressed size out of range"));
    }

    let mut payload = Vec::with_capacity(uncompressed_size as usize);
    let mut decoder = ZlibDecoder::new(compressed).take(uncompressed_size as u64 + 1);
    decoder.read_to_end(&mut payload)?;
    if payload.len() != uncompressed_size as usize {
        return Err(CodecError::Malformed("uncompressed size mismatch"));
    }
    Ok(Some((payload, consumed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: CompressionSettings = CompressionSettings {
        threshold: 64,
        level: 6,
    };

    #[test]
    fn uncompressed_roundtrip() {
        let payload = b"short payload".to_vec();
        let frame = encode_frame(&payload, None).unwrap();
        let (decoded, consumed) = decode_frame(&frame, None).unwrap().expect("whole frame");
        assert_eq!(decoded, payload);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn below_threshold_roundtrip() {
        let payload = b"short".to_vec();
        let frame = encode_frame(&payload, Some(SETTINGS)).unwrap();
        let (decoded, _) = decode_frame(&frame, Some(SETTINGS)).unwrap().expect("frame");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn compressed_roundtrip() {
        let payload = vec![7u8; 4096];
        let frame = encode_frame(&payload, Some(SETTINGS)).unwrap();
        assert!(frame.len() < payload.len());
        let (decoded, consumed) = decode_frame(&frame, Some(SETTINGS)).unwrap().expect("frame");
        assert_eq!(decoded, payload);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn partial_frame_waits() {
        let payload = vec![1u8; 100];
        let frame = encode_frame(&payload, None).unwrap();
        assert!(decode_frame(&frame[..frame.len() - 1], None).unwrap().is_none());
    }

    #[test]
    fn lying_size_rejected() {
        let payload = vec![3u8; 200];
        let mut frame = encode_frame(&payload, Some(SETTINGS)).unwrap();
        // Corrupt the declared uncompressed size, which sits right after the
        // frame-size prefix.
        let (_, header) = VarInt::decode_partial(&frame).unwrap().unwrap();
        frame[header] ^= 0x01;
        assert!(decode_frame(&frame, Some(SETTINGS)).is_err());
    }
}
