use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::is_known;

/// Bytes before the payload: magic, length, kind.
pub const HEADER_SIZE: usize = 8;

/// "SB", the first two bytes of every frame.
pub const MAGIC: [u8; 2] = *b"SB";

/// Default maximum payload size: 64 MiB.
///
/// A legacy reply carries every requested sample in one frame, so the
/// limit is sized for 40 channels x 4096 samples x 100 waveforms of u32.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// One frame off the wire.
#[derive(Debug, Clone)]
pub struct Frame {
    /// [`HELLO`](crate::HELLO), [`MESSAGE`](crate::MESSAGE) or
    /// [`GOODBYE`](crate::GOODBYE).
    pub kind: u16,
    pub payload: Bytes,
}

/// Parsed frame header.
///
/// ```text
/// offset 0   2          6        8
///        | SB | len u32 | kind u16 | payload (len bytes) |
/// ```
/// Both integers are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: u16,
    pub payload_len: usize,
}

impl FrameHeader {
    /// Validate the first [`HEADER_SIZE`] bytes of a frame.
    pub fn parse(header: &[u8; HEADER_SIZE], max_payload: usize) -> Result<Self> {
        let [m0, m1, l0, l1, l2, l3, k0, k1] = *header;
        if [m0, m1] != MAGIC {
            return Err(FrameError::InvalidMagic);
        }

        let kind = u16::from_le_bytes([k0, k1]);
        if !is_known(kind) {
            return Err(FrameError::UnknownKind(kind));
        }

        let payload_len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;
        if payload_len > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: max_payload,
            });
        }

        Ok(Self { kind, payload_len })
    }

    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let len = u32::try_from(self.payload_len).map_err(|_| FrameError::PayloadTooLarge {
            size: self.payload_len,
            max: u32::MAX as usize,
        })?;
        dst.put_slice(&MAGIC);
        dst.put_u32_le(len);
        dst.put_u16_le(self.kind);
        Ok(())
    }
}

/// Append one frame of `kind` carrying `payload` to `dst`.
pub fn encode_frame(kind: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = FrameHeader {
        kind,
        payload_len: payload.len(),
    };
    dst.reserve(HEADER_SIZE + payload.len());
    header.put(dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Take one complete frame off the front of `src`.
///
/// `Ok(None)` means more bytes are needed; nothing is consumed until the
/// whole frame is buffered. A bad header is reported as soon as its eight
/// bytes are present.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(header) = src.first_chunk::<HEADER_SIZE>() else {
        return Ok(None);
    };
    let header = FrameHeader::parse(header, max_payload)?;

    let total = HEADER_SIZE + header.payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(Frame {
        kind: header.kind,
        payload: src.split_to(header.payload_len).freeze(),
    }))
}

/// Limits and deadlines for one side of a link.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub max_payload_size: usize,
    /// `None` blocks.
    pub read_timeout: Option<Duration>,
    /// `None` blocks.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
