use std::io::{self, ErrorKind, Write};

use bytes::BytesMut;
use spybuf_transport::LinkStream;

use crate::codec::{encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

// Encode buffers above this are released after the frame leaves.
const RETAINED_BUFFER_CAPACITY: usize = 4 * INITIAL_BUFFER_CAPACITY;

/// Writes complete frames to any `Write` stream.
///
/// Header and payload are encoded into one buffer and written together, so
/// a frame either leaves whole or the writer reports an error.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
}

impl<T: Write> FrameWriter<T> {
    /// Writer accepting payloads up to [`DEFAULT_MAX_PAYLOAD`].
    pub fn new(inner: T) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_limit(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload,
        }
    }

    /// Send `payload` as one frame of `kind` and flush it.
    ///
    /// An oversized payload is refused before anything is written.
    pub fn send(&mut self, kind: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        self.buf.clear();
        encode_frame(kind, payload, &mut self.buf)?;
        let sent = self
            .inner
            .write_all(&self.buf)
            .and_then(|()| flush_retrying(&mut self.inner));

        if self.buf.capacity() > RETAINED_BUFFER_CAPACITY {
            self.buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        }

        sent.map_err(|err| match err.kind() {
            ErrorKind::WriteZero => FrameError::ConnectionClosed,
            _ => FrameError::Io(err),
        })
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn set_max_payload_size(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }
}

fn flush_retrying<W: Write>(inner: &mut W) -> io::Result<()> {
    loop {
        match inner.flush() {
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl FrameWriter<LinkStream> {
    /// Writer over one half of a link, with the configured write deadline.
    pub fn for_link(stream: LinkStream, config: &FrameConfig) -> Result<Self> {
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_limit(stream, config.max_payload_size))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{decode_frame, HEADER_SIZE};
    use crate::kind::{GOODBYE, HELLO, MESSAGE};

    fn captured() -> FrameWriter<Cursor<Vec<u8>>> {
        FrameWriter::new(Cursor::new(Vec::new()))
    }

    fn sent_frames(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<(u16, Vec<u8>)> {
        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX).unwrap() {
            frames.push((frame.kind, frame.payload.to_vec()));
        }
        assert!(wire.is_empty(), "trailing bytes after the last frame");
        frames
    }

    /// Records writes and flushes; fails each operation per its script first.
    #[derive(Default)]
    struct Device {
        data: Vec<u8>,
        flushes: usize,
        write_errors: Vec<ErrorKind>,
        flush_errors: Vec<ErrorKind>,
        accepts_nothing: bool,
    }

    impl Write for Device {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_errors.pop() {
                return Err(kind.into());
            }
            if self.accepts_nothing {
                return Ok(0);
            }
            // Short writes: at most 3 bytes at a time.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some(kind) = self.flush_errors.pop() {
                return Err(kind.into());
            }
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn session_frames_leave_in_order() {
        let mut writer = captured();
        writer.send(HELLO, br#"{"identity":"daq-01"}"#).unwrap();
        writer.send(MESSAGE, &[0x08, 0x1C, 0x12, 0x00]).unwrap();
        writer.send(GOODBYE, b"").unwrap();

        assert_eq!(
            sent_frames(writer),
            vec![
                (HELLO, br#"{"identity":"daq-01"}"#.to_vec()),
                (MESSAGE, vec![0x08, 0x1C, 0x12, 0x00]),
                (GOODBYE, Vec::new()),
            ]
        );
    }

    #[test]
    fn oversized_reply_writes_nothing() {
        let mut writer = FrameWriter::with_limit(Cursor::new(Vec::new()), 1024);

        let err = writer.send(MESSAGE, &[0u8; 1025]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1025, max: 1024 }));
        writer.send(MESSAGE, &[0u8; 1024]).unwrap();

        let frames = sent_frames(writer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1.len(), 1024);
    }

    #[test]
    fn large_reply_then_small_chunk() {
        let reply = vec![0x5A; 256 * 1024];
        let mut writer = captured();
        writer.send(MESSAGE, &reply).unwrap();
        writer.send(MESSAGE, b"next").unwrap();

        let frames = sent_frames(writer);
        assert_eq!(frames[0].1, reply);
        assert_eq!(frames[1].1, b"next");
    }

    #[test]
    fn short_and_interrupted_writes_complete_the_frame() {
        let device = Device {
            write_errors: vec![ErrorKind::Interrupted],
            flush_errors: vec![ErrorKind::Interrupted],
            ..Device::default()
        };
        let mut writer = FrameWriter::new(device);
        writer.send(MESSAGE, b"chunk").unwrap();

        let device = writer.into_inner();
        assert_eq!(device.data.len(), HEADER_SIZE + 5);
        assert_eq!(device.flushes, 1);
    }

    #[test]
    fn stalled_peer_is_a_timeout() {
        let device = Device {
            write_errors: vec![ErrorKind::WouldBlock],
            ..Device::default()
        };
        let err = FrameWriter::new(device).send(MESSAGE, b"x").unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let device = Device {
            accepts_nothing: true,
            ..Device::default()
        };
        let err = FrameWriter::new(device).send(GOODBYE, b"bye").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
