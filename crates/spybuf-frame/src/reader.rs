use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::BytesMut;
use spybuf_transport::LinkStream;

use crate::codec::{decode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Bytes already buffered survive a read timeout, so a timed-out
/// `read_frame` can simply be retried.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    max_payload: usize,
}

impl<T: Read> FrameReader<T> {
    /// Reader accepting payloads up to [`DEFAULT_MAX_PAYLOAD`].
    pub fn new(inner: T) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_limit(inner: T, max_payload: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_payload,
        }
    }

    /// Block until the next complete frame.
    ///
    /// EOF, even in the middle of a frame, is `ConnectionClosed`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.max_payload)? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn set_max_payload_size(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }

    // Read once into the tail of `buf`. On error `buf` is left as it was.
    fn fill(&mut self) -> Result<()> {
        let filled = self.buf.len();
        self.buf.resize(filled + READ_CHUNK_SIZE, 0);
        let outcome = loop {
            match self.inner.read(&mut self.buf[filled..]) {
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        self.buf.truncate(filled + *outcome.as_ref().unwrap_or(&0));

        match outcome {
            Ok(0) => Err(FrameError::ConnectionClosed),
            Ok(_) => Ok(()),
            Err(err) => Err(FrameError::Io(err)),
        }
    }
}

impl FrameReader<LinkStream> {
    /// Reader over one half of a link, with the configured read deadline.
    pub fn for_link(stream: LinkStream, config: &FrameConfig) -> Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_limit(stream, config.max_payload_size))
    }

    /// `None` blocks until a frame arrives.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use spybuf_transport::TcpTransport;

    use super::*;
    use crate::codec::encode_frame;
    use crate::kind::{GOODBYE, HELLO, MESSAGE};
    use crate::writer::FrameWriter;

    fn wire(frames: &[(u16, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (kind, payload) in frames {
            encode_frame(*kind, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn loopback_pair() -> (LinkStream, LinkStream) {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.endpoint();
        let connector = std::thread::spawn(move || {
            TcpTransport::connect(&endpoint, TcpTransport::DEFAULT_CONNECT_TIMEOUT).unwrap()
        });
        let server = listener.accept().unwrap();
        (connector.join().unwrap(), server)
    }

    /// Yields the scripted reads in order, then EOF.
    struct Scripted(Vec<std::io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let bytes = self.0.remove(0)?;
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }

    #[test]
    fn reads_a_whole_session_then_reports_close() {
        let bytes = wire(&[
            (HELLO, br#"{"identity":"daq-01"}"#.as_slice()),
            (MESSAGE, [0x08u8, 0x1F].as_slice()),
            (GOODBYE, b"done".as_slice()),
        ]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().kind, HELLO);
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), &[0x08, 0x1F]);
        let goodbye = reader.read_frame().unwrap();
        assert_eq!((goodbye.kind, goodbye.payload.as_ref()), (GOODBYE, b"done".as_ref()));
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn legacy_sized_reply_spans_many_reads() {
        let reply = vec![0xA5; 3 * READ_CHUNK_SIZE + 17];
        let mut reader = FrameReader::new(Cursor::new(wire(&[(MESSAGE, reply.as_slice())])));

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), reply.as_slice());
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn handshake_trickling_in_byte_by_byte() {
        let bytes = wire(&[(HELLO, br#"{"session":"s-1"}"#.as_slice())]);
        let trickle = Scripted(bytes.iter().map(|b| Ok(vec![*b])).collect());
        let mut reader = FrameReader::new(trickle);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.kind, HELLO);
        assert_eq!(frame.payload.as_ref(), br#"{"session":"s-1"}"#);
    }

    #[test]
    fn peer_vanishing_mid_chunk_is_a_close() {
        let mut bytes = wire(&[(MESSAGE, [0u8; 64].as_slice())]);
        bytes.truncate(40);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn timeout_keeps_partial_frame_for_retry() {
        let bytes = wire(&[(MESSAGE, b"chunk-7".as_slice())]);
        let (head, tail) = bytes.split_at(5);
        let mut reader = FrameReader::new(Scripted(vec![
            Ok(head.to_vec()),
            Err(ErrorKind::WouldBlock.into()),
            Err(ErrorKind::Interrupted.into()),
            Ok(tail.to_vec()),
        ]));

        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(reader.buffered(), 5);

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"chunk-7");
    }

    #[test]
    fn limit_applies_to_later_frames() {
        let bytes = wire(&[(HELLO, b"{}".as_slice()), (MESSAGE, [1u8; 32].as_slice())]);
        let mut reader = FrameReader::with_limit(Cursor::new(bytes), 16);

        assert_eq!(reader.read_frame().unwrap().kind, HELLO);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::PayloadTooLarge { size: 32, max: 16 })
        ));
    }

    #[test]
    fn chunk_stream_over_tcp() {
        let (client, server) = loopback_pair();
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let consumer = std::thread::spawn(move || {
            (0..64u32)
                .map(|_| reader.read_frame().unwrap().payload)
                .collect::<Vec<_>>()
        });
        for chunk in 0..64u32 {
            writer.send(MESSAGE, &chunk.to_le_bytes()).unwrap();
        }

        let received = consumer.join().unwrap();
        for (expected, payload) in (0..64u32).zip(received) {
            assert_eq!(payload.as_ref(), &expected.to_le_bytes());
        }
    }

    #[test]
    fn link_reader_honours_read_deadline() {
        let (_client, server) = loopback_pair();
        let config = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::for_link(server, &config).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }
}
