/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5342 \"SB\")")]
    InvalidMagic,

    /// The frame header carries a kind this protocol does not define.
    #[error("unknown frame kind {0}")]
    UnknownKind(u16),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the error is a read/write deadline expiring rather than a
    /// broken connection.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err) if err.kind() == std::io::ErrorKind::WouldBlock
                || err.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

impl From<spybuf_transport::TransportError> for FrameError {
    fn from(err: spybuf_transport::TransportError) -> Self {
        use spybuf_transport::TransportError;

        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
