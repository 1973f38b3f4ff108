use std::time::Duration;

use spybuf_frame::FrameError;
use spybuf_transport::TransportError;

/// Errors that can occur on a device link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The endpoint string could not be parsed.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The device could not be reached.
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    /// Handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// An outbound message could not be written.
    #[error("send failed: {0}")]
    Send(#[source] FrameError),

    /// The link is closed; no further messages will arrive or leave.
    #[error("link closed: {0}")]
    Closed(String),

    /// No message arrived within the deadline.
    #[error("no message received within {0:?}")]
    Timeout(Duration),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to start the inbound reader thread.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// True for errors raised while establishing the link.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            LinkError::InvalidEndpoint { .. }
                | LinkError::Connect { .. }
                | LinkError::HandshakeFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
