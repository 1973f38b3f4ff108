use std::time::Duration;

use spybuf_link::LinkError;
use spybuf_proto::{MessageType, ProtoError};

use crate::reshape::ReshapeError;

/// Errors that end an acquisition or a command call.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The request failed validation before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request could not be sent.
    #[error("send failed: {0}")]
    Send(#[source] LinkError),

    /// The link failed or closed while waiting for a reply.
    #[error("receive failed: {0}")]
    Receive(#[source] LinkError),

    /// A reply could not be decoded.
    #[error(transparent)]
    Decode(#[from] ProtoError),

    /// A reply carried a type other than the one this exchange expects.
    #[error("unexpected message type {actual} (expected {expected})")]
    UnexpectedMessageType {
        expected: MessageType,
        actual: String,
    },

    /// Reply metadata disagrees with the request.
    #[error("{what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: u64,
        actual: u64,
    },

    /// The device answered with `success = false`.
    #[error("device reported failure: {message}")]
    ServerReportedFailure { message: String },

    /// No reply within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the acquisition.
    #[error("acquisition cancelled")]
    Cancelled,

    /// Sample data did not fit the request layout.
    #[error(transparent)]
    Reshape(#[from] ReshapeError),

    /// A per-channel sink failed.
    #[error("sink for channel {channel} failed: {source}")]
    Sink {
        channel: u32,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    /// Map a receive-side link error, keeping deadlines distinct.
    pub(crate) fn receive(err: LinkError) -> Self {
        match err {
            LinkError::Timeout(after) => AcquireError::Timeout(after),
            other => AcquireError::Receive(other),
        }
    }

    /// Map a decode error for a reply whose type is checked by the caller.
    pub(crate) fn decode_reply(err: ProtoError, expected: MessageType) -> Self {
        match err {
            ProtoError::UnknownMessageType(value) => AcquireError::UnexpectedMessageType {
                expected,
                actual: value.to_string(),
            },
            other => AcquireError::Decode(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquireError>;
