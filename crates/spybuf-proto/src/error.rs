/// Errors raised while decoding envelopes and payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The bytes do not parse as a control envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope parsed but its type is outside the known enumeration.
    #[error("unknown message type {0}")]
    UnknownMessageType(i32),

    /// The envelope payload does not parse as the schema its type selects.
    #[error("malformed {schema} payload: {source}")]
    MalformedPayload {
        schema: &'static str,
        source: prost::DecodeError,
    },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
