use bytes::Bytes;
use prost::Message;

use crate::error::{ProtoError, Result};
use crate::message_type::MessageType;

/// Outer wrapper of every message on the control endpoint.
#[derive(Clone, PartialEq, Message)]
pub struct ControlEnvelope {
    /// Wire value of a [`MessageType`].
    #[prost(enumeration = "MessageType", tag = "1")]
    pub msg_type: i32,

    /// Payload encoded with the schema `msg_type` selects.
    #[prost(bytes = "bytes", tag = "2")]
    pub payload: Bytes,
}

/// A decoded envelope with a known type.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: MessageType,
    pub payload: Bytes,
}

impl Envelope {
    /// Decode the payload as `T`.
    pub fn payload_as<T: Message + Default>(&self) -> Result<T> {
        decode_payload(&self.payload)
    }
}

/// Encode `payload` in an envelope of type `kind`.
pub fn encode(kind: MessageType, payload: &[u8]) -> Vec<u8> {
    ControlEnvelope {
        msg_type: kind.into(),
        payload: Bytes::copy_from_slice(payload),
    }
    .encode_to_vec()
}

/// Encode a protobuf message as the payload of an envelope of type `kind`.
pub fn encode_message<T: Message>(kind: MessageType, message: &T) -> Vec<u8> {
    ControlEnvelope {
        msg_type: kind.into(),
        payload: Bytes::from(message.encode_to_vec()),
    }
    .encode_to_vec()
}

/// Decode an envelope.
///
/// Fails with [`ProtoError::MalformedEnvelope`] when the bytes do not parse
/// or the type field is unset, and with [`ProtoError::UnknownMessageType`]
/// when the type is outside the enumeration.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    let raw = ControlEnvelope::decode(bytes)
        .map_err(|err| ProtoError::MalformedEnvelope(err.to_string()))?;

    match MessageType::try_from(raw.msg_type) {
        Ok(MessageType::Unspecified) => Err(ProtoError::MalformedEnvelope(
            "message type is not set".to_string(),
        )),
        Ok(kind) => Ok(Envelope {
            kind,
            payload: raw.payload,
        }),
        Err(_) => Err(ProtoError::UnknownMessageType(raw.msg_type)),
    }
}

/// Decode a payload with the schema `T`.
pub fn decode_payload<T: Message + Default>(payload: &[u8]) -> Result<T> {
    T::decode(payload).map_err(|source| ProtoError::MalformedPayload {
        schema: short_type_name::<T>(),
        source,
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandResponse;
    use crate::spybuffer::DumpSpyBuffersResponse;

    #[test]
    fn envelope_carries_type_and_payload() {
        let wire = encode(MessageType::WriteAfeVgain, &[1, 2, 3]);
        let envelope = decode(&wire).unwrap();
        assert_eq!(envelope.kind, MessageType::WriteAfeVgain);
        assert_eq!(envelope.payload.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        let response = DumpSpyBuffersResponse {
            success: true,
            data: (0..64).collect(),
            ..Default::default()
        };
        let wire = encode_message(MessageType::DumpSpybuffer, &response);

        let err = decode(&wire[..wire.len() - 10]).unwrap_err();
        assert!(matches!(err, ProtoError::MalformedEnvelope(_)), "{err:?}");
    }

    #[test]
    fn garbage_is_malformed() {
        let err = decode(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, ProtoError::MalformedEnvelope(_)));
    }

    #[test]
    fn empty_bytes_have_no_type() {
        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, ProtoError::MalformedEnvelope(_)));
    }

    #[test]
    fn out_of_range_type_is_reported() {
        let wire = ControlEnvelope {
            msg_type: 99,
            payload: Bytes::new(),
        }
        .encode_to_vec();
        let err = decode(&wire).unwrap_err();
        assert!(matches!(err, ProtoError::UnknownMessageType(99)));
    }

    #[test]
    fn payload_schema_mismatch_names_schema() {
        let envelope = Envelope {
            kind: MessageType::ReadAfeReg,
            payload: Bytes::from_static(&[0x0A, 0x05, b'a']),
        };
        let err = envelope.payload_as::<CommandResponse>().unwrap_err();
        match err {
            ProtoError::MalformedPayload { schema, .. } => assert_eq!(schema, "CommandResponse"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
