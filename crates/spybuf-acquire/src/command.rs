//! One-shot control commands sharing the acquisition link.

use std::time::Duration;

use prost::Message;
use spybuf_link::MessageChannel;
use spybuf_proto::{decode, encode_message, CommandResponse, EmptyRequest, Envelope, MessageType};
use tracing::debug;

use crate::error::{AcquireError, Result};

/// Send `payload` as `kind` and wait for a reply of the same type.
///
/// Every command reply starts with the `success`/`message` pair, so a
/// refusal is surfaced here as [`AcquireError::ServerReportedFailure`]. The
/// envelope is returned for callers that need the rest of the payload.
pub fn execute<C, M>(channel: &mut C, kind: MessageType, payload: &M, timeout: Duration) -> Result<Envelope>
where
    C: MessageChannel,
    M: Message,
{
    channel
        .send_one(&encode_message(kind, payload))
        .map_err(AcquireError::Send)?;
    debug!(msg_type = %kind, "command sent");

    let bytes = channel.receive_one(Some(timeout)).map_err(AcquireError::receive)?;
    let envelope = decode(&bytes).map_err(|err| AcquireError::decode_reply(err, kind))?;
    if envelope.kind != kind {
        return Err(AcquireError::UnexpectedMessageType {
            expected: kind,
            actual: envelope.kind.to_string(),
        });
    }

    let head: CommandResponse = envelope.payload_as()?;
    if !head.success {
        return Err(AcquireError::ServerReportedFailure {
            message: head.message,
        });
    }
    Ok(envelope)
}

/// Fire a software trigger. Returns the device's message.
pub fn software_trigger<C: MessageChannel>(channel: &mut C, timeout: Duration) -> Result<String> {
    let envelope = execute(channel, MessageType::DoSoftwareTrigger, &EmptyRequest {}, timeout)?;
    let reply: CommandResponse = envelope.payload_as()?;
    Ok(reply.message)
}
