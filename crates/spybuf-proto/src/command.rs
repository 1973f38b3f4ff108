//! Payloads shared by the device configuration commands.

use prost::Message;

/// Head of every device command reply.
///
/// Command-specific replies carry further fields after these two; decoding
/// as `CommandResponse` skips them.
#[derive(Clone, PartialEq, Message)]
pub struct CommandResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// Payload of commands that take no arguments.
#[derive(Clone, PartialEq, Message)]
pub struct EmptyRequest {}
