//! Control envelope and payload schemas for the device control endpoint.
//!
//! Every request and reply on a link is a [`ControlEnvelope`]: a closed
//! [`MessageType`] plus an opaque payload whose protobuf schema the type
//! selects. This crate is pure: no I/O, no state.
//!
//! ```
//! use spybuf_proto::{decode, encode, MessageType};
//!
//! let wire = encode(MessageType::DoSoftwareTrigger, b"");
//! let envelope = decode(&wire).unwrap();
//! assert_eq!(envelope.kind, MessageType::DoSoftwareTrigger);
//! ```

pub mod command;
pub mod envelope;
pub mod error;
pub mod message_type;
pub mod spybuffer;

pub use command::{CommandResponse, EmptyRequest};
pub use envelope::{decode, decode_payload, encode, encode_message, ControlEnvelope, Envelope};
pub use error::{ProtoError, Result};
pub use message_type::MessageType;
pub use spybuffer::{
    DumpSpyBuffersChunkRequest, DumpSpyBuffersChunkResponse, DumpSpyBuffersRequest,
    DumpSpyBuffersResponse,
};
