//! Identity-addressed message links to spybuf devices.
//!
//! A [`Link`] is one logical session with a device: connect once, send
//! encoded envelopes, receive replies one at a time or as a lazy stream.
//! Inbound messages are buffered in a bounded queue whose capacity is the
//! flow-control credit offered to the device.

pub mod channel;
pub mod connector;
pub mod error;
pub mod handshake;
mod inbound;
pub mod link;
pub mod listener;

pub use channel::{MessageChannel, MessageStream};
pub use connector::{connect, connect_with_config};
pub use error::{LinkError, Result};
pub use handshake::{
    handshake_client, handshake_server, HandshakeConfig, HandshakeResult, HelloRequest,
    HelloResponse, PROTOCOL_NAME, PROTOCOL_VERSION,
};
pub use link::{Link, LinkConfig, DEFAULT_INBOUND_CAPACITY};
pub use listener::{LinkListener, ServerLink};
