//! TCP transport for spybuf device links.
//!
//! This is the lowest layer of spybuf. It knows how to parse a device
//! endpoint (`tcp://host:port`), open a connection within a bounded time,
//! and hand back a [`LinkStream`] that implements `Read + Write`.
//! Everything above it (framing, handshake, acquisition) is transport
//! agnostic.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::TcpTransport;
