//! Length-prefixed, kind-tagged message framing for spybuf device links.
//!
//! Every message on a link is framed with:
//! - A 2-byte magic number ("SB") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian frame kind (handshake, message, goodbye)
//!
//! A frame is the unit of atomicity: one encoded envelope always travels
//! in exactly one `MESSAGE` frame, so readers never see half a message.

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameHeader, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use kind::{GOODBYE, HELLO, MESSAGE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
