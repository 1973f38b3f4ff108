//! Streaming spy buffer acquisition for waveform digitizer front-ends.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoints and streams
//! - [`frame`]: length-prefixed, kind-tagged framing
//! - [`proto`]: control envelope and payload schemas
//! - [`link`]: identity-addressed device links with inbound credit (behind `acquire`)
//! - [`acquire`]: legacy and streaming acquisition, reassembly, sinks (behind `acquire`)

/// Re-export transport types.
pub mod transport {
    pub use spybuf_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spybuf_frame::*;
}

/// Re-export envelope and schema types.
pub mod proto {
    pub use spybuf_proto::*;
}

/// Re-export link types (requires `acquire` feature).
#[cfg(feature = "acquire")]
pub mod link {
    pub use spybuf_link::*;
}

/// Re-export acquisition types (requires `acquire` feature).
#[cfg(feature = "acquire")]
pub mod acquire {
    pub use spybuf_acquire::*;
}
