//! Frame kinds.
//!
//! The kind travels in the frame header and tells the link layer how to
//! treat the payload before any envelope decoding happens.

/// Connection handshake (identity exchange). Only valid before the first
/// `MESSAGE` frame.
pub const HELLO: u16 = 0;

/// One encoded control envelope.
pub const MESSAGE: u16 = 1;

/// Orderly close notification; the payload is an optional UTF-8 reason.
pub const GOODBYE: u16 = 2;

/// Returns a human-readable name for a frame kind.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        HELLO => "HELLO",
        MESSAGE => "MESSAGE",
        GOODBYE => "GOODBYE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the kind is defined by this protocol version.
pub fn is_known(kind: u16) -> bool {
    kind <= GOODBYE
}
