use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use spybuf_frame::{FrameError, FrameReader, FrameWriter, HELLO};
use tracing::debug;

use crate::error::{LinkError, Result};

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_IDENTITY_LEN: usize = 255;
const MAX_SESSION_LEN: usize = 128;

/// Protocol name spoken by spybuf links.
pub const PROTOCOL_NAME: &str = "spybuf";

/// Local protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Client hello sent in the first `HELLO` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloRequest {
    pub protocol: String,
    pub version: String,
    /// Client identity. Replies are routed to this identity.
    pub identity: String,
}

/// Server answer to [`HelloRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloResponse {
    pub protocol: String,
    pub version: String,
    /// Identity echoed back from the request.
    pub identity: String,
    /// Server-assigned session label.
    pub session: String,
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    pub identity: String,
    pub session: String,
    /// Version announced by the remote side.
    pub remote_version: String,
}

/// Configuration for the hello exchange.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Bound on the whole exchange.
    pub timeout: Duration,
    pub protocol_name: String,
    pub protocol_version: String,
    /// Maximum hello payload size in bytes.
    pub max_handshake_payload: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            max_handshake_payload: 16 * 1024,
        }
    }
}

/// Perform the client side of the hello exchange.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    identity: &str,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    validate_identity(identity)?;
    validate_protocol_name(&config.protocol_name)?;
    validate_version(&config.protocol_version)?;

    let req = HelloRequest {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        identity: identity.to_string(),
    };
    send_hello(writer, &req)?;

    let deadline = Instant::now() + config.timeout;
    let payload = recv_hello(reader, deadline, config)?;
    let resp: HelloResponse = serde_json::from_slice(&payload)?;

    check_protocol(&config.protocol_name, &resp.protocol)?;
    check_version(&config.protocol_version, &resp.version)?;
    validate_session(&resp.session)?;

    if resp.identity != identity {
        return Err(LinkError::HandshakeFailed(format!(
            "server acknowledged identity '{}' (sent '{}')",
            resp.identity, identity
        )));
    }

    debug!(identity, session = %resp.session, "handshake complete");

    Ok(HandshakeResult {
        identity: resp.identity,
        session: resp.session,
        remote_version: resp.version,
    })
}

/// Perform the server side of the hello exchange.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    session: &str,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    validate_session(session)?;

    let deadline = Instant::now() + config.timeout;
    let payload = recv_hello(reader, deadline, config)?;
    let req: HelloRequest = serde_json::from_slice(&payload)?;

    validate_identity(&req.identity)?;
    check_protocol(&config.protocol_name, &req.protocol)?;
    check_version(&config.protocol_version, &req.version)?;

    let resp = HelloResponse {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        identity: req.identity.clone(),
        session: session.to_string(),
    };
    send_hello(writer, &resp)?;

    debug!(identity = %req.identity, session, "accepted handshake");

    Ok(HandshakeResult {
        identity: req.identity,
        session: session.to_string(),
        remote_version: req.version,
    })
}

fn send_hello<T: Serialize, W: Write>(writer: &mut FrameWriter<W>, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    writer.send(HELLO, &payload)?;
    Ok(())
}

fn recv_hello<R: Read>(
    reader: &mut FrameReader<R>,
    deadline: Instant,
    config: &HandshakeConfig,
) -> Result<Vec<u8>> {
    loop {
        if Instant::now() >= deadline {
            return Err(LinkError::Timeout(config.timeout));
        }

        match reader.read_frame() {
            Ok(frame) => {
                if frame.kind != HELLO {
                    return Err(LinkError::HandshakeFailed(format!(
                        "expected HELLO frame, got {}",
                        spybuf_frame::kind::kind_name(frame.kind)
                    )));
                }
                if frame.payload.len() > config.max_handshake_payload {
                    return Err(LinkError::HandshakeFailed(format!(
                        "hello payload too large: {} (max {})",
                        frame.payload.len(),
                        config.max_handshake_payload
                    )));
                }
                return Ok(frame.payload.to_vec());
            }
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                return Err(LinkError::HandshakeFailed(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(LinkError::Frame(err)),
        }
    }
}

fn check_protocol(local: &str, remote: &str) -> Result<()> {
    validate_protocol_name(remote)?;
    if local != remote {
        return Err(LinkError::HandshakeFailed(format!(
            "unknown protocol '{remote}' (expected '{local}')"
        )));
    }
    Ok(())
}

fn check_version(local: &str, remote: &str) -> Result<()> {
    validate_version(remote)?;
    let (local_major, _) = parse_version(local)?;
    let (remote_major, _) = parse_version(remote)?;
    if local_major != remote_major {
        return Err(LinkError::HandshakeFailed(format!(
            "incompatible version '{remote}' (local '{local}')"
        )));
    }
    Ok(())
}

pub(crate) fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(LinkError::HandshakeFailed(format!(
            "invalid identity length: {}",
            identity.len()
        )));
    }
    Ok(())
}

fn validate_session(session: &str) -> Result<()> {
    if session.is_empty() || session.len() > MAX_SESSION_LEN {
        return Err(LinkError::HandshakeFailed(format!(
            "invalid session length: {}",
            session.len()
        )));
    }
    Ok(())
}

fn validate_protocol_name(protocol: &str) -> Result<()> {
    if protocol.is_empty() || protocol.len() > MAX_PROTOCOL_LEN {
        return Err(LinkError::HandshakeFailed(format!(
            "invalid protocol name length: {}",
            protocol.len()
        )));
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        return Err(LinkError::HandshakeFailed(format!(
            "invalid protocol version length: {}",
            version.len()
        )));
    }
    parse_version(version).map(|_| ())
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let invalid = |what: &str| LinkError::HandshakeFailed(format!("invalid version '{version}': {what}"));

    let mut parts = version.split('.');
    let major = parts.next().ok_or_else(|| invalid("missing major"))?;
    let minor = parts.next().ok_or_else(|| invalid("missing minor"))?;
    if parts.next().is_some() {
        return Err(invalid("expected '<major>.<minor>'"));
    }

    let major = major.parse::<u16>().map_err(|_| invalid("non-numeric major"))?;
    let minor = minor.parse::<u16>().map_err(|_| invalid("non-numeric minor"))?;
    Ok((major, minor))
}
