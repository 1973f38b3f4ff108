use spybuf_frame::{FrameConfig, FrameReader, FrameWriter};
use spybuf_transport::{Endpoint, TcpTransport, TransportError};
use tracing::info;

use crate::error::{LinkError, Result};
use crate::handshake::{handshake_client, validate_identity};
use crate::link::{Link, LinkConfig};

/// Connect to a device endpoint (`tcp://host:port`) as `identity`.
pub fn connect(endpoint: &str, identity: &str) -> Result<Link> {
    connect_with_config(endpoint, identity, &LinkConfig::default())
}

/// Connect with explicit configuration.
///
/// Setup never blocks past `connect_timeout` for the TCP connect plus the
/// same bound for the hello exchange.
pub fn connect_with_config(endpoint: &str, identity: &str, config: &LinkConfig) -> Result<Link> {
    validate_identity(identity)?;

    let endpoint = Endpoint::parse(endpoint).map_err(|err| match err {
        TransportError::InvalidEndpoint { endpoint, reason } => {
            LinkError::InvalidEndpoint { endpoint, reason }
        }
        other => LinkError::Transport(other),
    })?;

    let stream = TcpTransport::connect(&endpoint, config.connect_timeout).map_err(|source| {
        LinkError::Connect {
            endpoint: endpoint.to_string(),
            source,
        }
    })?;
    let reader_stream = stream.try_clone()?;

    let handshake_config = config.handshake();
    let frame_config = FrameConfig {
        max_payload_size: handshake_config.max_handshake_payload,
        read_timeout: Some(handshake_config.timeout),
        write_timeout: config.write_timeout,
    };

    let mut reader = FrameReader::for_link(reader_stream, &frame_config)?;
    let mut writer = FrameWriter::for_link(stream, &frame_config)?;

    let handshake = handshake_client(&mut reader, &mut writer, identity, &handshake_config)?;
    info!(%endpoint, identity, session = %handshake.session, "link established");

    Link::start(handshake, reader, writer, config)
}
