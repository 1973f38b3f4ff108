use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use spybuf_frame::{
    kind::kind_name, FrameConfig, FrameError, FrameReader, FrameWriter, GOODBYE, MESSAGE,
};
use spybuf_transport::{Endpoint, LinkStream, TcpTransport};
use tracing::{debug, warn};

use crate::error::{LinkError, Result};
use crate::handshake::handshake_server;
use crate::link::LinkConfig;

/// Device side: listens for and accepts client links.
pub struct LinkListener {
    transport: TcpTransport,
    config: LinkConfig,
    next_session: AtomicU64,
}

impl LinkListener {
    /// Bind to a TCP address such as `0.0.0.0:9000` or `127.0.0.1:0`.
    pub fn bind(addr: &str) -> Result<Self> {
        Ok(Self {
            transport: TcpTransport::bind(addr)?,
            config: LinkConfig::default(),
            next_session: AtomicU64::new(1),
        })
    }

    /// Override link config.
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next client and assign an auto-generated session label.
    pub fn accept(&self) -> Result<ServerLink> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.accept_with_session(&format!("session-{id}"))
    }

    /// Accept the next client under an explicit session label.
    pub fn accept_with_session(&self, session: &str) -> Result<ServerLink> {
        let stream = self.transport.accept()?;
        let reader_stream = stream.try_clone()?;

        let handshake_config = self.config.handshake();
        let frame_config = FrameConfig {
            max_payload_size: handshake_config.max_handshake_payload,
            read_timeout: Some(handshake_config.timeout),
            write_timeout: self.config.write_timeout,
        };

        let mut reader = FrameReader::for_link(reader_stream, &frame_config)?;
        let mut writer = FrameWriter::for_link(stream, &frame_config)?;

        let handshake = handshake_server(&mut reader, &mut writer, session, &handshake_config)?;

        reader.set_read_timeout(None)?;
        reader.set_max_payload_size(self.config.max_payload_size);
        writer.set_max_payload_size(self.config.max_payload_size);

        Ok(ServerLink {
            identity: handshake.identity,
            session: handshake.session,
            reader,
            writer,
            closed: false,
        })
    }

    /// Bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Bound address as a connectable endpoint.
    pub fn endpoint(&self) -> Endpoint {
        self.transport.endpoint()
    }
}

/// Device side of one accepted link. Synchronous: one request is read,
/// answered, then the next is read.
pub struct ServerLink {
    identity: String,
    session: String,
    reader: FrameReader<LinkStream>,
    writer: FrameWriter<LinkStream>,
    closed: bool,
}

impl ServerLink {
    /// Identity of the connected client.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Next message from the client. `None` once the client said goodbye
    /// or disconnected.
    pub fn recv(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            match self.reader.read_frame() {
                Ok(frame) if frame.kind == MESSAGE => return Ok(Some(frame.payload)),
                Ok(frame) if frame.kind == GOODBYE => {
                    debug!(identity = %self.identity, "client said goodbye");
                    self.closed = true;
                    return Ok(None);
                }
                Ok(frame) => {
                    warn!(identity = %self.identity, kind = kind_name(frame.kind), "ignoring frame");
                }
                Err(FrameError::ConnectionClosed) => {
                    self.closed = true;
                    return Ok(None);
                }
                Err(err) => return Err(LinkError::Frame(err)),
            }
        }
    }

    /// Send one message to the client.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LinkError::Closed("client is gone".to_string()));
        }
        self.writer.send(MESSAGE, message).map_err(LinkError::Send)
    }

    /// Say goodbye and shut the connection down.
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            if let Err(err) = self.writer.send(GOODBYE, b"") {
                debug!(identity = %self.identity, error = %err, "goodbye not delivered");
            }
            self.closed = true;
        }
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}
