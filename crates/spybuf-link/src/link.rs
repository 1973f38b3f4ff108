use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use spybuf_frame::{
    kind::kind_name, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD, GOODBYE, MESSAGE,
};
use spybuf_transport::LinkStream;
use tracing::{debug, trace, warn};

use crate::channel::MessageChannel;
use crate::error::{LinkError, Result};
use crate::handshake::{HandshakeConfig, HandshakeResult, PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::inbound::{InboundQueue, Pop};

/// Default inbound capacity before a caller applies its own credit.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1000;

/// Link behavior configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Bound on TCP connect and on the hello exchange.
    pub connect_timeout: Duration,
    /// Write timeout for outbound frames. `None` blocks.
    pub write_timeout: Option<Duration>,
    /// Inbound capacity until [`MessageChannel::set_inbound_capacity`] is called.
    pub inbound_capacity: usize,
    /// Largest accepted message payload.
    pub max_payload_size: usize,
    pub protocol_name: String,
    pub protocol_version: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Some(Duration::from_secs(30)),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

impl LinkConfig {
    /// Hello exchange settings derived from this config.
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            timeout: self.connect_timeout,
            protocol_name: self.protocol_name.clone(),
            protocol_version: self.protocol_version.clone(),
            ..HandshakeConfig::default()
        }
    }
}

/// Client side of a device link.
///
/// A background thread moves inbound messages into a bounded queue; the
/// queue capacity is the credit window. Outbound messages are written
/// directly from the caller's thread. Dropping the link closes it.
pub struct Link {
    identity: String,
    session: String,
    peer_addr: Option<SocketAddr>,
    writer: FrameWriter<LinkStream>,
    inbound: Arc<InboundQueue>,
    pump: Option<JoinHandle<()>>,
    closed: bool,
}

impl Link {
    /// Start a link over an already handshaken stream.
    pub(crate) fn start(
        handshake: HandshakeResult,
        mut reader: FrameReader<LinkStream>,
        mut writer: FrameWriter<LinkStream>,
        config: &LinkConfig,
    ) -> Result<Self> {
        // Runtime reads block; deadlines are enforced on the queue.
        reader.set_read_timeout(None)?;
        reader.set_max_payload_size(config.max_payload_size);
        writer.set_max_payload_size(config.max_payload_size);

        let inbound = Arc::new(InboundQueue::new(config.inbound_capacity));
        let queue = Arc::clone(&inbound);
        let identity = handshake.identity.clone();
        let pump = thread::Builder::new()
            .name("spybuf-link-reader".to_string())
            .spawn(move || pump_inbound(reader, &queue, &identity))?;

        Ok(Self {
            identity: handshake.identity,
            session: handshake.session,
            peer_addr: writer.get_ref().peer_addr(),
            writer,
            inbound,
            pump: Some(pump),
            closed: false,
        })
    }

    /// Identity this link announced.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Session label assigned by the device.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Address of the device.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Current inbound capacity.
    pub fn inbound_capacity(&self) -> usize {
        self.inbound.capacity()
    }

    /// Messages received but not yet consumed.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Close the link: send `GOODBYE`, shut the socket down and stop the
    /// reader thread. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(err) = self.writer.send(GOODBYE, b"") {
            debug!(identity = %self.identity, error = %err, "goodbye not delivered");
        }
        self.inbound.close("link closed locally");
        let shutdown = self.writer.get_ref().shutdown();
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!(identity = %self.identity, "link reader thread panicked");
            }
        }
        debug!(identity = %self.identity, "link closed");
        shutdown.map_err(LinkError::from)
    }
}

impl MessageChannel for Link {
    fn send_one(&mut self, message: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LinkError::Closed("link closed locally".to_string()));
        }
        if let Some(reason) = self.inbound.closed_reason() {
            return Err(LinkError::Closed(reason));
        }
        self.writer.send(MESSAGE, message).map_err(LinkError::Send)?;
        trace!(identity = %self.identity, bytes = message.len(), "sent message");
        Ok(())
    }

    fn receive_one(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        match self.inbound.pop(timeout) {
            Pop::Message(message) => Ok(message),
            Pop::TimedOut => Err(LinkError::Timeout(timeout.unwrap_or_default())),
            Pop::Closed(reason) => Err(LinkError::Closed(reason)),
        }
    }

    fn set_inbound_capacity(&mut self, capacity: usize) {
        debug!(identity = %self.identity, credit = capacity, "inbound capacity set");
        self.inbound.set_capacity(capacity);
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("identity", &self.identity)
            .field("session", &self.session)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.closed)
            .finish()
    }
}

fn pump_inbound(mut reader: FrameReader<LinkStream>, queue: &InboundQueue, identity: &str) {
    loop {
        match reader.read_frame() {
            Ok(frame) if frame.kind == MESSAGE => {
                trace!(identity, bytes = frame.payload.len(), "received message");
                if !queue.push(frame.payload) {
                    return;
                }
            }
            Ok(frame) if frame.kind == GOODBYE => {
                let reason = String::from_utf8_lossy(&frame.payload).into_owned();
                debug!(identity, %reason, "peer said goodbye");
                if reason.is_empty() {
                    queue.close("peer closed the link");
                } else {
                    queue.close(format!("peer closed the link: {reason}"));
                }
                return;
            }
            Ok(frame) => {
                warn!(identity, kind = kind_name(frame.kind), "ignoring frame after handshake");
            }
            Err(FrameError::ConnectionClosed) => {
                queue.close("connection closed by peer");
                return;
            }
            Err(err) => {
                queue.close(format!("receive failed: {err}"));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::connector::connect_with_config;
    use crate::listener::LinkListener;

    fn listener() -> (LinkListener, String) {
        let listener = LinkListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.endpoint().to_string();
        (listener, endpoint)
    }

    #[test]
    fn messages_flow_both_ways() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            let request = link.recv().unwrap().unwrap();
            link.send(&request).unwrap();
            link.send(b"second").unwrap();
            assert!(link.recv().unwrap().is_none(), "client goodbye ends the session");
        });

        let mut link = connect_with_config(&endpoint, "echo-client", &LinkConfig::default()).unwrap();
        assert_eq!(link.identity(), "echo-client");
        assert_eq!(link.session(), "session-1");

        link.send_one(b"ping").unwrap();
        let timeout = Some(Duration::from_secs(2));
        assert_eq!(link.receive_one(timeout).unwrap().as_ref(), b"ping");
        assert_eq!(link.receive_one(timeout).unwrap().as_ref(), b"second");

        link.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn receive_times_out_without_traffic() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            let _ = link.recv();
        });

        let mut link = connect_with_config(&endpoint, "quiet", &LinkConfig::default()).unwrap();
        let err = link
            .receive_one(Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(matches!(err, LinkError::Timeout(d) if d == Duration::from_millis(50)));

        drop(link);
        server.join().unwrap();
    }

    #[test]
    fn peer_goodbye_closes_after_draining() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            link.send(b"final words").unwrap();
            link.close().unwrap();
        });

        let mut link = connect_with_config(&endpoint, "c", &LinkConfig::default()).unwrap();
        server.join().unwrap();

        let timeout = Some(Duration::from_secs(2));
        assert_eq!(link.receive_one(timeout).unwrap().as_ref(), b"final words");
        assert!(matches!(link.receive_one(timeout), Err(LinkError::Closed(_))));
        assert!(matches!(link.send_one(b"late"), Err(LinkError::Closed(_))));
    }

    #[test]
    fn send_after_close_fails() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            let _ = link.recv();
        });

        let mut link = connect_with_config(&endpoint, "c", &LinkConfig::default()).unwrap();
        link.close().unwrap();
        link.close().unwrap();
        assert!(matches!(link.send_one(b"x"), Err(LinkError::Closed(_))));
        server.join().unwrap();
    }

    #[test]
    fn inbound_capacity_is_adjustable() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            let _ = link.recv();
        });

        let config = LinkConfig {
            inbound_capacity: 4,
            ..LinkConfig::default()
        };
        let mut link = connect_with_config(&endpoint, "c", &config).unwrap();
        assert_eq!(link.inbound_capacity(), 4);
        link.set_inbound_capacity(819);
        assert_eq!(link.inbound_capacity(), 819);

        drop(link);
        server.join().unwrap();
    }

    #[test]
    fn stream_collects_until_consumer_stops() {
        let (listener, endpoint) = listener();
        let server = thread::spawn(move || {
            let mut link = listener.accept().unwrap();
            for i in 0..5u8 {
                link.send(&[i]).unwrap();
            }
            let _ = link.recv();
        });

        let mut link = connect_with_config(&endpoint, "c", &LinkConfig::default()).unwrap();
        let got: Vec<u8> = link
            .receive_stream(Some(Duration::from_secs(2)))
            .take(5)
            .map(|m| m.unwrap()[0])
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);

        drop(link);
        server.join().unwrap();
    }
}
