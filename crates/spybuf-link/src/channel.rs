use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A bidirectional, message-oriented channel to one device.
///
/// Messages are opaque encoded envelopes; the channel never interprets them.
/// [`Link`](crate::Link) is the network implementation; tests drive the
/// acquisition engine through scripted implementations.
pub trait MessageChannel {
    /// Send one message as a single atomic unit.
    fn send_one(&mut self, message: &[u8]) -> Result<()>;

    /// Block until exactly one message is available.
    ///
    /// `None` waits without bound. An expired deadline is
    /// [`LinkError::Timeout`](crate::LinkError::Timeout).
    fn receive_one(&mut self, timeout: Option<Duration>) -> Result<Bytes>;

    /// Set how many undelivered inbound messages may be buffered before the
    /// peer is held back.
    fn set_inbound_capacity(&mut self, capacity: usize);

    /// Lazily yield inbound messages, one per arrival.
    ///
    /// Every step is bounded by `timeout`. The stream never ends on its own;
    /// the consumer decides when to stop. After the first error it yields
    /// nothing further.
    fn receive_stream(&mut self, timeout: Option<Duration>) -> MessageStream<'_, Self>
    where
        Self: Sized,
    {
        MessageStream {
            channel: self,
            timeout,
            failed: false,
        }
    }
}

impl<C: MessageChannel + ?Sized> MessageChannel for &mut C {
    fn send_one(&mut self, message: &[u8]) -> Result<()> {
        (**self).send_one(message)
    }

    fn receive_one(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        (**self).receive_one(timeout)
    }

    fn set_inbound_capacity(&mut self, capacity: usize) {
        (**self).set_inbound_capacity(capacity)
    }
}

/// Iterator returned by [`MessageChannel::receive_stream`].
pub struct MessageStream<'a, C: MessageChannel> {
    channel: &'a mut C,
    timeout: Option<Duration>,
    failed: bool,
}

impl<C: MessageChannel> Iterator for MessageStream<'_, C> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.channel.receive_one(self.timeout);
        self.failed = next.is_err();
        Some(next)
    }
}

impl<C: MessageChannel> std::iter::FusedIterator for MessageStream<'_, C> {}
