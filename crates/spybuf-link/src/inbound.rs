//! Bounded inbound message queue.
//!
//! The link's reader thread pushes every received message here and blocks
//! while the queue is at capacity. Because it stops draining the socket,
//! the peer's writes stall once the kernel buffers fill: the capacity acts
//! as the credit window seen by the producer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

/// Outcome of [`InboundQueue::pop`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pop {
    Message(Bytes),
    TimedOut,
    /// Queue is drained and will never receive more; carries the reason.
    Closed(String),
}

struct State {
    items: VecDeque<Bytes>,
    capacity: usize,
    closed: Option<String>,
}

pub(crate) struct InboundQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl InboundQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                capacity: capacity.max(1),
                closed: None,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue a message, waiting for room. Returns `false` once closed.
    pub(crate) fn push(&self, message: Bytes) -> bool {
        let mut state = self.state.lock();
        while state.closed.is_none() && state.items.len() >= state.capacity {
            self.not_full.wait(&mut state);
        }
        if state.closed.is_some() {
            return false;
        }
        state.items.push_back(message);
        self.not_empty.notify_one();
        true
    }

    /// Dequeue the oldest message.
    ///
    /// Messages queued before [`close`](Self::close) are still delivered.
    /// `None` waits without bound.
    pub(crate) fn pop(&self, timeout: Option<Duration>) -> Pop {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.items.pop_front() {
                self.not_full.notify_one();
                return Pop::Message(message);
            }
            if let Some(reason) = &state.closed {
                return Pop::Closed(reason.clone());
            }
            match deadline {
                None => self.not_empty.wait(&mut state),
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut state, deadline).timed_out()
                        && state.items.is_empty()
                        && state.closed.is_none()
                    {
                        return Pop::TimedOut;
                    }
                }
            }
        }
    }

    /// Change the capacity. Never below one.
    pub(crate) fn set_capacity(&self, capacity: usize) {
        self.state.lock().capacity = capacity.max(1);
        self.not_full.notify_all();
    }

    pub(crate) fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Mark the queue closed. The first reason wins.
    pub(crate) fn close(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.closed.is_none() {
            state.closed = Some(reason.into());
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Why the queue was closed, if it was.
    pub(crate) fn closed_reason(&self) -> Option<String> {
        self.state.lock().closed.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = InboundQueue::new(4);
        assert!(queue.push(Bytes::from_static(b"a")));
        assert!(queue.push(Bytes::from_static(b"b")));

        assert_eq!(queue.pop(None), Pop::Message(Bytes::from_static(b"a")));
        assert_eq!(queue.pop(None), Pop::Message(Bytes::from_static(b"b")));
    }

    #[test]
    fn pop_times_out_when_empty() {
        let queue = InboundQueue::new(1);
        let started = Instant::now();
        assert_eq!(queue.pop(Some(Duration::from_millis(30))), Pop::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn push_blocks_at_capacity_until_consumed() {
        let queue = Arc::new(InboundQueue::new(1));
        assert!(queue.push(Bytes::from_static(b"first")));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(Bytes::from_static(b"second")))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1, "producer must wait for credit");

        assert_eq!(
            queue.pop(None),
            Pop::Message(Bytes::from_static(b"first"))
        );
        assert!(producer.join().unwrap());
        assert_eq!(
            queue.pop(Some(Duration::from_secs(1))),
            Pop::Message(Bytes::from_static(b"second"))
        );
    }

    #[test]
    fn raising_capacity_releases_blocked_producer() {
        let queue = Arc::new(InboundQueue::new(1));
        queue.push(Bytes::from_static(b"1"));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(Bytes::from_static(b"2")))
        };
        thread::sleep(Duration::from_millis(20));
        queue.set_capacity(8);

        assert!(producer.join().unwrap());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 8);
    }

    #[test]
    fn close_drains_then_reports_reason() {
        let queue = InboundQueue::new(4);
        queue.push(Bytes::from_static(b"last"));
        queue.close("peer closed");
        queue.close("ignored");

        assert!(!queue.push(Bytes::from_static(b"late")));
        assert_eq!(queue.pop(None), Pop::Message(Bytes::from_static(b"last")));
        assert_eq!(queue.pop(None), Pop::Closed("peer closed".to_string()));
        assert_eq!(queue.closed_reason().as_deref(), Some("peer closed"));
    }

    #[test]
    fn close_wakes_blocked_producer() {
        let queue = Arc::new(InboundQueue::new(1));
        queue.push(Bytes::from_static(b"full"));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(Bytes::from_static(b"never")))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close("shutdown");

        assert!(!producer.join().unwrap());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue = InboundQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.set_capacity(0);
        assert_eq!(queue.capacity(), 1);
    }
}
