//! Front-end sinks: where an actor pushes messages for one attached client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::messaging::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(u64);

static NEXT_SINK: AtomicU64 = AtomicU64::new(1);

impl SinkId {
    pub fn next() -> Self {
        SinkId(NEXT_SINK.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// The client behind a sink has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sink closed")]
pub struct SinkClosed;

/// Transport-agnostic delivery endpoint. A sink that returns [`SinkClosed`]
/// is detached by its actor as if it had been unregistered.
pub trait Sink: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), SinkClosed>;

    /// Whether the client is already known to be gone, checked without
    /// sending anything.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink backed by an unbounded tokio channel; the front end owns the receiver.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Arc<Message>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Arc<Message>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn send(&self, message: &Message) -> Result<(), SinkClosed> {
        self.tx
            .send(Arc::new(message.clone()))
            .map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn closed_receiver_reports_sink_closed() {
        let (sink, mut rx) = ChannelSink::new();
        assert_ok!(sink.send(&Message::plain("hi")));
        let received = assert_ok!(rx.try_recv());
        assert_eq!(received.text(), "hi");
        drop(rx);
        assert_err!(sink.send(&Message::plain("gone")));
    }

    #[test]
    fn dropped_receiver_is_seen_without_sending() {
        let (sink, rx) = ChannelSink::new();
        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
    }

    #[test]
    fn sink_ids_are_unique() {
        assert_ne!(SinkId::next(), SinkId::next());
    }
}
