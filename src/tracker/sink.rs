//! Event Sink
//!
//! Transport seam for session events. The controller races every producer
//! pull against [`EventSink::closed`] so a consumer that goes away stops the
//! session promptly.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::events::SessionEvent;
use crate::types::{PulseError, Result};

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Push one event. Fails with `TransportClosed` once the consumer is gone.
    async fn send(&mut self, event: SessionEvent) -> Result<()>;

    /// Resolves when the consumer has gone away. Never resolves by default.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Sink over a bounded mpsc channel
pub struct ChannelSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and its receiving end with the given capacity
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&mut self, event: SessionEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| PulseError::TransportClosed)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionErrorKind;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (mut sink, mut rx) = ChannelSink::channel(4);
        for detail in ["a", "b"] {
            sink.send(SessionEvent::Error {
                kind: SessionErrorKind::ProducerFailure,
                detail: detail.to_string(),
            })
            .await
            .unwrap();
        }
        drop(sink);

        let mut seen = Vec::new();
        while let Some(SessionEvent::Error { detail, .. }) = rx.recv().await {
            seen.push(detail);
        }
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_is_transport_closed() {
        let (mut sink, rx) = ChannelSink::channel(1);
        drop(rx);

        sink.closed().await;
        let err = sink
            .send(SessionEvent::Error {
                kind: SessionErrorKind::ProducerFailure,
                detail: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::TransportClosed));
    }
}
