//! In-memory transport for tests and offline simulation.
//!
//! `MockTransport` records every call the link makes and replays scripted
//! inbound traffic on the next pump.  No sockets are opened.
//!
//! # Usage in tests
//!
//! ```ignore
//! let mut link = DeviceLink::new("ws://test", false, MockTransport::new());
//! link.initialize("relay", "garage").await;
//!
//! link.transport_mut().push_text(r#"{"dataType":"state"}"#);
//! link.poll().await;                        // on_message sees the text
//!
//! assert_eq!(link.transport().sent.len(), 1); // the identity announcement
//! ```
//!
//! # Failure flags
//!
//! Set `fail_connect` to make every connect attempt fail.  `drop_connection`
//! simulates the server going away: the transport becomes unavailable and the
//! next pump reports `ConnectionClosed`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use devlink_core::{decode_envelope, Envelope, Inbound, InboundMessage, LinkEvent, PartialMessage};

use crate::application::transport::{LinkTransport, TransportError};

/// A transport that records calls instead of performing network I/O.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// URLs passed to `connect`, in order.
    pub connects: Vec<String>,
    /// Text frames passed to `send_text`, in order.
    pub sent: Vec<String>,
    /// Number of pings sent.
    pub pings: usize,
    /// Number of pumps performed.
    pub pumps: usize,
    /// Number of closes performed.
    pub closes: usize,
    /// Whether the simulated connection is open.
    pub available: bool,
    /// When `true`, `connect` fails and leaves the transport unavailable.
    pub fail_connect: bool,
    /// Items returned by the next pump.
    pub inbound: VecDeque<Inbound>,
    availability_queries: AtomicUsize,
}

impl MockTransport {
    /// Creates a disconnected transport with no scripted traffic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a complete text message.
    pub fn push_text(&mut self, text: &str) {
        self.inbound
            .push_back(Inbound::Message(InboundMessage::Text(text.to_string())));
    }

    /// Queues a complete binary message.
    pub fn push_binary(&mut self, data: &[u8]) {
        self.inbound
            .push_back(Inbound::Message(InboundMessage::Binary(data.to_vec())));
    }

    /// Queues one fragment of a streamed message.
    pub fn push_partial(&mut self, data: &[u8], is_final: bool) {
        self.inbound.push_back(Inbound::Partial(PartialMessage {
            data: data.to_vec(),
            is_final,
        }));
    }

    /// Queues a connection event.
    pub fn push_event(&mut self, event: LinkEvent) {
        self.inbound.push_back(Inbound::Event(event));
    }

    /// Simulates the server closing the connection.
    pub fn drop_connection(&mut self) {
        self.available = false;
        self.push_event(LinkEvent::ConnectionClosed);
    }

    /// How many times `is_available` has been asked.
    pub fn availability_query_count(&self) -> usize {
        self.availability_queries.load(Ordering::Relaxed)
    }

    /// Decodes every sent frame that is a valid envelope.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent
            .iter()
            .filter_map(|text| decode_envelope(text).ok())
            .collect()
    }
}

#[async_trait]
impl LinkTransport for MockTransport {
    async fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        self.connects.push(url.to_string());
        if self.fail_connect {
            self.available = false;
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "mock connect failure".to_string(),
            });
        }
        self.available = true;
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if !self.available {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(text);
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if !self.available {
            return Err(TransportError::NotConnected);
        }
        self.pings += 1;
        Ok(())
    }

    async fn pump(&mut self) -> Vec<Inbound> {
        self.pumps += 1;
        self.inbound.drain(..).collect()
    }

    fn is_available(&self) -> bool {
        self.availability_queries.fetch_add(1, Ordering::Relaxed);
        self.available
    }

    async fn close(&mut self) {
        self.closes += 1;
        self.available = false;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let mut transport = MockTransport::new();

        let result = transport.send_text("x".to_string()).await;

        assert!(matches!(result, Err(TransportError::NotConnected)));
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn test_pump_drains_in_order() {
        // Arrange
        let mut transport = MockTransport::new();
        transport.push_text("a");
        transport.push_binary(&[1]);

        // Act
        let first = transport.pump().await;
        let second = transport.pump().await;

        // Assert
        assert_eq!(
            first,
            vec![
                Inbound::Message(InboundMessage::Text("a".to_string())),
                Inbound::Message(InboundMessage::Binary(vec![1])),
            ]
        );
        assert!(second.is_empty());
        assert_eq!(transport.pumps, 2);
    }

    #[tokio::test]
    async fn test_failed_connect_is_recorded_and_unavailable() {
        let mut transport = MockTransport {
            fail_connect: true,
            ..MockTransport::default()
        };

        let result = transport.connect("ws://x").await;

        assert!(result.is_err());
        assert_eq!(transport.connects, vec!["ws://x".to_string()]);
        assert!(!transport.is_available());
        assert_eq!(transport.availability_query_count(), 1);
    }

    #[tokio::test]
    async fn test_sent_envelopes_skips_non_envelopes() {
        let mut transport = MockTransport::new();
        transport.connect("ws://x").await.unwrap();
        transport
            .send_text(r#"{"action":"deviceType","type":"a","name":"b"}"#.to_string())
            .await
            .unwrap();
        transport.send_text("not json".to_string()).await.unwrap();

        assert_eq!(transport.sent_envelopes(), vec![Envelope::identity("a", "b")]);
    }
}
