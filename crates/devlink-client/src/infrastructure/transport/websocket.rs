//! WebSocket transport built on `tokio-tungstenite`.
//!
//! # Non-blocking pump
//!
//! [`LinkTransport::pump`] must not wait for the network.  `WsTransport`
//! polls the stream with a zero-length `tokio::time::timeout`: the inner
//! `next()` is polled once, and if no frame is already buffered the timeout
//! fires immediately and the pump returns.  Dropping a pending `next()` on a
//! `WebSocketStream` does not lose data.
//!
//! # Pings and pongs
//!
//! tungstenite queues a pong for every ping it reads and flushes it on the
//! next read or write, so the transport only reports pings; it never answers
//! them itself.
//!
//! # Fragmented messages
//!
//! tungstenite reassembles continuation frames before handing a message to
//! the reader, so `WsTransport` only ever yields complete messages.  It never
//! produces `Inbound::Partial`, and an `on_partial_message` handler is not
//! called on this transport.  Transports that stream fragments (such as
//! `MockTransport`) can still deliver them.
//!
//! # TLS
//!
//! `wss://` URLs are served by rustls with the webpki root store.  The ring
//! crypto provider is installed process-wide the first time a transport is
//! created.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use devlink_core::{Inbound, InboundMessage, LinkEvent};

use crate::application::transport::{LinkTransport, TransportError};

/// How long `close` waits for the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A single client-side WebSocket connection.
pub struct WsTransport {
    stream: Option<WsStream>,
    connect_timeout: Duration,
    /// Items produced outside `pump` (a failed send) and reported by the next
    /// pump.
    pending: Vec<Inbound>,
}

impl WsTransport {
    /// Creates a disconnected transport.
    pub fn new(connect_timeout: Duration) -> Self {
        install_tls_provider();
        Self {
            stream: None,
            connect_timeout,
            pending: Vec::new(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Drops the stream after an I/O failure and schedules `ConnectionClosed`.
    fn mark_lost(&mut self) {
        if self.stream.take().is_some() {
            self.pending.push(Inbound::Event(LinkEvent::ConnectionClosed));
        }
    }
}

#[async_trait]
impl LinkTransport for WsTransport {
    async fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        if self.stream.is_some() {
            self.close().await;
        }

        debug!("connecting to {url}");
        let (stream, _response) = timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                url: url.to_string(),
                timeout_ms: u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = stream.send(Message::Text(text)).await {
            self.mark_lost();
            return Err(TransportError::WebSocket(e.to_string()));
        }
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = stream.send(Message::Ping(Vec::new())).await {
            self.mark_lost();
            return Err(TransportError::WebSocket(e.to_string()));
        }
        Ok(())
    }

    async fn pump(&mut self) -> Vec<Inbound> {
        let mut items = std::mem::take(&mut self.pending);
        let Some(stream) = self.stream.as_mut() else {
            return items;
        };

        let mut closed = false;
        loop {
            match timeout(Duration::ZERO, stream.next()).await {
                // Nothing buffered.
                Err(_) => break,
                Ok(Some(Ok(Message::Close(frame)))) => {
                    debug!("close frame received: {frame:?}");
                    closed = true;
                    break;
                }
                Ok(Some(Ok(message))) => {
                    if let Some(item) = inbound_from(message) {
                        items.push(item);
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!("WebSocket read error: {e}");
                    closed = true;
                    break;
                }
                Ok(None) => {
                    debug!("WebSocket stream ended");
                    closed = true;
                    break;
                }
            }
        }

        if closed {
            self.stream = None;
            items.push(Inbound::Event(LinkEvent::ConnectionClosed));
        }
        items
    }

    fn is_available(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        match timeout(CLOSE_TIMEOUT, stream.close(None)).await {
            Ok(Ok(())) => debug!("WebSocket closed"),
            Ok(Err(e)) => debug!("WebSocket close error (ignored): {e}"),
            Err(_) => debug!("WebSocket close handshake timed out"),
        }
    }
}

/// Installs ring as the process-wide rustls provider unless one is already
/// set.
fn install_tls_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none()
        && rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
    {
        debug!("rustls crypto provider installed concurrently");
    }
}

/// Maps a tungstenite message to what the link consumes.  `Close` is handled
/// by the pump loop; raw frames only exist on the write side.  Both yield
/// `None`.
fn inbound_from(message: Message) -> Option<Inbound> {
    match message {
        Message::Text(text) => Some(Inbound::Message(InboundMessage::Text(text))),
        Message::Binary(data) => Some(Inbound::Message(InboundMessage::Binary(data))),
        Message::Ping(data) => Some(Inbound::Event(LinkEvent::GotPing(data))),
        Message::Pong(data) => Some(Inbound::Event(LinkEvent::GotPong(data))),
        Message::Close(_) | Message::Frame(_) => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
