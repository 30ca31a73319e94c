//! The transport seam between [`DeviceLink`](super::device_link::DeviceLink)
//! and a concrete WebSocket client.
//!
//! The link owns exactly one transport and is the only code that touches it.
//! The trait mirrors what a small embedded WebSocket client offers:
//! connect, send a text frame, send a ping, pump pending input, and report
//! whether the connection is still usable.
//!
//! # Why `pump` returns a `Vec`
//!
//! Embedded WebSocket clients usually invoke callbacks from inside their
//! `poll()` call.  Here the transport instead *returns* what it found and the
//! link dispatches it.  That keeps the callbacks owned by the link (so a new
//! registration replaces the old one in exactly one place) and lets the link
//! update its own status before the application's callbacks run.

use async_trait::async_trait;
use devlink_core::Inbound;
use thiserror::Error;

/// Errors reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket handshake (or the TCP/TLS connect before it) failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The connect did not finish within the configured timeout.
    #[error("connect to {url} timed out after {timeout_ms} ms")]
    ConnectTimeout { url: String, timeout_ms: u64 },

    /// An operation needed an open connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The WebSocket layer failed on an established connection.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// A WebSocket client the link can drive.
///
/// Implementations must never wait for the network inside
/// [`pump`](LinkTransport::pump): it processes only what has already arrived.
#[async_trait]
pub trait LinkTransport: Send {
    /// Opens a connection to `url`, replacing any existing one.
    async fn connect(&mut self, url: &str) -> Result<(), TransportError>;

    /// Sends one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Sends a protocol-level ping frame.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Processes pending inbound frames and returns them in arrival order.
    ///
    /// A closed or failed connection is reported as a
    /// [`LinkEvent::ConnectionClosed`](devlink_core::LinkEvent::ConnectionClosed)
    /// item and leaves the transport unavailable.
    async fn pump(&mut self) -> Vec<Inbound>;

    /// `true` while the connection is open and usable.
    fn is_available(&self) -> bool;

    /// Closes the connection, if any.
    async fn close(&mut self);
}
