//! DeviceLink: one device's WebSocket link to its server.
//!
//! # Lifecycle
//!
//! ```text
//! DeviceLink::new(url, debug, transport)     -- no I/O
//!  └─ initialize(type, name)                 -- connect + identity announcement
//!  └─ loop { poll() }                        -- caller-driven
//!       ├─ every check_interval: is_available()?
//!       │     └─ no → reconnect + re-announce
//!       └─ always: pump transport → callbacks
//! ```
//!
//! # Cooperative model
//!
//! The link has no background task and no timer of its own.  Everything
//! happens inside the method the caller is awaiting.  The application's main
//! loop must call [`DeviceLink::poll`] often enough that inbound messages are
//! delivered promptly and the ten-second liveness window is honoured; if the
//! loop stalls, so does the link.
//!
//! # Failure handling
//!
//! Connection problems during [`initialize`](DeviceLink::initialize) and
//! [`poll`](DeviceLink::poll) are logged and left for the next liveness
//! check, which reconnects without backoff.  [`send_response`] and
//! [`ping`](DeviceLink::ping) return a `Result` so callers may observe a
//! failed send, but nothing is queued or retried.
//!
//! [`send_response`]: DeviceLink::send_response

use std::fmt;
use std::time::Duration;

use devlink_core::{
    encode_envelope, CodecError, Envelope, Inbound, InboundMessage, LinkEvent, PartialMessage,
    ResponseData, DEFAULT_MAX_ENVELOPE_BYTES,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::clock::{Clock, MonotonicClock};
use crate::application::transport::{LinkTransport, TransportError};

/// Default time between liveness checks.
pub const CHECK_CONNECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by the fallible link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// An identity announcement was requested before `initialize`.
    #[error("link has no identity; call initialize() first")]
    NotInitialized,

    /// The envelope could not be encoded (e.g. it exceeds the size limit).
    #[error("envelope encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The transport refused or failed the operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Tunables for a [`DeviceLink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Minimum time between two liveness checks.
    pub check_interval: Duration,
    /// Bound on one connect attempt (used by transports that support it).
    pub connect_timeout: Duration,
    /// Largest envelope, in bytes, the link will send.
    pub max_envelope_bytes: usize,
}

impl Default for LinkConfig {
    /// | Field              | Default |
    /// |--------------------|---------|
    /// | check_interval     | 10 s    |
    /// | connect_timeout    | 5 s     |
    /// | max_envelope_bytes | 1024    |
    fn default() -> Self {
        Self {
            check_interval: CHECK_CONNECTION_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_envelope_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
        }
    }
}

/// Who this device is, as announced to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_type: String,
    pub name: String,
}

/// Counters and flags the link keeps about its own connection.
///
/// `connected` reflects the last connection event the link saw.  The
/// liveness check does not use it; it always asks the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    pub reconnects: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub pings_received: u64,
    pub pongs_received: u64,
}

/// Callback for complete inbound messages.
pub type MessageHandler = Box<dyn FnMut(&InboundMessage) + Send>;
/// Callback for fragments of streamed inbound messages.
pub type PartialMessageHandler = Box<dyn FnMut(&PartialMessage) + Send>;
/// Callback for connection events, run after the link's own handling.
pub type EventHandler = Box<dyn FnMut(&LinkEvent) + Send>;

/// A device's link to its server over one exclusively owned transport.
///
/// See the [module documentation](self) for the lifecycle.
pub struct DeviceLink<T, C = MonotonicClock> {
    connection_string: String,
    debug: bool,
    config: LinkConfig,
    identity: Option<DeviceIdentity>,
    transport: T,
    clock: C,
    /// Clock reading at the last liveness check.  Written only by `poll`.
    last_check_ms: u64,
    status: LinkStatus,
    message_handler: Option<MessageHandler>,
    partial_handler: Option<PartialMessageHandler>,
    event_handler: Option<EventHandler>,
}

impl<T: LinkTransport> DeviceLink<T, MonotonicClock> {
    /// Creates a link with default tunables and a monotonic clock.
    ///
    /// No I/O happens until [`initialize`](Self::initialize).
    pub fn new(connection_string: impl Into<String>, debug: bool, transport: T) -> Self {
        Self::with_parts(
            connection_string,
            debug,
            LinkConfig::default(),
            transport,
            MonotonicClock::new(),
        )
    }
}

impl<T: LinkTransport, C: Clock> DeviceLink<T, C> {
    /// Creates a link from explicit parts.
    pub fn with_parts(
        connection_string: impl Into<String>,
        debug: bool,
        config: LinkConfig,
        transport: T,
        clock: C,
    ) -> Self {
        Self {
            connection_string: connection_string.into(),
            debug,
            config,
            identity: None,
            transport,
            clock,
            last_check_ms: 0,
            status: LinkStatus::default(),
            message_handler: None,
            partial_handler: None,
            event_handler: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Stores the device identity, connects, and announces the identity.
    ///
    /// A failed connect is logged, not returned.  The announcement is still
    /// attempted, and the next liveness check in [`poll`](Self::poll) will
    /// reconnect.
    pub async fn initialize(&mut self, device_type: &str, name: &str) {
        self.identity = Some(DeviceIdentity {
            device_type: device_type.to_string(),
            name: name.to_string(),
        });
        info!(
            "initialising link for {device_type}/{name} to {}",
            self.connection_string
        );
        self.connect_and_announce().await;
    }

    /// Runs one cooperative step of the link.
    ///
    /// 1. If at least `check_interval` has passed since the last liveness
    ///    check, asks the transport whether the connection is usable and, if
    ///    not, reconnects and re-announces.  The check time is updated either
    ///    way.
    /// 2. Pumps the transport and dispatches whatever arrived.
    ///
    /// The liveness check always runs before the pump.
    pub async fn poll(&mut self) {
        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_check_ms) >= self.check_interval_ms() {
            self.last_check_ms = now;
            self.check_liveness().await;
        }

        self.pump().await;
    }

    /// Sends a protocol-level ping.  No reply is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Transport`] if the ping frame could not be sent.
    pub async fn ping(&mut self) -> Result<(), LinkError> {
        self.transport.ping().await?;
        self.diag(format_args!("ping sent"));
        Ok(())
    }

    /// Sends a `recieveData` response.
    ///
    /// `data` may be any number, string, or `serde_json::Value`.  An empty
    /// `id` leaves the `id` key out of the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Codec`] if the envelope exceeds
    /// `max_envelope_bytes`, or [`LinkError::Transport`] if the send failed.
    pub async fn send_response(
        &mut self,
        data: impl Into<ResponseData>,
        data_type: &str,
        id: &str,
    ) -> Result<(), LinkError> {
        let envelope = Envelope::response(data, data_type, id);
        self.send_envelope(&envelope).await
    }

    /// Closes the transport.  The link can be brought back with
    /// [`initialize`](Self::initialize) or by the next liveness check.
    pub async fn shutdown(&mut self) {
        let was_connected = self.status.connected;
        self.transport.close().await;
        if was_connected {
            self.handle_event(LinkEvent::ConnectionClosed);
        }
    }

    // ── Callback registration ─────────────────────────────────────────────────

    /// Registers the handler for complete inbound messages.
    ///
    /// Only one handler is active: registering again replaces the previous
    /// handler.
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.message_handler = Some(Box::new(handler));
    }

    /// Registers the handler for partial (streamed) inbound messages.
    ///
    /// Only one handler is active: registering again replaces the previous
    /// handler.
    pub fn on_partial_message<F>(&mut self, handler: F)
    where
        F: FnMut(&PartialMessage) + Send + 'static,
    {
        self.partial_handler = Some(Box::new(handler));
    }

    /// Registers a connection-event hook.  It runs after the link has
    /// updated its own [`LinkStatus`].  Latest registration wins.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&LinkEvent) + Send + 'static,
    {
        self.event_handler = Some(Box::new(handler));
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    /// Clock reading at the most recent liveness check (0 before the first).
    pub fn last_check_ms(&self) -> u64 {
        self.last_check_ms
    }

    /// Asks the transport whether the connection is currently usable.
    pub fn is_available(&self) -> bool {
        self.transport.is_available()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn check_interval_ms(&self) -> u64 {
        u64::try_from(self.config.check_interval.as_millis()).unwrap_or(u64::MAX)
    }

    async fn check_liveness(&mut self) {
        let available = self.transport.is_available();
        self.diag(format_args!("liveness check: available={available}"));

        if available {
            return;
        }
        if self.identity.is_none() {
            debug!("link unavailable but not initialised; skipping reconnect");
            return;
        }

        self.status.reconnects += 1;
        warn!(
            "link to {} unavailable; reconnecting (attempt {})",
            self.connection_string, self.status.reconnects
        );
        self.connect_and_announce().await;
    }

    /// Connects and then announces, logging rather than returning failures.
    async fn connect_and_announce(&mut self) {
        match self.transport.connect(&self.connection_string).await {
            Ok(()) => self.handle_event(LinkEvent::ConnectionOpened),
            Err(e) => warn!("connect failed: {e}"),
        }

        if let Err(e) = self.announce().await {
            warn!("identity announcement failed: {e}");
        }
    }

    async fn announce(&mut self) -> Result<(), LinkError> {
        let identity = self.identity.as_ref().ok_or(LinkError::NotInitialized)?;
        let envelope = Envelope::identity(identity.device_type.as_str(), identity.name.as_str());
        self.send_envelope(&envelope).await
    }

    async fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), LinkError> {
        let text = encode_envelope(envelope, self.config.max_envelope_bytes)?;
        self.diag(format_args!("sending to server: {text}"));
        self.transport.send_text(text).await?;
        self.status.messages_sent += 1;
        Ok(())
    }

    async fn pump(&mut self) {
        for item in self.transport.pump().await {
            self.dispatch(item);
        }
    }

    fn dispatch(&mut self, item: Inbound) {
        match item {
            Inbound::Message(message) => {
                self.status.messages_received += 1;
                match self.message_handler.as_mut() {
                    Some(handler) => handler(&message),
                    None => debug!(
                        "dropping inbound message ({} bytes): no handler",
                        message.data().len()
                    ),
                }
            }
            Inbound::Partial(fragment) => match self.partial_handler.as_mut() {
                Some(handler) => handler(&fragment),
                None => debug!(
                    "dropping message fragment ({} bytes): no handler",
                    fragment.data.len()
                ),
            },
            Inbound::Event(event) => self.handle_event(event),
        }
    }

    /// Per-instance connection-event handling.
    fn handle_event(&mut self, event: LinkEvent) {
        match &event {
            LinkEvent::ConnectionOpened => {
                self.status.connected = true;
                info!("connection opened to {}", self.connection_string);
            }
            LinkEvent::ConnectionClosed => {
                self.status.connected = false;
                info!("connection closed");
            }
            LinkEvent::GotPing(_) => {
                self.status.pings_received += 1;
                self.diag(format_args!("got a ping"));
            }
            LinkEvent::GotPong(_) => {
                self.status.pongs_received += 1;
                self.diag(format_args!("got a pong"));
            }
        }

        if let Some(handler) = self.event_handler.as_mut() {
            handler(&event);
        }
    }

    /// Per-link diagnostics: `info` when the debug flag is set, else `debug`.
    fn diag(&self, args: fmt::Arguments<'_>) {
        if self.debug {
            info!("{args}");
        } else {
            debug!("{args}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    };

    use devlink_core::decode_envelope;

    use super::*;
    use crate::application::clock::{ManualClock, MockClock};
    use crate::infrastructure::transport::mock::MockTransport;

    fn link_with_clock<C: Clock>(clock: C) -> DeviceLink<MockTransport, C> {
        DeviceLink::with_parts(
            "ws://server.local:8080",
            false,
            LinkConfig::default(),
            MockTransport::new(),
            clock,
        )
    }

    #[test]
    fn test_new_link_does_no_io() {
        // Arrange / Act
        let link = DeviceLink::new("ws://x", true, MockTransport::new());

        // Assert
        assert!(link.transport().connects.is_empty());
        assert!(link.transport().sent.is_empty());
        assert_eq!(link.last_check_ms(), 0);
        assert!(link.identity().is_none());
        assert!(link.is_debug());
    }

    #[test]
    fn test_link_config_defaults() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.check_interval, Duration::from_secs(10));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_envelope_bytes, 1024);
    }

    #[tokio::test]
    async fn test_initialize_connects_then_announces_once() {
        // Arrange
        let mut link = link_with_clock(ManualClock::new());

        // Act
        link.initialize("thermostat", "hall-1").await;

        // Assert
        let transport = link.transport();
        assert_eq!(transport.connects, vec!["ws://server.local:8080".to_string()]);
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(
            decode_envelope(&transport.sent[0]).unwrap(),
            Envelope::identity("thermostat", "hall-1")
        );
        assert!(link.status().connected);
        assert_eq!(link.status().messages_sent, 1);
    }

    #[tokio::test]
    async fn test_initialize_with_failed_connect_does_not_error_or_announce() {
        // Arrange
        let mut link = link_with_clock(ManualClock::new());
        link.transport_mut().fail_connect = true;

        // Act: no Result to inspect; the failure is absorbed
        link.initialize("thermostat", "hall-1").await;

        // Assert: connect attempted, announcement could not go out
        assert_eq!(link.transport().connects.len(), 1);
        assert!(link.transport().sent.is_empty());
        assert!(!link.status().connected);
        assert_eq!(link.identity().unwrap().name, "hall-1");
    }

    #[tokio::test]
    async fn test_poll_within_window_never_queries_availability() {
        // Arrange: the clock is stuck just short of the interval
        let mut clock = MockClock::new();
        clock.expect_now_ms().return_const(9_999_u64);
        let mut link = link_with_clock(clock);
        link.initialize("t", "n").await;

        // Act
        link.poll().await;
        link.poll().await;

        // Assert
        assert_eq!(link.transport().availability_query_count(), 0);
        assert_eq!(link.transport().connects.len(), 1);
        assert_eq!(link.transport().pumps, 2);
        assert_eq!(link.last_check_ms(), 0);
    }

    #[tokio::test]
    async fn test_poll_at_interval_with_live_link_only_updates_check_time() {
        // Arrange
        let mut clock = MockClock::new();
        clock.expect_now_ms().return_const(10_000_u64);
        let mut link = link_with_clock(clock);
        link.initialize("t", "n").await;

        // Act
        link.poll().await;

        // Assert
        assert_eq!(link.transport().availability_query_count(), 1);
        assert_eq!(link.transport().connects.len(), 1);
        assert_eq!(link.transport().sent.len(), 1);
        assert_eq!(link.last_check_ms(), 10_000);
    }

    #[tokio::test]
    async fn test_poll_after_interval_with_dead_link_reconnects_and_reannounces() {
        // Arrange: the clock moves 5 s per reading
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clock = Arc::clone(&ticks);
        let mut clock = MockClock::new();
        clock
            .expect_now_ms()
            .returning(move || ticks_clock.fetch_add(5_000, Ordering::Relaxed) + 5_000);
        let mut link = link_with_clock(clock);
        link.initialize("relay", "garage").await;
        link.transport_mut().available = false;

        // Act: first poll reads 5 000 (too early), second reads 10 000
        link.poll().await;
        assert_eq!(link.transport().connects.len(), 1);
        link.poll().await;

        // Assert
        let transport = link.transport();
        assert_eq!(transport.connects.len(), 2);
        assert_eq!(transport.sent.len(), 2);
        assert_eq!(
            decode_envelope(&transport.sent[1]).unwrap(),
            Envelope::identity("relay", "garage")
        );
        assert_eq!(link.status().reconnects, 1);
        assert_eq!(link.last_check_ms(), 10_000);
    }

    #[tokio::test]
    async fn test_poll_before_initialize_never_reconnects() {
        let clock = ManualClock::new();
        let mut link = link_with_clock(clock.clone());

        clock.set(20_000);
        link.poll().await;

        assert!(link.transport().connects.is_empty());
        assert_eq!(link.last_check_ms(), 20_000);
        assert_eq!(link.transport().pumps, 1);
    }

    #[tokio::test]
    async fn test_send_response_numeric_without_id() {
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        link.send_response(42.5, "temperature", "").await.unwrap();

        assert_eq!(
            link.transport().sent[1],
            r#"{"action":"recieveData","dataType":"temperature","data":42.5}"#
        );
    }

    #[tokio::test]
    async fn test_send_response_string_with_id() {
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        link.send_response("on", "state", "dev-7").await.unwrap();

        assert_eq!(
            link.transport().sent[1],
            r#"{"action":"recieveData","dataType":"state","data":"on","id":"dev-7"}"#
        );
    }

    #[tokio::test]
    async fn test_send_response_while_disconnected_returns_transport_error() {
        let mut link = link_with_clock(ManualClock::new());

        let result = link.send_response(1, "count", "").await;

        assert!(matches!(
            result,
            Err(LinkError::Transport(TransportError::NotConnected))
        ));
        assert_eq!(link.status().messages_sent, 0);
    }

    #[tokio::test]
    async fn test_oversized_response_is_rejected_before_sending() {
        // Arrange
        let config = LinkConfig {
            max_envelope_bytes: 64,
            ..LinkConfig::default()
        };
        let mut link = DeviceLink::with_parts(
            "ws://x",
            false,
            config,
            MockTransport::new(),
            ManualClock::new(),
        );
        link.initialize("t", "n").await;

        // Act
        let result = link.send_response("y".repeat(100), "blob", "").await;

        // Assert: nothing after the announcement reached the transport
        assert!(matches!(
            result,
            Err(LinkError::Codec(CodecError::TooLarge { .. }))
        ));
        assert_eq!(link.transport().sent.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_reaches_transport() {
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        link.ping().await.unwrap();

        assert_eq!(link.transport().pings, 1);
    }

    #[tokio::test]
    async fn test_latest_message_handler_wins() {
        // Arrange
        let seen = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        let first = Arc::clone(&seen);
        link.on_message(move |_| first.lock().unwrap().push("first"));
        let second = Arc::clone(&seen);
        link.on_message(move |_| second.lock().unwrap().push("second"));

        link.transport_mut().push_text("hello");

        // Act
        link.poll().await;

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec!["second"]);
        assert_eq!(link.status().messages_received, 1);
    }

    #[tokio::test]
    async fn test_partial_fragments_go_to_partial_handler_only() {
        // Arrange
        let whole = Arc::new(Mutex::new(0usize));
        let parts = Arc::new(Mutex::new(Vec::<bool>::new()));
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        let whole_count = Arc::clone(&whole);
        link.on_message(move |_| *whole_count.lock().unwrap() += 1);
        let part_log = Arc::clone(&parts);
        link.on_partial_message(move |p| part_log.lock().unwrap().push(p.is_final));

        link.transport_mut().push_partial(b"hel", false);
        link.transport_mut().push_partial(b"lo", true);

        // Act
        link.poll().await;

        // Assert
        assert_eq!(*whole.lock().unwrap(), 0);
        assert_eq!(*parts.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_events_update_status_before_hook_runs() {
        // Arrange
        let observed = Arc::new(Mutex::new(Vec::new()));
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;
        let log = Arc::clone(&observed);
        link.on_event(move |e| log.lock().unwrap().push(e.clone()));

        link.transport_mut().push_event(LinkEvent::GotPing(vec![1]));
        link.transport_mut().push_event(LinkEvent::GotPong(vec![]));
        link.transport_mut().drop_connection();

        // Act
        link.poll().await;

        // Assert
        let status = link.status();
        assert_eq!(status.pings_received, 1);
        assert_eq!(status.pongs_received, 1);
        assert!(!status.connected);
        assert_eq!(
            *observed.lock().unwrap(),
            vec![
                LinkEvent::GotPing(vec![1]),
                LinkEvent::GotPong(vec![]),
                LinkEvent::ConnectionClosed,
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_transport_and_reports_closed() {
        let mut link = link_with_clock(ManualClock::new());
        link.initialize("t", "n").await;

        link.shutdown().await;

        assert_eq!(link.transport().closes, 1);
        assert!(!link.status().connected);
        assert!(!link.is_available());
    }
}
