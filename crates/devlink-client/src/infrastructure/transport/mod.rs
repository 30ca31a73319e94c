//! Transport adapters and the convenience constructor for a WebSocket link.

pub mod mock;
pub mod websocket;

use crate::application::clock::MonotonicClock;
use crate::application::device_link::{DeviceLink, LinkConfig};

pub use mock::MockTransport;
pub use websocket::WsTransport;

/// A [`DeviceLink`] over a real WebSocket connection.
pub type WsDeviceLink = DeviceLink<WsTransport, MonotonicClock>;

/// Builds a WebSocket-backed link.  No I/O happens until `initialize`.
///
/// # Examples
///
/// ```rust
/// use devlink_client::application::device_link::LinkConfig;
/// use devlink_client::infrastructure::transport::ws_device_link;
///
/// let link = ws_device_link("ws://127.0.0.1:8080", false, LinkConfig::default());
/// assert_eq!(link.connection_string(), "ws://127.0.0.1:8080");
/// assert!(!link.is_available());
/// ```
pub fn ws_device_link(
    connection_string: impl Into<String>,
    debug: bool,
    config: LinkConfig,
) -> WsDeviceLink {
    let transport = WsTransport::new(config.connect_timeout);
    DeviceLink::with_parts(connection_string, debug, config, transport, MonotonicClock::new())
}
