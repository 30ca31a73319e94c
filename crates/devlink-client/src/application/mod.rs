//! Application layer for the device link.
//!
//! # What lives here?
//!
//! - **`device_link`** – [`DeviceLink`](device_link::DeviceLink): identity
//!   announcement, liveness polling with reconnect, response envelopes, and
//!   single-slot inbound callbacks.
//!
//! - **`transport`** – The [`LinkTransport`](transport::LinkTransport) trait
//!   the link drives.  Concrete transports live in the infrastructure layer
//!   and are injected at construction time.
//!
//! - **`clock`** – The monotonic millisecond clock that gates liveness checks.
//!
//! - **`answer_requests`** – The agent's request-answering use case: maps
//!   inbound `DataRequest`s to readings and sends them back over the link.

pub mod answer_requests;
pub mod clock;
pub mod device_link;
pub mod transport;
