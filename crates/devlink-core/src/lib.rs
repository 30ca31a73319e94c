//! # devlink-core
//!
//! Shared library for DevLink containing the server-facing envelope types and
//! the JSON codec that turns them into WebSocket text frames.
//!
//! This crate has no dependencies on sockets, async runtimes, or clocks.  The
//! connection lifecycle lives in `devlink-client`.
//!
//! # Architecture overview (for beginners)
//!
//! A DevLink device is a small networked gadget (a sensor, a relay board, a
//! thermostat) that keeps one WebSocket connection open to a server.  When
//! the connection comes up the device announces *what* it is (its type) and
//! *which one* it is (its name).  After that it answers requests by sending
//! small JSON "envelopes" back to the server.
//!
//! This crate defines:
//!
//! - **`protocol::messages`** – The envelope enum ([`Envelope`]), the response
//!   payload type ([`ResponseData`]), and the inbound message / event types
//!   that transports hand to the link.
//!
//! - **`protocol::codec`** – Size-checked JSON encoding and decoding of
//!   envelopes.  Oversized envelopes are rejected, never truncated.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `devlink_core::Envelope` instead of `devlink_core::protocol::messages::Envelope`.
pub use protocol::codec::{
    decode_data_request, decode_envelope, encode_envelope, CodecError, DEFAULT_MAX_ENVELOPE_BYTES,
};
pub use protocol::messages::{
    DataRequest, Envelope, Inbound, InboundMessage, LinkEvent, PartialMessage, ResponseData,
};
