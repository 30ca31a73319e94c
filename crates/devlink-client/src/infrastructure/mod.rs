//! Infrastructure layer for the DevLink client.
//!
//! Contains the I/O-facing adapters: WebSocket transports and the agent's
//! configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `devlink_core`, but MUST NOT be imported by the `application` layer's
//! production code.
//!
//! # Sub-modules
//!
//! - **`transport`** – `LinkTransport` implementations.  `WsTransport` talks to
//!   a real server through `tokio-tungstenite`; `MockTransport` records calls
//!   for tests.
//!
//! - **`storage`** – Loading and saving the agent's TOML configuration file.

pub mod storage;
pub mod transport;
