//! devlink-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does devlink-client do? (for beginners)
//!
//! A DevLink device keeps one WebSocket connection open to a server.  The
//! [`DeviceLink`](application::device_link::DeviceLink) type in this crate:
//!
//! 1. Connects to the server and announces the device's type and name.
//! 2. Checks every ten seconds (from inside `poll()`) whether the connection
//!    is still usable, and reconnects + re-announces when it is not.
//! 3. Delivers inbound messages to the callbacks the application registered.
//! 4. Sends JSON responses (`recieveData` envelopes) on request.
//!
//! Nothing runs in the background.  The application owns the loop and calls
//! `poll()` on a regular cadence, the same way firmware calls a library's
//! `loop()` hook.

/// Application layer: the link itself, its transport seam, and the clock.
pub mod application;

/// Infrastructure layer: WebSocket transport, mock transport, config storage.
pub mod infrastructure;
