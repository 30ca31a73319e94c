//! Envelope and inbound message types for the DevLink protocol.
//!
//! # Outbound envelopes
//!
//! Everything the device sends to the server is a JSON object with an
//! `"action"` field naming the server endpoint to invoke.  Two actions exist:
//!
//! ```json
//! {"action":"deviceType","type":"thermostat","name":"hall-1"}
//! {"action":"recieveData","dataType":"temperature","data":21.5,"id":"req-9"}
//! ```
//!
//! The `recieveData` spelling is what deployed servers route on.  It is part
//! of the wire contract and must not be "fixed".
//!
//! # Inbound traffic
//!
//! The link does not interpret inbound payloads.  Transports hand over
//! [`Inbound`] items: complete messages, partial (fragmented) messages, and
//! connection events.  The link routes each kind to the matching callback.

use serde::{Deserialize, Serialize};

/// `action` value of the identity announcement.
pub const ACTION_DEVICE_TYPE: &str = "deviceType";

/// `action` value of a data response.
pub const ACTION_RECEIVE_DATA: &str = "recieveData";

// ── Outbound envelopes ────────────────────────────────────────────────────────

/// All envelopes a device can send to the server.
///
/// # Serde representation
///
/// `tag = "action"` makes serde write the variant name into an `"action"`
/// field next to the variant's own fields, and read it back from there when
/// deserializing.  The `rename` attributes map the Rust names onto the
/// camelCase keys the server expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Envelope {
    /// Identity announcement: tells the server which kind of device this is
    /// and which one.
    ///
    /// Sent once after the first connect and again after every reconnect.
    #[serde(rename = "deviceType")]
    DeviceType {
        /// Device category.  Several devices may share one type.
        #[serde(rename = "type")]
        device_type: String,
        /// Unique device name within its type.
        name: String,
    },

    /// A response carrying one piece of application data.
    #[serde(rename = "recieveData")]
    ReceiveData {
        /// Application-defined tag describing what `data` is.
        #[serde(rename = "dataType")]
        data_type: String,
        /// The payload itself.
        data: ResponseData,
        /// Correlation id of the request being answered.
        ///
        /// Omitted from the JSON entirely when there is no id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl Envelope {
    /// Builds an identity-announcement envelope.
    pub fn identity(device_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DeviceType {
            device_type: device_type.into(),
            name: name.into(),
        }
    }

    /// Builds a response envelope.
    ///
    /// An empty `id` means "no correlation id" and produces an envelope
    /// without the `id` key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use devlink_core::Envelope;
    ///
    /// let env = Envelope::response(42.5, "temperature", "");
    /// assert_eq!(env.id(), None);
    ///
    /// let env = Envelope::response("on", "state", "dev-7");
    /// assert_eq!(env.id(), Some("dev-7"));
    /// ```
    pub fn response(data: impl Into<ResponseData>, data_type: impl Into<String>, id: &str) -> Self {
        Self::ReceiveData {
            data_type: data_type.into(),
            data: data.into(),
            id: (!id.is_empty()).then(|| id.to_string()),
        }
    }

    /// Returns the wire value of the `action` field.
    pub fn action(&self) -> &'static str {
        match self {
            Self::DeviceType { .. } => ACTION_DEVICE_TYPE,
            Self::ReceiveData { .. } => ACTION_RECEIVE_DATA,
        }
    }

    /// Returns the correlation id of a response, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::ReceiveData { id, .. } => id.as_deref(),
            Self::DeviceType { .. } => None,
        }
    }
}

/// Payload of a `recieveData` envelope.
///
/// `untagged` means the variant is not named in the JSON: a number is written
/// as a JSON number, text as a JSON string, and structured data as-is.  On
/// decode serde tries the variants top to bottom, so whole numbers come back
/// as [`ResponseData::Integer`] and fractional ones as [`ResponseData::Number`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// A whole number, written without a fractional part.
    Integer(i64),
    /// A floating-point reading.  Non-finite values encode as `null`.
    Number(f64),
    /// A text value.
    Text(String),
    /// Any other JSON value (objects, arrays, booleans).
    Json(serde_json::Value),
}

impl From<f64> for ResponseData {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for ResponseData {
    /// Widens through the shortest decimal form of the `f32`, so `21.3_f32`
    /// is sent as `21.3` rather than `21.299999237060547`.
    fn from(value: f32) -> Self {
        let widened = value
            .to_string()
            .parse::<f64>()
            .unwrap_or_else(|_| f64::from(value));
        Self::Number(widened)
    }
}

macro_rules! impl_integer_data {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ResponseData {
                fn from(value: $t) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_integer_data!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for ResponseData {
    /// Values above `i64::MAX` fall back to a floating-point number.
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Self::Integer)
            .unwrap_or(Self::Number(value as f64))
    }
}

impl From<bool> for ResponseData {
    fn from(value: bool) -> Self {
        Self::Json(serde_json::Value::Bool(value))
    }
}

impl From<&str> for ResponseData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ResponseData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for ResponseData {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// A request shape understood by the bundled agent binary.
///
/// The link itself never parses inbound traffic; this type exists for
/// applications that follow the common `{"dataType": ..., "id": ...}` request
/// convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Which reading the server wants.
    #[serde(rename = "dataType")]
    pub data_type: String,
    /// Correlation id to echo back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A complete inbound WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// UTF-8 text frame(s).
    Text(String),
    /// Binary frame(s).
    Binary(Vec<u8>),
}

impl InboundMessage {
    /// Returns the text content, or `None` for binary messages.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Returns the raw bytes of the message regardless of kind.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }
}

/// One fragment of a message that is being streamed rather than delivered
/// whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMessage {
    /// Fragment payload.
    pub data: Vec<u8>,
    /// `true` on the last fragment of the message.
    pub is_final: bool,
}

/// Connection-level notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The WebSocket handshake completed.
    ConnectionOpened,
    /// The connection was closed by either side or failed.
    ConnectionClosed,
    /// A protocol ping arrived (the transport answers it).
    GotPing(Vec<u8>),
    /// A protocol pong arrived.
    GotPong(Vec<u8>),
}

/// Anything a transport can hand to the link during a pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(InboundMessage),
    Partial(PartialMessage),
    Event(LinkEvent),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
