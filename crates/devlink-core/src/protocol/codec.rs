//! JSON codec for DevLink envelopes.
//!
//! Envelopes are serialized into a growable `String` and then checked against
//! a byte limit.  An envelope that does not fit is rejected with
//! [`CodecError::TooLarge`]; it is never cut short, because a truncated JSON
//! document is not valid JSON and the server would drop it silently.
//!
//! # Why a limit at all?
//!
//! The receiving server and the device's WebSocket stack both have finite
//! frame buffers.  Rejecting at the source gives the caller an error it can
//! log instead of a frame that disappears somewhere downstream.

use thiserror::Error;

use crate::protocol::messages::{DataRequest, Envelope};

/// Default maximum encoded envelope size in bytes.
pub const DEFAULT_MAX_ENVELOPE_BYTES: usize = 1024;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoded envelope exceeds the configured size limit.
    #[error("encoded envelope is {len} bytes, limit is {max}")]
    TooLarge { len: usize, max: usize },

    /// serde_json rejected the input or output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Envelope`] as a JSON string no longer than `max_len` bytes.
///
/// # Errors
///
/// Returns [`CodecError::TooLarge`] if the encoded text is longer than
/// `max_len`, or [`CodecError::Json`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use devlink_core::{encode_envelope, Envelope, DEFAULT_MAX_ENVELOPE_BYTES};
///
/// let env = Envelope::identity("thermostat", "hall-1");
/// let json = encode_envelope(&env, DEFAULT_MAX_ENVELOPE_BYTES).unwrap();
/// assert_eq!(json, r#"{"action":"deviceType","type":"thermostat","name":"hall-1"}"#);
/// ```
pub fn encode_envelope(envelope: &Envelope, max_len: usize) -> Result<String, CodecError> {
    let text = serde_json::to_string(envelope)?;
    if text.len() > max_len {
        return Err(CodecError::TooLarge {
            len: text.len(),
            max: max_len,
        });
    }
    Ok(text)
}

/// Decodes an [`Envelope`] from JSON text.
///
/// Devices never receive envelopes in normal operation; this is used by
/// test servers and diagnostics that inspect what a device sent.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the text is not a valid envelope
/// (malformed JSON, missing fields, or an unknown `action`).
pub fn decode_envelope(text: &str) -> Result<Envelope, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decodes a [`DataRequest`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the text is not an object with a string
/// `dataType` field.
pub fn decode_data_request(text: &str) -> Result<DataRequest, CodecError> {
    Ok(serde_json::from_str(text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
