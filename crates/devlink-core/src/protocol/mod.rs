//! Protocol module containing envelope types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_data_request, decode_envelope, encode_envelope, CodecError};
pub use messages::*;
