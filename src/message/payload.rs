//! Payload encoding and decoding
//!
//! Outbound values are encoded to JSON text, except strings which are sent
//! as-is. Inbound bytes go through an ordered fallback chain: JSON first,
//! then UTF-8 text, then the raw bytes.

use serde_json::Value;

/// A decoded inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The payload parsed as JSON.
    Json(Value),
    /// Valid UTF-8 that is not JSON.
    Text(String),
    /// Bytes that are not valid UTF-8.
    Raw(Vec<u8>),
}

impl Payload {
    /// Decode raw payload bytes. Never fails.
    pub fn decode(bytes: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Payload::Raw(bytes.to_vec());
        };

        match serde_json::from_str::<Value>(text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text.to_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text view of the payload. JSON strings are returned unquoted.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Json(value) => write!(f, "{value}"),
            Payload::Text(text) => f.write_str(text),
            Payload::Raw(bytes) => write!(f, "<{} raw bytes>", bytes.len()),
        }
    }
}

/// Encode an outbound value into payload bytes.
///
/// Objects and arrays become JSON text, strings pass through unchanged and
/// every other scalar is written in its JSON form (`42`, `true`, `null`).
pub fn encode_payload(value: &Value) -> Vec<u8> {
    match value {
        Value::String(text) => text.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    }
}
