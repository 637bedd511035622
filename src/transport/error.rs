use std::time::Duration;

use thiserror::Error;

/// Failures reported by a `Transport`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport session is not open")]
    NotOpen,

    #[error("transport session was closed by the broker")]
    Closed,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("broker rejected the request: {0}")]
    Rejected(String),

    #[error("topic or payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid protocol message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}
