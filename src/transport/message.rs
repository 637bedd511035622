//! JSON protocol spoken with a WebSocket broker.
//!
//! Every frame is a text frame holding one object tagged by `type`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Login {
        username: String,
        password: String,
    },
    Auth {
        token: String,
    },
    Subscribe {
        topic: String,
        #[serde(default)]
        qos: u8,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        payload: String,
        message_id: String,
        qos: u8,
        #[serde(default)]
        retain: bool,
    },
    Ack {
        message_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LoginResponse {
        token: String,
    },
    Authenticated {},
    Error {
        message: String,
    },
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        message_id: String,
        qos: u8,
    },
}
