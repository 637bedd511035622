//! Message-level types shared by the client and the transports.
//!
//! - `Payload`: decoded inbound payload (JSON, text or raw bytes)
//! - `QoS`: delivery level passed through to the transport
//! - `InboundFrame`: a raw frame as handed over by a transport

pub mod payload;
pub mod qos;

pub use payload::{Payload, encode_payload};
pub use qos::QoS;

/// A frame received from the transport, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub topic: Vec<u8>,
    pub payload: Vec<u8>,
}

impl InboundFrame {
    pub fn new(topic: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
