//! Error types surfaced by the bus client.
//!
//! Handler failures are never represented here: they are logged by the
//! dispatcher and do not leave `BusClient::dispatch`.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum BusError {
    /// The network monitor did not report the link as up in time.
    #[error("network not reachable after waiting {0:?}")]
    NetworkUnreachable(Duration),

    /// Opening the transport session failed. Not retried.
    #[error("handshake with broker {address} failed: {source}")]
    Handshake {
        address: String,
        #[source]
        source: TransportError,
    },

    /// An operation that needs a live session was called without one.
    #[error("not connected to the broker")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid QoS level {0}, expected 0, 1 or 2")]
    InvalidQos(u8),
}

pub type Result<T> = std::result::Result<T, BusError>;
