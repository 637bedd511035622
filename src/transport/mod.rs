//! The `transport` module defines the capability the bus client needs from
//! an underlying message bus, and ships two implementations:
//!
//! - `memory`: an in-process bus routing frames between transports, used by
//!   tests and single-process setups
//! - `websocket`: a client for a WebSocket broker speaking the JSON protocol
//!   defined in `message`
//!
//! Transports are plain owned values. A `BusClient` holds exactly one and
//! drives its whole lifecycle; there is no process-wide connection.

pub mod error;
pub mod memory;
pub mod message;
pub mod websocket;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::message::{InboundFrame, QoS};

pub use error::TransportError;
pub use memory::{MemoryBus, MemoryTransport};
pub use websocket::WsTransport;

/// Keepalive used when none is configured: one hour.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(3600);

/// Username/password pair presented to the broker during `open`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a transport needs to open a session with the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub keepalive: Duration,
    pub credentials: Option<Credentials>,
}

impl SessionOptions {
    /// Options for `host:port` with a generated client id and the default
    /// keepalive.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            client_id: generate_client_id(),
            host: host.into(),
            port,
            keepalive: DEFAULT_KEEPALIVE,
            credentials: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// `host:port`, as used in log lines and errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A fresh client id of the form `edgebus-<uuid>`.
pub fn generate_client_id() -> String {
    format!("edgebus-{}", Uuid::new_v4().simple())
}

/// The bus capability a `BusClient` is built on.
///
/// Frames flow back to the client through `receive_next`; the client then
/// decodes and dispatches them. Implementations must keep `receive_next`
/// cancel-safe: dropping the future before it completes must not lose a
/// frame, because the blocking dispatch loop races it against shutdown.
pub trait Transport {
    /// Open a session with the broker. A failure here is a handshake failure.
    fn open(
        &mut self,
        options: &SessionOptions,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the session. Closing a transport that is not open is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn publish(
        &mut self,
        topic: &[u8],
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn subscribe(
        &mut self,
        topic: &[u8],
        qos: QoS,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Best-effort removal of a broker-side subscription. Transports without
    /// the notion keep the default no-op; the client filters by its own table
    /// either way.
    fn unsubscribe(
        &mut self,
        _topic: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }

    /// Fetch the next inbound frame.
    ///
    /// With `blocking` set, waits until something arrives; `Ok(None)` may
    /// still be returned when only control traffic was handled. Without it,
    /// returns `Ok(None)` immediately when nothing is pending.
    fn receive_next(
        &mut self,
        blocking: bool,
    ) -> impl Future<Output = Result<Option<InboundFrame>, TransportError>> + Send;
}
