//! Bus client
//!
//! `BusClient` owns a `Transport` and the connection state built on it. It is
//! responsible for:
//! - opening the session once the network is reachable, with a bounded wait
//! - closing sessions that a one-shot publish opened
//! - keeping the subscription table and the broker-side subscriptions in step
//! - decoding inbound frames and fanning them out to matching handlers
//!
//! Concurrency and usage notes:
//! - The client is not synchronized internally. Every method is meant to be
//!   called from the task owning the client; share it behind a
//!   `tokio::sync::Mutex` or an actor if several tasks need it.
//! - Handler failures, returned errors and panics alike, are logged and
//!   contained inside `dispatch`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::message::{Payload, QoS, encode_payload};
use crate::network::{AlwaysReachable, NetworkMonitor};
use crate::subscription::{Handler, SubscriptionTable};
use crate::transport::{SessionOptions, Transport};
use crate::utils::error::{BusError, Result};

/// How long `connect` waits for the network before giving up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between two reachability checks while waiting for the network.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug)]
pub struct BusClient<T, N = AlwaysReachable> {
    pub(super) transport: T,
    network: N,
    options: SessionOptions,
    connect_timeout: Duration,
    poll_interval: Duration,
    pub(super) state: ConnectionState,
    subscriptions: SubscriptionTable,
}

impl<T: Transport> BusClient<T, AlwaysReachable> {
    /// A client for hosts whose network is always considered up.
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self::with_network(transport, AlwaysReachable, options)
    }
}

impl<T: Transport, N: NetworkMonitor> BusClient<T, N> {
    pub fn with_network(transport: T, network: N, options: SessionOptions) -> Self {
        Self {
            transport,
            network,
            options,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: ConnectionState::Disconnected,
            subscriptions: SubscriptionTable::new(),
        }
    }

    /// Build a client from loaded settings.
    pub fn from_settings(transport: T, network: N, settings: &Settings) -> Self {
        Self::with_network(transport, network, settings.session_options())
            .connect_timeout(settings.network.connect_timeout())
            .poll_interval(settings.network.poll_interval())
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// Poll the network monitor until it reports the link as up, for at most
    /// `connect_timeout`.
    async fn wait_for_network(&self) -> Result<()> {
        if self.network.is_reachable() {
            return Ok(());
        }

        debug!("waiting up to {:?} for the network", self.connect_timeout);
        let wait = async {
            while !self.network.is_reachable() {
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::time::timeout(self.connect_timeout, wait)
            .await
            .map_err(|_| BusError::NetworkUnreachable(self.connect_timeout))
    }

    /// Open the session. Does nothing when already connected.
    ///
    /// Patterns already in the subscription table are subscribed again on
    /// the new session.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        if let Err(e) = self.wait_for_network().await {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        let address = self.options.address();
        if let Err(source) = self.transport.open(&self.options).await {
            self.state = ConnectionState::Disconnected;
            error!(client_id = %self.options.client_id, "handshake with {address} failed: {source}");
            return Err(BusError::Handshake { address, source });
        }

        self.state = ConnectionState::Connected;
        info!(client_id = %self.options.client_id, "connected to {address}");

        for subscription in self.subscriptions.iter() {
            let pattern = subscription.pattern.as_str();
            if let Err(e) = self
                .transport
                .subscribe(pattern.as_bytes(), subscription.qos)
                .await
            {
                warn!(pattern, "failed to restore subscription: {e}");
            }
        }

        Ok(())
    }

    /// Close the session. Does nothing when already disconnected.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }

        self.state = ConnectionState::Disconnected;
        self.transport.close().await?;
        info!(client_id = %self.options.client_id, "disconnected from {}", self.options.address());
        Ok(())
    }

    /// Publish `payload` to `topic`.
    ///
    /// Objects and arrays are sent as JSON text, strings as-is and other
    /// scalars in their JSON form. When the client was disconnected, the
    /// session opened for this publish is closed again before returning,
    /// whether or not the publish itself succeeded.
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: impl Into<Value>,
        retain: bool,
        qos: QoS,
    ) -> Result<()> {
        let bytes = encode_payload(&payload.into());
        self.publish_bytes(topic, &bytes, retain, qos).await
    }

    /// Publish any serializable value, encoded like `publish` does.
    pub async fn publish_serialized<S>(
        &mut self,
        topic: &str,
        payload: &S,
        retain: bool,
        qos: QoS,
    ) -> Result<()>
    where
        S: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload)?;
        self.publish(topic, value, retain, qos).await
    }

    async fn publish_bytes(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<()> {
        self.wait_for_network().await?;

        let opened_here = !self.is_connected();
        self.connect().await?;

        let published = self
            .transport
            .publish(topic.as_bytes(), payload, retain, qos)
            .await
            .map_err(BusError::from);

        let closed = if opened_here {
            self.disconnect().await
        } else {
            Ok(())
        };

        match &published {
            Ok(()) => debug!(topic, bytes = payload.len(), retain, %qos, "published"),
            Err(e) => error!(topic, "publish failed: {e}"),
        }
        if let Err(e) = &closed {
            warn!("failed to close session after publish: {e}");
        }

        published.and(closed)
    }

    /// Register `handler` for `pattern` and subscribe on the broker.
    pub async fn subscribe(&mut self, pattern: &str, handler: Handler, qos: QoS) -> Result<()> {
        self.connect().await?;
        self.subscriptions.add(pattern, handler, qos);
        self.transport.subscribe(pattern.as_bytes(), qos).await?;
        info!(pattern, %qos, "subscribed");
        Ok(())
    }

    /// Remove `handler` from `pattern`, or the whole pattern when `handler`
    /// is `None`. Unknown patterns and handlers are ignored.
    ///
    /// Once a pattern has no handler left the broker-side subscription is
    /// dropped on a best-effort basis.
    pub async fn unsubscribe(&mut self, pattern: &str, handler: Option<&Handler>) {
        let removed = self.subscriptions.remove(pattern, handler);
        if !removed || !self.is_connected() {
            return;
        }

        match self.transport.unsubscribe(pattern.as_bytes()).await {
            Ok(()) => info!(pattern, "unsubscribed"),
            Err(e) => warn!(pattern, "broker unsubscribe failed: {e}"),
        }
    }

    /// Decode one inbound frame and invoke every matching handler.
    ///
    /// Returns the number of handlers invoked. A handler returning an error
    /// or panicking is logged and does not stop the remaining ones.
    pub fn dispatch(&self, topic: &[u8], payload: &[u8]) -> usize {
        let topic = String::from_utf8_lossy(topic);
        let payload = Payload::decode(payload);

        let handlers = self.subscriptions.match_all(&topic);
        if handlers.is_empty() {
            debug!(topic = %topic, "no handler for message");
            return 0;
        }

        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.call(&topic, &payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(topic = %topic, "handler failed: {e}"),
                Err(cause) => error!(topic = %topic, "handler panicked: {}", panic_message(&*cause)),
            }
        }

        handlers.len()
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
