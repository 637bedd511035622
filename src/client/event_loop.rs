//! Receive loops
//!
//! Two ways to service inbound traffic:
//! - `wait_for_messages` parks the task on the transport and dispatches every
//!   frame until a shutdown future resolves
//! - `check_messages` handles at most one pending frame and returns at once,
//!   for loops that interleave the bus with other periodic work
//!
//! Shutdown is only raced against frame reception, so a dispatch that has
//! started always runs to completion.

use std::future::Future;

use tracing::{error, info};

use crate::client::{BusClient, ConnectionState};
use crate::network::NetworkMonitor;
use crate::transport::{Transport, TransportError};
use crate::utils::error::{BusError, Result};

impl<T: Transport, N: NetworkMonitor> BusClient<T, N> {
    /// Dispatch inbound frames until `shutdown` resolves.
    ///
    /// Fails with `BusError::NotConnected` when called without a session. A
    /// transport failure ends the loop and leaves the client disconnected.
    pub async fn wait_for_messages<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }

        tokio::pin!(shutdown);
        info!("listening for messages");

        loop {
            let received = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("stopping message listener");
                    return Ok(());
                }
                received = self.transport.receive_next(true) => received,
            };

            match received {
                Ok(Some(frame)) => {
                    self.dispatch(&frame.topic, &frame.payload);
                }
                Ok(None) => {}
                Err(e) => return Err(self.receive_failed(e)),
            }
        }
    }

    /// Dispatch at most one pending frame without waiting.
    ///
    /// Returns `Ok(true)` when a frame was dispatched. Without a session this
    /// is a no-op returning `Ok(false)`.
    pub async fn check_messages(&mut self) -> Result<bool> {
        if !self.is_connected() {
            return Ok(false);
        }

        match self.transport.receive_next(false).await {
            Ok(Some(frame)) => {
                self.dispatch(&frame.topic, &frame.payload);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(self.receive_failed(e)),
        }
    }

    fn receive_failed(&mut self, e: TransportError) -> BusError {
        error!("receive failed, session is gone: {e}");
        self.state = ConnectionState::Disconnected;
        e.into()
    }
}
