//! The `client` module holds the bus client: connection lifecycle,
//! publishing, subscriptions and inbound dispatch.
//!
//! - `bus_client`: `BusClient` and its connect/publish/subscribe/dispatch API
//! - `event_loop`: the blocking and polling receive loops
//! - `device`: sensor/status conveniences used by device firmware

pub mod bus_client;
pub mod device;
pub mod event_loop;

pub use bus_client::{BusClient, ConnectionState, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL};

#[cfg(test)]
mod tests;
