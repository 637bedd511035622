//! # EdgeBus
//!
//! `edgebus` is a small publish/subscribe client for devices talking to a
//! message broker. It keeps a table of topic patterns with their handlers,
//! publishes JSON or text payloads, and dispatches inbound messages to every
//! matching handler.
//!
//! ## Core Modules
//!
//! - `client`: `BusClient`, its connection lifecycle and receive loops.
//! - `config`: Loads client configuration from files and the environment.
//! - `message`: Payload decoding/encoding, QoS and raw inbound frames.
//! - `network`: Reachability checks consulted before connecting.
//! - `subscription`: Handlers and the pattern-keyed subscription table.
//! - `topic`: Wildcard topic matching and device topic builders.
//! - `transport`: The `Transport` capability plus in-memory and WebSocket
//!   implementations.
//! - `utils`: Shared error type and logging setup.

pub mod client;
pub mod config;
pub mod message;
pub mod network;
pub mod subscription;
pub mod topic;
pub mod transport;
pub mod utils;

pub use client::{BusClient, ConnectionState};
pub use message::{Payload, QoS};
pub use subscription::Handler;
pub use utils::error::{BusError, Result};
