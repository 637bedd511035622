//! Subscription management
//!
//! The `SubscriptionTable` maps topic patterns to ordered lists of
//! `Handler`s. A pattern is present only while at least one handler is
//! registered for it.
//!
//! Concurrency note: the table is owned by a single `BusClient` and is not
//! synchronized internally.

pub mod handler;
pub mod table;

pub use handler::{Handler, HandlerError, HandlerResult};
pub use table::{Subscription, SubscriptionTable};
