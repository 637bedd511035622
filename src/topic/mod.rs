//! Topic matching and topic naming conventions.
//!
//! Topics are `/`-separated hierarchies such as `sensors/temperature`.
//! Subscription patterns may use `+` for exactly one segment and a trailing
//! `#` for any remainder.

pub mod matcher;

pub use matcher::{matches, sensor_topic, status_topic};
