//! Network reachability
//!
//! The client only needs to know whether the network link is up before it
//! opens a session. Association, retries and reboots belong to the platform
//! layer, which reports its state through a `NetworkMonitor`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Polled reachability check.
pub trait NetworkMonitor {
    fn is_reachable(&self) -> bool;
}

/// Monitor for hosts whose network is managed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl NetworkMonitor for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }
}

/// Shared link flag flipped by whatever drives the network interface.
#[derive(Debug, Clone, Default)]
pub struct LinkFlag {
    up: Arc<AtomicBool>,
}

impl LinkFlag {
    pub fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
        }
    }

    pub fn set_up(&self) {
        self.up.store(true, Ordering::Release);
    }

    pub fn set_down(&self) {
        self.up.store(false, Ordering::Release);
    }
}

impl NetworkMonitor for LinkFlag {
    fn is_reachable(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}

impl<F> NetworkMonitor for F
where
    F: Fn() -> bool,
{
    fn is_reachable(&self) -> bool {
        self()
    }
}
