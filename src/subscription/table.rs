//! Pattern → handler table
//!
//! Patterns are kept in a `BTreeMap` so `match_all` walks them in a stable,
//! lexicographic order. Handlers under one pattern run in insertion order.

use std::collections::BTreeMap;

use crate::message::QoS;
use crate::subscription::Handler;
use crate::topic;

/// Handlers registered under one pattern, plus the QoS last requested for it.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub pattern: String,
    pub handlers: Vec<Handler>,
    pub qos: QoS,
}

#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: BTreeMap<String, Subscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `pattern`, creating the entry if
    /// needed. The same handler may be registered more than once.
    pub fn add(&mut self, pattern: &str, handler: Handler, qos: QoS) {
        let entry = self
            .entries
            .entry(pattern.to_string())
            .or_insert_with(|| Subscription {
                pattern: pattern.to_string(),
                handlers: Vec::new(),
                qos,
            });
        entry.qos = qos;
        entry.handlers.push(handler);
    }

    /// Remove one registration of `handler`, or the whole entry when
    /// `handler` is `None`. Unknown patterns and handlers are ignored.
    ///
    /// Returns `true` when the pattern no longer has an entry as a result of
    /// this call.
    pub fn remove(&mut self, pattern: &str, handler: Option<&Handler>) -> bool {
        let Some(handler) = handler else {
            return self.entries.remove(pattern).is_some();
        };

        let Some(entry) = self.entries.get_mut(pattern) else {
            return false;
        };

        if let Some(index) = entry.handlers.iter().position(|h| h == handler) {
            entry.handlers.remove(index);
        }

        if entry.handlers.is_empty() {
            self.entries.remove(pattern);
            return true;
        }

        false
    }

    /// Every handler whose pattern matches `topic`, in table order.
    pub fn match_all(&self, topic: &str) -> Vec<Handler> {
        self.entries
            .values()
            .filter(|entry| topic::matches(topic, &entry.pattern))
            .flat_map(|entry| entry.handlers.iter().cloned())
            .collect()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.entries.contains_key(pattern)
    }

    pub fn get(&self, pattern: &str) -> Option<&Subscription> {
        self.entries.get(pattern)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
