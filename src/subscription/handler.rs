use std::fmt;
use std::sync::Arc;

use crate::message::Payload;

/// Error type handlers may return; it is logged by the dispatcher.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

type HandlerFn = dyn Fn(&str, &Payload) -> HandlerResult + Send + Sync;

/// A callback invoked with `(topic, payload)` for every matching message.
///
/// Cloning a `Handler` yields the same callback: clones compare equal and
/// removing one clone from a pattern removes that registration. Two handlers
/// built from separate `Handler::new` calls are always distinct, even when
/// wrapping identical closures.
#[derive(Clone)]
pub struct Handler {
    callback: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str, &Payload) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn call(&self, topic: &str, payload: &Payload) -> HandlerResult {
        (self.callback)(topic, payload)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.callback) as *const ()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.addr()).finish()
    }
}
