//! In-process bus
//!
//! `MemoryBus` plays the broker: every `MemoryTransport` created from it is a
//! client session, and published frames are routed to each session holding a
//! matching subscription, using the same wildcard rules as the client.
//! Retained messages are replayed to new subscribers.
//!
//! The bus also counts handshakes and can be told to refuse sessions or
//! publishes, which makes connection behaviour observable.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::debug;

use crate::message::{InboundFrame, QoS};
use crate::topic;
use crate::transport::{SessionOptions, Transport, TransportError};

#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

#[derive(Debug, Default)]
struct BusState {
    next_session: u64,
    sessions: HashMap<u64, Session>,
    retained: BTreeMap<String, Vec<u8>>,
    handshakes: usize,
    refuse_handshakes: bool,
    fail_publishes: bool,
}

#[derive(Debug)]
struct Session {
    client_id: String,
    patterns: Vec<String>,
    sender: UnboundedSender<InboundFrame>,
}

impl BusState {
    fn route(&self, topic: &str, payload: &[u8]) -> usize {
        let mut delivered = 0;
        for session in self.sessions.values() {
            if !session.patterns.iter().any(|p| topic::matches(topic, p)) {
                continue;
            }
            if session
                .sender
                .send(InboundFrame::new(topic, payload))
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new, unopened transport attached to this bus.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            bus: self.clone(),
            session: None,
        }
    }

    /// Deliver a frame as if another client had published it. Returns the
    /// number of sessions that received it.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> usize {
        self.state().route(topic, payload)
    }

    /// Number of `open` calls seen so far, refused ones included.
    pub fn handshakes(&self) -> usize {
        self.state().handshakes
    }

    pub fn open_sessions(&self) -> usize {
        self.state().sessions.len()
    }

    /// Number of open sessions subscribed to exactly `pattern`.
    pub fn subscribers(&self, pattern: &str) -> usize {
        self.state()
            .sessions
            .values()
            .filter(|s| s.patterns.iter().any(|p| p == pattern))
            .count()
    }

    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.state().retained.get(topic).cloned()
    }

    pub fn refuse_handshakes(&self, refuse: bool) {
        self.state().refuse_handshakes = refuse;
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.state().fail_publishes = fail;
    }

    /// Drop every session, as a broker restart would.
    pub fn drop_sessions(&self) {
        self.state().sessions.clear();
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct OpenSession {
    id: u64,
    inbox: UnboundedReceiver<InboundFrame>,
}

/// One client session on a `MemoryBus`.
#[derive(Debug)]
pub struct MemoryTransport {
    bus: MemoryBus,
    session: Option<OpenSession>,
}

impl MemoryTransport {
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn session_id(&self) -> Result<u64, TransportError> {
        self.session
            .as_ref()
            .map(|s| s.id)
            .ok_or(TransportError::NotOpen)
    }

    fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.bus.state().sessions.remove(&session.id);
        }
    }
}

impl Transport for MemoryTransport {
    async fn open(&mut self, options: &SessionOptions) -> Result<(), TransportError> {
        self.drop_session();

        let mut state = self.bus.state();
        state.handshakes += 1;
        if state.refuse_handshakes {
            return Err(TransportError::Handshake(format!(
                "bus refused client {}",
                options.client_id
            )));
        }

        let id = state.next_session;
        state.next_session += 1;
        let (sender, inbox) = mpsc::unbounded_channel();
        state.sessions.insert(
            id,
            Session {
                client_id: options.client_id.clone(),
                patterns: Vec::new(),
                sender,
            },
        );
        drop(state);

        debug!(client_id = %options.client_id, session = id, "memory session opened");
        self.session = Some(OpenSession { id, inbox });
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.drop_session();
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &[u8],
        payload: &[u8],
        retain: bool,
        _qos: QoS,
    ) -> Result<(), TransportError> {
        self.session_id()?;
        let topic = std::str::from_utf8(topic)?;

        let mut state = self.bus.state();
        if state.fail_publishes {
            return Err(TransportError::Rejected(format!("publish to {topic}")));
        }

        if retain {
            if payload.is_empty() {
                state.retained.remove(topic);
            } else {
                state.retained.insert(topic.to_string(), payload.to_vec());
            }
        }

        state.route(topic, payload);
        Ok(())
    }

    async fn subscribe(&mut self, topic: &[u8], _qos: QoS) -> Result<(), TransportError> {
        let id = self.session_id()?;
        let pattern = std::str::from_utf8(topic)?;

        let mut state = self.bus.state();
        let retained: Vec<(String, Vec<u8>)> = state
            .retained
            .iter()
            .filter(|(t, _)| topic::matches(t, pattern))
            .map(|(t, p)| (t.clone(), p.clone()))
            .collect();

        let session = state.sessions.get_mut(&id).ok_or(TransportError::Closed)?;
        if !session.patterns.iter().any(|p| p == pattern) {
            session.patterns.push(pattern.to_string());
        }
        debug!(client_id = %session.client_id, pattern, "memory subscription added");

        for (topic, payload) in retained {
            let _ = session.sender.send(InboundFrame::new(topic, payload));
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &[u8]) -> Result<(), TransportError> {
        let id = self.session_id()?;
        let pattern = std::str::from_utf8(topic)?;

        if let Some(session) = self.bus.state().sessions.get_mut(&id) {
            session.patterns.retain(|p| p != pattern);
        }
        Ok(())
    }

    async fn receive_next(
        &mut self,
        blocking: bool,
    ) -> Result<Option<InboundFrame>, TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::NotOpen)?;

        if blocking {
            return match session.inbox.recv().await {
                Some(frame) => Ok(Some(frame)),
                None => Err(TransportError::Closed),
            };
        }

        match session.inbox.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.drop_session();
    }
}
