//! Link events and fan-out
//!
//! Every subscriber owns an unbounded crossbeam queue, so events from one
//! session arrive in publish order and a slow subscriber never blocks the
//! read loop.

use super::session::SessionId;
use crate::protocol::Message;
use crate::transport::Peer;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// Event published by sessions and listeners
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Session opened; always the first event of a session
    Connected { session: SessionId, peer: Peer },
    /// Session closed; published exactly once per session
    Disconnected { session: SessionId, peer: Peer },
    /// Decoded inbound frame
    Message { session: SessionId, message: Message },
    /// Dial failed; the connect slot is idle again
    ConnectFailed { peer: Peer, reason: String },
    /// Acceptor failed for a reason other than cancellation
    AcceptFailed { reason: String },
}

impl LinkEvent {
    /// Session the event belongs to, if any
    pub fn session(&self) -> Option<SessionId> {
        match self {
            LinkEvent::Connected { session, .. }
            | LinkEvent::Disconnected { session, .. }
            | LinkEvent::Message { session, .. } => Some(*session),
            LinkEvent::ConnectFailed { .. } | LinkEvent::AcceptFailed { .. } => None,
        }
    }
}

/// Fan-out of [`LinkEvent`]s to subscriber queues
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<LinkEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// New queue receiving every event published from now on
    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to all live subscribers, dropping ones whose receiver is gone
    pub fn publish(&self, event: LinkEvent) {
        log::trace!("Publishing {:?}", event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
