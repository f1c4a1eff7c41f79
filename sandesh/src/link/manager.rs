//! Session manager: racing accept and connect listeners, one active session
//!
//! Slot state:
//!
//! ```text
//!          accept_incoming()            connection established
//! Idle ──► AcceptPending ─────────┐
//!   │                             ├──► Active ──► Idle (EOF / error / disconnect)
//!   └────► ConnectPending ────────┘
//!          connect_as_client()
//! ```
//!
//! Both pending states may exist together. Promotion runs under the slot lock:
//! the completing listener must still be the registered one, then both
//! listeners are cancelled, the previous session is closed and the new one is
//! installed. A listener that completes after being cancelled closes its
//! stream instead of promoting.

use super::events::{EventHub, LinkEvent};
use super::session::{Session, SessionId};
use crate::config::{Config, SessionConfig};
use crate::error::{Error, Result};
use crate::protocol::{Command, Message};
use crate::transport::{self, Acceptor, Adapter, Duplex, Peer};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Listener identity, unique within a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Accept,
    Connect,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Accept => f.write_str("accept"),
            ListenerKind::Connect => f.write_str("connect"),
        }
    }
}

/// Registered in-flight listener
struct Listener {
    id: ListenerId,
    kind: ListenerKind,
    peer: Option<Peer>,
    cancelled: Arc<AtomicBool>,
    acceptor: Option<Arc<dyn Acceptor>>,
}

impl Listener {
    /// Mark cancelled and release the acceptor. A dial in progress cannot be
    /// interrupted; it sees the flag when it completes.
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            log::debug!("Cancelling {} listener {:?}", self.kind, self.id);
        }
        if let Some(acceptor) = &self.acceptor {
            acceptor.close();
        }
    }
}

#[derive(Default)]
struct Slot {
    accept: Option<Listener>,
    connect: Option<Listener>,
    active: Option<Session>,
}

impl Slot {
    fn listener(&self, kind: ListenerKind) -> Option<&Listener> {
        match kind {
            ListenerKind::Accept => self.accept.as_ref(),
            ListenerKind::Connect => self.connect.as_ref(),
        }
    }

    fn listener_mut(&mut self, kind: ListenerKind) -> &mut Option<Listener> {
        match kind {
            ListenerKind::Accept => &mut self.accept,
            ListenerKind::Connect => &mut self.connect,
        }
    }

    fn cancel_listeners(&mut self) {
        let listeners = [self.accept.take(), self.connect.take()];
        for listener in listeners.into_iter().flatten() {
            listener.cancel();
        }
    }
}

/// Coarse slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    AcceptPending,
    ConnectPending,
    /// Both listeners in flight
    Racing,
    Active,
}

/// Snapshot of the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub accepting: bool,
    /// Peer being dialed
    pub connecting: Option<Peer>,
    /// Open session
    pub active: Option<(SessionId, Peer)>,
}

impl LinkStatus {
    pub fn state(&self) -> SlotState {
        match (&self.active, self.accepting, &self.connecting) {
            (Some(_), _, _) => SlotState::Active,
            (None, true, Some(_)) => SlotState::Racing,
            (None, true, None) => SlotState::AcceptPending,
            (None, false, Some(_)) => SlotState::ConnectPending,
            (None, false, None) => SlotState::Idle,
        }
    }
}

/// Background callback dispatcher started by a `subscribe_*` call
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// True once the manager is gone and the queue drained
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

struct ManagerInner {
    adapter: Arc<dyn Adapter>,
    hub: Arc<EventHub>,
    session_config: SessionConfig,
    slot: Mutex<Slot>,
    /// Id of the most recently installed session; 0 before the first
    current: Arc<AtomicU64>,
    next_session: AtomicU64,
    next_listener: AtomicU64,
}

impl ManagerInner {
    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed))
    }

    /// Install a freshly established stream if its listener is still current
    fn promote(&self, kind: ListenerKind, id: ListenerId, stream: Box<dyn Duplex>, peer: Peer) {
        let mut slot = self.slot.lock();

        if slot.listener(kind).is_none_or(|l| l.id != id) {
            log::info!(
                "Cancelled {} listener completed with {}; closing its stream",
                kind,
                peer
            );
            if let Err(e) = stream.shutdown() {
                log::debug!("Stream shutdown for {}: {}", peer, e);
            }
            return;
        }

        slot.cancel_listeners();

        if let Some(previous) = slot.active.take() {
            log::info!(
                "Session {} with {} superseded by {} via {}",
                previous.id(),
                previous.peer(),
                peer,
                kind
            );
            previous.close();
        }

        // Publish the id before the read loop can emit anything
        let session_id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        let previous_id = self.current.swap(session_id.0, Ordering::AcqRel);

        match Session::open(
            session_id,
            stream,
            peer.clone(),
            &self.session_config,
            Arc::clone(&self.hub),
        ) {
            Ok(session) => {
                log::info!("Session {} established with {} via {}", session_id, peer, kind);
                slot.active = Some(session);
            }
            Err(e) => {
                log::error!("Failed to open session with {}: {}", peer, e);
                self.current.store(previous_id, Ordering::Release);
                let reason = e.to_string();
                self.hub.publish(match kind {
                    ListenerKind::Accept => LinkEvent::AcceptFailed { reason },
                    ListenerKind::Connect => LinkEvent::ConnectFailed { peer, reason },
                });
            }
        }
    }

    /// Forget a finished listener if it is still the registered one
    fn clear_listener(&self, kind: ListenerKind, id: ListenerId) {
        let mut slot = self.slot.lock();
        let entry = slot.listener_mut(kind);
        if entry.as_ref().is_some_and(|l| l.id == id) {
            *entry = None;
        }
    }

    fn shutdown(&self) {
        let mut slot = self.slot.lock();
        slot.cancel_listeners();
        if let Some(session) = slot.active.take() {
            session.close();
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Owns the active session and the accept/connect listeners
///
/// Cloning yields another handle on the same manager.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(adapter: Arc<dyn Adapter>, session_config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                adapter,
                hub: Arc::new(EventHub::new()),
                session_config,
                slot: Mutex::new(Slot::default()),
                current: Arc::new(AtomicU64::new(0)),
                next_session: AtomicU64::new(1),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Manager over the adapter selected in config
    pub fn from_config(config: &Config) -> Result<Self> {
        let adapter = transport::create_adapter(config)?;
        Ok(Self::new(adapter, config.session.clone()))
    }

    /// Start (or restart) the accept listener
    pub fn accept_incoming(&self) -> Result<()> {
        let mut slot = self.inner.slot.lock();
        if let Some(previous) = slot.accept.take() {
            previous.cancel();
        }

        let acceptor: Arc<dyn Acceptor> = Arc::from(self.inner.adapter.listen()?);
        let id = self.inner.next_listener_id();
        let cancelled = Arc::new(AtomicBool::new(false));

        let weak = Arc::downgrade(&self.inner);
        let thread_acceptor = Arc::clone(&acceptor);
        let thread_cancelled = Arc::clone(&cancelled);
        thread::Builder::new()
            .name("sandesh-accept".to_string())
            .spawn(move || accept_thread(weak, id, thread_acceptor, thread_cancelled))
            .map_err(|e| {
                acceptor.close();
                Error::ThreadSpawn(e.to_string())
            })?;

        log::info!("Accept listener {:?} started", id);
        slot.accept = Some(Listener {
            id,
            kind: ListenerKind::Accept,
            peer: None,
            cancelled,
            acceptor: Some(acceptor),
        });
        Ok(())
    }

    /// Start (or restart) the connect listener toward `peer`
    pub fn connect_as_client(&self, peer: Peer) -> Result<()> {
        let mut slot = self.inner.slot.lock();
        if let Some(previous) = slot.connect.take() {
            previous.cancel();
        }

        let id = self.inner.next_listener_id();
        let cancelled = Arc::new(AtomicBool::new(false));

        let weak = Arc::downgrade(&self.inner);
        let adapter = Arc::clone(&self.inner.adapter);
        let thread_peer = peer.clone();
        let thread_cancelled = Arc::clone(&cancelled);
        thread::Builder::new()
            .name("sandesh-connect".to_string())
            .spawn(move || connect_thread(weak, id, adapter, thread_peer, thread_cancelled))
            .map_err(|e| Error::ThreadSpawn(e.to_string()))?;

        log::info!("Connect listener {:?} started for {}", id, peer);
        slot.connect = Some(Listener {
            id,
            kind: ListenerKind::Connect,
            peer: Some(peer),
            cancelled,
            acceptor: None,
        });
        Ok(())
    }

    /// The open session, if any; never blocks on I/O
    pub fn active_session(&self) -> Option<Session> {
        self.inner
            .slot
            .lock()
            .active
            .as_ref()
            .filter(|s| s.is_open())
            .cloned()
    }

    pub fn status(&self) -> LinkStatus {
        let slot = self.inner.slot.lock();
        LinkStatus {
            accepting: slot.accept.is_some(),
            connecting: slot.connect.as_ref().and_then(|l| l.peer.clone()),
            active: slot
                .active
                .as_ref()
                .filter(|s| s.is_open())
                .map(|s| (s.id(), s.peer().clone())),
        }
    }

    /// Close the active session and cancel both listeners
    pub fn disconnect(&self) {
        log::info!("Disconnect requested");
        self.inner.shutdown();
    }

    /// Write `text` verbatim through the active session
    pub fn send_raw(&self, text: &str) -> Result<()> {
        let session = self.active_session().ok_or(Error::NotConnected)?;
        session.send(text.as_bytes())
    }

    /// Encode, frame with the configured terminator, and send
    pub fn send_command(&self, command: &Command) -> Result<()> {
        let session = self.active_session().ok_or(Error::NotConnected)?;
        let bytes = command.frame(&self.inner.session_config.line_terminator)?;
        log::debug!("Session {} >> {:?}", session.id(), command);
        session.send(&bytes)
    }

    pub fn bonded_peers(&self) -> Vec<Peer> {
        self.inner.adapter.bonded_peers()
    }

    pub fn scan_for_peers(&self) -> Result<Vec<Peer>> {
        self.inner.adapter.scan()
    }

    /// Raw event queue. Events carry their session id so stale ones can be
    /// told apart.
    pub fn subscribe_events(&self) -> Receiver<LinkEvent> {
        self.inner.hub.subscribe()
    }

    /// Call `on_message` for every message of the current session, serially
    /// on a dedicated thread
    pub fn subscribe_messages<F>(&self, on_message: F) -> Result<Subscription>
    where
        F: Fn(&Message) + Send + 'static,
    {
        self.dispatch("sandesh-messages", move |event| {
            if let LinkEvent::Message { message, .. } = event {
                on_message(message);
            }
        })
    }

    /// Call `on_lifecycle(peer, connected)` for the current session's
    /// connect and disconnect, serially on a dedicated thread
    pub fn subscribe_lifecycle<F>(&self, on_lifecycle: F) -> Result<Subscription>
    where
        F: Fn(&Peer, bool) + Send + 'static,
    {
        self.dispatch("sandesh-lifecycle", move |event| match event {
            LinkEvent::Connected { peer, .. } => on_lifecycle(peer, true),
            LinkEvent::Disconnected { peer, .. } => on_lifecycle(peer, false),
            _ => {}
        })
    }

    /// Drain a fresh queue on a named thread, dropping session events that
    /// belong to a superseded session
    fn dispatch<F>(&self, name: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(&LinkEvent) + Send + 'static,
    {
        let events = self.inner.hub.subscribe();
        let current = Arc::clone(&self.inner.current);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for event in events.iter() {
                    if let Some(session) = event.session()
                        && session.0 != current.load(Ordering::Acquire)
                    {
                        log::debug!("Dropping event from stale session {}", session);
                        continue;
                    }
                    handler(&event);
                }
            })
            .map_err(|e| Error::ThreadSpawn(e.to_string()))?;
        Ok(Subscription { handle })
    }
}

fn accept_thread(
    manager: Weak<ManagerInner>,
    id: ListenerId,
    acceptor: Arc<dyn Acceptor>,
    cancelled: Arc<AtomicBool>,
) {
    let result = acceptor.accept();
    let Some(manager) = manager.upgrade() else {
        if let Ok((stream, _)) = result {
            let _ = stream.shutdown();
        }
        return;
    };
    match result {
        Ok((stream, peer)) => manager.promote(ListenerKind::Accept, id, stream, peer),
        Err(Error::Cancelled) => {
            log::debug!("Accept listener {:?} cancelled", id);
            manager.clear_listener(ListenerKind::Accept, id);
        }
        Err(e) => {
            if !cancelled.load(Ordering::Acquire) {
                log::error!("Accept failed: {}", e);
                manager.hub.publish(LinkEvent::AcceptFailed {
                    reason: e.to_string(),
                });
            }
            acceptor.close();
            manager.clear_listener(ListenerKind::Accept, id);
        }
    }
}

fn connect_thread(
    manager: Weak<ManagerInner>,
    id: ListenerId,
    adapter: Arc<dyn Adapter>,
    peer: Peer,
    cancelled: Arc<AtomicBool>,
) {
    let result = adapter.dial(&peer);
    let Some(manager) = manager.upgrade() else {
        if let Ok(stream) = result {
            let _ = stream.shutdown();
        }
        return;
    };
    match result {
        Ok(stream) => manager.promote(ListenerKind::Connect, id, stream, peer),
        Err(e) => {
            if cancelled.load(Ordering::Acquire) {
                log::debug!("Cancelled dial to {} failed: {}", peer, e);
            } else {
                log::warn!("Connection to {} failed: {}", peer, e);
                manager.hub.publish(LinkEvent::ConnectFailed {
                    peer,
                    reason: e.to_string(),
                });
            }
            manager.clear_listener(ListenerKind::Connect, id);
        }
    }
}
