//! Transport session: one live duplex connection
//!
//! `Session::open` starts a named read-loop thread that publishes, in order:
//!
//! ```text
//! Connected ─► Message* ─► Disconnected
//! ```
//!
//! `Connected` and `Disconnected` are each published exactly once. Writes go
//! through a writer-only mutex and never wait on the read loop.

use super::events::{EventHub, LinkEvent};
use super::framing::LineFramer;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::protocol::decode;
use crate::transport::{Duplex, Peer};
use parking_lot::Mutex;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Session identity, unique within a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Closed,
}

struct SessionInner {
    id: SessionId,
    peer: Peer,
    stream: Box<dyn Duplex>,
    writer: Mutex<Box<dyn Write + Send>>,
    state: Mutex<SessionState>,
    closed: AtomicBool,
}

/// Handle to a session; clones share the same connection
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// Take ownership of `stream` and start the read loop
    pub fn open(
        id: SessionId,
        stream: Box<dyn Duplex>,
        peer: Peer,
        config: &SessionConfig,
        hub: Arc<EventHub>,
    ) -> Result<Session> {
        let endpoints = stream
            .reader()
            .and_then(|reader| Ok((reader, stream.writer()?)));
        let (reader, writer) = match endpoints {
            Ok(endpoints) => endpoints,
            Err(e) => {
                let _ = stream.shutdown();
                return Err(Error::Transport(format!(
                    "Stream endpoints unavailable for {}: {}",
                    peer, e
                )));
            }
        };

        let inner = Arc::new(SessionInner {
            id,
            peer,
            stream,
            writer: Mutex::new(writer),
            state: Mutex::new(SessionState::Connecting),
            closed: AtomicBool::new(false),
        });

        let read_loop = ReadLoop {
            inner: Arc::clone(&inner),
            reader,
            framer: LineFramer::new(config.frame_mode, config.max_line_length),
            buffer_size: config.read_buffer_size.max(1),
            hub,
        };

        if let Err(e) = thread::Builder::new()
            .name(format!("sandesh-session-{}", id.0))
            .spawn(move || read_loop.run())
        {
            inner.closed.store(true, Ordering::Release);
            *inner.state.lock() = SessionState::Closed;
            let _ = inner.stream.shutdown();
            return Err(Error::ThreadSpawn(e.to_string()));
        }

        Ok(Session { inner })
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn peer(&self) -> &Peer {
        &self.inner.peer
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// False once `close` was called or the read loop ended
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Write bytes. Failures are logged and returned; the session stays up
    /// until the read loop sees the stream end.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        let mut writer = self.inner.writer.lock();
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| {
                log::error!("Write to {} failed: {}", self.inner.peer, e);
                Error::Transport(e.to_string())
            })
    }

    /// Shut the stream down; the read loop then publishes `Disconnected`.
    /// Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Closing session {} with {}", self.inner.id, self.inner.peer);
        *self.inner.state.lock() = SessionState::Closed;
        if let Err(e) = self.inner.stream.shutdown() {
            log::debug!("Stream shutdown for {}: {}", self.inner.peer, e);
        }
    }
}

struct ReadLoop {
    inner: Arc<SessionInner>,
    reader: Box<dyn Read + Send>,
    framer: LineFramer,
    buffer_size: usize,
    hub: Arc<EventHub>,
}

impl ReadLoop {
    fn run(mut self) {
        let id = self.inner.id;
        {
            let mut state = self.inner.state.lock();
            if *state == SessionState::Connecting {
                *state = SessionState::Connected;
            }
        }
        log::info!("Session {} connected to {}", id, self.inner.peer);
        self.hub.publish(LinkEvent::Connected {
            session: id,
            peer: self.inner.peer.clone(),
        });

        let mut buffer = vec![0u8; self.buffer_size];
        let peer_closed = loop {
            if self.inner.closed.load(Ordering::Acquire) {
                break false;
            }
            match self.reader.read(&mut buffer) {
                Ok(0) => {
                    log::info!("Session {}: peer closed the stream", id);
                    break true;
                }
                Ok(n) => {
                    for line in self.framer.push(&buffer[..n]) {
                        self.publish_line(&line);
                    }
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    if !self.inner.closed.load(Ordering::Acquire) {
                        log::warn!("Session {} read error: {}", id, e);
                    }
                    break true;
                }
            }
        };

        if peer_closed && let Some(tail) = self.framer.finish() {
            self.publish_line(&tail);
        }

        self.inner.closed.store(true, Ordering::Release);
        *self.inner.state.lock() = SessionState::Closed;
        if let Err(e) = self.inner.stream.shutdown() {
            log::debug!("Stream shutdown after read loop: {}", e);
        }
        log::info!("Session {} disconnected from {}", id, self.inner.peer);
        self.hub.publish(LinkEvent::Disconnected {
            session: id,
            peer: self.inner.peer.clone(),
        });
    }

    fn publish_line(&self, line: &str) {
        log::debug!("Session {} << {}", self.inner.id, line);
        self.hub.publish(LinkEvent::Message {
            session: self.inner.id,
            message: decode(line),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use crate::transport::MockStream;
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn open_mock(config: &SessionConfig) -> (Session, MockStream, Receiver<LinkEvent>) {
        let hub = Arc::new(EventHub::new());
        let events = hub.subscribe();
        let (local, remote) = MockStream::pair();
        let session = Session::open(
            SessionId(7),
            Box::new(local),
            Peer::new("mock"),
            config,
            hub,
        )
        .unwrap();
        (session, remote, events)
    }

    #[test]
    fn test_connected_before_messages_then_disconnected() {
        let (session, remote, events) = open_mock(&SessionConfig::default());
        remote.inject(b"STATUS,running\nROBOT,3,4,E\n").unwrap();
        remote.close();

        let first = events.recv_timeout(WAIT).unwrap();
        assert!(matches!(first, LinkEvent::Connected { session: SessionId(7), .. }));

        match events.recv_timeout(WAIT).unwrap() {
            LinkEvent::Message { message, .. } => assert_eq!(
                message,
                Message::Status {
                    raw: "STATUS,running".to_string(),
                    status: "running".to_string()
                }
            ),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            events.recv_timeout(WAIT).unwrap(),
            LinkEvent::Message { message: Message::Position { x: 3, y: 4, .. }, .. }
        ));
        assert!(matches!(
            events.recv_timeout(WAIT).unwrap(),
            LinkEvent::Disconnected { .. }
        ));
        assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_open());
    }

    #[test]
    fn test_close_is_idempotent_single_disconnect() {
        let (session, remote, events) = open_mock(&SessionConfig::default());
        assert!(matches!(
            events.recv_timeout(WAIT).unwrap(),
            LinkEvent::Connected { .. }
        ));

        let other = session.clone();
        session.close();
        other.close();
        session.close();

        assert!(matches!(
            events.recv_timeout(WAIT).unwrap(),
            LinkEvent::Disconnected { .. }
        ));
        assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(remote.is_closed());
        assert!(matches!(session.send(b"f"), Err(Error::NotConnected)));
    }

    #[test]
    fn test_send_reaches_peer() {
        let (session, remote, _events) = open_mock(&SessionConfig::default());
        session.send(b"f").unwrap();
        session.send(b"tl").unwrap();
        assert_eq!(remote.received_exact(3, WAIT), b"ftl");
        session.close();
    }

    #[test]
    fn test_unterminated_tail_flushed_on_eof() {
        let (_session, remote, events) = open_mock(&SessionConfig::default());
        remote.inject(b"ROBOT,1").unwrap();
        remote.inject(b",2,N").unwrap();
        remote.close();

        let messages: Vec<Message> = events
            .iter()
            .take_while(|e| !matches!(e, LinkEvent::Disconnected { .. }))
            .filter_map(|e| match e {
                LinkEvent::Message { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], Message::Position { x: 1, y: 2, .. }));
    }
}
