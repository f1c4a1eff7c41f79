//! Mock transport for testing
//!
//! [`MockStream::pair`] gives two connected in-memory ends. [`MockAdapter`]
//! hands every `listen` and `dial` to the test as a pending handle, so the
//! test decides which side of a race completes and when.

use super::{Acceptor, Adapter, Duplex, Peer};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, SendError, Sender, select, unbounded};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One direction of a mock stream
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

#[derive(Default)]
struct PipeState {
    buffer: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState::default()),
            ready: Condvar::new(),
        })
    }

    fn read(&self, buf: &mut [u8], deadline: Option<Instant>) -> std::io::Result<usize> {
        let mut state = self.state.lock();
        while state.buffer.is_empty() && !state.closed {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return Err(std::io::ErrorKind::TimedOut.into());
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
        let n = state.buffer.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        state.buffer.extend(data);
        self.ready.notify_all();
        Ok(data.len())
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// One end of an in-memory duplex stream
#[derive(Clone)]
pub struct MockStream {
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
    endpoints_fail: bool,
}

struct PipeReader(Arc<Pipe>);

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf, None)
    }
}

struct PipeWriter(Arc<Pipe>);

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl MockStream {
    /// Two connected ends; bytes written to one are read from the other
    pub fn pair() -> (MockStream, MockStream) {
        let a_to_b = Pipe::new();
        let b_to_a = Pipe::new();
        (
            MockStream {
                incoming: Arc::clone(&b_to_a),
                outgoing: Arc::clone(&a_to_b),
                endpoints_fail: false,
            },
            MockStream {
                incoming: a_to_b,
                outgoing: b_to_a,
                endpoints_fail: false,
            },
        )
    }

    /// Make `reader`/`writer` fail, as a stream that died during setup
    pub fn with_failing_endpoints(mut self) -> Self {
        self.endpoints_fail = true;
        self
    }

    fn check_endpoints(&self) -> std::io::Result<()> {
        if self.endpoints_fail {
            return Err(std::io::Error::other("mock endpoints unavailable"));
        }
        Ok(())
    }

    /// Send bytes to the other end
    pub fn inject(&self, data: &[u8]) -> std::io::Result<()> {
        self.outgoing.write(data).map(|_| ())
    }

    /// Wait up to `timeout` for bytes from the other end, then drain what
    /// has arrived. Empty on timeout or EOF.
    pub fn received(&self, timeout: Duration) -> Vec<u8> {
        let mut buf = [0u8; 4096];
        match self.incoming.read(&mut buf, Some(Instant::now() + timeout)) {
            Ok(n) => buf[..n].to_vec(),
            Err(_) => Vec::new(),
        }
    }

    /// Read until `expected` bytes arrived or `timeout` elapsed
    pub fn received_exact(&self, expected: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        while out.len() < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let chunk = self.received(remaining);
            if chunk.is_empty() {
                break;
            }
            out.extend(chunk);
        }
        out
    }

    /// True once either end shut the stream down
    pub fn is_closed(&self) -> bool {
        self.incoming.is_closed() && self.outgoing.is_closed()
    }

    /// Close both directions from this end
    pub fn close(&self) {
        self.incoming.close();
        self.outgoing.close();
    }
}

impl Duplex for MockStream {
    fn reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        self.check_endpoints()?;
        Ok(Box::new(PipeReader(Arc::clone(&self.incoming))))
    }

    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        self.check_endpoints()?;
        Ok(Box::new(PipeWriter(Arc::clone(&self.outgoing))))
    }

    fn shutdown(&self) -> std::io::Result<()> {
        self.close();
        Ok(())
    }
}

/// Shared between an acceptor and its [`PendingAccept`]. Once closed, no
/// stream is left queued: late connects are refused and queued ones closed.
struct AcceptGate {
    closed: Mutex<bool>,
}

/// Acceptor fed by a [`PendingAccept`]
struct MockAcceptor {
    incoming: Receiver<(MockStream, Peer)>,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    gate: Arc<AcceptGate>,
}

impl Acceptor for MockAcceptor {
    fn accept(&self) -> Result<(Box<dyn Duplex>, Peer)> {
        select! {
            recv(self.incoming) -> msg => match msg {
                Ok((stream, peer)) => Ok((Box::new(stream), peer)),
                Err(_) => Err(Error::Cancelled),
            },
            recv(self.close_rx) -> _ => Err(Error::Cancelled),
        }
    }

    fn close(&self) {
        let mut closed = self.gate.closed.lock();
        *closed = true;
        // Dropping the sender disconnects close_rx and wakes accept
        self.close_tx.lock().take();
        for (stream, peer) in self.incoming.try_iter() {
            log::debug!("Refusing queued connection from {}", peer);
            stream.close();
        }
    }
}

/// A `listen` call waiting for the test to connect a peer
pub struct PendingAccept {
    incoming: Sender<(MockStream, Peer)>,
    gate: Arc<AcceptGate>,
}

impl PendingAccept {
    /// Connect `peer`; returns the remote end the test drives
    pub fn connect(&self, peer: Peer) -> MockStream {
        let (local, remote) = MockStream::pair();
        self.connect_stream(local, peer);
        remote
    }

    /// Hand a prepared local end to the acceptor. Refused (closed) once the
    /// acceptor is closed.
    pub fn connect_stream(&self, local: MockStream, peer: Peer) {
        let closed = self.gate.closed.lock();
        if *closed {
            local.close();
            return;
        }
        if let Err(SendError((local, _))) = self.incoming.send((local, peer)) {
            local.close();
        }
    }

    /// True once the acceptor was closed by its owner
    pub fn is_closed(&self) -> bool {
        *self.gate.closed.lock()
    }
}

type DialReply = Sender<std::result::Result<MockStream, String>>;

/// A `dial` call blocked until the test completes or refuses it
pub struct PendingDial {
    pub peer: Peer,
    reply: DialReply,
}

impl PendingDial {
    /// Let the dial succeed; returns the remote end the test drives
    pub fn complete(self) -> MockStream {
        let (local, remote) = MockStream::pair();
        if self.reply.send(Ok(local)).is_err() {
            remote.close();
        }
        remote
    }

    /// Fail the dial with `reason`
    pub fn refuse(self, reason: &str) {
        let _ = self.reply.send(Err(reason.to_string()));
    }
}

/// Adapter whose connections are driven by the test
pub struct MockAdapter {
    accepts_tx: Sender<PendingAccept>,
    accepts_rx: Receiver<PendingAccept>,
    dials_tx: Sender<PendingDial>,
    dials_rx: Receiver<PendingDial>,
    bonded: Vec<Peer>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        let (accepts_tx, accepts_rx) = unbounded();
        let (dials_tx, dials_rx) = unbounded();
        Self {
            accepts_tx,
            accepts_rx,
            dials_tx,
            dials_rx,
            bonded: Vec::new(),
        }
    }

    pub fn with_bonded(mut self, peers: Vec<Peer>) -> Self {
        self.bonded = peers;
        self
    }

    /// Next `listen` call, in call order
    pub fn next_accept(&self, timeout: Duration) -> Option<PendingAccept> {
        self.accepts_rx.recv_timeout(timeout).ok()
    }

    /// Next `dial` call, in call order
    pub fn next_dial(&self, timeout: Duration) -> Option<PendingDial> {
        self.dials_rx.recv_timeout(timeout).ok()
    }
}

impl Adapter for MockAdapter {
    fn listen(&self) -> Result<Box<dyn Acceptor>> {
        let (incoming_tx, incoming_rx) = unbounded();
        let (close_tx, close_rx) = unbounded();
        let gate = Arc::new(AcceptGate {
            closed: Mutex::new(false),
        });
        self.accepts_tx
            .send(PendingAccept {
                incoming: incoming_tx,
                gate: Arc::clone(&gate),
            })
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Box::new(MockAcceptor {
            incoming: incoming_rx,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            gate,
        }))
    }

    fn dial(&self, peer: &Peer) -> Result<Box<dyn Duplex>> {
        let (reply, outcome) = unbounded();
        self.dials_tx
            .send(PendingDial {
                peer: peer.clone(),
                reply,
            })
            .map_err(|e| Error::Transport(e.to_string()))?;
        let dial_error = |reason: String| Error::Dial {
            peer: peer.address.clone(),
            reason,
        };
        match outcome.recv() {
            Ok(Ok(stream)) => Ok(Box::new(stream)),
            Ok(Err(reason)) => Err(dial_error(reason)),
            Err(_) => Err(dial_error("dial abandoned".to_string())),
        }
    }

    fn bonded_peers(&self) -> Vec<Peer> {
        self.bonded.clone()
    }

    fn scan(&self) -> Result<Vec<Peer>> {
        Ok(self.bonded.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn test_pair_roundtrip() {
        let (local, remote) = MockStream::pair();
        remote.inject(b"ROBOT,1,2,N\n").unwrap();

        let mut buf = [0u8; 32];
        let n = local.reader().unwrap().read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ROBOT,1,2,N\n");

        local.writer().unwrap().write_all(b"f").unwrap();
        assert_eq!(remote.received(WAIT), b"f");
    }

    #[test]
    fn test_shutdown_gives_eof_both_ways() {
        let (local, remote) = MockStream::pair();
        let mut reader = remote.reader().unwrap();
        local.shutdown().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(remote.is_closed());
        assert!(remote.inject(b"x").is_err());
    }

    #[test]
    fn test_acceptor_close_cancels() {
        let adapter = MockAdapter::new();
        let acceptor: Arc<dyn Acceptor> = Arc::from(adapter.listen().unwrap());
        let pending = adapter.next_accept(WAIT).unwrap();

        let waiting = Arc::clone(&acceptor);
        let handle = thread::spawn(move || waiting.accept().map(|(_, peer)| peer));
        acceptor.close();

        assert!(matches!(handle.join().unwrap(), Err(Error::Cancelled)));
        assert!(pending.is_closed());
    }

    #[test]
    fn test_closed_acceptor_refuses_connections() {
        let adapter = MockAdapter::new();
        let acceptor = adapter.listen().unwrap();
        let pending = adapter.next_accept(WAIT).unwrap();

        let queued = pending.connect(Peer::new("early"));
        acceptor.close();
        let late = pending.connect(Peer::new("late"));

        assert!(queued.is_closed());
        assert!(late.is_closed());
        assert!(matches!(acceptor.accept(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_dial_outcomes() {
        let adapter = Arc::new(MockAdapter::new());

        let dialer = Arc::clone(&adapter);
        let handle = thread::spawn(move || dialer.dial(&Peer::new("robot")).is_ok());
        adapter.next_dial(WAIT).unwrap().complete();
        assert!(handle.join().unwrap());

        let dialer = Arc::clone(&adapter);
        let handle = thread::spawn(move || dialer.dial(&Peer::new("robot")));
        adapter.next_dial(WAIT).unwrap().refuse("host down");
        match handle.join().unwrap() {
            Err(Error::Dial { reason, .. }) => assert_eq!(reason, "host down"),
            _ => panic!("expected dial error"),
        }
    }
}
