//! TCP backend
//!
//! The robot's RFCOMM serial profile is usually bridged to a TCP socket (or
//! simulated by one), so accept binds `[link].listen_address` and dial
//! connects to the peer's `host:port`.

use super::{Acceptor, Adapter, Duplex, Peer, configured_peers};
use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Poll interval of the nonblocking accept loop
const ACCEPT_POLL: Duration = Duration::from_millis(10);

impl Duplex for TcpStream {
    fn reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self) -> std::io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Nonblocking listener polled until a peer arrives or `close` drops it
pub struct TcpAcceptor {
    listener: Mutex<Option<TcpListener>>,
    closed: AtomicBool,
}

impl TcpAcceptor {
    pub fn bind(address: &str) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|e| {
            Error::Transport(format!("Failed to bind to {}: {}", address, e))
        })?;
        listener.set_nonblocking(true)?;
        log::info!("Listening for incoming link on {}", address);
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            closed: AtomicBool::new(false),
        })
    }

    /// Bound address, e.g. after binding port 0
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener
            .lock()
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }
}

impl Acceptor for TcpAcceptor {
    fn accept(&self) -> Result<(Box<dyn Duplex>, Peer)> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            let result = match self.listener.lock().as_ref() {
                Some(listener) => listener.accept(),
                None => return Err(Error::Cancelled),
            };
            match result {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;
                    if let Err(e) = stream.set_nodelay(true) {
                        log::warn!("Failed to set TCP_NODELAY: {}", e);
                    }
                    log::info!("Accepted link from {}", addr);
                    return Ok((Box::new(stream), Peer::new(addr.to_string())));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Dropping the listener releases the port right away
            self.listener.lock().take();
            log::debug!("TCP acceptor closed");
        }
    }
}

/// TCP adapter
pub struct TcpAdapter {
    listen_address: String,
    peers: Vec<Peer>,
    scan_timeout: Duration,
}

impl TcpAdapter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            listen_address: config.link.listen_address.clone(),
            peers: configured_peers(config),
            scan_timeout: Duration::from_millis(config.link.scan_timeout_ms),
        }
    }

    /// Probe a peer with a bounded connect
    fn reachable(&self, peer: &Peer) -> bool {
        let Ok(mut addrs) = peer.address.to_socket_addrs() else {
            log::debug!("Cannot resolve {}", peer.address);
            return false;
        };
        addrs.any(|addr| {
            TcpStream::connect_timeout(&addr, self.scan_timeout)
                .map(|s| {
                    let _ = s.shutdown(Shutdown::Both);
                })
                .is_ok()
        })
    }
}

impl Adapter for TcpAdapter {
    fn listen(&self) -> Result<Box<dyn Acceptor>> {
        Ok(Box::new(TcpAcceptor::bind(&self.listen_address)?))
    }

    fn dial(&self, peer: &Peer) -> Result<Box<dyn Duplex>> {
        log::info!("Connecting to {}", peer);
        let stream = TcpStream::connect(peer.address.as_str()).map_err(|e| Error::Dial {
            peer: peer.address.clone(),
            reason: e.to_string(),
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(Box::new(stream))
    }

    fn bonded_peers(&self) -> Vec<Peer> {
        self.peers.clone()
    }

    /// TCP has no discovery; configured peers that answer a connect probe
    /// are reported
    fn scan(&self) -> Result<Vec<Peer>> {
        let found: Vec<Peer> = self
            .peers
            .iter()
            .filter(|p| self.reachable(p))
            .cloned()
            .collect();
        log::info!("Scan found {} of {} peers", found.len(), self.peers.len());
        Ok(found)
    }
}
