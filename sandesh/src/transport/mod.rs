//! Transport layer for link I/O abstraction
//!
//! A backend provides three things:
//!
//! - [`Duplex`]: an established byte stream that can hand out independent
//!   read and write endpoints and be shut down from any thread
//! - [`Acceptor`]: a passive listener whose blocking `accept` returns when a
//!   peer connects or when `close` is called from another thread
//! - [`Adapter`]: the radio stand-in that opens acceptors, dials peers and
//!   reports known/discoverable peers
//!
//! Closing the underlying resource is the only way to stop a blocked call.

use crate::config::{Config, TransportKind};
use crate::error::Result;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

pub mod mock;
mod serial;
mod tcp;

pub use mock::{MockAdapter, MockStream};
pub use serial::SerialAdapter;
pub use tcp::TcpAdapter;

/// Remote device identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Socket address or device path
    pub address: String,
    /// Human-readable name, if known
    pub name: Option<String>,
    /// Known ahead of time (configured / paired)
    pub bonded: bool,
}

impl Peer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            bonded: false,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
            bonded: false,
        }
    }

    pub fn bonded(mut self) -> Self {
        self.bonded = true;
        self
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Established bidirectional byte stream
pub trait Duplex: Send + Sync {
    /// Independent read endpoint, used by the session read loop
    fn reader(&self) -> std::io::Result<Box<dyn Read + Send>>;

    /// Independent write endpoint
    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>>;

    /// Close both directions; a blocked read on any endpoint returns
    fn shutdown(&self) -> std::io::Result<()>;
}

/// Passive listener for one incoming connection
pub trait Acceptor: Send + Sync {
    /// Block until a peer connects. Returns `Error::Cancelled` after `close`.
    fn accept(&self) -> Result<(Box<dyn Duplex>, Peer)>;

    /// Release the listening resource and unblock `accept`. Idempotent.
    fn close(&self);
}

/// Link backend
pub trait Adapter: Send + Sync {
    /// Open a passive listener
    fn listen(&self) -> Result<Box<dyn Acceptor>>;

    /// Actively connect; blocks until connected or failed
    fn dial(&self, peer: &Peer) -> Result<Box<dyn Duplex>>;

    /// Peers known without discovery
    fn bonded_peers(&self) -> Vec<Peer>;

    /// Discover reachable peers
    fn scan(&self) -> Result<Vec<Peer>>;
}

/// Configured peers as bonded [`Peer`]s
pub(crate) fn configured_peers(config: &Config) -> Vec<Peer> {
    config
        .link
        .peers
        .iter()
        .map(|p| Peer {
            address: p.address.clone(),
            name: p.name.clone(),
            bonded: true,
        })
        .collect()
}

/// Create the adapter selected by `[link].transport`
pub fn create_adapter(config: &Config) -> Result<Arc<dyn Adapter>> {
    match config.link.transport {
        TransportKind::Tcp => Ok(Arc::new(TcpAdapter::from_config(config))),
        TransportKind::Serial => Ok(Arc::new(SerialAdapter::from_config(config))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;

    #[test]
    fn test_configured_peers_are_bonded() {
        let mut config = Config::default();
        config.link.peers.push(PeerConfig {
            name: Some("robot".to_string()),
            address: "10.0.0.2:5560".to_string(),
        });
        let peers = configured_peers(&config);
        assert_eq!(peers.len(), 1);
        assert!(peers[0].bonded);
        assert_eq!(peers[0].to_string(), "robot (10.0.0.2:5560)");
    }

    #[test]
    fn test_create_adapter_uses_config_peers() {
        let mut config = Config::default();
        config.link.transport = TransportKind::Serial;
        config.link.peers.push(PeerConfig {
            name: None,
            address: "/dev/rfcomm0".to_string(),
        });
        let adapter = create_adapter(&config).unwrap();
        assert_eq!(adapter.bonded_peers()[0].address, "/dev/rfcomm0");
    }
}
