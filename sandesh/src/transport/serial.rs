//! Serial device backend
//!
//! Dials a device node such as `/dev/rfcomm0` bound to the robot's serial
//! profile. A serial node cannot accept; bind the channel outside the process
//! (e.g. `rfcomm watch`) and dial the resulting node instead.

use super::{Acceptor, Adapter, Duplex, Peer, configured_peers};
use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Open serial device usable as a [`Duplex`]
pub struct SerialLink {
    port: Mutex<Box<dyn SerialPort>>,
    closed: Arc<AtomicBool>,
}

impl SerialLink {
    /// Open a serial port, 8N1 without flow control
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/rfcomm0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `read_timeout` - Bounds how long a blocked read holds off `shutdown`
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(Self {
            port: Mutex::new(port),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn endpoint(&self) -> std::io::Result<SerialEnd> {
        let port = self
            .port
            .lock()
            .try_clone()
            .map_err(std::io::Error::other)?;
        Ok(SerialEnd {
            port,
            closed: Arc::clone(&self.closed),
        })
    }
}

/// One cloned handle on the port
struct SerialEnd {
    port: Box<dyn SerialPort>,
    closed: Arc<AtomicBool>,
}

impl Read for SerialEnd {
    /// EOF once the link is shut down; read timeouts pass through as
    /// `TimedOut` so the caller can re-check its own state
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.port.read(buf)
    }
}

impl Write for SerialEnd {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Duplex for SerialLink {
    fn reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.endpoint()?))
    }

    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.endpoint()?))
    }

    fn shutdown(&self) -> std::io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Serial adapter
pub struct SerialAdapter {
    baud_rate: u32,
    read_timeout: Duration,
    peers: Vec<Peer>,
}

impl SerialAdapter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            baud_rate: config.serial.baud_rate,
            read_timeout: Duration::from_millis(config.serial.read_timeout_ms),
            peers: configured_peers(config),
        }
    }
}

impl Adapter for SerialAdapter {
    fn listen(&self) -> Result<Box<dyn Acceptor>> {
        Err(Error::NotSupported(
            "serial links cannot accept; bind the channel externally and dial the device node"
                .to_string(),
        ))
    }

    fn dial(&self, peer: &Peer) -> Result<Box<dyn Duplex>> {
        let link = SerialLink::open(&peer.address, self.baud_rate, self.read_timeout).map_err(
            |e| Error::Dial {
                peer: peer.address.clone(),
                reason: e.to_string(),
            },
        )?;
        Ok(Box::new(link))
    }

    fn bonded_peers(&self) -> Vec<Peer> {
        self.peers.clone()
    }

    /// Serial ports present on this machine, named after configured peers
    /// where the path matches
    fn scan(&self) -> Result<Vec<Peer>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|info| {
                self.peers
                    .iter()
                    .find(|p| p.address == info.port_name)
                    .cloned()
                    .unwrap_or_else(|| Peer::new(info.port_name))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_not_supported() {
        let adapter = SerialAdapter::from_config(&Config::default());
        assert!(matches!(adapter.listen(), Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_dial_missing_device() {
        let adapter = SerialAdapter::from_config(&Config::default());
        let result = adapter.dial(&Peer::new("/dev/sandesh-does-not-exist"));
        match result {
            Err(Error::Dial { peer, .. }) => assert_eq!(peer, "/dev/sandesh-does-not-exist"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("dial should fail"),
        }
    }
}
