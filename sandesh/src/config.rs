//! Configuration for Sandesh
//!
//! Loads link, session and arena settings from a TOML file. Every section has
//! defaults, so a partial file only needs to name what it changes.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub serial: SerialConfig,
    pub session: SessionConfig,
    pub arena: ArenaConfig,
    pub logging: LoggingConfig,
}

/// Which backend carries the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// TCP socket (RFCOMM bridged to TCP, or a simulator)
    #[default]
    Tcp,
    /// Serial device node (e.g. `/dev/rfcomm0`)
    Serial,
}

/// A peer listed in config, reported as bonded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeerConfig {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Socket address (`host:port`) or device path
    pub address: String,
}

/// Link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Backend used for accept and dial
    pub transport: TransportKind,

    /// Bind address for incoming connections (TCP only)
    ///
    /// Examples:
    /// - `0.0.0.0:5560` - All interfaces
    /// - `127.0.0.1:5560` - Localhost only
    pub listen_address: String,

    /// Scan probe timeout in milliseconds
    pub scan_timeout_ms: u64,

    /// Known peers, returned by `bonded_peers()`
    pub peers: Vec<PeerConfig>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            listen_address: "0.0.0.0:5560".to_string(),
            scan_timeout_ms: 300,
            peers: Vec::new(),
        }
    }
}

/// Serial backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate for the device node
    pub baud_rate: u32,
    /// Read timeout; bounds how long `close()` takes to stop the read loop
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout_ms: 100,
        }
    }
}

/// How the read loop turns byte chunks into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    /// Decode only complete newline-terminated lines
    #[default]
    Buffered,
    /// Forward each read chunk immediately; chunks without a newline are
    /// forwarded whole (legacy robot-firmware behaviour)
    Chunk,
}

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub frame_mode: FrameMode,
    /// Bytes per read call
    pub read_buffer_size: usize,
    /// Unterminated frames longer than this are flushed as-is
    pub max_line_length: usize,
    /// Terminator appended by `Command::frame`
    pub line_terminator: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_mode: FrameMode::Buffered,
            read_buffer_size: 1024,
            max_line_length: 4096,
            line_terminator: "\n".to_string(),
        }
    }
}

/// What robot motion does when it would leave the grid interior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Drop the motion, pose unchanged
    #[default]
    Reject,
    /// Apply the motion regardless
    Unchecked,
}

/// Arena configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Cells per side
    pub grid_size: i32,
    pub bounds: BoundsPolicy,
    /// Lateral offset (cells) of an arc turn
    pub turning_radius: f64,
    /// Robot start cell
    pub robot_start: (i32, i32),
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            bounds: BoundsPolicy::Reject,
            turning_radius: 4.5,
            robot_start: (1, 1),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use sandesh::config::Config;
    ///
    /// let config = Config::from_file("sandesh.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.link.transport, TransportKind::Tcp);
        assert_eq!(config.link.listen_address, "0.0.0.0:5560");
        assert_eq!(config.session.frame_mode, FrameMode::Buffered);
        assert_eq!(config.session.read_buffer_size, 1024);
        assert_eq!(config.arena.grid_size, 20);
        assert_eq!(config.arena.bounds, BoundsPolicy::Reject);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_serialization() {
        let toml_string = toml::to_string_pretty(&Config::default()).unwrap();

        assert!(toml_string.contains("[link]"));
        assert!(toml_string.contains("[session]"));
        assert!(toml_string.contains("[arena]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("frame_mode = \"buffered\""));
        assert!(toml_string.contains("bounds = \"reject\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[link]
transport = "serial"
listen_address = "127.0.0.1:6000"

[[link.peers]]
name = "robot"
address = "/dev/rfcomm0"

[session]
frame_mode = "chunk"

[arena]
bounds = "unchecked"

[logging]
level = "debug"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.link.transport, TransportKind::Serial);
        assert_eq!(config.link.peers.len(), 1);
        assert_eq!(config.link.peers[0].name.as_deref(), Some("robot"));
        assert_eq!(config.session.frame_mode, FrameMode::Chunk);
        // Unspecified keys keep their defaults
        assert_eq!(config.session.read_buffer_size, 1024);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.arena.bounds, BoundsPolicy::Unchecked);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_transport_rejected() {
        let result = Config::from_toml("[link]\ntransport = \"carrier-pigeon\"\n");
        assert!(result.is_err());
    }
}
