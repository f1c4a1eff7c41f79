//! Error types for Sandesh

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Sandesh error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Stream endpoint, read or write failure on an established link
    #[error("Transport error: {0}")]
    Transport(String),

    /// Outbound connection attempt failed
    #[error("Failed to connect to {peer}: {reason}")]
    Dial {
        /// Address of the peer that was dialed
        peer: String,
        /// Underlying failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No active session to send through
    #[error("Not connected")]
    NotConnected,

    /// Listener was cancelled before it produced a connection
    #[error("Listener cancelled")]
    Cancelled,

    /// Operation not supported by this transport
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Configuration parse failure
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration write failure
    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Background thread could not be started
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
