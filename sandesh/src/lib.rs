//! Sandesh - control-side link library for a grid robot
//!
//! Pairs with a remote robot over a serial-profile link, decodes its
//! newline-delimited reports into typed [`Message`]s and encodes operator
//! [`Command`]s back onto the wire.
//!
//! ## Modules
//!
//! - [`link`]: session manager racing accept and connect, one active session
//! - [`transport`]: TCP, serial and in-memory backends
//! - [`protocol`]: line decoder and command encoder
//! - [`arena`]: obstacle grid and robot pose

pub mod arena;
pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use arena::{Arena, Grid, Obstacle, Robot, Target};
pub use config::Config;
pub use error::{Error, Result};
pub use link::{LinkEvent, Session, SessionId, SessionManager};
pub use protocol::{Command, Facing, Message, MoveCommand, ObstacleEdit, decode};
pub use transport::Peer;
