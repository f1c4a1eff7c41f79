//! Line protocol between controller and robot
//!
//! - [`inbound`]: frame → [`Message`] decoding
//! - [`outbound`]: [`Command`] → wire string encoding
//! - [`facing`]: the canonical heading code table both directions use

pub mod facing;
pub mod inbound;
pub mod outbound;

pub use facing::Facing;
pub use inbound::{Message, decode};
pub use outbound::{
    Command, MoveCommand, ObstacleEdit, ObstacleSnapshot, SnapshotObstacle, decode_snapshot,
};
