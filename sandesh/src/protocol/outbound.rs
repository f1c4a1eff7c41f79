//! Controller → robot commands.
//!
//! Three wire formats share the link:
//!
//! ```text
//! f | r | tl | tr | fl | fr                      manual drive token
//! {"cat":"<category>","value":<string|object>}    structured command
//! OBSTACLE,<id>,<x>,<y>,<code> | OBSTACLE,<id>,REMOVE   live obstacle edit
//! ```
//!
//! Headings use the canonical table in [`super::facing`].

use super::facing::Facing;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Manual drive step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveCommand {
    /// One cell ahead
    Forward,
    /// One cell back
    Backward,
    /// Spot turn left
    RotateLeft,
    /// Spot turn right
    RotateRight,
    /// Forward arc turn left
    TurnLeft,
    /// Forward arc turn right
    TurnRight,
}

impl MoveCommand {
    /// Wire token
    pub fn token(self) -> &'static str {
        match self {
            Self::Forward => "f",
            Self::Backward => "r",
            Self::RotateLeft => "tl",
            Self::RotateRight => "tr",
            Self::TurnLeft => "fl",
            Self::TurnRight => "fr",
        }
    }

    /// Inverse of [`MoveCommand::token`]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "f" => Some(Self::Forward),
            "r" => Some(Self::Backward),
            "tl" => Some(Self::RotateLeft),
            "tr" => Some(Self::RotateRight),
            "fl" => Some(Self::TurnLeft),
            "fr" => Some(Self::TurnRight),
            _ => None,
        }
    }
}

/// One obstacle in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotObstacle {
    pub x: i32,
    pub y: i32,
    pub id: u32,
    /// Heading code
    pub d: i32,
}

/// Full arena state sent before a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    pub robot_x: i32,
    pub robot_y: i32,
    /// Heading code
    pub robot_dir: i32,
    pub mode: String,
    pub obstacles: Vec<SnapshotObstacle>,
}

impl ObstacleSnapshot {
    /// Build a snapshot; robot position is truncated to its cell
    pub fn new(robot_pos: (f64, f64), robot_heading: Facing) -> Self {
        Self {
            robot_x: robot_pos.0 as i32,
            robot_y: robot_pos.1 as i32,
            robot_dir: robot_heading.code(),
            mode: "0".to_string(),
            obstacles: Vec::new(),
        }
    }

    /// Append an obstacle entry
    pub fn push(&mut self, id: u32, x: i32, y: i32, facing: Facing) {
        self.obstacles.push(SnapshotObstacle {
            x,
            y,
            id,
            d: facing.code(),
        });
    }
}

/// Live obstacle edit made while placing obstacles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleEdit {
    /// Added, moved or rotated
    Upsert {
        id: u32,
        x: i32,
        y: i32,
        facing: Facing,
    },
    /// Deleted
    Remove { id: u32 },
}

/// `{"cat": ..., "value": ...}` wrapper used by structured commands
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    cat: String,
    value: T,
}

impl<T> Envelope<T> {
    fn new(cat: &str, value: T) -> Self {
        Self {
            cat: cat.to_string(),
            value,
        }
    }
}

/// Outbound command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Manual drive, raw token
    Move(MoveCommand),
    /// Manual drive wrapped as `{"cat":"manual"}` for JSON-only firmware
    Manual(MoveCommand),
    /// Begin the run
    Start,
    /// Robot start pose and all obstacles
    ObstacleSnapshot(ObstacleSnapshot),
    /// Incremental obstacle change
    ObstacleEdit(ObstacleEdit),
    /// Operator chat text, sent verbatim
    Chat(String),
}

impl Command {
    /// Encode to the wire string (no line terminator)
    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            Command::Move(m) => m.token().to_string(),
            Command::Manual(m) => serde_json::to_string(&Envelope::new("manual", m.token()))?,
            Command::Start => serde_json::to_string(&Envelope::new("control", "start"))?,
            Command::ObstacleSnapshot(snapshot) => {
                serde_json::to_string(&Envelope::new("obstacles", snapshot))?
            }
            Command::ObstacleEdit(ObstacleEdit::Upsert { id, x, y, facing }) => {
                format!("OBSTACLE,{},{},{},{}", id, x, y, facing.code())
            }
            Command::ObstacleEdit(ObstacleEdit::Remove { id }) => {
                format!("OBSTACLE,{},REMOVE", id)
            }
            Command::Chat(text) => text.clone(),
        };
        Ok(encoded)
    }

    /// Encode and append `terminator`, ready to write to a session
    pub fn frame(&self, terminator: &str) -> Result<Vec<u8>> {
        let mut bytes = self.encode()?.into_bytes();
        bytes.extend_from_slice(terminator.as_bytes());
        Ok(bytes)
    }
}

/// Parse an encoded `obstacles` command back into its snapshot
pub fn decode_snapshot(json: &str) -> Result<ObstacleSnapshot> {
    let envelope: Envelope<ObstacleSnapshot> = serde_json::from_str(json)?;
    if envelope.cat != "obstacles" {
        return Err(crate::error::Error::Serialization(format!(
            "Expected category 'obstacles', got '{}'",
            envelope.cat
        )));
    }
    Ok(envelope.value)
}
