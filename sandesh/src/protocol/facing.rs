//! Heading codes shared by the inbound and outbound protocol.
//!
//! # Canonical wire table
//!
//! | Facing | Code |
//! |--------|------|
//! | SKIP   | 0    |
//! | NORTH  | 1    |
//! | EAST   | 2    |
//! | SOUTH  | 3    |
//! | WEST   | 4    |
//!
//! This is the only numeric table on the wire. Older robot firmware used
//! `0/2/4/6/8`; those codes are not accepted as aliases, and a code outside
//! the table decodes to NORTH.

use std::fmt;

/// Cardinal heading plus the "keep previous value" sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    #[default]
    North,
    East,
    South,
    West,
    /// Leave the current heading unchanged
    Skip,
}

impl Facing {
    /// Wire code from the canonical table
    pub fn code(self) -> i32 {
        match self {
            Facing::Skip => 0,
            Facing::North => 1,
            Facing::East => 2,
            Facing::South => 3,
            Facing::West => 4,
        }
    }

    /// Facing for a wire code; codes outside the table map to NORTH
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Facing::Skip,
            1 => Facing::North,
            2 => Facing::East,
            3 => Facing::South,
            4 => Facing::West,
            other => {
                log::debug!("Unknown heading code {}, using NORTH", other);
                Facing::North
            }
        }
    }

    /// Parse a heading field: a numeric code, or `N/E/S/W` / `NORTH/...` in
    /// any case. Anything else is NORTH.
    pub fn parse_field(field: &str) -> Self {
        let field = field.trim();
        if let Ok(code) = field.parse::<i32>() {
            return Self::from_code(code);
        }
        match field.to_ascii_uppercase().as_str() {
            "N" | "NORTH" => Facing::North,
            "E" | "EAST" => Facing::East,
            "S" | "SOUTH" => Facing::South,
            "W" | "WEST" => Facing::West,
            _ => {
                log::debug!("Unrecognized heading '{}', using NORTH", field);
                Facing::North
            }
        }
    }

    /// Next heading clockwise; SKIP stays SKIP
    pub fn clockwise(self) -> Self {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
            Facing::Skip => Facing::Skip,
        }
    }

    /// Next heading counter-clockwise; SKIP stays SKIP
    pub fn counter_clockwise(self) -> Self {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
            Facing::Skip => Facing::Skip,
        }
    }

    /// Unit cell step `(dx, dy)` for this heading; north is +y
    pub fn step(self) -> (i32, i32) {
        match self {
            Facing::North => (0, 1),
            Facing::East => (1, 0),
            Facing::South => (0, -1),
            Facing::West => (-1, 0),
            Facing::Skip => (0, 0),
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facing::North => "NORTH",
            Facing::East => "EAST",
            Facing::South => "SOUTH",
            Facing::West => "WEST",
            Facing::Skip => "SKIP",
        };
        f.write_str(name)
    }
}
