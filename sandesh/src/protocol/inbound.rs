//! Robot → controller messages.
//!
//! Each frame is either free text or a delimited record:
//!
//! ```text
//! COMMAND,field1[,field2[,field3]]     (comma-separated)
//! COMMAND;field1[;field2[;field3]]     (semicolon, used when no comma present)
//! ```
//!
//! | Command              | Result                                      |
//! |----------------------|---------------------------------------------|
//! | `INFO`               | `PlainText("[info] " + field1)`             |
//! | `ERROR`              | `PlainText("[error] " + field1)`            |
//! | `MODE`               | `PlainText("[mode] " + field1)`             |
//! | `STATUS`             | `Status`                                    |
//! | `ROBOT` / `LOCATION` | `Position` (needs x, y, heading)            |
//! | `TARGET`/`IMAGE-REC` | `TargetFound` (obstacle id, target id[, heading]) |
//! | anything else        | `PlainText(line)`                           |
//!
//! Decoding never fails. Malformed records fall back to `PlainText` or to zeroed
//! numeric fields, and the anomaly is logged.

use super::facing::Facing;

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Free text, or an informational record rendered as text
    PlainText { raw: String },

    /// Robot status report (e.g. "running", "finished")
    Status { raw: String, status: String },

    /// Robot pose report in grid cells
    Position {
        raw: String,
        x: i32,
        y: i32,
        heading: Facing,
    },

    /// Image recognition result for an obstacle
    TargetFound {
        raw: String,
        obstacle_id: i32,
        target_id: i32,
        /// Obstacle face the target was seen on, when reported
        heading: Option<Facing>,
    },
}

impl Message {
    /// The text this message was decoded from (or rendered to, for tagged text)
    pub fn raw(&self) -> &str {
        match self {
            Message::PlainText { raw }
            | Message::Status { raw, .. }
            | Message::Position { raw, .. }
            | Message::TargetFound { raw, .. } => raw,
        }
    }

    fn plain(raw: impl Into<String>) -> Self {
        Message::PlainText { raw: raw.into() }
    }
}

/// Split a frame into fields. Trailing empty fields are dropped, so `STATUS,`
/// is a single field.
fn split_fields(line: &str) -> Vec<&str> {
    let delimiter = if line.contains(',') { ',' } else { ';' };
    let mut fields: Vec<&str> = line.split(delimiter).collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Parse an integer field, or 0 when malformed
fn int_field_or_zero(field: &str) -> i32 {
    match field.trim().parse::<i32>() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("Error parsing integer field '{}'", field);
            0
        }
    }
}

fn decode_position(line: &str, fields: &[&str]) -> Message {
    if fields.len() < 4 {
        log::debug!("Position record too short: {}", line);
        return Message::plain(line);
    }
    let (Ok(x), Ok(y)) = (
        fields[1].trim().parse::<i32>(),
        fields[2].trim().parse::<i32>(),
    ) else {
        log::warn!("Malformed position record: {}", line);
        return Message::plain(line);
    };
    Message::Position {
        raw: line.to_string(),
        x,
        y,
        heading: Facing::parse_field(fields[3]),
    }
}

/// A record without both ids zeroes both, even if one was present
fn decode_target(line: &str, fields: &[&str]) -> Message {
    let (obstacle_id, target_id) = if fields.len() < 3 {
        log::warn!(
            "Expected 2 ids but record has {} fields: {}",
            fields.len().saturating_sub(1),
            line
        );
        (0, 0)
    } else {
        (int_field_or_zero(fields[1]), int_field_or_zero(fields[2]))
    };
    Message::TargetFound {
        raw: line.to_string(),
        obstacle_id,
        target_id,
        heading: fields.get(3).map(|f| Facing::parse_field(f)),
    }
}

/// Decode one frame. Pure; safe to call from any thread.
pub fn decode(line: &str) -> Message {
    let fields = split_fields(line);
    if fields.len() < 2 {
        return Message::plain(line);
    }

    let command = fields[0].trim().to_ascii_uppercase();
    match command.as_str() {
        "INFO" => Message::plain(format!("[info] {}", fields[1])),
        "ERROR" => Message::plain(format!("[error] {}", fields[1])),
        "MODE" => Message::plain(format!("[mode] {}", fields[1])),
        "STATUS" => Message::Status {
            raw: line.to_string(),
            status: fields[1].to_string(),
        },
        "ROBOT" | "LOCATION" => decode_position(line, &fields),
        "TARGET" | "IMAGE-REC" => decode_target(line, &fields),
        _ => Message::plain(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(
            decode("STATUS,finished"),
            Message::Status {
                raw: "STATUS,finished".to_string(),
                status: "finished".to_string(),
            }
        );
    }

    #[test]
    fn test_status_passed_through_untrimmed() {
        match decode("STATUS, running ") {
            Message::Status { status, .. } => assert_eq!(status, " running "),
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_tagged_text() {
        assert_eq!(decode("INFO,ready").raw(), "[info] ready");
        assert_eq!(decode("error;motor stalled").raw(), "[error] motor stalled");
        assert_eq!(decode(" mode ,path").raw(), "[mode] path");
    }

    #[test]
    fn test_position_numeric_and_letters() {
        let numeric = decode("ROBOT,4,7,2");
        let letter = decode("robot,4,7,e");
        let word = decode("LOCATION;4;7;East");
        for msg in [&numeric, &letter, &word] {
            match msg {
                Message::Position { x, y, heading, .. } => {
                    assert_eq!((*x, *y, *heading), (4, 7, Facing::East));
                }
                other => panic!("expected position, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_position_malformed_falls_back() {
        assert_eq!(decode("ROBOT,1,2"), Message::plain("ROBOT,1,2"));
        assert_eq!(decode("ROBOT,a,2,N"), Message::plain("ROBOT,a,2,N"));
    }

    #[test]
    fn test_target_without_heading() {
        assert_eq!(
            decode("TARGET,3,12"),
            Message::TargetFound {
                raw: "TARGET,3,12".to_string(),
                obstacle_id: 3,
                target_id: 12,
                heading: None,
            }
        );
    }

    #[test]
    fn test_target_with_heading_and_bad_ints() {
        match decode("IMAGE-REC,x,12,S") {
            Message::TargetFound {
                obstacle_id,
                target_id,
                heading,
                ..
            } => {
                assert_eq!(obstacle_id, 0);
                assert_eq!(target_id, 12);
                assert_eq!(heading, Some(Facing::South));
            }
            other => panic!("expected target, got {:?}", other),
        }
        // Short record zeroes both ids
        match decode("TARGET,5") {
            Message::TargetFound {
                obstacle_id,
                target_id,
                ..
            } => assert_eq!((obstacle_id, target_id), (0, 0)),
            other => panic!("expected target, got {:?}", other),
        }
    }

    #[test]
    fn test_short_frames_are_plain() {
        for line in ["", "hello", "STATUS,", ",", ";;;", "INFO"] {
            assert_eq!(decode(line), Message::plain(line), "line {:?}", line);
        }
    }

    #[test]
    fn test_unknown_command_passthrough() {
        assert_eq!(decode("BATTERY,80"), Message::plain("BATTERY,80"));
    }

    #[test]
    fn test_never_panics_on_noise() {
        let mut seed: u32 = 0x1234_5678;
        for len in 0..200 {
            let bytes: Vec<u8> = (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                    (seed >> 16) as u8
                })
                .collect();
            let line = String::from_utf8_lossy(&bytes);
            let _ = decode(&line);
        }
        let many = vec!["ROBOT"; 10_000].join(",");
        let _ = decode(&many);
    }
}
