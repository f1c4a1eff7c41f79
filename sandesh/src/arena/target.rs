//! Image-recognition target labels

/// Label table indexed by target id. Ids 0-9 are unused.
const TARGET_LABELS: [&str; 41] = [
    "", "", "", "", "", "", "", "", "", "", // 0-9
    "bs", // 10: bullseye
    "1", "2", "3", "4", "5", "6", "7", "8", "9", // 11-19
    "A", "B", "C", "D", "E", "F", "G", "H", "S", "T", "U", "V", "W", "X", "Y", "Z", // 20-35
    "up", "dwn", "rgt", "lft", // 36-39: arrows
    "stp", // 40: stop
];

/// Recognized target on an obstacle face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    id: i32,
    label: &'static str,
}

impl Target {
    /// Look up a target id. Unknown ids resolve to the empty placeholder label.
    pub fn of(target_id: i32) -> Self {
        let label = usize::try_from(target_id)
            .ok()
            .and_then(|i| TARGET_LABELS.get(i))
            .copied()
            .unwrap_or_else(|| {
                log::debug!("Target id {} outside label table", target_id);
                ""
            });
        Self {
            id: target_id,
            label,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Short label ("2", "bs", "up", ...); empty for the placeholder
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// True when the id had no label
    pub fn is_placeholder(&self) -> bool {
        self.label.is_empty()
    }
}
