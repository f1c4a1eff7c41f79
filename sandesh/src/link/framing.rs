//! Line framing for the session read loop
//!
//! | Mode       | Complete line | Chunk without `\n`     | EOF tail |
//! |------------|---------------|------------------------|----------|
//! | `Buffered` | decoded       | held until `\n`        | flushed  |
//! | `Chunk`    | decoded       | forwarded as one line  | n/a      |
//!
//! A trailing `\r` is stripped and empty lines are skipped in both modes.

use crate::config::FrameMode;

/// Splits a byte stream into text frames
#[derive(Debug)]
pub struct LineFramer {
    mode: FrameMode,
    buffer: Vec<u8>,
    max_line_length: usize,
}

impl LineFramer {
    pub fn new(mode: FrameMode, max_line_length: usize) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            max_line_length: max_line_length.max(1),
        }
    }

    /// Feed one read chunk, returning the frames it completes, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        match self.mode {
            FrameMode::Chunk => {
                for piece in chunk.split(|&b| b == b'\n') {
                    push_line(&mut lines, piece);
                }
            }
            FrameMode::Buffered => {
                self.buffer.extend_from_slice(chunk);
                let mut start = 0;
                while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
                    push_line(&mut lines, &self.buffer[start..start + offset]);
                    start += offset + 1;
                }
                self.buffer.drain(..start);

                if self.buffer.len() > self.max_line_length {
                    log::warn!(
                        "Frame exceeds {} bytes without newline, flushing",
                        self.max_line_length
                    );
                    push_line(&mut lines, &self.buffer);
                    self.buffer.clear();
                }
            }
        }
        lines
    }

    /// Unterminated tail left at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        push_line(&mut lines, &self.buffer);
        self.buffer.clear();
        lines.pop()
    }

    /// Bytes held waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return;
    }
    lines.push(String::from_utf8_lossy(raw).into_owned());
}
