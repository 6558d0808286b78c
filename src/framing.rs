//! Turns the raw byte stream from the port into discrete lines.

/// Buffers input and yields a line whenever `\n` is seen.
///
/// Lines are returned trimmed of the terminator and surrounding whitespace, so a
/// `\r\n` ending behaves the same as `\n`. Blank lines are dropped. Bytes after the
/// last terminator stay buffered until the next push.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Feeds a chunk of bytes and returns every line it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                let text = String::from_utf8_lossy(&self.buffer);
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
                self.buffer.clear();
            } else {
                self.buffer.push(b);
            }
        }
        lines
    }

    /// Number of bytes held for an unterminated line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
