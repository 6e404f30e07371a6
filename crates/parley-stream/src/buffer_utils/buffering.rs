use anyhow::Result;
use std::collections::VecDeque;

/// Circular buffer for line-based parsing of a chunked byte stream
///
/// Accepts `\n`, `\r\n` and a lone `\r` as terminators. A `\r` that ends the
/// buffered bytes is held back until the next chunk shows whether a `\n`
/// follows, unless the buffer has been closed.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
    closed: bool,
}

impl CircularLineBuffer {
    /// Create a new buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            closed: false,
        }
    }

    /// Add bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Mark end of input so a trailing `\r` terminates its line
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Extract next line (without its terminator) from buffer
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let pos = self
            .buffer
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')?;

        let terminator_len = if self.buffer[pos] == b'\r' {
            match self.buffer.get(pos + 1) {
                Some(&b'\n') => 2,
                Some(_) => 1,
                None if self.closed => 1,
                None => return None,
            }
        } else {
            1
        };

        let mut line_bytes: Vec<u8> = self.buffer.drain(..pos + terminator_len).collect();
        line_bytes.truncate(pos);

        match String::from_utf8(line_bytes) {
            Ok(line) => Some(Ok(line)),
            Err(e) => Some(Err(anyhow::anyhow!("Invalid UTF-8: {}", e))),
        }
    }

    /// Drop whatever partial line is still buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Current buffer size
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_buffer_basic() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\n");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "partial line");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"first\r");
        assert!(buffer.next_line().is_none());

        buffer.extend(b"\nsecond\r\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "first");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "second");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_lone_carriage_return() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"a\rb\r");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "a");
        assert!(buffer.next_line().is_none());

        buffer.close();
        assert_eq!(buffer.next_line().unwrap().unwrap(), "b");
    }

    #[test]
    fn test_preserves_whitespace() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"  indented \n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "  indented ");
    }

    #[test]
    fn test_invalid_utf8_is_reported_and_consumed() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(&[0xff, 0xfe, b'\n', b'o', b'k', b'\n']);
        assert!(buffer.next_line().unwrap().is_err());
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ok");
    }
}
