//! Line framing for the wire protocol
//!
//! Turns the raw byte chunks read off a socket into complete
//! newline-terminated messages, buffering any unterminated remainder
//! until the next read.

/// Per-connection receive buffer
///
/// Bytes go in via [`extend`](LineBuffer::extend) in whatever chunking the
/// socket produced; complete lines come out via
/// [`next_line`](LineBuffer::next_line) in arrival order. The terminator is
/// stripped. There is no maximum line length: a peer that never sends a
/// newline grows this buffer without bound.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of received bytes
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete line, if one is buffered
    ///
    /// Returns the bytes up to (and excluding) the next `\n`, removing them
    /// and the terminator from the buffer. Invalid UTF-8 is replaced
    /// lossily. Returns `None` when no terminator is buffered yet.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
        self.buf.drain(..=pos);
        Some(line)
    }

    /// Number of buffered bytes not yet part of a complete line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buf: &mut LineBuffer) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = buf.next_line() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_single_line() {
        let mut buf = LineBuffer::new();
        buf.extend(b"hello\n");
        assert_eq!(drain(&mut buf), vec!["hello"]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut buf = LineBuffer::new();
        buf.extend(b"a\nbb\nccc\n");
        assert_eq!(drain(&mut buf), vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buf = LineBuffer::new();
        buf.extend(b"hel");
        assert!(buf.next_line().is_none());
        buf.extend(b"lo\nwor");
        assert_eq!(drain(&mut buf), vec!["hello"]);
        assert_eq!(buf.pending(), 3);
        buf.extend(b"ld\n");
        assert_eq!(drain(&mut buf), vec!["world"]);
    }

    #[test]
    fn test_empty_line() {
        let mut buf = LineBuffer::new();
        buf.extend(b"\n\na\n");
        assert_eq!(drain(&mut buf), vec!["", "", "a"]);
    }

    #[test]
    fn test_remainder_retained() {
        let mut buf = LineBuffer::new();
        buf.extend(b"complete\npartial");
        assert_eq!(drain(&mut buf), vec!["complete"]);
        assert_eq!(buf.pending(), 7);
    }

    #[test]
    fn test_any_chunking_yields_same_lines() {
        // Feed the same stream one byte at a time and in one big chunk;
        // both splits must produce identical output.
        let stream = b"first\nsecond line\n|pipes|ok\ntail";

        let mut whole = LineBuffer::new();
        whole.extend(stream);
        let expected = drain(&mut whole);

        let mut bytewise = LineBuffer::new();
        let mut got = Vec::new();
        for &b in stream.iter() {
            bytewise.extend(&[b]);
            while let Some(line) = bytewise.next_line() {
                got.push(line);
            }
        }

        assert_eq!(got, expected);
        assert_eq!(bytewise.pending(), whole.pending());
    }

    #[test]
    fn test_lossy_utf8() {
        let mut buf = LineBuffer::new();
        buf.extend(&[0xff, 0xfe, b'\n']);
        let line = buf.next_line().unwrap();
        assert_eq!(line.chars().count(), 2);
    }
}
