//! The fixed-capacity line buffer and the raw-line reader that fills it.

use crate::diag::{Diagnostic, Severity, SourceLoc};

/// Maximum printable-character capacity of one source line (132 columns plus a null slot).
pub const BUFFER_CAP: usize = 133;

/// A fixed-capacity line buffer with independent write and read cursors.
///
/// The read cursor is the parser's lookahead: callers "unget" by decrementing `ridx`, which is
/// always valid because every call site that does so has just advanced it by exactly one.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    /// Read cursor; the next byte `next()` will return.
    pub ridx: usize,
}

impl LineBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the buffer from one physical source line, expanding tabs to the next multiple of 8
    /// columns and rejecting non-printable control bytes.
    ///
    /// `loc` is used only to stamp any diagnostic raised; line-too-long and invalid-character
    /// are the only failure modes here.
    pub fn load(&mut self, raw: &str, loc: SourceLoc) -> Result<(), Diagnostic> {
        self.bytes.clear();
        self.ridx = 0;
        let mut col = 0usize;
        for c in raw.chars() {
            if c == '\t' {
                let next_stop = (col / 8 + 1) * 8;
                while col < next_stop {
                    self.push(b' ', &loc)?;
                    col += 1;
                }
                continue;
            }
            if c == '\r' {
                continue;
            }
            if !is_printable(c) {
                return Err(Diagnostic::new(
                    Severity::Error,
                    "E0002",
                    loc,
                    "invalid character on input",
                ));
            }
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).as_bytes() {
                self.push(*b, &loc)?;
            }
            col += 1;
        }
        Ok(())
    }

    fn push(&mut self, b: u8, loc: &SourceLoc) -> Result<(), Diagnostic> {
        if self.bytes.len() >= BUFFER_CAP - 1 {
            return Err(Diagnostic::new(
                Severity::Error,
                "E0001",
                loc.clone(),
                "line too long",
            ));
        }
        self.bytes.push(b);
        Ok(())
    }

    /// The full contents as text, for diagnostics and listing output.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or("")
    }

    /// Whether the read cursor has consumed the whole line.
    pub fn at_end(&self) -> bool {
        self.ridx >= self.bytes.len()
    }

    /// Read and advance past the next byte, or `'\0'` at end of buffer.
    pub fn next(&mut self) -> char {
        if self.at_end() {
            return '\0';
        }
        let c = self.bytes[self.ridx] as char;
        self.ridx += 1;
        c
    }

    /// Peek the next byte without advancing.
    pub fn peek(&self) -> char {
        if self.at_end() {
            '\0'
        } else {
            self.bytes[self.ridx] as char
        }
    }

    /// Un-read the last consumed byte; only valid immediately after a `next()`.
    pub fn unget(&mut self) {
        if self.ridx > 0 {
            self.ridx -= 1;
        }
    }
}

fn is_printable(c: char) -> bool {
    c == ' ' || (!c.is_control() && (c as u32) < 0x80)
}

/// Skip spaces/tabs starting at the read cursor; return the first non-space character
/// (without consuming it twice — the cursor is left just past it, matching the C idiom of
/// `skip_space` returning the lookahead character while leaving `ridx` one past it).
pub fn skip_space(buf: &mut LineBuffer) -> char {
    loop {
        let c = buf.next();
        if c != ' ' && c != '\t' {
            return c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tabs_to_next_multiple_of_8() {
        let mut b = LineBuffer::new();
        b.load("a\tb", SourceLoc::none()).unwrap();
        assert_eq!(b.as_str(), "a       b");
    }

    #[test]
    fn rejects_control_bytes() {
        let mut b = LineBuffer::new();
        let err = b.load("a\u{0007}b", SourceLoc::none()).unwrap_err();
        assert_eq!(err.code, "E0002");
    }

    #[test]
    fn rejects_overlong_lines() {
        let mut b = LineBuffer::new();
        let long = "x".repeat(200);
        let err = b.load(&long, SourceLoc::none()).unwrap_err();
        assert_eq!(err.code, "E0001");
    }

    #[test]
    fn skip_space_stops_at_first_non_space() {
        let mut b = LineBuffer::new();
        b.load("   LDA", SourceLoc::none()).unwrap();
        assert_eq!(skip_space(&mut b), 'L');
    }

    #[test]
    fn unget_allows_single_char_lookahead() {
        let mut b = LineBuffer::new();
        b.load("AB", SourceLoc::none()).unwrap();
        assert_eq!(b.next(), 'A');
        assert_eq!(b.next(), 'B');
        b.unget();
        assert_eq!(b.next(), 'B');
    }
}
