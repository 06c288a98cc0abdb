//! Diagnostic taxonomy: debug notes, suppressible warnings, and fatal errors.
//!
//! Every diagnostic carries a stable four-digit code (`Wxxxx`/`Exxxx`) so that scripts and
//! editors can key off it regardless of the human-readable message text.

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

/// The three severities a diagnostic can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Emitted only when `-d` is active.
    Debug,
    /// Suppressible individually by tag; promoted to an error by `-w`.
    Warning,
    /// Fatal to the current pass.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "debug",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Where, in the source, a diagnostic was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLoc {
    /// Name of the file being assembled when the diagnostic fired.
    pub file: Option<String>,
    /// 1-based line number, absent when no line is current (e.g. CLI argument errors).
    pub line: Option<u32>,
}

impl SourceLoc {
    /// A location with no file or line context.
    pub fn none() -> Self {
        Self::default()
    }

    /// A location at a specific file and line.
    pub fn at(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

/// One diagnostic: a severity, a stable code, an optional location, and free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `Debug`, `Warning`, or `Error`.
    pub severity: Severity,
    /// Four-digit stable code, e.g. `"E0038"` or `"W0012"`.
    pub code: &'static str,
    /// Where the diagnostic occurred.
    pub loc: SourceLoc,
    /// Human-readable message text.
    pub text: String,
}

impl Diagnostic {
    /// Construct a new diagnostic.
    pub fn new(severity: Severity, code: &'static str, loc: SourceLoc, text: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            loc,
            text: text.into(),
        }
    }

    /// The numeric portion of `code`, used to index the suppression bitmap.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not of the form `[EW]\d{4}`; every code constructed within this
    /// crate follows that shape.
    pub fn tag(&self) -> u16 {
        self.code[1..]
            .parse()
            .expect("diagnostic codes are always a letter followed by four digits")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.loc.file, self.loc.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}: {}: {}", self.severity, self.code, self.text),
            _ => write!(f, "{}: {}: {}", self.severity, self.code, self.text),
        }
    }
}

/// Top-level failure kind returned from library entry points.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Underlying file I/O failed outside of the diagnostic channel (e.g. can't open output).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A fatal diagnostic was raised; the pass driver stopped at the next line boundary.
    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),
    /// An invariant the assembler itself is responsible for was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Diagnostic> for AssembleError {
    fn from(diag: Diagnostic) -> Self {
        AssembleError::Diagnostic(Box::new(diag))
    }
}

/// A 10,000-bit suppression bitmap indexed by warning tag, plus the running error/warning state.
pub struct DiagSink<W: Write> {
    out: W,
    suppressed: Box<[u64; Self::WORDS]>,
    debug: bool,
    fail_on_warning: bool,
    any_error: bool,
    any_warning: bool,
}

impl<W: Write> DiagSink<W> {
    const BITS: usize = 10_000;
    const WORDS: usize = Self::BITS.div_ceil(64);

    /// Create a sink writing formatted diagnostics to `out`.
    pub fn new(out: W, debug: bool, fail_on_warning: bool) -> Self {
        Self {
            out,
            suppressed: Box::new([0u64; Self::WORDS]),
            debug,
            fail_on_warning,
            any_error: false,
            any_warning: false,
        }
    }

    /// Disable warning `tag` (the numeric part of e.g. `W0012`).
    pub fn disable(&mut self, tag: u16) {
        let tag = tag as usize;
        if tag < Self::BITS {
            self.suppressed[tag / 64] |= 1 << (tag % 64);
        }
    }

    /// Re-enable a previously disabled warning tag.
    pub fn enable(&mut self, tag: u16) {
        let tag = tag as usize;
        if tag < Self::BITS {
            self.suppressed[tag / 64] &= !(1 << (tag % 64));
        }
    }

    fn is_suppressed(&self, tag: u16) -> bool {
        let tag = tag as usize;
        tag < Self::BITS && (self.suppressed[tag / 64] >> (tag % 64)) & 1 != 0
    }

    /// Record and print a diagnostic. Returns `Ok(false)` for a reported warning/debug note
    /// (callers treat this as "continue"), and `Err` for a fatal error.
    pub fn report(&mut self, diag: Diagnostic) -> Result<bool, AssembleError> {
        match diag.severity {
            Severity::Debug => {
                if self.debug {
                    writeln!(self.out, "{diag}").map_err(AssembleError::Io)?;
                }
                Ok(true)
            }
            Severity::Warning => {
                if self.is_suppressed(diag.tag()) {
                    return Ok(true);
                }
                self.any_warning = true;
                writeln!(self.out, "{diag}").map_err(AssembleError::Io)?;
                if self.fail_on_warning {
                    self.any_error = true;
                }
                Ok(true)
            }
            Severity::Error => {
                self.any_error = true;
                writeln!(self.out, "{diag}").map_err(AssembleError::Io)?;
                Err(diag.into())
            }
        }
    }

    /// Whether any error (or, under `-w`, any warning) was observed.
    pub fn failed(&self) -> bool {
        self.any_error
    }

    /// Whether any warning at all was printed, independent of `-w`.
    pub fn any_warning(&self) -> bool {
        self.any_warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_location() {
        let d = Diagnostic::new(Severity::Error, "E0038", SourceLoc::at("foo.asm", 12), "seek failed");
        assert_eq!(d.to_string(), "foo.asm:12: error: E0038: seek failed");
    }

    #[test]
    fn formats_without_location() {
        let d = Diagnostic::new(Severity::Error, "E0001", SourceLoc::none(), "bad flag");
        assert_eq!(d.to_string(), "error: E0001: bad flag");
    }

    #[test]
    fn tag_parses_numeric_suffix() {
        let d = Diagnostic::new(Severity::Warning, "W0012", SourceLoc::none(), "");
        assert_eq!(d.tag(), 12);
    }

    #[test]
    fn suppression_round_trips() {
        let mut sink = DiagSink::new(Vec::new(), false, false);
        let warn = || Diagnostic::new(Severity::Warning, "W0012", SourceLoc::none(), "branch to next location");
        sink.report(warn()).unwrap();
        let before = sink.out.clone();
        sink.disable(12);
        sink.report(warn()).unwrap();
        assert_eq!(sink.out, before, "suppressed warning must not print");
        sink.enable(12);
        sink.report(warn()).unwrap();
        assert_eq!(sink.out, {
            let mut v = before;
            v.extend_from_slice(b"warning: W0012: branch to next location\n");
            v
        });
    }

    #[test]
    fn fail_on_warning_upgrades_result() {
        let mut sink = DiagSink::new(Vec::new(), false, true);
        sink.report(Diagnostic::new(Severity::Warning, "W0012", SourceLoc::none(), "x"))
            .unwrap();
        assert!(sink.failed());
    }

    #[test]
    fn error_propagates_and_records_failure() {
        let mut sink = DiagSink::new(Vec::new(), false, false);
        let err = sink.report(Diagnostic::new(Severity::Error, "E0001", SourceLoc::none(), "bad"));
        assert!(err.is_err());
        assert!(sink.failed());
    }
}
