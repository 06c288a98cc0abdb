//! Motorola S-record (SREC) back-end: ASCII hex text, accumulated into tunable-size `S1` data
//! records and terminated by `S9`.

use crate::diag::{AssembleError, Diagnostic, SourceLoc, Severity};
use crate::pseudo::ByteKind;

use super::{Backend, FloatEncoding};

const DEFAULT_RECSIZE: usize = 34;

/// SREC back-end (`-f srec`).
#[derive(Debug)]
pub struct SrecBackend {
    lines: Vec<u8>,
    buffer: Vec<u8>,
    addr: u16,
    recsize: usize,
    have_org: bool,
    ended: bool,
    override_exec: Option<u16>,
}

impl Default for SrecBackend {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            buffer: Vec::new(),
            addr: 0,
            recsize: DEFAULT_RECSIZE,
            have_org: false,
            ended: false,
            override_exec: None,
        }
    }
}

impl SrecBackend {
    /// A fresh back-end with the default 34-byte record size.
    pub fn new() -> Self {
        Self::default()
    }

    fn write_record(&mut self, kind: u8, addr: u16, data: &[u8]) {
        let len = data.len() as u8 + 3;
        let mut sum = len as u32 + (addr >> 8) as u32 + (addr & 0xFF) as u32;
        for &b in data {
            sum += b as u32;
        }
        let chksum = !(sum as u8);
        self.lines
            .extend_from_slice(format!("S{kind}{len:02X}{addr:04X}").as_bytes());
        for &b in data {
            self.lines.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        self.lines.extend_from_slice(format!("{chksum:02X}\n").as_bytes());
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let addr = self.addr;
            let data = std::mem::take(&mut self.buffer);
            self.write_record(1, addr, &data);
            self.addr = self.addr.wrapping_add(data.len() as u16);
        }
    }

    fn push(&mut self, addr: u16, bytes: &[u8]) -> Result<(), AssembleError> {
        if !self.have_org {
            return Err(Diagnostic::new(Severity::Error, "E0057", SourceLoc::none(), "ORG must be set before writing").into());
        }
        if self.buffer.is_empty() {
            self.addr = addr;
        }
        for &b in bytes {
            self.buffer.push(b);
            if self.buffer.len() >= self.recsize {
                self.flush();
            }
        }
        Ok(())
    }
}

impl Backend for SrecBackend {
    fn cmdline(&mut self, flag: &str, value: Option<&str>) -> Result<bool, AssembleError> {
        match flag {
            "R" => {
                let n: usize = value
                    .and_then(|v| v.parse().ok())
                    .filter(|n| (1..=252).contains(n))
                    .ok_or_else(|| {
                        AssembleError::from(Diagnostic::new(
                            Severity::Error,
                            "E0042",
                            SourceLoc::none(),
                            "-R record size must be between 1 and 252",
                        ))
                    })?;
                self.recsize = n;
                Ok(true)
            }
            "O" => {
                let n: u16 = value
                    .and_then(|v| u16::from_str_radix(v.trim_start_matches('$'), 16).ok())
                    .ok_or_else(|| {
                        AssembleError::from(Diagnostic::new(Severity::Error, "E0042", SourceLoc::none(), "-O needs a hex address"))
                    })?;
                self.override_exec = Some(n);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn write(&mut self, addr: u16, bytes: &[u8], _kind: ByteKind) -> Result<(), AssembleError> {
        self.push(addr, bytes)
    }

    fn org(&mut self, addr: u16) -> Result<(), AssembleError> {
        self.flush();
        self.addr = addr;
        self.have_org = true;
        Ok(())
    }

    fn end(&mut self, entry: Option<u16>) -> Result<(), AssembleError> {
        if self.ended {
            return Err(Diagnostic::new(Severity::Error, "E0056", SourceLoc::none(), "END already processed").into());
        }
        self.flush();
        let exec = self.override_exec.or(entry).unwrap_or(0);
        self.write_record(9, exec, &[]);
        self.ended = true;
        Ok(())
    }

    fn float_encoding(&self) -> FloatEncoding {
        FloatEncoding::Ieee754
    }

    fn usage(&self) -> &'static str {
        "srec: Motorola S-record hex text (-R recsize, -O exec-override)"
    }

    fn fini(self: Box<Self>) -> Result<Vec<u8>, AssembleError> {
        Ok(self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_s1_then_s9() {
        let mut b = SrecBackend::new();
        b.org(0x1000).unwrap();
        b.write(0x1000, &[0xAA, 0xBB], ByteKind::Data).unwrap();
        b.end(Some(0x1000)).unwrap();
        let out = String::from_utf8(Box::new(b).fini().unwrap()).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("S1051000AABB"));
        assert!(lines.next().unwrap().starts_with("S9"));
    }

    #[test]
    fn flushes_full_record_automatically() {
        let mut b = SrecBackend::new();
        b.recsize = 2;
        b.org(0).unwrap();
        b.write(0, &[1, 2, 3], ByteKind::Data).unwrap();
        b.end(None).unwrap();
        let out = String::from_utf8(Box::new(b).fini().unwrap()).unwrap();
        // one full 2-byte record, one 1-byte record, then S9
        assert_eq!(out.lines().count(), 3);
    }
}
