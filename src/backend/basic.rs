//! Color BASIC `DATA`-statement loader back-end: the assembled program is wrapped as plain ASCII
//! BASIC text that pokes itself into memory at load time, not a tokenized binary.

use crate::diag::{AssembleError, Diagnostic, SourceLoc, Severity};
use crate::pseudo::ByteKind;

use super::{Backend, FloatEncoding};

const MAX_LINE_LEN: usize = 249;

/// Color BASIC loader back-end (`-f basic`).
#[derive(Debug)]
pub struct BasicBackend {
    text: Vec<u8>,
    data_line: String,
    line: u32,
    incr: u32,
    strspace: u32,
    staddr: u16,
    pc: u16,
    usr: [u16; 10],
    cassette: Option<String>,
    disk: Option<String>,
    have_org: bool,
}

impl Default for BasicBackend {
    fn default() -> Self {
        Self {
            text: Vec::new(),
            data_line: String::new(),
            line: 10,
            incr: 10,
            strspace: 200,
            staddr: 0,
            pc: 0,
            usr: [0; 10],
            cassette: None,
            disk: None,
            have_org: false,
        }
    }
}

impl BasicBackend {
    /// A fresh back-end, line 10 incrementing by 10, 200 bytes of string space.
    pub fn new() -> Self {
        Self::default()
    }

    fn start_data_line(&mut self) {
        self.data_line = format!("{} DATA", self.line);
    }

    fn emit_line(&mut self) {
        self.text.extend_from_slice(self.data_line.as_bytes());
        self.text.push(b'\n');
        self.line += self.incr;
        self.start_data_line();
    }

    fn append_byte(&mut self, b: u8) {
        let first = self.data_line.ends_with("DATA");
        let piece = if first { format!("{b}") } else { format!(",{b}") };
        if !first && self.data_line.len() + piece.len() > MAX_LINE_LEN {
            self.emit_line();
            self.data_line.push_str(&format!("{b}"));
        } else {
            self.data_line.push_str(&piece);
        }
    }
}

impl Backend for BasicBackend {
    fn pass_start(&mut self, pass: u8) {
        if pass == 2 {
            self.start_data_line();
        }
    }

    fn write(&mut self, addr: u16, bytes: &[u8], _kind: ByteKind) -> Result<(), AssembleError> {
        if !self.have_org {
            return Err(Diagnostic::new(Severity::Error, "E0057", SourceLoc::none(), "ORG must be set before writing").into());
        }
        let _ = addr;
        for &b in bytes {
            self.append_byte(b);
        }
        self.pc = self.pc.wrapping_add(bytes.len() as u16);
        Ok(())
    }

    fn org(&mut self, addr: u16) -> Result<(), AssembleError> {
        if !self.have_org {
            self.staddr = addr;
            self.have_org = true;
        }
        self.pc = addr;
        Ok(())
    }

    fn end(&mut self, entry: Option<u16>) -> Result<(), AssembleError> {
        if !self.data_line.ends_with("DATA") {
            self.text.extend_from_slice(self.data_line.as_bytes());
            self.text.push(b'\n');
        }
        self.text.extend_from_slice(
            format!(
                "{} CLEAR{},{}:FORA={}TO{}:READB:POKEA,B:NEXT\n",
                self.line,
                self.strspace,
                self.staddr.wrapping_sub(1),
                self.staddr,
                self.pc.wrapping_sub(1)
            )
            .as_bytes(),
        );
        self.line += self.incr;
        if self.usr.iter().any(|&u| u != 0) {
            self.text.extend_from_slice(format!("{} POKE275,{}:POKE276,{}\n", self.line, 0, 0).as_bytes());
            self.line += self.incr;
        }
        for (n, addr) in self.usr.iter().enumerate() {
            if *addr != 0 {
                self.text.extend_from_slice(format!("{} DEFUSR{}={}\n", self.line, n, addr).as_bytes());
                self.line += self.incr;
            }
        }
        match (&self.cassette, &self.disk, entry) {
            (Some(name), _, Some(e)) => {
                self.text.extend_from_slice(
                    format!("{} CSAVEM\"{}\",{},{},{}\n", self.line, name, self.staddr, self.pc, e).as_bytes(),
                );
            }
            (_, Some(name), Some(e)) => {
                self.text.extend_from_slice(
                    format!("{} SAVEM\"{}\",{},{},{}\n", self.line, name, self.staddr, self.pc, e).as_bytes(),
                );
            }
            (Some(_), _, None) | (_, Some(_), None) => {
                return Err(Diagnostic::new(Severity::Error, "E9999", SourceLoc::none(), "cassette/disk save requires an entry label").into());
            }
            (None, None, entry) => {
                self.text
                    .extend_from_slice(format!("{} EXEC{}\n", self.line, entry.unwrap_or(self.staddr)).as_bytes());
            }
        }
        Ok(())
    }

    fn float_encoding(&self) -> FloatEncoding {
        FloatEncoding::MicrosoftBias129
    }

    fn usage(&self) -> &'static str {
        "basic: Color BASIC DATA-statement loader text (-A cassette, -S disk)"
    }

    fn fini(self: Box<Self>) -> Result<Vec<u8>, AssembleError> {
        Ok(self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_data_line_and_loader_tail() {
        let mut b = BasicBackend::new();
        b.pass_start(2);
        b.org(0x1000).unwrap();
        b.write(0x1000, &[1, 2, 3], ByteKind::Data).unwrap();
        b.end(Some(0x1000)).unwrap();
        let out = String::from_utf8(Box::new(b).fini().unwrap()).unwrap();
        assert!(out.starts_with("10 DATA1,2,3\n"));
        assert!(out.contains("CLEAR200"));
        assert!(out.contains("EXEC4096"));
    }

    #[test]
    fn wraps_to_new_data_line_past_max_length() {
        let mut b = BasicBackend::new();
        b.pass_start(2);
        b.org(0).unwrap();
        let bytes = vec![1u8; 120];
        b.write(0, &bytes, ByteKind::Data).unwrap();
        b.end(Some(0)).unwrap();
        let out = String::from_utf8(Box::new(b).fini().unwrap()).unwrap();
        assert!(out.lines().filter(|l| l.contains("DATA")).count() >= 2);
    }
}
