//! Dragon computer executable back-end: a 9-byte header (`0x55 0x02 <load> <len> <exec> 0xAA`)
//! prefixed to the raw byte stream, backpatched once the final length is known.

use crate::diag::{AssembleError, Diagnostic, SourceLoc, Severity};
use crate::pseudo::ByteKind;

use super::{Backend, FloatEncoding};

const HEADER_LEN: usize = 9;

/// Dragon back-end (`-f dragon`).
#[derive(Debug, Default)]
pub struct DragonBackend {
    image: Vec<u8>,
    load: u16,
    pc: u16,
    have_org: bool,
    exec: u16,
    have_exec: bool,
}

impl DragonBackend {
    /// A fresh back-end with 9 bytes of header space reserved.
    pub fn new() -> Self {
        Self {
            image: vec![0; HEADER_LEN],
            ..Self::default()
        }
    }

    fn ensure_len(&mut self, offset: usize) {
        if self.image.len() < offset {
            self.image.resize(offset, 0);
        }
    }
}

impl Backend for DragonBackend {
    fn write(&mut self, addr: u16, bytes: &[u8], _kind: ByteKind) -> Result<(), AssembleError> {
        if !self.have_org {
            return Err(Diagnostic::new(Severity::Error, "E0057", SourceLoc::none(), "ORG must be set before writing").into());
        }
        let offset = HEADER_LEN + addr.wrapping_sub(self.load) as usize;
        self.ensure_len(offset + bytes.len());
        self.image[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.pc = addr.wrapping_add(bytes.len() as u16);
        Ok(())
    }

    fn org(&mut self, addr: u16) -> Result<(), AssembleError> {
        if !self.have_org {
            self.load = addr;
            self.have_org = true;
        }
        self.pc = addr;
        Ok(())
    }

    fn rmb(&mut self, addr: u16, _count: u16) -> Result<(), AssembleError> {
        let offset = HEADER_LEN + addr.wrapping_sub(self.load) as usize;
        self.ensure_len(offset);
        self.pc = addr;
        Ok(())
    }

    fn end(&mut self, entry: Option<u16>) -> Result<(), AssembleError> {
        let entry = entry.ok_or_else(|| {
            AssembleError::from(Diagnostic::new(Severity::Error, "E0111", SourceLoc::none(), "missing label on END directive"))
        })?;
        self.exec = entry;
        self.have_exec = true;
        let len = self.image.len() - HEADER_LEN;
        if len > 0xFFF7 {
            return Err(Diagnostic::new(Severity::Error, "E0112", SourceLoc::none(), "program too large for Dragon executable format").into());
        }
        self.image[0] = 0x55;
        self.image[1] = 0x02;
        self.image[2..4].copy_from_slice(&self.load.to_be_bytes());
        self.image[4..6].copy_from_slice(&(len as u16).to_be_bytes());
        self.image[6..8].copy_from_slice(&self.exec.to_be_bytes());
        self.image[8] = 0xAA;
        Ok(())
    }

    fn float_encoding(&self) -> FloatEncoding {
        FloatEncoding::MicrosoftBias129
    }

    fn usage(&self) -> &'static str {
        "dragon: a Dragon computer EXEC-loadable executable"
    }

    fn fini(self: Box<Self>) -> Result<Vec<u8>, AssembleError> {
        if !self.have_exec {
            return Err(Diagnostic::new(Severity::Error, "E0111", SourceLoc::none(), "missing label on END directive").into());
        }
        Ok(self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_header_with_load_len_exec() {
        let mut b = DragonBackend::new();
        b.org(0x3000).unwrap();
        b.write(0x3000, &[1, 2, 3], ByteKind::Data).unwrap();
        b.end(Some(0x3000)).unwrap();
        let out = Box::new(b).fini().unwrap();
        assert_eq!(&out[0..2], &[0x55, 0x02]);
        assert_eq!(&out[2..4], &[0x30, 0x00]);
        assert_eq!(&out[4..6], &[0x00, 0x03]);
        assert_eq!(&out[6..8], &[0x30, 0x00]);
        assert_eq!(out[8], 0xAA);
        assert_eq!(&out[9..12], &[1, 2, 3]);
    }

    #[test]
    fn end_without_label_is_an_error() {
        let mut b = DragonBackend::new();
        b.org(0x3000).unwrap();
        let e = b.end(None).unwrap_err();
        assert!(matches!(e, AssembleError::Diagnostic(d) if d.code == "E0111"));
    }
}
