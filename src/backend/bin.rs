//! Flat binary output: a single byte image, gaps filled with zero via seek-style resizing.

use crate::diag::AssembleError;
use crate::pseudo::ByteKind;

use super::{Backend, FloatEncoding};

/// Flat binary back-end (`-f bin`).
#[derive(Debug, Default)]
pub struct BinBackend {
    base: Option<u16>,
    image: Vec<u8>,
}

impl BinBackend {
    /// A fresh, empty image.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_len(&mut self, offset: usize) {
        if self.image.len() < offset {
            self.image.resize(offset, 0);
        }
    }
}

impl Backend for BinBackend {
    fn write(&mut self, addr: u16, bytes: &[u8], _kind: ByteKind) -> Result<(), AssembleError> {
        let base = *self.base.get_or_insert(addr);
        let offset = addr.wrapping_sub(base) as usize;
        self.ensure_len(offset);
        self.ensure_len(offset + bytes.len());
        self.image[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn org(&mut self, addr: u16) -> Result<(), AssembleError> {
        self.base.get_or_insert(addr);
        Ok(())
    }

    fn end(&mut self, _entry: Option<u16>) -> Result<(), AssembleError> {
        Ok(())
    }

    fn float_encoding(&self) -> FloatEncoding {
        FloatEncoding::Ieee754
    }

    fn usage(&self) -> &'static str {
        "bin: a flat, headerless memory image starting at the first ORG address"
    }

    fn fini(self: Box<Self>) -> Result<Vec<u8>, AssembleError> {
        Ok(self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_gap_between_writes_with_zero() {
        let mut b = BinBackend::new();
        b.write(0x100, &[1, 2], ByteKind::Data).unwrap();
        b.write(0x105, &[9], ByteKind::Data).unwrap();
        let out = Box::new(b).fini().unwrap();
        assert_eq!(out, vec![1, 2, 0, 0, 0, 9]);
    }
}
