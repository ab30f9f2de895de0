//! Random-access byte I/O over the backing image.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Seek-and-transfer wrapper around the opened image.
///
/// The engine is generic over the device so the binary can hand it a
/// `std::fs::File` and the tests a `Cursor<Vec<u8>>`.
pub struct Image<D> {
    dev: D,
}

impl<D: Read + Write + Seek> Image<D> {
    pub fn new(dev: D) -> Self {
        Self { dev }
    }

    /// Read exactly `len` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.dev.seek(SeekFrom::Start(offset))?;
        self.dev.read_exact(buf)
    }

    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.dev.seek(SeekFrom::Start(offset))?;
        self.dev.write_all(bytes)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.dev.flush()
    }

    /// Borrow the underlying device (used by tests to inspect raw bytes).
    pub fn get_ref(&self) -> &D {
        &self.dev
    }
}
