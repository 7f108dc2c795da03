use std::io::{self, Read, Write};

use crate::pool::Recycle;

/// Smallest free space offered to a reader in one `read` call.
pub const MIN_READ: usize = 512;

/// A growable byte accumulator that keeps its storage across resets.
///
/// Unlike a bare `Vec<u8>`, the backing storage stays initialised after
/// [`reset`](OutputBuffer::reset), so refilling a warmed-up buffer never
/// zero-fills or reallocates. Readers write straight into the spare region
/// via [`read_from`](OutputBuffer::read_from); there is no intermediate copy.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    /// Initialised storage; `buf.len()` is the usable capacity.
    buf: Vec<u8>,
    /// Bytes of `buf` holding output.
    len: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            len: 0,
        }
    }

    /// Accumulated output.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Usable storage, including the spare region past `len`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Truncate to zero length, keeping the storage.
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Make room for at least `additional` more bytes.
    fn grow(&mut self, additional: usize) {
        let needed = self.len + additional;
        if needed > self.buf.len() {
            let target = needed.max(self.buf.len() * 2);
            self.buf.resize(target, 0);
        }
    }

    /// Drain `reader` to EOF, appending everything it yields.
    ///
    /// Returns the number of bytes appended. On error the bytes appended so
    /// far stay in the buffer; callers discard them with [`reset`](Self::reset).
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let start = self.len;
        loop {
            if self.buf.len() - self.len < MIN_READ {
                self.grow(MIN_READ);
            }
            match reader.read(&mut self.buf[self.len..]) {
                Ok(0) => return Ok(self.len - start),
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.grow(data.len());
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Recycle for OutputBuffer {
    fn recycle(&mut self) {
        self.reset();
    }

    fn retained_bytes(&self) -> usize {
        self.buf.capacity()
    }
}
