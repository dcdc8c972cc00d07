//! Circular byte ring for TCP receive data
//!
//! Fixed capacity chosen at construction; `push_slice` stores what fits and
//! reports the overflow instead of silently truncating.

use alloc::boxed::Box;
use alloc::vec;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Only `accepted` bytes of the input fit; the rest was not stored.
    Overflow { accepted: usize },
    Empty,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Overflow { accepted } => {
                write!(f, "ring buffer full after {} bytes", accepted)
            }
            BufferError::Empty => write!(f, "ring buffer empty"),
        }
    }
}

/// Bounded byte ring with `start/end/count` bookkeeping.
pub struct ByteRing {
    data: Box<[u8]>,
    start: usize,
    end: usize,
    count: usize,
}

impl ByteRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            count: 0,
        }
    }

    /// Append as many bytes as fit.
    ///
    /// Returns `Ok(len)` when everything was stored, otherwise
    /// `Err(Overflow { accepted })` with the accepted prefix already in place.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Result<usize, BufferError> {
        let accepted = bytes.len().min(self.free_space());
        for &byte in &bytes[..accepted] {
            self.data[self.end] = byte;
            self.end = (self.end + 1) % self.data.len();
        }
        self.count += accepted;

        if accepted < bytes.len() {
            Err(BufferError::Overflow { accepted })
        } else {
            Ok(accepted)
        }
    }

    /// Copy up to `out.len()` bytes out of the ring. Returns 0 when empty.
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.count);
        for slot in out.iter_mut().take(n) {
            *slot = self.data[self.start];
            self.start = (self.start + 1) % self.data.len();
        }
        self.count -= n;
        n
    }

    pub fn pop(&mut self) -> Result<u8, BufferError> {
        let mut byte = [0u8; 1];
        if self.pop_into(&mut byte) == 0 {
            return Err(BufferError::Empty);
        }
        Ok(byte[0])
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.data.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn free_space(&self) -> usize {
        self.data.len() - self.count
    }

    /// Read index.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Write index.
    pub fn end(&self) -> usize {
        self.end
    }
}

impl fmt::Debug for ByteRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRing")
            .field("capacity", &self.data.len())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("count", &self.count)
            .finish()
    }
}
