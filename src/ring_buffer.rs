use crate::error::Error;
use std::fmt;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity circular byte buffer, safe to share between threads.
///
/// Every operation takes one lock over the whole state, so producers and
/// consumers are serialized. Nothing blocks: reading an empty buffer fails
/// with [`Error::Empty`] and writing a full one with [`Error::Full`].
///
/// A zero-capacity buffer is degenerate: it reports itself as both empty and
/// full, rejects every non-empty write and every non-empty read.
pub struct RingBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    buffer: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    full: bool,
}

/// Result of [`RingBuffer::try_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Bytes committed to the buffer.
    pub written: usize,
    /// Set when some or all of the payload did not fit.
    pub full: bool,
}

impl WriteOutcome {
    pub fn into_result(self) -> Result<usize, Error> {
        match (self.full, self.written) {
            (false, n) => Ok(n),
            (true, 0) => Err(Error::Full),
            (true, written) => Err(Error::Partial { written }),
        }
    }
}

impl Inner {
    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn length(&self) -> usize {
        if self.read_pos == self.write_pos {
            if self.full {
                return self.capacity();
            }
            return 0;
        }
        if self.write_pos > self.read_pos {
            return self.write_pos - self.read_pos;
        }
        self.capacity() - self.read_pos + self.write_pos
    }

    fn free(&self) -> usize {
        if self.read_pos == self.write_pos {
            if self.full {
                return 0;
            }
            return self.capacity();
        }
        if self.write_pos < self.read_pos {
            return self.read_pos - self.write_pos;
        }
        self.capacity() - self.write_pos + self.read_pos
    }

    /// Moves `pos` forward by `n <= capacity` slots.
    fn advance(&self, pos: usize, n: usize) -> usize {
        let next = pos + n;
        if next >= self.capacity() {
            next - self.capacity()
        } else {
            next
        }
    }

    /// Copy `dst.len()` unread bytes starting at `read_pos` into `dst`.
    fn copy_out(&self, dst: &mut [u8]) {
        let n = dst.len();
        if self.read_pos + n <= self.capacity() {
            dst.copy_from_slice(&self.buffer[self.read_pos..self.read_pos + n]);
        } else {
            // Region wraps: tail of storage first, then the head
            let first_chunk = self.capacity() - self.read_pos;
            let second_chunk = n - first_chunk;

            dst[..first_chunk].copy_from_slice(&self.buffer[self.read_pos..]);
            dst[first_chunk..].copy_from_slice(&self.buffer[..second_chunk]);
        }
    }

    /// Copy `src` into free space starting at `write_pos`.
    fn copy_in(&mut self, src: &[u8]) {
        let n = src.len();
        let write_pos = self.write_pos;
        if write_pos + n <= self.capacity() {
            self.buffer[write_pos..write_pos + n].copy_from_slice(src);
        } else {
            let first_chunk = self.capacity() - write_pos;
            let second_chunk = n - first_chunk;

            self.buffer[write_pos..].copy_from_slice(&src[..first_chunk]);
            self.buffer[..second_chunk].copy_from_slice(&src[first_chunk..]);
        }
    }
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: vec![0; capacity],
                read_pos: 0,
                write_pos: 0,
                full: false,
            }),
            capacity,
        }
    }

    // Every critical section leaves the cursors consistent, so a poisoned
    // lock still guards valid state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read up to `dst.len()` bytes, oldest first.
    ///
    /// Returns [`Error::Empty`] when nothing is buffered and `dst` is not
    /// empty. Reading fewer bytes than requested is not an error.
    pub fn read(&self, dst: &mut [u8]) -> Result<usize, Error> {
        if dst.is_empty() {
            return Ok(0);
        }

        let mut inner = self.lock();
        let available = inner.length();
        if available == 0 {
            return Err(Error::Empty);
        }

        let n = available.min(dst.len());
        inner.copy_out(&mut dst[..n]);
        inner.read_pos = inner.advance(inner.read_pos, n);
        inner.full = false;

        Ok(n)
    }

    /// Read the next byte or fail with [`Error::Empty`].
    pub fn read_byte(&self) -> Result<u8, Error> {
        let mut inner = self.lock();
        if inner.read_pos == inner.write_pos && !inner.full {
            return Err(Error::Empty);
        }

        let b = inner.buffer[inner.read_pos];
        inner.read_pos = inner.advance(inner.read_pos, 1);
        inner.full = false;

        Ok(b)
    }

    /// Write as much of `src` as fits and report what happened.
    ///
    /// The prefix that fits is committed; the remainder is dropped, not
    /// buffered.
    pub fn try_write(&self, src: &[u8]) -> WriteOutcome {
        if src.is_empty() {
            return WriteOutcome { written: 0, full: false };
        }

        let mut inner = self.lock();
        let free = inner.free();
        if free == 0 {
            return WriteOutcome { written: 0, full: true };
        }

        let n = src.len().min(free);
        inner.copy_in(&src[..n]);
        inner.write_pos = inner.advance(inner.write_pos, n);
        if inner.write_pos == inner.read_pos {
            inner.full = true;
        }

        WriteOutcome {
            written: n,
            full: n < src.len(),
        }
    }

    /// Write `src` into the buffer.
    ///
    /// Fails with [`Error::Full`] when nothing could be written and with
    /// [`Error::Partial`] when only a prefix fit. In the partial case the
    /// prefix stays committed.
    pub fn write(&self, src: &[u8]) -> Result<usize, Error> {
        self.try_write(src).into_result()
    }

    /// Write one byte or fail with [`Error::Full`] leaving the buffer untouched.
    pub fn write_byte(&self, b: u8) -> Result<(), Error> {
        let mut inner = self.lock();
        if (inner.read_pos == inner.write_pos && inner.full) || self.capacity == 0 {
            return Err(Error::Full);
        }

        let write_pos = inner.write_pos;
        inner.buffer[write_pos] = b;
        inner.write_pos = inner.advance(write_pos, 1);
        if inner.write_pos == inner.read_pos {
            inner.full = true;
        }

        Ok(())
    }

    /// Same as [`write`](Self::write) with the UTF-8 bytes of `s`.
    pub fn write_str(&self, s: &str) -> Result<usize, Error> {
        self.write(s.as_bytes())
    }

    /// Number of unread bytes.
    pub fn length(&self) -> usize {
        self.lock().length()
    }

    /// Number of bytes that can be written before the buffer is full.
    pub fn free(&self) -> usize {
        self.lock().free()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the unread bytes in order, without consuming them.
    pub fn bytes(&self) -> Vec<u8> {
        let inner = self.lock();
        let mut out = vec![0; inner.length()];
        inner.copy_out(&mut out);
        out
    }

    pub fn is_full(&self) -> bool {
        self.lock().full || self.capacity == 0
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.lock();
        inner.read_pos == inner.write_pos && !inner.full
    }

    /// Discard all buffered bytes. Storage is not zeroed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.read_pos = 0;
        inner.write_pos = 0;
        inner.full = false;
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("read_pos", &inner.read_pos)
            .field("write_pos", &inner.write_pos)
            .field("full", &inner.full)
            .finish()
    }
}

impl io::Read for &RingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        RingBuffer::read(*self, buf).map_err(io::Error::from)
    }
}

impl io::Read for RingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for &RingBuffer {
    /// Short writes are `Ok(n)`; a write that accepts nothing is `WouldBlock`.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let outcome = self.try_write(buf);
        if outcome.written == 0 && outcome.full {
            return Err(Error::Full.into());
        }
        Ok(outcome.written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for RingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fails unless the whole string fit. A prefix may still have been committed.
impl fmt::Write for &RingBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        RingBuffer::write_str(*self, s).map(|_| ()).map_err(|_| fmt::Error)
    }
}
