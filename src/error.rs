// src/error.rs

use std::fmt;
use std::io;

/// Errors reported by [`RingBuffer`](crate::RingBuffer) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No unread bytes were available for a non-empty read.
    Empty,
    /// No free space was available; nothing was written.
    Full,
    /// The payload exceeded the free space. `written` bytes were committed
    /// and the rest was dropped.
    Partial { written: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Empty => write!(f, "ringbuffer is empty"),
            Error::Full => write!(f, "ringbuffer is full"),
            Error::Partial { written } => {
                write!(f, "ringbuffer is full after writing {} bytes", written)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for both `Full` and `Partial`.
    pub fn is_full(&self) -> bool {
        matches!(self, Error::Full | Error::Partial { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Error::Empty)
    }

    /// Bytes committed before the error was raised.
    pub fn written(&self) -> usize {
        match self {
            Error::Partial { written } => *written,
            _ => 0,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        // Ok(0) would read as end-of-stream, so both conditions are WouldBlock.
        io::Error::new(io::ErrorKind::WouldBlock, err)
    }
}
