//! Fixed-capacity circular byte buffer safe for concurrent use.
//!
//! ```
//! use ringbuffer::RingBuffer;
//!
//! let rb = RingBuffer::new(1024);
//! rb.write(b"abcd").unwrap();
//! assert_eq!(rb.length(), 4);
//! assert_eq!(rb.free(), 1020);
//!
//! let mut buf = [0u8; 4];
//! rb.read(&mut buf).unwrap();
//! assert_eq!(&buf, b"abcd");
//! ```
//!
//! The `config`, `sources` and `pump` modules drive the buffer from async
//! producer and consumer tasks; they back the `ringpump` binary.

pub mod config;
pub mod error;
pub mod pump;
pub mod ring_buffer;
pub mod sources;

pub use error::Error;
pub use ring_buffer::{RingBuffer, WriteOutcome};
