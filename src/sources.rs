use crate::config::PatternConfig;
use async_trait::async_trait;
use std::io;

/// Producer side of a pump: yields chunks until exhausted.
#[async_trait]
pub trait ByteSource: Send + Sync {
    fn id(&self) -> &str;

    /// Next chunk of bytes. An empty chunk means the source is exhausted.
    async fn next_chunk(&self) -> io::Result<Vec<u8>>;
}

/// Endless repetition of a fixed byte pattern.
pub struct PatternSource {
    id: String,
    pattern: Vec<u8>,
    chunk_size: usize,
    offset: tokio::sync::Mutex<usize>,
}

impl PatternSource {
    pub fn new(cfg: PatternConfig) -> Self {
        Self {
            id: cfg.id,
            pattern: cfg.pattern.into_bytes(),
            chunk_size: cfg.chunk_size,
            offset: tokio::sync::Mutex::new(0),
        }
    }
}

#[async_trait]
impl ByteSource for PatternSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn next_chunk(&self) -> io::Result<Vec<u8>> {
        if self.pattern.is_empty() {
            return Ok(Vec::new());
        }
        let mut offset = self.offset.lock().await;
        let chunk: Vec<u8> = self.pattern.iter()
            .cycle()
            .skip(*offset)
            .take(self.chunk_size)
            .copied()
            .collect();
        *offset = (*offset + chunk.len()) % self.pattern.len();
        Ok(chunk)
    }
}
