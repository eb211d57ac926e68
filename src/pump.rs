use crate::config::FlattenedConfig;
use crate::error::Error;
use crate::ring_buffer::RingBuffer;
use crate::sources::{ByteSource, PatternSource};
use futures::future::join_all;
use log::{debug, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters collected while pumping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PumpStats {
    pub produced: u64,
    pub consumed: u64,
    /// Writes that hit a full buffer, including partial writes.
    pub full_events: u64,
    /// Reads that found the buffer empty.
    pub empty_events: u64,
    pub per_source: Vec<(String, u64)>,
}

/// Moves bytes from every source through one shared ring buffer into a
/// single consumer.
///
/// The buffer never blocks, so producers and the consumer poll: a full or
/// empty buffer makes the task yield and retry.
pub struct Pump {
    buffer: Arc<RingBuffer>,
    sources: Vec<Arc<dyn ByteSource>>,
    read_size: usize,
    total_bytes: u64,
}

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    active_producers: AtomicUsize,
    full_events: AtomicU64,
}

/// Raises `stop` however the consumer exits, including when its future is
/// dropped, so spawned producers never outlive it.
struct StopOnDrop(Arc<Shared>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop.store(true, Ordering::SeqCst);
    }
}

impl Pump {
    pub fn new(
        buffer: Arc<RingBuffer>,
        sources: Vec<Arc<dyn ByteSource>>,
        read_size: usize,
        total_bytes: u64,
    ) -> Self {
        Self { buffer, sources, read_size, total_bytes }
    }

    pub fn from_config(cfg: FlattenedConfig) -> Self {
        let sources = cfg.sources
            .into_iter()
            .map(|s| Arc::new(PatternSource::new(s)) as Arc<dyn ByteSource>)
            .collect();
        Self::new(Arc::new(RingBuffer::new(cfg.capacity)), sources, cfg.read_size, cfg.total_bytes)
    }

    pub fn buffer(&self) -> &Arc<RingBuffer> {
        &self.buffer
    }

    pub async fn run(&self) -> Result<PumpStats, Box<dyn std::error::Error>> {
        self.run_with(|_| {}).await
    }

    /// Pump until `total_bytes` have been consumed or every source is
    /// exhausted and the buffer drained. Each consumed chunk goes to `sink`.
    pub async fn run_with<F>(&self, mut sink: F) -> Result<PumpStats, Box<dyn std::error::Error>>
    where
        F: FnMut(&[u8]),
    {
        let shared = Arc::new(Shared::default());
        shared.active_producers.store(self.sources.len(), Ordering::SeqCst);
        let stop = StopOnDrop(Arc::clone(&shared));

        info!(
            "Pumping {} bytes through a {} byte buffer from {} sources",
            self.total_bytes,
            self.buffer.capacity(),
            self.sources.len()
        );

        let mut handles = Vec::with_capacity(self.sources.len());
        for src in &self.sources {
            let src = Arc::clone(src);
            let buffer = Arc::clone(&self.buffer);
            let shared = Arc::clone(&shared);
            handles.push(tokio::spawn(async move {
                let res = produce(src.as_ref(), &buffer, &shared).await;
                shared.active_producers.fetch_sub(1, Ordering::SeqCst);
                res
            }));
        }

        let mut stats = PumpStats::default();
        let mut read_error = None;
        let mut chunk = vec![0u8; self.read_size];
        while stats.consumed < self.total_bytes {
            let remaining = (self.total_bytes - stats.consumed).min(chunk.len() as u64) as usize;
            match self.buffer.read(&mut chunk[..remaining]) {
                Ok(n) => {
                    sink(&chunk[..n]);
                    stats.consumed += n as u64;
                }
                Err(Error::Empty) => {
                    // Re-check after the empty read so bytes committed by the
                    // last producer are not lost
                    if shared.active_producers.load(Ordering::SeqCst) == 0
                        && self.buffer.is_empty()
                    {
                        debug!("All sources exhausted after {} bytes", stats.consumed);
                        break;
                    }
                    stats.empty_events += 1;
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }
        drop(stop);

        let results = join_all(handles).await;
        if let Some(e) = read_error {
            return Err(e.into());
        }
        for (src, res) in self.sources.iter().zip(results) {
            let produced = res
                .map_err(|e| format!("Producer task '{}' failed: {}", src.id(), e))?
                .map_err(|e| format!("Source '{}' failed: {}", src.id(), e))?;
            stats.produced += produced;
            stats.per_source.push((src.id().to_string(), produced));
        }
        stats.full_events = shared.full_events.load(Ordering::SeqCst);

        if stats.consumed < self.total_bytes {
            warn!(
                "Sources ran dry: consumed {} of {} requested bytes",
                stats.consumed, self.total_bytes
            );
        }
        Ok(stats)
    }
}

/// Feed one source into the buffer until it is exhausted or the pump stops.
/// Returns the number of bytes committed.
async fn produce(src: &dyn ByteSource, buffer: &RingBuffer, shared: &Shared) -> io::Result<u64> {
    let mut produced = 0u64;
    while !shared.stop.load(Ordering::SeqCst) {
        let chunk = src.next_chunk().await?;
        if chunk.is_empty() {
            debug!("Source '{}' exhausted after {} bytes", src.id(), produced);
            break;
        }

        // Keep the rejected suffix of a partial write for the next attempt
        let mut pending = &chunk[..];
        while !pending.is_empty() && !shared.stop.load(Ordering::SeqCst) {
            let outcome = buffer.try_write(pending);
            produced += outcome.written as u64;
            pending = &pending[outcome.written..];
            if outcome.full {
                shared.full_events.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConfig;
    use async_trait::async_trait;
    use futures::FutureExt;

    fn pattern_source(id: &str, pattern: &str, chunk_size: usize) -> Arc<dyn ByteSource> {
        Arc::new(PatternSource::new(PatternConfig {
            id: id.to_string(),
            pattern: pattern.to_string(),
            chunk_size,
            enabled: true,
        }))
    }

    struct BrokenSource;

    #[async_trait]
    impl ByteSource for BrokenSource {
        fn id(&self) -> &str {
            "broken"
        }

        async fn next_chunk(&self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[tokio::test]
    async fn test_single_source_preserves_order() {
        let pump = Pump::new(
            Arc::new(RingBuffer::new(16)),
            vec![pattern_source("abcd", "abcd", 7)],
            5,
            1000,
        );

        let mut out = Vec::new();
        let stats = pump.run_with(|c| out.extend_from_slice(c)).await.unwrap();

        assert_eq!(stats.consumed, 1000);
        assert_eq!(out, "abcd".repeat(250).into_bytes());
        // Whatever was produced but not consumed is still buffered
        assert_eq!(stats.produced, stats.consumed + pump.buffer().length() as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_multiple_sources() {
        let pump = Pump::new(
            Arc::new(RingBuffer::new(32)),
            vec![
                pattern_source("a", "a", 9),
                pattern_source("b", "b", 13),
                pattern_source("c", "c", 3),
            ],
            8,
            10_000,
        );

        let mut out = Vec::new();
        let stats = pump.run_with(|c| out.extend_from_slice(c)).await.unwrap();

        assert_eq!(stats.consumed, 10_000);
        assert!(out.iter().all(|b| matches!(b, b'a' | b'b' | b'c')));
        assert_eq!(stats.per_source.len(), 3);
        assert_eq!(stats.produced, stats.consumed + pump.buffer().length() as u64);
    }

    #[tokio::test]
    async fn test_no_sources_stops() {
        let pump = Pump::new(Arc::new(RingBuffer::new(8)), Vec::new(), 4, 100);
        let stats = pump.run().await.unwrap();
        assert_eq!(stats.consumed, 0);
        assert_eq!(stats.produced, 0);
    }

    #[tokio::test]
    async fn test_zero_budget() {
        let pump = Pump::new(
            Arc::new(RingBuffer::new(8)),
            vec![pattern_source("x", "x", 4)],
            4,
            0,
        );
        let stats = pump.run().await.unwrap();
        assert_eq!(stats.consumed, 0);
    }

    #[tokio::test]
    async fn test_source_error_is_reported() {
        let pump = Pump::new(Arc::new(RingBuffer::new(8)), vec![Arc::new(BrokenSource) as Arc<dyn ByteSource>], 4, 100);
        let err = pump.run().await.unwrap_err();
        assert!(err.to_string().contains("device gone"));
    }

    #[tokio::test]
    async fn test_abandoned_run_releases_producers() {
        let source = pattern_source("x", "x", 4);
        let pump = Pump::new(Arc::new(RingBuffer::new(8)), vec![Arc::clone(&source)], 4, 100);

        // First poll spawns the producer, finds the buffer empty and yields;
        // the run is then dropped mid-flight.
        assert!(pump.run().now_or_never().is_none());

        for _ in 0..100 {
            if Arc::strong_count(&source) == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        // Only `source` and the pump itself still hold the source
        assert_eq!(Arc::strong_count(&source), 2);
    }

    #[test]
    fn test_stop_raised_on_every_exit() {
        let shared = Arc::new(Shared::default());
        let early_exit = |shared: &Arc<Shared>| -> Result<(), Error> {
            let _stop = StopOnDrop(Arc::clone(shared));
            Err(Error::Full)
        };
        assert!(early_exit(&shared).is_err());
        assert!(shared.stop.load(Ordering::SeqCst));
    }
}
