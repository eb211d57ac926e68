//! Ring buffer throughput benchmarks
//!
//! Moves 512 byte blocks through a 1 KiB buffer, either on one thread or
//! against a background reader/writer contending for the same lock.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ringbuffer::RingBuffer;
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const CAPACITY: usize = 1024;
const BLOCK: usize = 512;

/// Write all of `data`, retrying while the buffer is full.
fn write_block(rb: &RingBuffer, data: &[u8]) {
    let mut pending = data;
    while !pending.is_empty() {
        let outcome = rb.try_write(pending);
        pending = &pending[outcome.written..];
        if outcome.written == 0 {
            thread::yield_now();
        }
    }
}

/// Fill `buf` completely, retrying while the buffer is empty.
fn read_block(rb: &RingBuffer, buf: &mut [u8]) {
    let mut filled = 0;
    while filled < buf.len() {
        match rb.read(&mut buf[filled..]) {
            Ok(n) => filled += n,
            Err(_) => thread::yield_now(),
        }
    }
}

fn sync_benchmark(c: &mut Criterion) {
    let rb = RingBuffer::new(CAPACITY);
    let data = vec![b'a'; BLOCK];
    let mut buf = vec![0u8; BLOCK];

    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Bytes(BLOCK as u64));
    group.bench_function("sync", |b| {
        b.iter(|| {
            rb.write(black_box(&data)).unwrap();
            rb.read(black_box(&mut buf)).unwrap();
        })
    });
    group.finish();
}

fn async_read_benchmark(c: &mut Criterion) {
    let rb = Arc::new(RingBuffer::new(CAPACITY));
    let stop = Arc::new(AtomicBool::new(false));
    let data = vec![b'a'; BLOCK];

    let reader = {
        let rb = Arc::clone(&rb);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut buf = vec![0u8; BLOCK];
            while !stop.load(Ordering::Relaxed) {
                let _ = rb.read(&mut buf);
            }
        })
    };

    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Bytes(BLOCK as u64));
    group.bench_function("async_read", |b| b.iter(|| write_block(&rb, black_box(&data))));
    group.finish();

    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();
}

fn async_write_benchmark(c: &mut Criterion) {
    let rb = Arc::new(RingBuffer::new(CAPACITY));
    let stop = Arc::new(AtomicBool::new(false));
    let mut buf = vec![0u8; BLOCK];

    let writer = {
        let rb = Arc::clone(&rb);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let data = vec![b'a'; BLOCK];
            while !stop.load(Ordering::Relaxed) {
                let _ = rb.write(&data);
            }
        })
    };

    let mut group = c.benchmark_group("ring_buffer");
    group.throughput(Throughput::Bytes(BLOCK as u64));
    group.bench_function("async_write", |b| b.iter(|| read_block(&rb, black_box(&mut buf))));
    group.finish();

    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();
}

criterion_group!(benches, sync_benchmark, async_read_benchmark, async_write_benchmark);
criterion_main!(benches);
