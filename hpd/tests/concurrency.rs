/// Many threads sharing one decompressor: results must round-trip and the
/// number of readers and buffers must follow thread count, not call count.
mod common;

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use hpd::{Decompressor, DecompressorConfig, Strategy, CODEC_GZIP, CODEC_LZ4};

use common::{encode, init_logging, pseudo_random_bytes, ORDER_JSON};

const THREADS: usize = 64;
const CALLS_PER_THREAD: usize = 10_000;

/// A payload unique to thread `i`, and its encoding under `tag`.
fn thread_payload(i: usize) -> Result<(u8, Vec<u8>, Vec<u8>)> {
    let tag = if i % 2 == 0 { CODEC_LZ4 } else { CODEC_GZIP };
    let mut raw = format!("thread-{i}:").into_bytes();
    raw.extend_from_slice(&pseudo_random_bytes(64 + i * 8, i as u64));
    raw.extend_from_slice(ORDER_JSON.as_bytes());
    let src = encode(&raw, tag)?;
    Ok((tag, raw, src))
}

#[test]
fn test_parallel_pooled_round_trip() -> Result<()> {
    init_logging();
    let d = Decompressor::new();
    let payloads = (0..THREADS).map(thread_payload).collect::<Result<Vec<_>>>()?;

    thread::scope(|s| {
        for (tag, raw, src) in &payloads {
            let d = &d;
            s.spawn(move || {
                for _ in 0..CALLS_PER_THREAD {
                    let out = d.decompress_pooled(src, *tag).unwrap();
                    assert_eq!(out.as_ref(), raw.as_slice());
                }
            });
        }
    });

    let stats = d.stats();
    assert!(stats.lz4_readers.created <= THREADS / 2, "{stats:?}");
    assert!(stats.gzip_readers.created <= THREADS / 2, "{stats:?}");
    assert!(stats.buffers.created <= THREADS, "{stats:?}");
    let calls = THREADS * CALLS_PER_THREAD;
    assert_eq!(
        stats.buffers.created + stats.buffers.reused,
        calls,
        "every call leased exactly one buffer"
    );
    Ok(())
}

#[test]
fn test_parallel_mixed_strategies_through_arc() -> Result<()> {
    let d = Arc::new(Decompressor::with_config(
        DecompressorConfig::builder()
            .max_idle_readers(4)
            .max_idle_buffers(4)
            .external_pool_slots(4)
            .build(),
    ));
    let payloads = Arc::new((0..8).map(thread_payload).collect::<Result<Vec<_>>>()?);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let d = Arc::clone(&d);
            let payloads = Arc::clone(&payloads);
            thread::spawn(move || {
                for n in 0..500 {
                    let (tag, raw, src) = &payloads[(t + n) % payloads.len()];
                    let strategy = Strategy::ALL[n % Strategy::ALL.len()];
                    let out = d.decompress_with(src, *tag, strategy).unwrap();
                    assert_eq!(out.as_ref(), raw.as_slice(), "{strategy:?}");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked");
    }

    // Small free lists: surplus items were dropped, never handed out twice.
    let stats = d.stats();
    assert!(stats.lz4_readers.idle <= 4);
    assert!(stats.gzip_readers.idle <= 4);
    assert!(stats.buffers.idle <= 4);
    assert!(stats.external_buffers.idle <= 4);
    Ok(())
}
