use std::borrow::Cow;
use std::io::{self, Read};

use bytes::BufMut;
use log::{debug, trace};

use hpd_codecs::{GzipState, Lz4State};
use hpd_core::{codec_by_id, Codec, DecompressError, OutputBuffer, Pool, PoolCounters, Result, Retarget};

use crate::config::DecompressorConfig;
use crate::external::ExternalPool;

/// How a `&self` call marshals decompressed bytes.
///
/// Every variant returns an owned result that is independent of the
/// decompressor. The shared in-place strategies need `&mut self` and have
/// their own methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Accumulate into a buffer allocated for this call and hand it over.
    Fresh,
    /// Accumulate into a pooled [`OutputBuffer`], return a copy.
    Pooled,
    /// Accumulate into a `BytesMut` from the lock-free external pool, return a copy.
    ExternalPool,
    /// Append into a pooled `Vec<u8>`, return a copy.
    AppendSlice,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Fresh,
        Strategy::Pooled,
        Strategy::ExternalPool,
        Strategy::AppendSlice,
    ];
}

/// Counters for every pool owned by a [`Decompressor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub gzip_readers: PoolCounters,
    pub lz4_readers: PoolCounters,
    pub buffers: PoolCounters,
    pub external_buffers: PoolCounters,
    pub append_slices: PoolCounters,
}

/// Per-codec pools of re-targetable reader state.
struct ReaderPools {
    gzip: Pool<GzipState>,
    lz4: Pool<Lz4State>,
}

impl ReaderPools {
    fn new(config: &DecompressorConfig) -> Self {
        Self {
            gzip: Pool::new("gzip", config.max_idle_readers, usize::MAX, GzipState::create),
            lz4: Pool::new("lz4", config.max_idle_readers, usize::MAX, Lz4State::create),
        }
    }

    /// Lease a reader for `codec`, reset it over `src`, and hand it to `sink`.
    ///
    /// The lease is returned to its pool on every exit path.
    fn drain<T>(
        &self,
        codec: Codec,
        src: &[u8],
        sink: impl FnOnce(&mut dyn Read) -> io::Result<T>,
    ) -> Result<T> {
        match codec {
            Codec::Gzip => lease_and_drain(&self.gzip, src, sink),
            Codec::Lz4 => lease_and_drain(&self.lz4, src, sink),
            Codec::None => {
                let mut passthrough = src;
                sink(&mut passthrough).map_err(|e| DecompressError::codec(Codec::None, e))
            }
        }
    }
}

fn lease_and_drain<S: Retarget, T>(
    pool: &Pool<S>,
    src: &[u8],
    sink: impl FnOnce(&mut dyn Read) -> io::Result<T>,
) -> Result<T> {
    let mut state = pool.get();
    let result = state.reset(src).and_then(|mut reader| sink(&mut reader));
    result.map_err(|e| {
        debug!("{}: decompression of {} bytes failed: {}", S::CODEC, src.len(), e);
        DecompressError::codec(S::CODEC, e)
    })
}

/// Resolve `tag`; `None` means the payload is passed through untouched.
fn streaming_codec(tag: u8) -> Result<Option<Codec>> {
    match codec_by_id(tag)? {
        Codec::None => Ok(None),
        codec => Ok(Some(codec)),
    }
}

/// Decompression façade that reuses codec readers and output buffers.
///
/// # Strategies
///
/// | method | result backed by | valid until |
/// |---|---|---|
/// | [`decompress`](Self::decompress) | a buffer allocated for the call | caller owns it |
/// | [`decompress_shared`](Self::decompress_shared) | the decompressor's shared buffer | next `&mut` use of the decompressor |
/// | [`decompress_shared_copy`](Self::decompress_shared_copy) | exact-size copy of the shared buffer | caller owns it |
/// | [`decompress_pooled`](Self::decompress_pooled) | copy of a pooled [`OutputBuffer`] | caller owns it |
/// | [`decompress_external_pool`](Self::decompress_external_pool) | copy of a pooled `BytesMut` | caller owns it |
/// | [`decompress_append_slice`](Self::decompress_append_slice) | copy of a pooled `Vec<u8>` | caller owns it |
///
/// For codec tag `NONE` every method returns `src` itself: no copy, no
/// allocation. Callers that need ownership call `into_owned()`.
///
/// # Concurrency
///
/// All `&self` methods may be called from many threads at once; each call
/// leases its own reader and accumulator. The shared-buffer methods take
/// `&mut self`, so a returned slice cannot outlive the next call and the
/// shared buffer is never touched by two threads at once. Concurrent
/// pipelines use one of the pooled strategies instead.
pub struct Decompressor {
    config: DecompressorConfig,
    readers: ReaderPools,
    shared: OutputBuffer,
    buffers: Pool<OutputBuffer>,
    external: ExternalPool,
    slices: Pool<Vec<u8>>,
}

impl Decompressor {
    pub fn new() -> Self {
        Self::with_config(DecompressorConfig::default())
    }

    pub fn with_config(config: DecompressorConfig) -> Self {
        let capacity = config.initial_buffer_capacity;
        Self {
            readers: ReaderPools::new(&config),
            shared: OutputBuffer::new(),
            buffers: Pool::new(
                "output-buffer",
                config.max_idle_buffers,
                config.max_retained_capacity,
                move || OutputBuffer::with_capacity(capacity),
            ),
            external: ExternalPool::new(
                config.external_pool_slots,
                capacity,
                config.max_retained_capacity,
            ),
            slices: Pool::new(
                "append-slice",
                config.max_idle_buffers,
                config.max_retained_capacity,
                move || Vec::with_capacity(capacity),
            ),
            config,
        }
    }

    pub fn config(&self) -> &DecompressorConfig {
        &self.config
    }

    /// Decompress `src` into a buffer allocated for this call.
    ///
    /// The result is independent of the decompressor and safe to keep or
    /// send anywhere. For `NONE` the result borrows `src`.
    pub fn decompress<'a>(&self, src: &'a [u8], tag: u8) -> Result<Cow<'a, [u8]>> {
        let Some(codec) = streaming_codec(tag)? else {
            return Ok(Cow::Borrowed(src));
        };
        trace!("{codec}: fresh-buffer decompress of {} bytes", src.len());
        let out = self.readers.drain(codec, src, |reader| {
            let mut out = Vec::new();
            reader.read_to_end(&mut out)?;
            Ok(out)
        })?;
        Ok(Cow::Owned(out))
    }

    /// Decompress `src` into the decompressor's single reusable buffer and
    /// return a view of it.
    ///
    /// No allocation happens once the buffer has grown to the working size.
    /// The returned slice is overwritten by the next shared call; the borrow
    /// checker enforces that it is consumed before then. On error the buffer
    /// is emptied and nothing is returned.
    pub fn decompress_shared<'a>(&'a mut self, src: &'a [u8], tag: u8) -> Result<&'a [u8]> {
        let Some(codec) = streaming_codec(tag)? else {
            return Ok(src);
        };
        trace!("{codec}: shared in-place decompress of {} bytes", src.len());
        let shared = &mut self.shared;
        shared.reset();
        if let Err(e) = self.readers.drain(codec, src, |reader| shared.read_from(reader)) {
            shared.reset();
            return Err(e);
        }
        Ok(self.shared.as_slice())
    }

    /// Like [`decompress_shared`](Self::decompress_shared), but return an
    /// exact-size copy so the shared buffer is free again on return.
    pub fn decompress_shared_copy<'a>(&mut self, src: &'a [u8], tag: u8) -> Result<Cow<'a, [u8]>> {
        if streaming_codec(tag)?.is_none() {
            return Ok(Cow::Borrowed(src));
        }
        let view = self.decompress_shared(src, tag)?;
        Ok(Cow::Owned(view.to_vec()))
    }

    /// Decompress into a pooled [`OutputBuffer`] and return a copy.
    pub fn decompress_pooled<'a>(&self, src: &'a [u8], tag: u8) -> Result<Cow<'a, [u8]>> {
        let Some(codec) = streaming_codec(tag)? else {
            return Ok(Cow::Borrowed(src));
        };
        trace!("{codec}: pooled decompress of {} bytes", src.len());
        let mut buf = self.buffers.get();
        self.readers.drain(codec, src, |reader| buf.read_from(reader))?;
        Ok(Cow::Owned(buf.as_slice().to_vec()))
    }

    /// Decompress into a `BytesMut` leased from the lock-free external pool
    /// and return a copy.
    pub fn decompress_external_pool<'a>(&self, src: &'a [u8], tag: u8) -> Result<Cow<'a, [u8]>> {
        let Some(codec) = streaming_codec(tag)? else {
            return Ok(Cow::Borrowed(src));
        };
        trace!("{codec}: external-pool decompress of {} bytes", src.len());
        let mut buf = self.external.get();
        self.readers.drain(codec, src, |reader| {
            io::copy(reader, &mut (&mut *buf).writer())
        })?;
        Ok(Cow::Owned(buf.to_vec()))
    }

    /// Append into a pooled `Vec<u8>` and return a copy.
    pub fn decompress_append_slice<'a>(&self, src: &'a [u8], tag: u8) -> Result<Cow<'a, [u8]>> {
        let Some(codec) = streaming_codec(tag)? else {
            return Ok(Cow::Borrowed(src));
        };
        trace!("{codec}: append-slice decompress of {} bytes", src.len());
        let mut slice = self.slices.get();
        self.readers.drain(codec, src, |reader| reader.read_to_end(&mut slice))?;
        Ok(Cow::Owned(slice.to_vec()))
    }

    /// Run one of the `&self` strategies chosen at runtime.
    pub fn decompress_with<'a>(
        &self,
        src: &'a [u8],
        tag: u8,
        strategy: Strategy,
    ) -> Result<Cow<'a, [u8]>> {
        match strategy {
            Strategy::Fresh => self.decompress(src, tag),
            Strategy::Pooled => self.decompress_pooled(src, tag),
            Strategy::ExternalPool => self.decompress_external_pool(src, tag),
            Strategy::AppendSlice => self.decompress_append_slice(src, tag),
        }
    }

    /// Snapshot of every pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            gzip_readers: self.readers.gzip.counters(),
            lz4_readers: self.readers.lz4.counters(),
            buffers: self.buffers.counters(),
            external_buffers: self.external.counters(),
            append_slices: self.slices.counters(),
        }
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lz4(data: &[u8]) -> Vec<u8> {
        let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_decompressor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Decompressor>();
    }

    #[test]
    fn test_streaming_codec_routes_tags() {
        assert_eq!(streaming_codec(0).unwrap(), None);
        assert_eq!(streaming_codec(1).unwrap(), Some(Codec::Gzip));
        assert_eq!(streaming_codec(2).unwrap(), Some(Codec::Lz4));
        assert!(matches!(
            streaming_codec(9),
            Err(DecompressError::UnsupportedCodec(9))
        ));
    }

    #[test]
    fn test_shared_buffer_cleared_after_error() {
        let mut d = Decompressor::new();
        let good = lz4(b"first payload");
        assert_eq!(d.decompress_shared(&good, 2).unwrap(), b"first payload");
        assert!(d.decompress_shared(b"garbage", 2).is_err());
        assert!(d.shared.is_empty());
        assert_eq!(d.decompress_shared(&good, 2).unwrap(), b"first payload");
    }

    #[test]
    fn test_pooled_buffer_returned_on_error() {
        let d = Decompressor::new();
        let mut src = lz4(&b"x".repeat(10_000));
        src.truncate(src.len() - 3);
        for strategy in Strategy::ALL {
            assert!(d.decompress_with(&src, 2, strategy).is_err(), "{strategy:?}");
        }
        let stats = d.stats();
        assert_eq!(stats.buffers.idle, 1);
        assert_eq!(stats.external_buffers.idle, 1);
        assert_eq!(stats.append_slices.idle, 1);
        assert_eq!(stats.lz4_readers.idle, 1);
    }
}
