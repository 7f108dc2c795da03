use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use log::{debug, trace};

use hpd_core::PoolCounters;

/// Lock-free pool of `BytesMut` accumulators backed by a fixed-size
/// `crossbeam` queue.
///
/// Gets never block: an empty queue means a new buffer is allocated. Puts
/// never block either: a full queue means the returned buffer is dropped.
pub struct ExternalPool {
    queue: ArrayQueue<BytesMut>,
    initial_capacity: usize,
    max_retained: usize,
    created: AtomicUsize,
    reused: AtomicUsize,
    discarded: AtomicUsize,
}

impl ExternalPool {
    pub fn new(slots: usize, initial_capacity: usize, max_retained: usize) -> Self {
        Self {
            queue: ArrayQueue::new(slots.max(1)),
            initial_capacity,
            max_retained,
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> ExternalLease<'_> {
        let buf = match self.queue.pop() {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!("external pool: empty, allocating {} bytes", self.initial_capacity);
                BytesMut::with_capacity(self.initial_capacity)
            }
        };
        ExternalLease {
            pool: self,
            buf: Some(buf),
        }
    }

    fn put(&self, mut buf: BytesMut) {
        buf.clear();
        if buf.capacity() > self.max_retained || self.queue.push(buf).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("external pool: dropping returned buffer");
        }
    }

    pub fn counters(&self) -> PoolCounters {
        PoolCounters {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.queue.len(),
        }
    }
}

/// A `BytesMut` borrowed from an [`ExternalPool`]; cleared and pushed back
/// on drop.
pub struct ExternalLease<'p> {
    pool: &'p ExternalPool,
    buf: Option<BytesMut>,
}

impl Deref for ExternalLease<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        match &self.buf {
            Some(buf) => buf,
            None => unreachable!("external lease accessed after release"),
        }
    }
}

impl DerefMut for ExternalLease<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        match &mut self.buf {
            Some(buf) => buf,
            None => unreachable!("external lease accessed after release"),
        }
    }
}

impl Drop for ExternalLease<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_come_back_cleared() {
        let pool = ExternalPool::new(2, 128, 1 << 20);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(b"leftover");
        }
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 128);
        assert_eq!(pool.counters().created, 1);
        assert_eq!(pool.counters().reused, 1);
    }

    #[test]
    fn test_full_queue_drops_surplus() {
        let pool = ExternalPool::new(1, 16, 1 << 20);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        let c = pool.counters();
        assert_eq!(c.idle, 1);
        assert_eq!(c.discarded, 1);
    }

    #[test]
    fn test_oversized_buffer_not_retained() {
        let pool = ExternalPool::new(4, 16, 1024);
        {
            let mut buf = pool.get();
            buf.extend_from_slice(&[0u8; 4096]);
        }
        assert_eq!(pool.counters().idle, 0);
        assert_eq!(pool.counters().discarded, 1);
    }
}
