//! Thread-safe free-list pools with scoped leases.
//!
//! A [`Pool`] hands out [`Lease`]s. A lease owns its item exclusively until
//! it is dropped, at which point the item is recycled and pushed back onto the
//! free list. Dropping happens on every exit path, including early returns
//! through `?` and unwinding panics, so callers never release by hand.
//!
//! Pools are unbounded in how many items they can create but bounded in how
//! many idle items they keep. Surplus items are simply dropped, so the number
//! of live items follows peak concurrent demand rather than call count.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

/// Items that can be cleared for reuse by the next lessee.
pub trait Recycle {
    /// Drop per-use state (length, cursors, counters) while keeping the
    /// allocations.
    fn recycle(&mut self);

    /// Heap bytes this item keeps alive. Pools refuse to keep items whose
    /// retained size exceeds their limit.
    fn retained_bytes(&self) -> usize {
        0
    }
}

impl Recycle for Vec<u8> {
    fn recycle(&mut self) {
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.capacity()
    }
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounters {
    /// Items constructed by the factory since the pool was created.
    pub created: usize,
    /// Leases served from the free list.
    pub reused: usize,
    /// Returned items dropped because the free list was full or the item
    /// grew past the retention limit.
    pub discarded: usize,
    /// Items currently sitting on the free list.
    pub idle: usize,
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A thread-safe pool of reusable `T`.
pub struct Pool<T: Recycle> {
    name: &'static str,
    free: Mutex<Vec<T>>,
    factory: Factory<T>,
    max_idle: usize,
    max_retained_bytes: usize,
    created: AtomicUsize,
    reused: AtomicUsize,
    discarded: AtomicUsize,
}

impl<T: Recycle> Pool<T> {
    /// Create an empty pool. Items are built lazily by `factory`.
    ///
    /// `max_idle` caps the free list; `max_retained_bytes` caps the size of
    /// any single item the pool is willing to keep.
    pub fn new(
        name: &'static str,
        max_idle: usize,
        max_retained_bytes: usize,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            free: Mutex::new(Vec::with_capacity(max_idle)),
            factory: Box::new(factory),
            max_idle,
            max_retained_bytes,
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
        }
    }

    /// Lease an item, reusing an idle one when available.
    pub fn get(&self) -> Lease<'_, T> {
        let idle = self.free.lock().pop();
        let item = match idle {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                trace!("{} pool: reusing idle item", self.name);
                item
            }
            None => {
                let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("{} pool: empty, constructing item #{}", self.name, n);
                (self.factory)()
            }
        };
        Lease {
            pool: self,
            item: Some(item),
        }
    }

    /// Return an item to the free list, or drop it if the pool is full.
    fn put(&self, mut item: T) {
        item.recycle();
        if item.retained_bytes() > self.max_retained_bytes {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(
                "{} pool: dropping item retaining {} bytes (limit {})",
                self.name,
                item.retained_bytes(),
                self.max_retained_bytes
            );
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(item);
            trace!("{} pool: item returned, {} idle", self.name, free.len());
        } else {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("{} pool: free list full, dropping item", self.name);
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn counters(&self) -> PoolCounters {
        PoolCounters {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.free.lock().len(),
        }
    }
}

impl<T: Recycle> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("max_idle", &self.max_idle)
            .field("max_retained_bytes", &self.max_retained_bytes)
            .field("counters", &self.counters())
            .finish()
    }
}

/// Exclusive possession of a pooled item; returns it to the pool on drop.
pub struct Lease<'p, T: Recycle> {
    pool: &'p Pool<T>,
    item: Option<T>,
}

impl<T: Recycle> Deref for Lease<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<T: Recycle> DerefMut for Lease<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<T: Recycle> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}
