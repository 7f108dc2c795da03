use serde::{Deserialize, Serialize};

/// Default idle items kept per pool.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Default starting capacity of a pooled output buffer: 64 KB.
pub const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default largest buffer a pool keeps after use: 64 MB.
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 64 * 1024 * 1024;

/// Pool sizing for a [`Decompressor`](crate::Decompressor).
///
/// Build with `DecompressorConfig::builder().foo(...).build()`, or
/// deserialize it from a host's own config file: every field is optional and
/// falls back to its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressorConfig {
    /// Idle reader states kept per codec. Readers beyond this are dropped on
    /// return and rebuilt on demand.
    pub max_idle_readers: usize,

    /// Idle accumulators kept by each internal buffer pool.
    pub max_idle_buffers: usize,

    /// Capacity a freshly built pooled accumulator starts with (bytes).
    pub initial_buffer_capacity: usize,

    /// Accumulators that grew past this many bytes are dropped instead of
    /// being returned, so one outsized payload does not pin memory.
    pub max_retained_capacity: usize,

    /// Slots in the lock-free external buffer pool.
    pub external_pool_slots: usize,
}

impl Default for DecompressorConfig {
    fn default() -> Self {
        Self {
            max_idle_readers: DEFAULT_MAX_IDLE,
            max_idle_buffers: DEFAULT_MAX_IDLE,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
            max_retained_capacity: DEFAULT_MAX_RETAINED_CAPACITY,
            external_pool_slots: DEFAULT_MAX_IDLE,
        }
    }
}

impl DecompressorConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> DecompressorConfigBuilder {
        DecompressorConfigBuilder {
            inner: Self::default(),
        }
    }
}

/// Fluent builder for `DecompressorConfig`.
#[derive(Clone, Debug)]
pub struct DecompressorConfigBuilder {
    inner: DecompressorConfig,
}

impl DecompressorConfigBuilder {
    pub fn max_idle_readers(mut self, n: usize) -> Self {
        self.inner.max_idle_readers = n;
        self
    }

    pub fn max_idle_buffers(mut self, n: usize) -> Self {
        self.inner.max_idle_buffers = n;
        self
    }

    pub fn initial_buffer_capacity(mut self, bytes: usize) -> Self {
        self.inner.initial_buffer_capacity = bytes;
        self
    }

    pub fn max_retained_capacity(mut self, bytes: usize) -> Self {
        self.inner.max_retained_capacity = bytes;
        self
    }

    pub fn external_pool_slots(mut self, n: usize) -> Self {
        self.inner.external_pool_slots = n;
        self
    }

    pub fn build(self) -> DecompressorConfig {
        self.inner
    }
}
