//! Hot-path decompression: a codec-tag dispatcher over pooled, re-targetable
//! gzip and LZ4 readers, with a menu of output-buffer strategies that trade
//! allocation count against aliasing.
//!
//! ```no_run
//! use hpd::{Decompressor, CODEC_LZ4};
//!
//! # fn payload() -> Vec<u8> { Vec::new() }
//! let d = Decompressor::new();
//! let src = payload();
//! let raw = d.decompress_pooled(&src, CODEC_LZ4)?;
//! # Ok::<(), hpd::DecompressError>(())
//! ```

pub mod config;
mod decompressor;
mod external;

pub use config::{DecompressorConfig, DecompressorConfigBuilder};
pub use decompressor::{Decompressor, PoolStats, Strategy};
pub use external::{ExternalLease, ExternalPool};
pub use hpd_core::{
    codec_by_id, Codec, DecompressError, FrameError, PoolCounters, Result, CODEC_GZIP, CODEC_LZ4,
    CODEC_NONE,
};
