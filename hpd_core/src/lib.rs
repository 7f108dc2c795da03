pub mod codec;
pub mod error;
pub mod format;
pub mod pool;
pub mod sink;

pub use codec::Retarget;
pub use error::{DecompressError, FrameError};
pub use format::{codec_by_id, Codec, CODEC_GZIP, CODEC_LZ4, CODEC_NONE};
pub use pool::{Lease, Pool, PoolCounters, Recycle};
pub use sink::OutputBuffer;

pub type Result<T> = std::result::Result<T, DecompressError>;
