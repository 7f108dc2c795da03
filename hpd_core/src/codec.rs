use std::io::{self, Read};

use crate::format::Codec;
use crate::pool::Recycle;

/// Reusable codec-reader state that can be re-targeted at a new source.
///
/// Each implementation:
/// - Owns the expensive parts of a decoder (inflate window, block buffers,
///   dictionary history) and keeps them across calls.
/// - Binds to a source only through [`reset`](Retarget::reset), which returns
///   a reader borrowing both the state and `src`. Once that reader is dropped
///   the state holds no reference to `src`, so it can go back to a pool.
/// - After a successful `reset` behaves exactly like a freshly constructed
///   decoder apart from the retained buffers.
pub trait Retarget: Recycle + Send + 'static {
    /// Streaming reader over one source.
    type Reader<'a>: Read
    where
        Self: 'a;

    /// The codec this state decodes.
    const CODEC: Codec;

    /// Construct an idle state with no source attached.
    fn create() -> Self;

    /// Re-initialise the state over `src`.
    ///
    /// May fail for codecs that parse a header eagerly (gzip). On failure the
    /// state is still idle and safe to return to its pool.
    fn reset<'a>(&'a mut self, src: &'a [u8]) -> io::Result<Self::Reader<'a>>;
}
