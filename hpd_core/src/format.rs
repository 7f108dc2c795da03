use std::fmt;

use crate::error::DecompressError;

// ── Codec tags ─────────────────────────────────────────────────────────────
//
// The tag is chosen by the producer and carried out-of-band next to the
// payload. It is never read from the compressed bytes themselves.

pub const CODEC_NONE: u8 = 0;
pub const CODEC_GZIP: u8 = 1;
pub const CODEC_LZ4: u8 = 2;

/// Compression applied to a payload, decoded from its one-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Codec {
    /// Payload is stored verbatim; decoding is a zero-copy passthrough.
    None = CODEC_NONE,
    /// RFC 1952 gzip, one or more members.
    Gzip = CODEC_GZIP,
    /// LZ4 frame format, one or more frames.
    Lz4 = CODEC_LZ4,
}

impl Codec {
    /// The on-the-wire tag byte.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Human-readable codec name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Gzip => "gzip",
            Codec::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Codec {
    type Error = DecompressError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        codec_by_id(tag)
    }
}

/// Resolve a codec from its tag byte.
///
/// Any tag outside {0, 1, 2} is rejected here, before a pool or buffer is
/// touched.
pub fn codec_by_id(id: u8) -> Result<Codec, DecompressError> {
    match id {
        CODEC_NONE => Ok(Codec::None),
        CODEC_GZIP => Ok(Codec::Gzip),
        CODEC_LZ4 => Ok(Codec::Lz4),
        other => Err(DecompressError::UnsupportedCodec(other)),
    }
}
