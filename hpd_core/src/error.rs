use std::io;

use crate::format::Codec;

/// Error returned by every decompression entry point.
#[derive(thiserror::Error, Debug)]
pub enum DecompressError {
    /// The tag byte is not one of the recognised codecs. No I/O was done.
    #[error("unsupported codec tag {0:#04x}")]
    UnsupportedCodec(u8),

    /// The codec reader failed while resetting or reading.
    #[error("{codec} codec error: {source}")]
    Codec {
        codec: Codec,
        #[source]
        source: io::Error,
    },
}

impl DecompressError {
    pub fn codec(codec: Codec, source: io::Error) -> Self {
        DecompressError::Codec { codec, source }
    }

    /// The framing fault behind a codec error, if the reader raised one.
    ///
    /// Returns `None` for unsupported tags and for plain I/O conditions such
    /// as a truncated payload (`io::ErrorKind::UnexpectedEof`).
    pub fn frame_error(&self) -> Option<&FrameError> {
        match self {
            DecompressError::Codec { source, .. } => source
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<FrameError>()),
            DecompressError::UnsupportedCodec(_) => None,
        }
    }
}

/// Violations of the gzip member or LZ4 frame layout.
///
/// Readers raise these inside `io::Error::new(ErrorKind::InvalidData, ..)`
/// so they can flow through `std::io::Read`; use
/// [`DecompressError::frame_error`] to get them back.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("header checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    HeaderChecksum { expected: u32, actual: u32 },

    #[error("block checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    BlockChecksum { expected: u32, actual: u32 },

    #[error("content checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ContentChecksum { expected: u32, actual: u32 },

    #[error("content length mismatch: expected {expected} bytes, got {actual}")]
    ContentLength { expected: u64, actual: u64 },

    #[error("block of {len} bytes exceeds the frame's {max}-byte block size")]
    BlockTooLarge { len: usize, max: usize },

    #[error("corrupt stream: {0}")]
    Corrupt(String),
}

impl From<FrameError> for io::Error {
    fn from(e: FrameError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_message_names_codec() {
        let err = DecompressError::codec(
            Codec::Gzip,
            FrameError::InvalidHeader("bad magic").into(),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("gzip codec error"), "got: {msg}");
        assert!(msg.contains("bad magic"), "got: {msg}");
    }

    #[test]
    fn test_frame_error_round_trips_through_io_error() {
        let err = DecompressError::codec(
            Codec::Lz4,
            FrameError::ContentLength { expected: 10, actual: 4 }.into(),
        );
        assert_eq!(
            err.frame_error(),
            Some(&FrameError::ContentLength { expected: 10, actual: 4 })
        );
    }

    #[test]
    fn test_plain_io_error_has_no_frame_error() {
        let err = DecompressError::codec(
            Codec::Lz4,
            io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"),
        );
        assert!(err.frame_error().is_none());
        assert!(DecompressError::UnsupportedCodec(0xff).frame_error().is_none());
    }

    #[test]
    fn test_unsupported_message() {
        assert_eq!(
            DecompressError::UnsupportedCodec(0xff).to_string(),
            "unsupported codec tag 0xff"
        );
    }
}
