mod gzip;
mod lz4;

pub use gzip::{GzipReader, GzipState};
pub use lz4::{Lz4Reader, Lz4State};
