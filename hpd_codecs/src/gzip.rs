use std::io::{self, Read};

use flate2::{Crc, Decompress, FlushDecompress, Status};
use log::{debug, trace};

use hpd_core::{Codec, FrameError, Recycle, Retarget};

const ID1: u8 = 0x1f;
const ID2: u8 = 0x8b;
const CM_DEFLATE: u8 = 8;

// ── Header flags (RFC 1952 §2.3.1) ─────────────────────────────────────────

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const FRESERVED: u8 = 0xe0;

/// Fixed part of a member header: magic, CM, FLG, MTIME, XFL, OS.
const FIXED_HEADER_LEN: usize = 10;
/// CRC32 + ISIZE.
const TRAILER_LEN: usize = 8;

/// Reusable gzip decoding state.
///
/// Holds the raw-DEFLATE inflater (and its 32 KiB window) plus the running
/// CRC32. Both survive [`reset`](Retarget::reset); only their counters are
/// rewound. Member framing (header, trailer, multistream) is handled by
/// [`GzipReader`].
pub struct GzipState {
    inflate: Decompress,
    crc: Crc,
}

impl GzipState {
    pub fn new() -> Self {
        Self {
            inflate: Decompress::new(false),
            crc: Crc::new(),
        }
    }

    fn rewind(&mut self) {
        self.inflate.reset(false);
        self.crc.reset();
    }
}

impl Default for GzipState {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for GzipState {
    fn recycle(&mut self) {
        self.rewind();
    }
}

impl Retarget for GzipState {
    type Reader<'a> = GzipReader<'a>;

    const CODEC: Codec = Codec::Gzip;

    fn create() -> Self {
        Self::new()
    }

    /// Rewind the inflater and parse the first member header of `src`.
    ///
    /// Fails with [`FrameError::InvalidHeader`] (or `UnexpectedEof` for a
    /// truncated header) before any byte is decoded.
    fn reset<'a>(&'a mut self, src: &'a [u8]) -> io::Result<GzipReader<'a>> {
        self.rewind();
        let header_len = parse_header(src)?;
        trace!("gzip: reset over {} bytes, header {} bytes", src.len(), header_len);
        Ok(GzipReader {
            state: self,
            src,
            pos: header_len,
            members: 1,
            done: false,
        })
    }
}

/// Streaming gzip reader bound to one source.
pub struct GzipReader<'a> {
    state: &'a mut GzipState,
    src: &'a [u8],
    /// Offset of the next unread byte of `src`.
    pos: usize,
    members: usize,
    done: bool,
}

impl GzipReader<'_> {
    /// Members decoded or in progress so far.
    pub fn members(&self) -> usize {
        self.members
    }

    /// Verify the trailer of the member that just ended and move on to the
    /// next member, if any.
    fn finish_member(&mut self) -> io::Result<()> {
        let trailer = self
            .src
            .get(self.pos..self.pos + TRAILER_LEN)
            .ok_or_else(|| eof("truncated gzip trailer"))?;
        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expected_len = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        self.pos += TRAILER_LEN;

        let actual_crc = self.state.crc.sum();
        if actual_crc != expected_crc {
            return Err(FrameError::ContentChecksum {
                expected: expected_crc,
                actual: actual_crc,
            }
            .into());
        }
        let actual_len = self.state.crc.amount();
        if actual_len != expected_len {
            return Err(FrameError::ContentLength {
                expected: expected_len as u64,
                actual: actual_len as u64,
            }
            .into());
        }

        if self.pos == self.src.len() {
            self.done = true;
            return Ok(());
        }

        // Concatenated member.
        let header_len = parse_header(&self.src[self.pos..])?;
        self.pos += header_len;
        self.state.rewind();
        self.members += 1;
        trace!("gzip: starting member #{}", self.members);
        Ok(())
    }
}

impl Read for GzipReader<'_> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() || self.done {
            return Ok(0);
        }
        loop {
            let input = &self.src[self.pos..];
            let in_before = self.state.inflate.total_in();
            let out_before = self.state.inflate.total_out();
            let status = self
                .state
                .inflate
                .decompress(input, dst, FlushDecompress::None)
                .map_err(|e| {
                    debug!("gzip: inflate failed at offset {}: {}", self.pos, e);
                    io::Error::new(io::ErrorKind::InvalidData, e)
                })?;
            let consumed = (self.state.inflate.total_in() - in_before) as usize;
            let produced = (self.state.inflate.total_out() - out_before) as usize;
            self.pos += consumed;
            self.state.crc.update(&dst[..produced]);

            match status {
                Status::StreamEnd => {
                    self.finish_member()?;
                    if produced > 0 || self.done {
                        return Ok(produced);
                    }
                }
                Status::Ok | Status::BufError => {
                    if produced > 0 {
                        return Ok(produced);
                    }
                    if consumed == 0 {
                        return Err(if self.pos >= self.src.len() {
                            eof("truncated deflate stream")
                        } else {
                            FrameError::Corrupt("inflate made no progress".into()).into()
                        });
                    }
                }
            }
        }
    }
}

/// Parse one member header at the start of `src` and return its length.
fn parse_header(src: &[u8]) -> io::Result<usize> {
    if src.len() < FIXED_HEADER_LEN {
        return Err(eof("truncated gzip header"));
    }
    if src[0] != ID1 || src[1] != ID2 {
        return Err(FrameError::InvalidHeader("bad gzip magic").into());
    }
    if src[2] != CM_DEFLATE {
        return Err(FrameError::InvalidHeader("unsupported compression method").into());
    }
    let flags = src[3];
    if flags & FRESERVED != 0 {
        return Err(FrameError::InvalidHeader("reserved flag bits set").into());
    }

    let mut pos = FIXED_HEADER_LEN;
    if flags & FEXTRA != 0 {
        let xlen = src
            .get(pos..pos + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| eof("truncated gzip extra field"))?;
        pos += 2 + xlen;
        if pos > src.len() {
            return Err(eof("truncated gzip extra field"));
        }
    }
    if flags & FNAME != 0 {
        pos = skip_cstr(src, pos).ok_or_else(|| eof("unterminated gzip file name"))?;
    }
    if flags & FCOMMENT != 0 {
        pos = skip_cstr(src, pos).ok_or_else(|| eof("unterminated gzip comment"))?;
    }
    if flags & FHCRC != 0 {
        let stored = src
            .get(pos..pos + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(|| eof("truncated gzip header crc"))?;
        let mut crc = Crc::new();
        crc.update(&src[..pos]);
        let actual = (crc.sum() & 0xffff) as u16;
        if actual != stored {
            return Err(FrameError::HeaderChecksum {
                expected: stored as u32,
                actual: actual as u32,
            }
            .into());
        }
        pos += 2;
    }
    Ok(pos)
}

/// Offset just past the NUL terminating the string at `from`.
fn skip_cstr(src: &[u8], from: usize) -> Option<usize> {
    src.get(from..)?
        .iter()
        .position(|&b| b == 0)
        .map(|nul| from + nul + 1)
}

fn eof(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, msg)
}
