use std::io::{self, Read};

use log::{debug, trace};
use lz4_flex::block::{decompress_into, decompress_into_with_dict};
use xxhash_rust::xxh32::{xxh32, Xxh32};

use hpd_core::{Codec, FrameError, Recycle, Retarget};

// ── Frame format constants ─────────────────────────────────────────────────

const MAGIC: u32 = 0x184D_2204;
const LEGACY_MAGIC: u32 = 0x184C_2102;
const SKIPPABLE_MAGIC_MIN: u32 = 0x184D_2A50;
const SKIPPABLE_MAGIC_MAX: u32 = 0x184D_2A5F;

const FLG_VERSION_MASK: u8 = 0b1100_0000;
const FLG_VERSION: u8 = 0b0100_0000;
const FLG_INDEPENDENT: u8 = 1 << 5;
const FLG_BLOCK_CHECKSUM: u8 = 1 << 4;
const FLG_CONTENT_SIZE: u8 = 1 << 3;
const FLG_CONTENT_CHECKSUM: u8 = 1 << 2;
const FLG_RESERVED: u8 = 1 << 1;
const FLG_DICT_ID: u8 = 1 << 0;

const BD_RESERVED: u8 = 0b1000_1111;

/// High bit of a block size word: block is stored uncompressed.
const BLOCK_UNCOMPRESSED: u32 = 0x8000_0000;

/// Linked blocks may reference this much previously decoded output.
const WINDOW_SIZE: usize = 64 * 1024;

/// Block maximum size from the BD byte's 3-bit size id.
fn block_max_size(id: u8) -> Option<usize> {
    match id {
        4 => Some(64 * 1024),
        5 => Some(256 * 1024),
        6 => Some(1024 * 1024),
        7 => Some(4 * 1024 * 1024),
        _ => None,
    }
}

/// Parsed frame descriptor.
#[derive(Debug, Clone, Copy)]
struct FrameInfo {
    block_max: usize,
    linked: bool,
    block_checksum: bool,
    content_checksum: bool,
    content_size: Option<u64>,
}

/// Reusable LZ4 frame decoding state.
///
/// Keeps the decoded-block buffer, the 64 KiB history used by linked blocks,
/// and the content hasher. A 4 MiB-block frame allocates its block buffer
/// once; later frames on the same state decode into the same memory.
pub struct Lz4State {
    block: Vec<u8>,
    window: Vec<u8>,
    hasher: Xxh32,
}

impl Lz4State {
    pub fn new() -> Self {
        Self {
            block: Vec::new(),
            window: Vec::with_capacity(WINDOW_SIZE),
            hasher: Xxh32::new(0),
        }
    }
}

impl Default for Lz4State {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for Lz4State {
    fn recycle(&mut self) {
        self.window.clear();
        self.hasher.reset(0);
    }

    fn retained_bytes(&self) -> usize {
        self.block.capacity() + self.window.capacity()
    }
}

impl Retarget for Lz4State {
    type Reader<'a> = Lz4Reader<'a>;

    const CODEC: Codec = Codec::Lz4;

    fn create() -> Self {
        Self::new()
    }

    /// Attach to `src`. Never fails: the frame header is validated on the
    /// first read.
    fn reset<'a>(&'a mut self, src: &'a [u8]) -> io::Result<Lz4Reader<'a>> {
        self.recycle();
        trace!("lz4: reset over {} bytes", src.len());
        Ok(Lz4Reader {
            state: self,
            src,
            pos: 0,
            frame: None,
            content_len: 0,
            out_start: 0,
            out_end: 0,
            frames: 0,
        })
    }
}

/// Streaming LZ4 frame reader bound to one source.
///
/// Decodes one block at a time into the state's block buffer and serves
/// reads from it. Concatenated and skippable frames are handled; an empty
/// source reads as empty output.
pub struct Lz4Reader<'a> {
    state: &'a mut Lz4State,
    src: &'a [u8],
    pos: usize,
    /// Descriptor of the frame being decoded, `None` between frames.
    frame: Option<FrameInfo>,
    /// Decoded bytes in the current frame.
    content_len: u64,
    /// Undelivered range of `state.block`.
    out_start: usize,
    out_end: usize,
    frames: usize,
}

impl<'a> Lz4Reader<'a> {
    /// Data frames started so far (skippable frames excluded).
    pub fn frames(&self) -> usize {
        self.frames
    }

    fn take(&mut self, n: usize, what: &'static str) -> io::Result<&'a [u8]> {
        let src = self.src;
        let bytes = src
            .get(self.pos..self.pos + n)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, what))?;
        self.pos += n;
        Ok(bytes)
    }

    fn take_u32(&mut self, what: &'static str) -> io::Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Parse the next frame header. Skippable frames are consumed whole and
    /// leave `self.frame` unset.
    fn read_frame_header(&mut self) -> io::Result<()> {
        let magic = self.take_u32("truncated lz4 magic")?;
        match magic {
            MAGIC => {}
            SKIPPABLE_MAGIC_MIN..=SKIPPABLE_MAGIC_MAX => {
                let len = self.take_u32("truncated skippable frame")? as usize;
                self.take(len, "truncated skippable frame")?;
                trace!("lz4: skipped {} byte skippable frame", len);
                return Ok(());
            }
            LEGACY_MAGIC => {
                return Err(FrameError::InvalidHeader("legacy lz4 frames are not supported").into())
            }
            _ => return Err(FrameError::InvalidHeader("bad lz4 magic").into()),
        }

        let src = self.src;
        let descriptor_start = self.pos;
        let b = self.take(2, "truncated lz4 frame descriptor")?;
        let (flg, bd) = (b[0], b[1]);
        if flg & FLG_VERSION_MASK != FLG_VERSION {
            return Err(FrameError::InvalidHeader("unsupported lz4 frame version").into());
        }
        if flg & FLG_RESERVED != 0 || bd & BD_RESERVED != 0 {
            return Err(FrameError::InvalidHeader("reserved lz4 descriptor bits set").into());
        }
        if flg & FLG_DICT_ID != 0 {
            return Err(FrameError::InvalidHeader("lz4 dictionary frames are not supported").into());
        }
        let block_max = block_max_size((bd >> 4) & 0b111)
            .ok_or(FrameError::InvalidHeader("invalid lz4 block max size"))?;

        let content_size = if flg & FLG_CONTENT_SIZE != 0 {
            let b = self.take(8, "truncated lz4 content size")?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            Some(u64::from_le_bytes(raw))
        } else {
            None
        };

        let descriptor = &src[descriptor_start..self.pos];
        let expected = ((xxh32(descriptor, 0) >> 8) & 0xff) as u32;
        let actual = self.take(1, "truncated lz4 header checksum")?[0] as u32;
        if actual != expected {
            return Err(FrameError::HeaderChecksum { expected, actual }.into());
        }

        let info = FrameInfo {
            block_max,
            linked: flg & FLG_INDEPENDENT == 0,
            block_checksum: flg & FLG_BLOCK_CHECKSUM != 0,
            content_checksum: flg & FLG_CONTENT_CHECKSUM != 0,
            content_size,
        };
        trace!("lz4: frame #{} {:?}", self.frames + 1, info);

        if self.state.block.len() < block_max {
            self.state.block.resize(block_max, 0);
        }
        self.state.window.clear();
        self.state.hasher.reset(0);
        self.content_len = 0;
        self.frames += 1;
        self.frame = Some(info);
        Ok(())
    }

    /// Decode the next block of the current frame into the block buffer, or
    /// close the frame on its end mark.
    fn read_block(&mut self, info: FrameInfo) -> io::Result<()> {
        let word = self.take_u32("truncated lz4 block header")?;
        if word == 0 {
            return self.end_frame(info);
        }

        let stored_raw = word & BLOCK_UNCOMPRESSED != 0;
        let len = (word & !BLOCK_UNCOMPRESSED) as usize;
        if len > info.block_max {
            return Err(FrameError::BlockTooLarge {
                len,
                max: info.block_max,
            }
            .into());
        }
        let data = self.take(len, "truncated lz4 block")?;
        if info.block_checksum {
            let expected = self.take_u32("truncated lz4 block checksum")?;
            let actual = xxh32(data, 0);
            if actual != expected {
                return Err(FrameError::BlockChecksum { expected, actual }.into());
            }
        }

        let state = &mut *self.state;
        let dst = &mut state.block[..info.block_max];
        let n = if stored_raw {
            dst[..len].copy_from_slice(data);
            len
        } else if info.linked && !state.window.is_empty() {
            decompress_into_with_dict(data, dst, &state.window).map_err(corrupt_block)?
        } else {
            decompress_into(data, dst).map_err(corrupt_block)?
        };
        let decoded = &state.block[..n];

        if info.content_checksum {
            state.hasher.update(decoded);
        }
        if info.linked {
            if n >= WINDOW_SIZE {
                state.window.clear();
                state.window.extend_from_slice(&decoded[n - WINDOW_SIZE..]);
            } else {
                let overflow = (state.window.len() + n).saturating_sub(WINDOW_SIZE);
                state.window.drain(..overflow);
                state.window.extend_from_slice(decoded);
            }
        }

        self.content_len += n as u64;
        self.out_start = 0;
        self.out_end = n;
        Ok(())
    }

    fn end_frame(&mut self, info: FrameInfo) -> io::Result<()> {
        if info.content_checksum {
            let expected = self.take_u32("truncated lz4 content checksum")?;
            let actual = self.state.hasher.digest();
            if actual != expected {
                return Err(FrameError::ContentChecksum { expected, actual }.into());
            }
        }
        if let Some(expected) = info.content_size {
            if expected != self.content_len {
                return Err(FrameError::ContentLength {
                    expected,
                    actual: self.content_len,
                }
                .into());
            }
        }
        trace!("lz4: frame #{} done, {} bytes", self.frames, self.content_len);
        self.frame = None;
        Ok(())
    }
}

impl Read for Lz4Reader<'_> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_start < self.out_end {
                let n = dst.len().min(self.out_end - self.out_start);
                dst[..n].copy_from_slice(&self.state.block[self.out_start..self.out_start + n]);
                self.out_start += n;
                return Ok(n);
            }
            match self.frame {
                Some(info) => self.read_block(info)?,
                None if self.pos == self.src.len() => return Ok(0),
                None => self.read_frame_header()?,
            }
        }
    }
}

fn corrupt_block(e: lz4_flex::block::DecompressError) -> io::Error {
    debug!("lz4: block decode failed: {}", e);
    io::Error::new(io::ErrorKind::InvalidData, e)
}
