/// Integration tests for re-targetable reader state.
///
/// Each state is driven through many sources in a row, including failing
/// ones, to check that `reset` fully fences one source from the next.
use std::io::{Read, Write};

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use hpd_codecs::{GzipState, Lz4State};
use hpd_core::{Codec, Retarget};
use lz4_flex::frame::FrameEncoder;

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn lz4(data: &[u8]) -> Result<Vec<u8>> {
    let mut enc = FrameEncoder::new(Vec::new());
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn decode<S: Retarget>(state: &mut S, src: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    state.reset(src)?.read_to_end(&mut out)?;
    Ok(out)
}

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

fn payloads() -> Vec<Vec<u8>> {
    vec![
        b"hello".to_vec(),
        Vec::new(),
        b"{\"k\":1}".repeat(5_000),
        pseudo_random_bytes(200_000, 0xDEAD_BEEF),
        b"abc".to_vec(),
    ]
}

fn exercise<S: Retarget>(encode: fn(&[u8]) -> Result<Vec<u8>>) -> Result<()> {
    let mut state = S::create();
    for (i, data) in payloads().iter().enumerate() {
        let src = encode(data)?;
        assert_eq!(&decode(&mut state, &src)?, data, "{} payload #{i}", S::CODEC);

        // A failed source in between must not leak into the next one.
        let broken = &src[..src.len() / 2];
        let _ = decode(&mut state, broken);
    }
    Ok(())
}

#[test]
fn test_gzip_state_survives_many_sources() -> Result<()> {
    exercise::<GzipState>(gzip)
}

#[test]
fn test_lz4_state_survives_many_sources() -> Result<()> {
    exercise::<Lz4State>(lz4)
}

#[test]
fn test_codec_identity() {
    assert_eq!(GzipState::CODEC, Codec::Gzip);
    assert_eq!(Lz4State::CODEC, Codec::Lz4);
}

#[test]
fn test_small_reads_match_bulk_reads() -> Result<()> {
    let data = b"the quick brown fox jumps over the lazy dog. ".repeat(2_000);

    let src = gzip(&data)?;
    let mut state = GzipState::create();
    assert_eq!(read_in_chunks(&mut state.reset(&src)?)?, data);

    let src = lz4(&data)?;
    let mut state = Lz4State::create();
    assert_eq!(read_in_chunks(&mut state.reset(&src)?)?, data);
    Ok(())
}

fn read_in_chunks<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 7];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&chunk[..n]);
    }
}
