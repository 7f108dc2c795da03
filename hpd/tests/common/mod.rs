#![allow(dead_code)]

use std::io::Write;

use anyhow::{bail, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use hpd::{CODEC_GZIP, CODEC_LZ4, CODEC_NONE};
use lz4_flex::frame::FrameEncoder;

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Encode `data` the way a producer tagging it with `tag` would.
pub fn encode(data: &[u8], tag: u8) -> Result<Vec<u8>> {
    match tag {
        CODEC_NONE => Ok(data.to_vec()),
        CODEC_GZIP => {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        CODEC_LZ4 => {
            let mut enc = FrameEncoder::new(Vec::new());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        other => bail!("no encoder for tag {other}"),
    }
}

/// Generate `len` deterministic bytes using a simple LCG.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
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

/// One order record, as produced by the upstream feed.
pub const ORDER_JSON: &str = r#"{"placed_by": "XXXXXX","order_id": "100000000000000","exchange_order_id": "200000000000000","parent_order_id": null,"status": "CANCELLED","order_timestamp": "2021-05-31 09:18:57","variety": "regular","exchange": "CDS","tradingsymbol": "USDINR21JUNFUT","instrument_token": 412675,"order_type": "LIMIT","transaction_type": "BUY","validity": "DAY","product": "NRML","quantity": 1,"price": 72,"tag": null,"guid": "XXXXX"}"#;
