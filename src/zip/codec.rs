//! Per-entry decompression, dispatched on the method id.
//!
//! | id | method  |
//! |----|---------|
//! | 0  | stored  |
//! | 8  | deflate (raw, no zlib/gzip wrapper) |
//! | 12 | bzip2   |
//! | 14 | LZMA (ZIP framing) |

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use bzip2::read::BzDecoder;
use flate2::read::DeflateDecoder;
use lzma_rs::decompress::{Options, UnpackedSize};

use crate::error::{ExtractError, Result};

use super::structures::{CompressionMethod, LocalFileHeader};

/// Upper bound on the up-front allocation taken from the declared size.
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Decompress `payload` according to `header`.
///
/// Unknown method ids fail with [`ExtractError::UnsupportedCodec`] rather
/// than yielding empty output. Deflate and bzip2 output stops one byte
/// past the declared uncompressed size.
pub fn decompress(header: &LocalFileHeader, payload: &[u8]) -> Result<Vec<u8>> {
    let capacity = (header.uncompressed_size as usize).min(MAX_PREALLOCATION);
    // One byte past the declared size is enough to fail verification.
    let limit = header.uncompressed_size as u64 + 1;

    match header.method() {
        CompressionMethod::Stored => Ok(payload.to_vec()),
        CompressionMethod::Deflate => {
            let mut out = Vec::with_capacity(capacity);
            DeflateDecoder::new(payload)
                .take(limit)
                .read_to_end(&mut out)
                .map_err(|e| ExtractError::Codec(format!("deflate: {e}")))?;
            Ok(out)
        }
        CompressionMethod::Bzip2 => {
            let mut out = Vec::with_capacity(capacity);
            BzDecoder::new(payload)
                .take(limit)
                .read_to_end(&mut out)
                .map_err(|e| ExtractError::Codec(format!("bzip2: {e}")))?;
            Ok(out)
        }
        CompressionMethod::Lzma => decompress_lzma(header, payload, capacity),
        CompressionMethod::Unknown(id) => Err(ExtractError::UnsupportedCodec(id)),
    }
}

/// ZIP wraps raw LZMA as `major:1 | minor:1 | props_len:2 | props | data`.
/// Unlike a `.lzma` file there is no 8-byte size after the properties, so
/// the size comes from the header, or the stream runs to its end marker
/// when flag bit 1 says one is present.
fn decompress_lzma(header: &LocalFileHeader, payload: &[u8], capacity: usize) -> Result<Vec<u8>> {
    if payload.len() < 4 {
        return Err(ExtractError::Codec("lzma: truncated ZIP LZMA header".into()));
    }
    let props_len = LittleEndian::read_u16(&payload[2..4]) as usize;
    if props_len != 5 {
        return Err(ExtractError::Codec(format!(
            "lzma: unexpected properties size {props_len}"
        )));
    }

    let unpacked_size = if header.has_lzma_eos_marker() {
        UnpackedSize::UseProvided(None)
    } else {
        UnpackedSize::UseProvided(Some(header.uncompressed_size as u64))
    };
    let options = Options {
        unpacked_size,
        ..Default::default()
    };

    let mut input = &payload[4..];
    let mut out = Vec::with_capacity(capacity);
    lzma_rs::lzma_decompress_with_options(&mut input, &mut out, &options)
        .map_err(|e| ExtractError::Codec(format!("lzma: {e}")))?;
    Ok(out)
}
