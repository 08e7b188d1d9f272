//! Block compression.
//!
//! Every failure to decode a compressed payload is reported as
//! [`Error::CorruptBlock`].

use crate::config::CompressionType;
use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Compression level used for LZ4HC.
const LZ4HC_LEVEL: i32 = 9;

/// Neither LZ4 nor snappy can expand input by more than this factor, so a
/// larger declared length can only come from a damaged payload.
const MAX_EXPANSION: usize = 256;

/// Largest decompressed length accepted for a payload of `compressed` bytes.
fn max_decompressed_len(compressed: usize) -> usize {
    compressed.saturating_mul(MAX_EXPANSION).saturating_add(64)
}

fn check_declared_len(algorithm: &str, declared: usize, compressed: usize) -> Result<()> {
    if declared > max_decompressed_len(compressed) {
        return Err(Error::corrupt_block(format!(
            "{} payload of {} bytes declares {} decompressed bytes",
            algorithm, compressed, declared
        )));
    }
    Ok(())
}

/// Compress data using the specified compression type
pub fn compress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => compress_zlib(data),
        CompressionType::Snappy => compress_snappy(data),
        CompressionType::Lz4 => compress_lz4(data, None),
        CompressionType::Lz4hc => {
            compress_lz4(data, Some(lz4::block::CompressionMode::HIGHCOMPRESSION(LZ4HC_LEVEL)))
        }
    }
}

/// Decompress data using the specified compression type
pub fn decompress(data: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zlib => decompress_zlib(data),
        CompressionType::Snappy => decompress_snappy(data),
        CompressionType::Lz4 | CompressionType::Lz4hc => decompress_lz4(data),
    }
}

fn compress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::corrupt_block(format!("zlib decompression failed: {}", e)))?;
    Ok(out)
}

fn compress_snappy(data: &[u8]) -> Result<Vec<u8>> {
    snap::raw::Encoder::new()
        .compress_vec(data)
        .map_err(|e| Error::invalid_argument(format!("Snappy compression failed: {}", e)))
}

fn decompress_snappy(data: &[u8]) -> Result<Vec<u8>> {
    let declared = snap::raw::decompress_len(data)
        .map_err(|e| Error::corrupt_block(format!("Snappy decompression failed: {}", e)))?;
    check_declared_len("Snappy", declared, data.len())?;
    snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|e| Error::corrupt_block(format!("Snappy decompression failed: {}", e)))
}

fn compress_lz4(data: &[u8], mode: Option<lz4::block::CompressionMode>) -> Result<Vec<u8>> {
    Ok(lz4::block::compress(data, mode, true)?)
}

fn decompress_lz4(data: &[u8]) -> Result<Vec<u8>> {
    // The payload starts with the decompressed length as a little-endian i32.
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::corrupt_block("LZ4 payload missing its size prefix"))?;
    let declared = usize::try_from(i32::from_le_bytes(prefix))
        .map_err(|_| Error::corrupt_block("LZ4 payload declares a negative size"))?;
    check_declared_len("LZ4", declared, data.len() - 4)?;

    lz4::block::decompress(data, None)
        .map_err(|e| Error::corrupt_block(format!("LZ4 decompression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_compression() {
        let data = b"Hello, World!";
        let compressed = compress(data, CompressionType::None).unwrap();
        assert_eq!(compressed, data);
        assert_eq!(decompress(&compressed, CompressionType::None).unwrap(), data);
    }

    #[test]
    fn test_every_algorithm_shrinks_repetitive_data() {
        let data = b"Hello, World! This is a test of block compression. ".repeat(20);
        for ctype in CompressionType::ALL.into_iter().skip(1) {
            let compressed = compress(&data, ctype).unwrap();
            assert!(compressed.len() < data.len(), "{} did not compress", ctype);
            assert_eq!(decompress(&compressed, ctype).unwrap(), data, "{}", ctype);
        }
    }

    #[test]
    fn test_empty_input() {
        for ctype in [CompressionType::None, CompressionType::Zlib, CompressionType::Snappy] {
            let compressed = compress(b"", ctype).unwrap();
            assert!(decompress(&compressed, ctype).unwrap().is_empty(), "{}", ctype);
        }
    }

    #[test]
    fn test_oversized_declared_length_is_corrupt_block() {
        // LZ4 size prefix claiming 1GB ahead of a few payload bytes.
        let mut lz4_payload = (1i32 << 30).to_le_bytes().to_vec();
        lz4_payload.extend_from_slice(&[0x10, b'a']);
        let result = decompress(&lz4_payload, CompressionType::Lz4);
        assert!(matches!(result, Err(Error::CorruptBlock(_))));

        let mut negative = (-1i32).to_le_bytes().to_vec();
        negative.push(0);
        assert!(matches!(decompress(&negative, CompressionType::Lz4hc), Err(Error::CorruptBlock(_))));

        // Snappy varint header claiming 128MB.
        let snappy_payload = [0x80u8, 0x80, 0x80, 0x40, 0x00];
        let result = decompress(&snappy_payload, CompressionType::Snappy);
        assert!(matches!(result, Err(Error::CorruptBlock(_))));
    }

    #[test]
    fn test_highly_repetitive_block_within_bound() {
        let data = vec![0u8; 1 << 20];
        for ctype in [CompressionType::Snappy, CompressionType::Lz4, CompressionType::Lz4hc] {
            let compressed = compress(&data, ctype).unwrap();
            assert_eq!(decompress(&compressed, ctype).unwrap(), data, "{}", ctype);
        }
    }

    #[test]
    fn test_garbage_is_corrupt_block() {
        let garbage = [0xFFu8, 0x13, 0x37, 0x00, 0x42, 0x99, 0x01, 0x02];
        for ctype in [CompressionType::Zlib, CompressionType::Snappy, CompressionType::Lz4] {
            let result = decompress(&garbage, ctype);
            assert!(matches!(result, Err(Error::CorruptBlock(_))), "{}", ctype);
        }
    }
}
