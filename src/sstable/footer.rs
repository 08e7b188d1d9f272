//! Block framing and the fixed-size table trailer.
//!
//! Every block on disk is framed as
//! ```text
//! [payload_len: u32][crc32(payload): u32][compression id: u8][payload]
//! ```
//! and the file ends with a fixed 96-byte trailer holding the table
//! [`Metadata`]. All integers are little-endian.

use crate::config::CompressionType;
use crate::error::{Error, Result};
use crate::sstable::compression;
use crate::sstable::{FOOTER_SIZE, FRAME_HEADER_SIZE, MAGIC_NUMBER};
use serde::Serialize;
use std::io::Write;

/// BlockHandle represents a pointer to a framed block in the table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHandle {
    /// Offset of the frame in the file
    pub offset: u64,
    /// Size of the frame in bytes, header included
    pub size: u64,
}

impl BlockHandle {
    /// Create a new BlockHandle
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Encode the BlockHandle to bytes (16 bytes: 8 for offset + 8 for size)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode a BlockHandle from an index entry value
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != 16 {
            return Err(Error::corrupt_index(format!(
                "Block handle must be 16 bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { offset: le_u64(&data[0..8]), size: le_u64(&data[8..16]) })
    }

    /// End offset of this block, or `None` if it overflows `u64`
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Frame an encoded block: compress it and prepend the frame header.
pub fn encode_frame(block: &[u8], compression: CompressionType) -> Result<Vec<u8>> {
    let payload = compression::compress(block, compression)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::invalid_argument("Block exceeds 4GB after compression"))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.push(compression as u8);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Verify and unpack a frame read from disk, returning the decompressed block.
///
/// The frame's compression id must match `expected`, the id recorded in the
/// trailer.
pub fn decode_frame(frame: &[u8], expected: CompressionType) -> Result<Vec<u8>> {
    if frame.len() < FRAME_HEADER_SIZE {
        return Err(Error::corrupt_block("Block frame too small"));
    }

    let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let stored_checksum = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    let compression_id = frame[8];
    let payload = &frame[FRAME_HEADER_SIZE..];

    if payload.len() != len {
        return Err(Error::corrupt_block(format!(
            "Block length mismatch: header says {}, frame holds {}",
            len,
            payload.len()
        )));
    }

    let computed_checksum = crc32fast::hash(payload);
    if computed_checksum != stored_checksum {
        return Err(Error::corrupt_block(format!(
            "Checksum mismatch: expected {:#x}, got {:#x}",
            stored_checksum, computed_checksum
        )));
    }

    if compression_id != expected as u8 {
        return Err(Error::corrupt_block(format!(
            "Compression id {} does not match table compression {}",
            compression_id, expected
        )));
    }

    compression::decompress(payload, expected)
}

/// File-level metadata stored in the trailer.
///
/// Computed once when the writer finalizes and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Offset of the index block frame.
    pub index_block_offset: u64,
    /// Target data block size the table was written with.
    pub data_block_size: u64,
    /// Compression applied to data blocks.
    pub compression: CompressionType,
    /// Restart interval of data blocks.
    pub restart_interval: u64,
    /// Number of entries.
    pub count_entries: u64,
    /// Number of data blocks.
    pub count_data_blocks: u64,
    /// Bytes occupied by data block frames.
    pub bytes_data_blocks: u64,
    /// Bytes occupied by the index block frame.
    pub bytes_index_block: u64,
    /// Sum of all key lengths.
    pub bytes_keys: u64,
    /// Sum of all value lengths.
    pub bytes_values: u64,
}

impl Metadata {
    /// Encode the trailer (96 bytes).
    ///
    /// Format:
    /// ```text
    /// [10 x u64 fields: 80 bytes]
    /// [crc32 of the fields: 4 bytes]
    /// [reserved: 4 bytes]
    /// [magic: 8 bytes]
    /// ```
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        for field in [
            self.index_block_offset,
            self.data_block_size,
            self.compression as u64,
            self.restart_interval,
            self.count_entries,
            self.count_data_blocks,
            self.bytes_data_blocks,
            self.bytes_index_block,
            self.bytes_keys,
            self.bytes_values,
        ] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());

        debug_assert_eq!(buf.len(), FOOTER_SIZE);
        buf
    }

    /// Decode the trailer.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != FOOTER_SIZE {
            return Err(Error::corrupt_index(format!(
                "Trailer size mismatch: expected {}, got {}",
                FOOTER_SIZE,
                data.len()
            )));
        }

        let magic = le_u64(&data[88..96]);
        if magic != MAGIC_NUMBER {
            return Err(Error::corrupt_index(format!(
                "Invalid table magic number: expected {:#x}, got {:#x}",
                MAGIC_NUMBER, magic
            )));
        }

        let stored_checksum = u32::from_le_bytes([data[80], data[81], data[82], data[83]]);
        if crc32fast::hash(&data[..80]) != stored_checksum {
            return Err(Error::corrupt_index("Trailer checksum mismatch"));
        }

        let field = |i: usize| le_u64(&data[i * 8..i * 8 + 8]);
        let compression = u8::try_from(field(2))
            .ok()
            .and_then(CompressionType::from_u8)
            .ok_or_else(|| Error::corrupt_index(format!("Unknown compression id {}", field(2))))?;

        Ok(Self {
            index_block_offset: field(0),
            data_block_size: field(1),
            compression,
            restart_interval: field(3),
            count_entries: field(4),
            count_data_blocks: field(5),
            bytes_data_blocks: field(6),
            bytes_index_block: field(7),
            bytes_keys: field(8),
            bytes_values: field(9),
        })
    }

    /// Write the trailer to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Handle of the index block frame.
    pub fn index_handle(&self) -> BlockHandle {
        BlockHandle::new(self.index_block_offset, self.bytes_index_block)
    }
}

fn le_u64(data: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[..8]);
    u64::from_le_bytes(buf)
}
