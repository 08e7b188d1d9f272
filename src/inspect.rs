//! File statistics for finished tables.
//!
//! [`inspect`] reads only the fixed-size trailer, so it costs the same for
//! a table of any size and never decodes a data block.

use crate::error::{Error, Result};
use crate::sstable::reader::read_metadata;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Summary statistics for a table file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    /// Path the table was inspected at
    pub filename: String,
    /// Total file size in bytes
    pub filesize: u64,
    /// Offset of the index block
    pub index_block_offset: u64,
    /// Framed size of the index block
    pub index_bytes: u64,
    /// Share of the file taken by the index, in percent
    pub index_bytes_pct: f64,
    /// Framed size of all data blocks
    pub data_block_bytes: u64,
    /// Share of the file taken by data blocks, in percent
    pub data_block_bytes_pct: f64,
    /// Target data block size the table was written with
    pub data_block_size: u64,
    /// Number of data blocks
    pub data_block_count: u64,
    /// Number of entries
    pub entry_count: u64,
    /// Sum of all key lengths
    pub key_bytes: u64,
    /// Sum of all value lengths
    pub value_bytes: u64,
    /// Compression algorithm name
    pub compression: String,
    /// File size divided by raw key and value bytes; 0.0 for a table with no payload
    pub compactness: f64,
}

/// Read a table's trailer and derive its statistics.
///
/// The file is opened read-only and without locking, so it may be
/// inspected while [`TableReader`](crate::TableReader)s have it open.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<TableInfo> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| Error::from_open(e, path))?;
    let filesize = file.metadata()?.len();
    let metadata = read_metadata(&mut file, filesize)?;

    let payload = metadata.bytes_keys + metadata.bytes_values;
    let compactness = if payload == 0 { 0.0 } else { filesize as f64 / payload as f64 };

    Ok(TableInfo {
        filename: path.display().to_string(),
        filesize,
        index_block_offset: metadata.index_block_offset,
        index_bytes: metadata.bytes_index_block,
        index_bytes_pct: percent(metadata.bytes_index_block, filesize),
        data_block_bytes: metadata.bytes_data_blocks,
        data_block_bytes_pct: percent(metadata.bytes_data_blocks, filesize),
        data_block_size: metadata.data_block_size,
        data_block_count: metadata.count_data_blocks,
        entry_count: metadata.count_entries,
        key_bytes: metadata.bytes_keys,
        value_bytes: metadata.bytes_values,
        compression: metadata.compression.as_str().to_string(),
        compactness,
    })
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
