//! Index block implementation.
//!
//! The index block maps the last key of every data block to that block's
//! handle, so a lookup can binary search for the one candidate block.

use crate::error::{Error, Result};
use crate::sstable::block::{Block, BlockBuilder};
use crate::sstable::footer::BlockHandle;
use bytes::Bytes;

/// IndexEntry represents a single entry in the index block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The largest key in the data block
    pub key: Vec<u8>,
    /// Handle to the data block
    pub handle: BlockHandle,
}

impl IndexEntry {
    /// Create a new IndexEntry
    pub fn new(key: Vec<u8>, handle: BlockHandle) -> Self {
        Self { key, handle }
    }
}

/// IndexBlock provides lookup of data blocks by key.
#[derive(Debug, Clone, Default)]
pub struct IndexBlock {
    entries: Vec<IndexEntry>,
}

impl IndexBlock {
    /// Parse an index block, requiring strictly increasing keys and data
    /// blocks that lie below `data_end`.
    pub fn new(data: Bytes, data_end: u64) -> Result<Self> {
        let block = Block::new(data).map_err(into_corrupt_index)?;
        let raw = block.entries().map_err(into_corrupt_index)?;

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let handle = BlockHandle::decode(&value)?;
            let in_data = handle.end_offset().is_some_and(|end| end <= data_end);
            if !in_data {
                return Err(Error::corrupt_index(format!(
                    "Data block at {} (+{}) extends past the data region",
                    handle.offset, handle.size
                )));
            }
            if let Some(prev) = entries.last() {
                let prev_end = prev.handle.end_offset().unwrap_or(u64::MAX);
                if key <= prev.key || handle.offset < prev_end {
                    return Err(Error::corrupt_index(format!(
                        "Index entries out of order at block {}",
                        entries.len()
                    )));
                }
            }
            entries.push(IndexEntry::new(key, handle));
        }

        Ok(Self { entries })
    }

    /// Position of the first data block whose last key is >= `key`.
    ///
    /// Returns `None` when `key` sorts after every key in the table.
    pub fn find_block(&self, key: &[u8]) -> Option<usize> {
        let pos = self.entries.partition_point(|e| e.key.as_slice() < key);
        (pos < self.entries.len()).then_some(pos)
    }

    /// Entry for the data block at `pos`
    pub fn entry(&self, pos: usize) -> Option<&IndexEntry> {
        self.entries.get(pos)
    }

    /// All index entries in key order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Get the number of entries in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn into_corrupt_index(err: Error) -> Error {
    match err {
        Error::CorruptBlock(msg) => Error::CorruptIndex(msg),
        other => other,
    }
}

/// IndexBlockBuilder builds an index block.
pub struct IndexBlockBuilder {
    builder: BlockBuilder,
}

impl IndexBlockBuilder {
    /// Create a new IndexBlockBuilder
    pub fn new() -> Self {
        // Every index entry is a restart point.
        Self { builder: BlockBuilder::new(1) }
    }

    /// Add an index entry
    pub fn add_entry(&mut self, entry: &IndexEntry) {
        self.builder.add(&entry.key, &entry.handle.encode());
    }

    /// Finish building and return the block data
    pub fn finish(self) -> Bytes {
        self.builder.finish()
    }

    /// Number of entries added
    pub fn len(&self) -> usize {
        self.builder.len()
    }

    /// Check if the builder is empty
    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }
}

impl Default for IndexBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}
