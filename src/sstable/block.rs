//! Data block codec.
//!
//! A block holds sorted key-value entries with prefix compression and
//! restart points for binary search.

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Block stores key-value pairs with prefix compression.
///
/// Format:
/// ```text
/// [Entry 1]
/// [Entry 2]
/// ...
/// [Entry N]
/// [Restart Point 1: u32]
/// ...
/// [Restart Point M: u32]
/// [Num Restarts: u32]
/// ```
///
/// Each entry format:
/// ```text
/// [shared_key_len: varint]   // Length of shared prefix with previous key
/// [unshared_key_len: varint] // Length of unshared key suffix
/// [value_len: varint]        // Length of value
/// [unshared_key: bytes]      // Key suffix
/// [value: bytes]             // Value data
/// ```
///
/// The entry at every restart point stores its key in full (shared = 0).
#[derive(Debug, Clone)]
pub struct Block {
    data: Bytes,
    restart_offset: usize,
    num_restarts: u32,
}

impl Block {
    /// Create a new Block from raw (decompressed) data, validating the restart array.
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corrupt_block("Block too small"));
        }

        let num_restarts = read_u32(&data, data.len() - 4)?;
        let restart_bytes = (num_restarts as usize)
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .ok_or_else(|| Error::corrupt_block("Restart count overflow"))?;
        if num_restarts == 0 || restart_bytes > data.len() {
            return Err(Error::corrupt_block(format!(
                "Invalid restart count {} for block of {} bytes",
                num_restarts,
                data.len()
            )));
        }
        let restart_offset = data.len() - restart_bytes;

        let block = Self { data, restart_offset, num_restarts };

        // Restart points must be strictly increasing offsets into the entry area.
        let mut prev: Option<u32> = None;
        for i in 0..num_restarts {
            let point = block.restart_point(i)?;
            let in_range = (point as usize) < block.restart_offset
                || (point == 0 && block.restart_offset == 0 && num_restarts == 1);
            if !in_range || prev.is_some_and(|p| p >= point) {
                return Err(Error::corrupt_block(format!("Invalid restart point {}", point)));
            }
            prev = Some(point);
        }
        if block.restart_point(0)? != 0 {
            return Err(Error::corrupt_block("First restart point must be 0"));
        }

        Ok(block)
    }

    /// Get the number of restart points
    pub fn num_restarts(&self) -> u32 {
        self.num_restarts
    }

    /// Offsets of all restart points.
    pub fn restart_points(&self) -> Result<Vec<u32>> {
        (0..self.num_restarts).map(|i| self.restart_point(i)).collect()
    }

    fn restart_point(&self, index: u32) -> Result<u32> {
        read_u32(&self.data, self.restart_offset + index as usize * 4)
    }

    /// Check if the block holds no entries
    pub fn is_empty(&self) -> bool {
        self.restart_offset == 0
    }

    /// Create an iterator over the block
    pub fn iter(&self) -> BlockIterator {
        BlockIterator::new(self.clone())
    }

    /// Decode every entry, checking that each restart point lands on an entry boundary.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let restarts = self.restart_points()?;
        let mut next_restart = restarts.iter().peekable();
        let mut entries = Vec::new();
        let mut iter = self.iter();
        iter.seek_to_first();
        loop {
            let offset = iter.current as u32;
            if next_restart.peek() == Some(&&offset) {
                next_restart.next();
                if offset < self.restart_offset as u32 && self.parse_entry(iter.current)?.0 != 0 {
                    return Err(Error::corrupt_block("Restart entry shares a key prefix"));
                }
            }
            if !iter.advance()? {
                break;
            }
            entries.push((iter.key().to_vec(), iter.value().to_vec()));
        }
        if next_restart.next().is_some() {
            return Err(Error::corrupt_block("Restart array does not match entries"));
        }
        Ok(entries)
    }

    /// Get the raw data
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Encode sorted entries into a block.
pub fn encode_block<K, V>(entries: &[(K, V)], restart_interval: usize) -> Bytes
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut builder = BlockBuilder::new(restart_interval);
    for (key, value) in entries {
        builder.add(key.as_ref(), value.as_ref());
    }
    builder.finish()
}

/// A fully decoded block: its entries and its restart offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    /// Entries in key order.
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
    /// Byte offsets of the restart points.
    pub restarts: Vec<u32>,
}

/// Decode a block produced by [`encode_block`] or [`BlockBuilder`].
pub fn decode_block(data: Bytes) -> Result<DecodedBlock> {
    let block = Block::new(data)?;
    Ok(DecodedBlock { entries: block.entries()?, restarts: block.restart_points()? })
}

/// BlockBuilder builds a block with prefix compression.
pub struct BlockBuilder {
    buffer: BytesMut,
    restarts: Vec<u32>,
    counter: usize,
    num_entries: usize,
    last_key: Vec<u8>,
    block_restart_interval: usize,
}

impl BlockBuilder {
    /// Create a new BlockBuilder
    pub fn new(block_restart_interval: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            restarts: vec![0],
            counter: 0,
            num_entries: 0,
            last_key: Vec::new(),
            block_restart_interval: block_restart_interval.max(1),
        }
    }

    /// Add a key-value pair to the block.
    ///
    /// Keys must be strictly increasing; the table writer enforces this.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(
            self.num_entries == 0 || key > self.last_key.as_slice(),
            "Keys must be added in sorted order"
        );

        let mut shared = 0;
        if self.counter >= self.block_restart_interval {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        } else if self.num_entries > 0 {
            shared = shared_prefix_len(&self.last_key, key);
        }

        let unshared = key.len() - shared;

        put_varint(&mut self.buffer, shared as u64);
        put_varint(&mut self.buffer, unshared as u64);
        put_varint(&mut self.buffer, value.len() as u64);
        self.buffer.put_slice(&key[shared..]);
        self.buffer.put_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
        self.num_entries += 1;
    }

    /// Finish building and return the block data
    pub fn finish(mut self) -> Bytes {
        for restart in &self.restarts {
            self.buffer.put_u32_le(*restart);
        }
        self.buffer.put_u32_le(self.restarts.len() as u32);
        self.buffer.freeze()
    }

    /// Estimated encoded size of the block
    pub fn current_size(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.num_entries
    }

    /// Check if the block is empty
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// The most recently added key
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Iterator over entries in a block
pub struct BlockIterator {
    block: Block,
    current: usize,
    key: Vec<u8>,
    value: Vec<u8>,
    valid: bool,
    // Set by `seek`: the entry it stopped on is loaded but not yet yielded.
    pending: bool,
}

impl BlockIterator {
    fn new(block: Block) -> Self {
        Self {
            block,
            current: 0,
            key: Vec::new(),
            value: Vec::new(),
            valid: false,
            pending: false,
        }
    }

    /// Position before the first entry; the next `advance` yields it.
    pub fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
    }

    fn seek_to_restart_point(&mut self, offset: u32) {
        self.key.clear();
        self.value.clear();
        self.current = offset as usize;
        self.valid = false;
        self.pending = false;
    }

    /// Position before the first entry whose key is >= `target`.
    ///
    /// Binary searches the restart points for the last one whose key is
    /// below `target`, then scans forward.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        let mut left = 0u32;
        let mut right = self.block.num_restarts - 1;
        while left < right {
            let mid = left + (right - left).div_ceil(2);
            let offset = self.block.restart_point(mid)?;
            let (shared, key, _, _) = self.block.parse_entry(offset as usize)?;
            if shared != 0 {
                return Err(Error::corrupt_block("Restart entry shares a key prefix"));
            }
            if key < target {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(self.block.restart_point(left)?);
        while self.advance()? {
            if self.key.as_slice() >= target {
                self.valid = false;
                self.pending = true;
                break;
            }
        }
        Ok(())
    }

    /// Move to the next entry; returns false at the end of the block.
    pub fn advance(&mut self) -> Result<bool> {
        if self.pending {
            self.pending = false;
            self.valid = true;
            return Ok(true);
        }
        if self.current >= self.block.restart_offset {
            self.valid = false;
            return Ok(false);
        }

        let (shared, suffix, value, next) = self.block.parse_entry(self.current)?;
        if shared > self.key.len() {
            self.valid = false;
            return Err(Error::corrupt_block(format!(
                "Shared prefix {} exceeds previous key at offset {}",
                shared, self.current
            )));
        }

        self.key.truncate(shared);
        self.key.extend_from_slice(suffix);
        self.value.clear();
        self.value.extend_from_slice(value);
        self.current = next;
        self.valid = true;
        Ok(true)
    }

    /// Check if the iterator is positioned on an entry
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Get the current key
    pub fn key(&self) -> &[u8] {
        assert!(self.valid, "Iterator not valid");
        &self.key
    }

    /// Get the current value
    pub fn value(&self) -> &[u8] {
        assert!(self.valid, "Iterator not valid");
        &self.value
    }
}

impl Block {
    // Returns (shared, key suffix, value, offset of the next entry).
    fn parse_entry(&self, offset: usize) -> Result<(usize, &[u8], &[u8], usize)> {
        let area = &self.data[..self.restart_offset];
        let mut pos = offset;
        let shared = take_varint(area, &mut pos)? as usize;
        let unshared = take_varint(area, &mut pos)? as usize;
        let value_len = take_varint(area, &mut pos)? as usize;

        let key_end = pos
            .checked_add(unshared)
            .filter(|&end| end <= area.len())
            .ok_or_else(|| Error::corrupt_block(format!("Truncated key at offset {}", offset)))?;
        let value_end = key_end
            .checked_add(value_len)
            .filter(|&end| end <= area.len())
            .ok_or_else(|| Error::corrupt_block(format!("Truncated value at offset {}", offset)))?;

        Ok((shared, &area[pos..key_end], &area[key_end..value_end], value_end))
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::corrupt_block("Truncated block"))
}

/// Append a varint-encoded integer.
pub(crate) fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value & 0x7F | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint at `*pos`, advancing it.
pub(crate) fn take_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0;
    while let Some(&byte) = data.get(*pos) {
        if shift >= 64 {
            break;
        }
        *pos += 1;
        value |= ((byte & 0x7F) as u64) << shift;
        if byte < 0x80 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(Error::corrupt_block("Malformed varint"))
}
