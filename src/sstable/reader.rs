//! Table reader implementation.
//!
//! Opens a finalized table, validates its trailer and index, and serves
//! point, prefix, range and full-scan lookups through [`TableIterator`].

use crate::config::CompressionType;
use crate::error::{Error, Result};
use crate::sstable::block::Block;
use crate::sstable::footer::{decode_frame, BlockHandle, Metadata};
use crate::sstable::index::IndexBlock;
use crate::sstable::iterator::{Bound, TableIterator};
use crate::sstable::FOOTER_SIZE;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// TableReader provides read access to a table file.
///
/// Any number of readers may open the same file concurrently. Data blocks
/// are read and decoded lazily, one at a time, as iterators reach them.
///
/// Usage:
/// ```no_run
/// use mtable::TableReader;
///
/// let reader = TableReader::open("table.mtbl").unwrap();
/// for entry in reader.get(b"key1") {
///     let (key, value) = entry.unwrap();
///     println!("{:?} => {:?}", key, value);
/// }
/// ```
#[derive(Debug)]
pub struct TableReader {
    path: PathBuf,
    file: Mutex<File>,
    metadata: Metadata,
    index: IndexBlock,
    file_size: u64,
}

impl TableReader {
    /// Open a table file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| Error::from_open(e, &path))?;

        let file_size = file.metadata()?.len();
        let metadata = read_metadata(&mut file, file_size)?;

        let index_handle = metadata.index_handle();
        let index_frame = read_frame(&mut file, &index_handle).map_err(|e| match e {
            Error::CorruptBlock(msg) => Error::CorruptIndex(msg),
            other => other,
        })?;
        let index_data = decode_frame(&index_frame, CompressionType::None).map_err(|e| match e {
            Error::CorruptBlock(msg) => Error::CorruptIndex(msg),
            other => other,
        })?;
        let index = IndexBlock::new(Bytes::from(index_data), metadata.index_block_offset)?;

        if index.len() as u64 != metadata.count_data_blocks {
            return Err(Error::corrupt_index(format!(
                "Index lists {} blocks, trailer declares {}",
                index.len(),
                metadata.count_data_blocks
            )));
        }

        log::debug!(
            "Opened table {:?}: {} entries, {} blocks, {}",
            path,
            metadata.count_entries,
            metadata.count_data_blocks,
            metadata.compression
        );

        Ok(Self { path, file: Mutex::new(file), metadata, index, file_size })
    }

    /// Iterator yielding the entry whose key equals `key`, if any
    pub fn get(&self, key: &[u8]) -> TableIterator<'_> {
        TableIterator::new(self, Some(key), Bound::Exact(key.to_vec()))
    }

    /// Iterator over every entry whose key starts with `prefix`
    pub fn get_prefix(&self, prefix: &[u8]) -> TableIterator<'_> {
        TableIterator::new(self, Some(prefix), Bound::Prefix(prefix.to_vec()))
    }

    /// Iterator over entries with `start <= key < end`
    ///
    /// `start > end` yields nothing.
    pub fn get_range(&self, start: &[u8], end: &[u8]) -> TableIterator<'_> {
        if start > end {
            return TableIterator::empty(self);
        }
        TableIterator::new(self, Some(start), Bound::Before(end.to_vec()))
    }

    /// Iterator over every entry in key order
    pub fn scan(&self) -> TableIterator<'_> {
        TableIterator::new(self, None, Bound::Unbounded)
    }

    /// Alias of [`TableReader::scan`].
    pub fn iter(&self) -> TableIterator<'_> {
        self.scan()
    }

    /// File-level metadata from the trailer
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get the number of data blocks
    pub fn num_blocks(&self) -> usize {
        self.index.len()
    }

    /// Get the file size
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path the table was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn index(&self) -> &IndexBlock {
        &self.index
    }

    /// Read, verify and decode the data block at `pos` in the index.
    pub(crate) fn read_block(&self, pos: usize) -> Result<Block> {
        let entry = self
            .index
            .entry(pos)
            .ok_or_else(|| Error::corrupt_block(format!("No data block {}", pos)))?;

        let frame = {
            let mut file = self.file.lock();
            read_frame(&mut file, &entry.handle)?
        };
        let data = decode_frame(&frame, self.metadata.compression)
            .map_err(|e| Error::corrupt_block(format!("data block {}: {}", pos, e)))?;
        Block::new(Bytes::from(data))
    }
}

/// Read and validate the trailer of a table file.
///
/// Only the trailer is read; the layout it describes must account for the
/// whole file.
pub(crate) fn read_metadata(file: &mut File, file_size: u64) -> Result<Metadata> {
    if file_size < FOOTER_SIZE as u64 {
        return Err(Error::corrupt_index("File too small to be a valid table"));
    }

    file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
    let mut trailer = [0u8; FOOTER_SIZE];
    file.read_exact(&mut trailer)?;
    let metadata = Metadata::decode(&trailer)?;

    let expected_size = metadata
        .index_block_offset
        .checked_add(metadata.bytes_index_block)
        .and_then(|n| n.checked_add(FOOTER_SIZE as u64));
    if expected_size != Some(file_size) || metadata.bytes_data_blocks != metadata.index_block_offset
    {
        return Err(Error::corrupt_index(format!(
            "Trailer layout does not match file size {}",
            file_size
        )));
    }

    Ok(metadata)
}

fn read_frame(file: &mut File, handle: &BlockHandle) -> Result<Vec<u8>> {
    let size = usize::try_from(handle.size)
        .map_err(|_| Error::corrupt_block(format!("Block size {} too large", handle.size)))?;
    file.seek(SeekFrom::Start(handle.offset))?;
    let mut buffer = vec![0u8; size];
    file.read_exact(&mut buffer).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::corrupt_block(format!(
            "Block at {} (+{}) reads beyond end of file",
            handle.offset, handle.size
        )),
        _ => Error::Io(e),
    })?;
    Ok(buffer)
}
