//! Table writer.
//!
//! Builds a table file from a sequence of strictly increasing key-value pairs.

use crate::config::{CompressionType, WriterOptions};
use crate::error::{Error, Result};
use crate::sstable::block::BlockBuilder;
use crate::sstable::footer::{encode_frame, BlockHandle, Metadata};
use crate::sstable::index::{IndexBlockBuilder, IndexEntry};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// TableWriter builds a table file.
///
/// The target file must not exist yet. Nothing written is a valid table
/// until [`TableWriter::finalize`] succeeds.
///
/// Usage:
/// ```no_run
/// use mtable::{TableWriter, WriterOptions};
///
/// let mut writer = TableWriter::new("table.mtbl", WriterOptions::default()).unwrap();
/// writer.add(b"key1", b"value1").unwrap();
/// writer.add(b"key2", b"value2").unwrap();
/// writer.finalize().unwrap();
/// ```
pub struct TableWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    options: WriterOptions,
    data_block_builder: BlockBuilder,
    index_block_builder: IndexBlockBuilder,
    last_key: Option<Vec<u8>>,
    offset: u64,
    num_entries: u64,
    num_data_blocks: u64,
    bytes_keys: u64,
    bytes_values: u64,
    // Set once an add has failed; the table can no longer be completed.
    failure: Option<String>,
}

impl TableWriter {
    /// Create the table file at `path`.
    ///
    /// Fails with [`Error::AlreadyExists`] if anything already exists there.
    pub fn new<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::from_open(e, &path))?;

        log::debug!("Creating table {:?} with {:?}", path, options);

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            options,
            data_block_builder: BlockBuilder::new(options.restart_interval),
            index_block_builder: IndexBlockBuilder::new(),
            last_key: None,
            offset: 0,
            num_entries: 0,
            num_data_blocks: 0,
            bytes_keys: 0,
            bytes_values: 0,
            failure: None,
        })
    }

    /// Add a key-value pair to the table.
    ///
    /// `key` must be strictly greater than the previously added key. An
    /// out-of-order key fails with [`Error::OutOfOrder`] and leaves the
    /// writer unable to accept further entries or to finalize.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            return Err(Error::WriterClosed(self.path.display().to_string()));
        }

        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                let msg = format!(
                    "key {:?} is not greater than previous key {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                );
                self.failure.get_or_insert_with(|| msg.clone());
                return Err(Error::OutOfOrder(msg));
            }
        }

        if let Some(reason) = &self.failure {
            return Err(Error::WriterClosed(format!("writer failed earlier: {}", reason)));
        }

        self.data_block_builder.add(key, value);
        self.last_key = Some(key.to_vec());
        self.num_entries += 1;
        self.bytes_keys += key.len() as u64;
        self.bytes_values += value.len() as u64;

        if self.data_block_builder.current_size() >= self.options.block_size {
            if let Err(e) = self.flush_data_block() {
                self.failure = Some(e.to_string());
                return Err(e);
            }
        }

        Ok(())
    }

    /// Flush the current data block to disk
    fn flush_data_block(&mut self) -> Result<()> {
        if self.data_block_builder.is_empty() {
            return Ok(());
        }

        let builder = std::mem::replace(
            &mut self.data_block_builder,
            BlockBuilder::new(self.options.restart_interval),
        );
        let entries = builder.len();
        let block_data = builder.finish();
        let frame = encode_frame(&block_data, self.options.compression)?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::WriterClosed(self.path.display().to_string()))?;
        writer.write_all(&frame)?;

        let handle = BlockHandle::new(self.offset, frame.len() as u64);
        let last_key = self.last_key.clone().unwrap_or_default();
        self.index_block_builder.add_entry(&IndexEntry::new(last_key, handle));
        self.offset += frame.len() as u64;
        self.num_data_blocks += 1;

        log::debug!(
            "Flushed data block {} ({} entries, {} -> {} bytes) at offset {}",
            self.num_data_blocks,
            entries,
            block_data.len(),
            frame.len(),
            handle.offset
        );

        Ok(())
    }

    /// Finish the table: flush the last block, then write the index block
    /// and the trailer, and release the file.
    ///
    /// On failure the partial file is removed, so no file claiming to be a
    /// valid table is left behind.
    pub fn finalize(&mut self) -> Result<Metadata> {
        if let Some(reason) = self.failure.clone() {
            if self.writer.take().is_some() {
                self.remove_partial_file();
            }
            return Err(Error::WriterClosed(format!("writer failed earlier: {}", reason)));
        }
        if self.writer.is_none() {
            return Err(Error::WriterClosed(self.path.display().to_string()));
        }

        match self.write_tail() {
            Ok(meta) => {
                log::info!(
                    "Finalized table {:?}: {} entries in {} blocks, {} bytes",
                    self.path,
                    meta.count_entries,
                    meta.count_data_blocks,
                    meta.index_block_offset + meta.bytes_index_block + crate::sstable::FOOTER_SIZE as u64
                );
                Ok(meta)
            }
            Err(e) => {
                self.writer = None;
                self.failure = Some(e.to_string());
                self.remove_partial_file();
                Err(e)
            }
        }
    }

    fn remove_partial_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to remove partial table {:?}: {}", self.path, e);
        }
    }

    /// Alias of [`TableWriter::finalize`].
    pub fn close(&mut self) -> Result<Metadata> {
        self.finalize()
    }

    fn write_tail(&mut self) -> Result<Metadata> {
        self.flush_data_block()?;

        let index_builder = std::mem::take(&mut self.index_block_builder);
        let index_frame = encode_frame(&index_builder.finish(), CompressionType::None)?;

        let metadata = Metadata {
            index_block_offset: self.offset,
            data_block_size: self.options.block_size as u64,
            compression: self.options.compression,
            restart_interval: self.options.restart_interval as u64,
            count_entries: self.num_entries,
            count_data_blocks: self.num_data_blocks,
            bytes_data_blocks: self.offset,
            bytes_index_block: index_frame.len() as u64,
            bytes_keys: self.bytes_keys,
            bytes_values: self.bytes_values,
        };

        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| Error::WriterClosed(self.path.display().to_string()))?;
        writer.write_all(&index_frame)?;
        metadata.write_to(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(metadata)
    }

    /// Get the number of entries added
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Path of the table being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the writer has been finalized or has failed
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            log::warn!("Table {:?} dropped without finalize; file is not a valid table", self.path);
        }
    }
}

impl std::fmt::Debug for TableWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableWriter")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("num_entries", &self.num_entries)
            .field("closed", &self.is_closed())
            .finish()
    }
}
