//! Configuration options for table writers and sorters.

use crate::error::{Error, Result};
use crate::sorter::{KeepLatest, MergeResolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default target size of a data block (8KB).
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Default number of entries between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Default in-memory budget of a sorter before it spills a run (1GB).
pub const DEFAULT_MAX_MEMORY: usize = 1024 * 1024 * 1024;

/// Compression algorithms for data blocks.
///
/// The discriminant is the id persisted in the table trailer and in every
/// block frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// zlib (deflate) compression.
    Zlib = 1,

    /// Snappy compression (fast, moderate compression ratio).
    Snappy = 2,

    /// LZ4 compression (very fast, lower compression ratio).
    Lz4 = 3,

    /// LZ4 high-compression mode.
    Lz4hc = 4,
}

impl CompressionType {
    /// Every supported algorithm, in id order.
    pub const ALL: [CompressionType; 5] = [
        CompressionType::None,
        CompressionType::Zlib,
        CompressionType::Snappy,
        CompressionType::Lz4,
        CompressionType::Lz4hc,
    ];

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Zlib),
            2 => Some(CompressionType::Snappy),
            3 => Some(CompressionType::Lz4),
            4 => Some(CompressionType::Lz4hc),
            _ => None,
        }
    }

    /// Short lowercase name, as reported by the inspector.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Zlib => "zlib",
            CompressionType::Snappy => "snappy",
            CompressionType::Lz4 => "lz4",
            CompressionType::Lz4hc => "lz4hc",
        }
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        CompressionType::Zlib
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CompressionType::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_argument(format!("Unknown compression type: {}", s)))
    }
}

/// Options fixed at table writer construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterOptions {
    /// Compression algorithm applied to each data block.
    /// Default: CompressionType::Zlib
    pub compression: CompressionType,

    /// Target size of an encoded data block (in bytes).
    /// Default: 8KB
    pub block_size: usize,

    /// Number of entries between full-key restart points.
    /// Default: 16
    pub restart_interval: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            restart_interval: DEFAULT_RESTART_INTERVAL,
        }
    }
}

impl WriterOptions {
    /// Creates a new WriterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the target block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the restart interval.
    pub fn restart_interval(mut self, interval: usize) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::invalid_argument("block_size must be > 0"));
        }
        if self.block_size > u32::MAX as usize {
            return Err(Error::invalid_argument("block_size must fit in 32 bits"));
        }
        if self.restart_interval == 0 {
            return Err(Error::invalid_argument("restart_interval must be > 0"));
        }
        Ok(())
    }
}

/// Options fixed at sorter construction.
#[derive(Clone)]
pub struct SorterOptions {
    /// Resolver invoked when two entries share a key.
    /// Default: KeepLatest
    pub merge: Arc<dyn MergeResolver>,

    /// Directory that receives spilled run files.
    /// Default: the system temporary directory
    pub temp_dir: PathBuf,

    /// In-memory budget (in bytes) before the buffer is spilled to a run.
    /// Default: 1GB
    pub max_memory: usize,
}

impl Default for SorterOptions {
    fn default() -> Self {
        Self {
            merge: Arc::new(KeepLatest),
            temp_dir: std::env::temp_dir(),
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

impl fmt::Debug for SorterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SorterOptions")
            .field("merge", &self.merge.name())
            .field("temp_dir", &self.temp_dir)
            .field("max_memory", &self.max_memory)
            .finish()
    }
}

impl SorterOptions {
    /// Creates a new SorterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the merge resolver.
    pub fn merge<M: MergeResolver + 'static>(mut self, merge: M) -> Self {
        self.merge = Arc::new(merge);
        self
    }

    /// Sets the directory for run files.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Sets the in-memory budget.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Validates the options, including that the temporary directory exists
    /// and is a directory.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory == 0 {
            return Err(Error::invalid_argument("max_memory must be > 0"));
        }
        let meta = std::fs::metadata(&self.temp_dir)
            .map_err(|e| Error::from_open(e, &self.temp_dir))?;
        if !meta.is_dir() {
            return Err(Error::invalid_argument(format!(
                "Path {} is not a directory",
                self.temp_dir.display()
            )));
        }
        Ok(())
    }
}
