//! Spilled run files.
//!
//! A run is a sorted batch of entries written to a private temporary file
//! as a sequence of bincode-encoded `(key, value)` records. The file is
//! removed when the run is dropped.

use crate::error::{Error, Result};
use crate::sorter::merge::Entry;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// A sorted run spilled to disk.
#[derive(Debug)]
pub struct SortedRun {
    file: NamedTempFile,
    len: u64,
    bytes: u64,
}

impl SortedRun {
    /// Write already-sorted `entries` to a new run file under `dir`.
    pub fn spill(dir: &Path, entries: &[Entry]) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("mtable-run-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| Error::sort_failed(format!("create run file in {:?}: {}", dir, e)))?;

        let mut writer = BufWriter::new(file.as_file());
        for entry in entries {
            bincode::serialize_into(&mut writer, entry)?;
        }
        writer
            .flush()
            .map_err(|e| Error::sort_failed(format!("write run file {:?}: {}", file.path(), e)))?;
        drop(writer);

        let bytes = file
            .as_file()
            .metadata()
            .map_err(|e| Error::sort_failed(format!("stat run file {:?}: {}", file.path(), e)))?
            .len();

        Ok(Self { file, len: entries.len() as u64, bytes })
    }

    /// Number of entries in the run
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if the run holds no entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the run file in bytes
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Path of the run file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Open an independent reader positioned at the start of the run.
    pub fn reader(&self) -> Result<RunReader> {
        let file = self
            .file
            .reopen()
            .map_err(|e| Error::sort_failed(format!("reopen run file {:?}: {}", self.path(), e)))?;
        Ok(RunReader { reader: BufReader::new(file), remaining: self.len })
    }
}

/// Sequential reader over a run file.
pub struct RunReader {
    reader: BufReader<File>,
    remaining: u64,
}

impl Iterator for RunReader {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match bincode::deserialize_from(&mut self.reader) {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.remaining = 0;
                Some(Err(Error::sort_failed(format!("read run file: {}", e))))
            }
        }
    }
}
