//! External sorter.
//!
//! Accepts entries in any order, spills sorted runs to temporary files when
//! its memory budget is exceeded, and on [`Sorter::write`] merges all runs
//! into a [`TableWriter`], resolving duplicate keys with the configured
//! [`MergeResolver`].
//!
//! ## Collision order
//!
//! Runs are numbered in the order they were produced, and each run is
//! sorted stably, so entries with equal keys reach the resolver in the
//! order they were added. Three or more values for one key are folded
//! pairwise, left to right.

pub mod merge;
pub mod run;

pub use merge::{Entry, KeepFirst, KeepLatest, MergeResolver, MergingRuns, RunSource};
pub use run::SortedRun;

use crate::config::SorterOptions;
use crate::error::{Error, Result};
use crate::sstable::TableWriter;

/// Approximate per-entry bookkeeping cost counted against the memory budget.
const ENTRY_OVERHEAD: usize = 2 * std::mem::size_of::<Vec<u8>>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Accepting,
    Written,
    Closed,
}

/// External sorter producing a table from unordered input.
///
/// Usage:
/// ```no_run
/// use mtable::{Sorter, SorterOptions, TableWriter, WriterOptions};
///
/// let mut sorter = Sorter::new(SorterOptions::default()).unwrap();
/// sorter.add(b"bbb", b"2").unwrap();
/// sorter.add(b"aaa", b"1").unwrap();
///
/// let mut writer = TableWriter::new("sorted.mtbl", WriterOptions::default()).unwrap();
/// sorter.write(&mut writer).unwrap();
/// sorter.close().unwrap();
/// writer.finalize().unwrap();
/// ```
#[derive(Debug)]
pub struct Sorter {
    options: SorterOptions,
    entries: Vec<Entry>,
    buffered_bytes: usize,
    runs: Vec<SortedRun>,
    num_entries: u64,
    state: State,
}

impl Sorter {
    /// Create a sorter. The temporary directory must exist.
    pub fn new(options: SorterOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            entries: Vec::new(),
            buffered_bytes: 0,
            runs: Vec::new(),
            num_entries: 0,
            state: State::Accepting,
        })
    }

    /// Add an entry. Keys may arrive in any order and may repeat.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_accepting()?;

        self.entries.push((key.to_vec(), value.to_vec()));
        self.buffered_bytes += key.len() + value.len() + ENTRY_OVERHEAD;
        self.num_entries += 1;

        if self.buffered_bytes >= self.options.max_memory {
            self.spill()?;
        }
        Ok(())
    }

    /// Sort the buffer and write it out as a new run.
    fn spill(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        // Stable: equal keys keep insertion order.
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        let run = SortedRun::spill(&self.options.temp_dir, &self.entries)?;

        log::debug!(
            "Spilled run {} with {} entries ({} bytes) to {:?}",
            self.runs.len(),
            run.len(),
            run.bytes(),
            run.path()
        );

        self.runs.push(run);
        self.entries.clear();
        self.buffered_bytes = 0;
        Ok(())
    }

    /// Merge everything added so far into `writer`.
    ///
    /// Spilled runs are streamed back from their files. Entries still
    /// buffered are sorted and merged straight from memory as the newest
    /// run; they are never spilled first.
    ///
    /// Each merged entry is passed to [`TableWriter::add`]. The writer is not
    /// finalized; committing the table is left to the caller. Any failure
    /// is reported as [`Error::SortFailed`]. The sorter accepts no more
    /// entries afterwards, whether the write succeeded or not.
    pub fn write(&mut self, writer: &mut TableWriter) -> Result<()> {
        self.ensure_accepting()?;
        self.state = State::Written;

        let result = self.merge_into(writer);
        self.runs.clear();
        self.entries = Vec::new();
        self.buffered_bytes = 0;
        result
    }

    fn merge_into(&mut self, writer: &mut TableWriter) -> Result<()> {
        let mut sources: Vec<RunSource> = Vec::with_capacity(self.runs.len() + 1);
        for run in &self.runs {
            sources.push(Box::new(run.reader()?));
        }

        // The unspilled tail is the final, newest run.
        let mut tail = std::mem::take(&mut self.entries);
        tail.sort_by(|a, b| a.0.cmp(&b.0));
        sources.push(Box::new(tail.into_iter().map(Ok)));

        let num_runs = sources.len();
        let mut merge = MergingRuns::new(sources, self.options.merge.clone())
            .map_err(into_sort_failed)?;

        let mut written = 0u64;
        for entry in merge.by_ref() {
            let (key, value) = entry.map_err(into_sort_failed)?;
            writer
                .add(&key, &value)
                .map_err(|e| Error::sort_failed(format!("target writer rejected entry: {}", e)))?;
            written += 1;
        }

        log::info!(
            "Merged {} entries from {} runs into {} unique keys ({} collisions resolved by {})",
            self.num_entries,
            num_runs,
            written,
            merge.collisions(),
            self.options.merge.name()
        );
        Ok(())
    }

    /// Release buffered entries and run files.
    ///
    /// Closing twice fails with [`Error::SorterClosed`]. Dropping the sorter
    /// releases the same resources.
    pub fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::SorterClosed("sorter is already closed".into()));
        }
        self.state = State::Closed;
        self.runs.clear();
        self.entries = Vec::new();
        self.buffered_bytes = 0;
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.state {
            State::Accepting => Ok(()),
            State::Written => Err(Error::SorterClosed("sorter has already been written".into())),
            State::Closed => Err(Error::SorterClosed("sorter is closed".into())),
        }
    }

    /// Number of entries added
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Number of runs spilled to disk so far
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// The sorter's options
    pub fn options(&self) -> &SorterOptions {
        &self.options
    }
}

fn into_sort_failed(err: Error) -> Error {
    match err {
        Error::SortFailed(_) => err,
        other => Error::sort_failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterOptions;
    use crate::sstable::TableReader;
    use tempfile::TempDir;

    fn sort_into_table(sorter: &mut Sorter, dir: &TempDir) -> Vec<(Vec<u8>, Vec<u8>)> {
        let path = dir.path().join("sorted.mtbl");
        let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
        sorter.write(&mut writer).unwrap();
        writer.finalize().unwrap();
        let reader = TableReader::open(&path).unwrap();
        reader.scan().map(|e| e.unwrap()).collect()
    }

    fn pair(k: &str, v: &str) -> (Vec<u8>, Vec<u8>) {
        (k.as_bytes().to_vec(), v.as_bytes().to_vec())
    }

    #[test]
    fn test_sorter_in_memory() {
        let dir = TempDir::new().unwrap();
        let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
        for key in ["1010", "1000", "1005", "1001"] {
            sorter.add(key.as_bytes(), b"v").unwrap();
        }
        assert_eq!(sorter.num_runs(), 0);

        let keys: Vec<Vec<u8>> = sort_into_table(&mut sorter, &dir).into_iter().map(|e| e.0).collect();
        assert_eq!(keys, vec![b"1000".to_vec(), b"1001".to_vec(), b"1005".to_vec(), b"1010".to_vec()]);
        // The buffer was merged from memory; the table is the only file written.
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(files, vec![std::ffi::OsString::from("sorted.mtbl")]);
    }

    #[test]
    fn test_sorter_spills_and_keeps_latest() {
        let dir = TempDir::new().unwrap();
        // Every entry crosses the budget, so each add spills.
        let options = SorterOptions::new().temp_dir(dir.path()).max_memory(1);
        let mut sorter = Sorter::new(options).unwrap();
        for (k, v) in [("c", "3"), ("a", "1"), ("b", "2"), ("a", "9")] {
            sorter.add(k.as_bytes(), v.as_bytes()).unwrap();
        }
        assert_eq!(sorter.num_runs(), 4);

        let table = sort_into_table(&mut sorter, &dir);
        assert_eq!(table, vec![pair("a", "9"), pair("b", "2"), pair("c", "3")]);
    }

    #[test]
    fn test_sorter_duplicates_within_one_run() {
        let dir = TempDir::new().unwrap();
        let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
        for (k, v) in [("bbb", "2"), ("aaa", "1"), ("ccc", "3"), ("bbb", "22"), ("aaa", "11")] {
            sorter.add(k.as_bytes(), v.as_bytes()).unwrap();
        }
        sorter.add(b"aaa", b"111").unwrap();

        let table = sort_into_table(&mut sorter, &dir);
        assert_eq!(table, vec![pair("aaa", "111"), pair("bbb", "22"), pair("ccc", "3")]);
    }

    #[test]
    fn test_sorter_custom_resolver_order() {
        let dir = TempDir::new().unwrap();
        let concat = |_key: &[u8], left: &[u8], right: &[u8]| [left, b",".as_slice(), right].concat();
        let options = SorterOptions::new().temp_dir(dir.path()).max_memory(80).merge(concat);
        let mut sorter = Sorter::new(options).unwrap();
        for v in ["1", "2", "3", "4", "5"] {
            sorter.add(b"k", v.as_bytes()).unwrap();
        }
        assert!(sorter.num_runs() >= 1);

        let table = sort_into_table(&mut sorter, &dir);
        assert_eq!(table, vec![pair("k", "1,2,3,4,5")]);
    }

    #[test]
    fn test_sorter_closed() {
        let dir = TempDir::new().unwrap();
        let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
        sorter.add(b"a", b"1").unwrap();
        sort_into_table(&mut sorter, &dir);

        assert!(matches!(sorter.add(b"b", b"2"), Err(Error::SorterClosed(_))));
        sorter.close().unwrap();
        assert!(matches!(sorter.close(), Err(Error::SorterClosed(_))));
        assert!(matches!(sorter.add(b"b", b"2"), Err(Error::SorterClosed(_))));
    }

    #[test]
    fn test_sorter_releases_run_files() {
        let dir = TempDir::new().unwrap();
        let runs_dir = dir.path().join("runs");
        std::fs::create_dir(&runs_dir).unwrap();
        let options = SorterOptions::new().temp_dir(&runs_dir).max_memory(1);
        let mut sorter = Sorter::new(options).unwrap();
        sorter.add(b"x", b"1").unwrap();
        sorter.add(b"y", b"2").unwrap();
        assert_eq!(std::fs::read_dir(&runs_dir).unwrap().count(), 2);

        drop(sorter);
        assert_eq!(std::fs::read_dir(&runs_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_spill_into_vanished_temp_dir() {
        let dir = TempDir::new().unwrap();
        let runs_dir = dir.path().join("runs");
        std::fs::create_dir(&runs_dir).unwrap();
        let mut sorter = Sorter::new(SorterOptions::new().temp_dir(&runs_dir).max_memory(1)).unwrap();
        std::fs::remove_dir(&runs_dir).unwrap();

        assert!(matches!(sorter.add(b"k", b"v"), Err(Error::SortFailed(_))));
    }

    #[test]
    fn test_write_into_nonempty_writer_fails() {
        let dir = TempDir::new().unwrap();
        let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
        sorter.add(b"a", b"1").unwrap();

        let mut writer = TableWriter::new(dir.path().join("t.mtbl"), WriterOptions::default()).unwrap();
        writer.add(b"z", b"last").unwrap();
        assert!(matches!(sorter.write(&mut writer), Err(Error::SortFailed(_))));
    }
}
