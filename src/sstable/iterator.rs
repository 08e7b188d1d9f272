//! Lazy cursor over the entries of a table.

use crate::error::Result;
use crate::sstable::block::BlockIterator;
use crate::sstable::reader::TableReader;
use std::iter::FusedIterator;

/// Where a table iterator stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Bound {
    /// Run to the end of the table.
    Unbounded,
    /// Yield only an entry whose key equals this one.
    Exact(Vec<u8>),
    /// Yield while keys start with this prefix.
    Prefix(Vec<u8>),
    /// Yield while keys are below this (exclusive) end key.
    Before(Vec<u8>),
}

impl Bound {
    fn admits(&self, key: &[u8]) -> bool {
        match self {
            Bound::Unbounded => true,
            Bound::Exact(k) => key == k.as_slice(),
            Bound::Prefix(p) => key.starts_with(p),
            Bound::Before(end) => key < end.as_slice(),
        }
    }
}

/// Forward-only iterator over a key range of a [`TableReader`].
///
/// Data blocks are read and decoded one at a time, when the cursor crosses
/// into them. An error reading a block is yielded once, after which the
/// iterator is exhausted; entries already yielded stay valid.
///
/// The iterator borrows its reader and cannot outlive it.
pub struct TableIterator<'a> {
    reader: &'a TableReader,
    next_block: usize,
    block_iter: Option<BlockIterator>,
    seek_target: Option<Vec<u8>>,
    bound: Bound,
    done: bool,
}

impl<'a> TableIterator<'a> {
    pub(crate) fn new(reader: &'a TableReader, start: Option<&[u8]>, bound: Bound) -> Self {
        let first_block = match start {
            Some(key) => reader.index().find_block(key),
            None => Some(0),
        };
        Self {
            reader,
            next_block: first_block.unwrap_or(0),
            block_iter: None,
            seek_target: start.map(<[u8]>::to_vec),
            bound,
            done: first_block.is_none(),
        }
    }

    pub(crate) fn empty(reader: &'a TableReader) -> Self {
        Self {
            reader,
            next_block: 0,
            block_iter: None,
            seek_target: None,
            bound: Bound::Unbounded,
            done: true,
        }
    }

    fn load_next_block(&mut self) -> Result<bool> {
        if self.next_block >= self.reader.num_blocks() {
            return Ok(false);
        }

        let block = self.reader.read_block(self.next_block)?;
        self.next_block += 1;

        let mut iter = block.iter();
        match self.seek_target.take() {
            Some(target) => iter.seek(&target)?,
            None => iter.seek_to_first(),
        }
        self.block_iter = Some(iter);
        Ok(true)
    }

    fn advance(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            if self.block_iter.is_none() && !self.load_next_block()? {
                return Ok(None);
            }

            let Some(iter) = self.block_iter.as_mut() else {
                return Ok(None);
            };
            if !iter.advance()? {
                self.block_iter = None;
                continue;
            }

            if !self.bound.admits(iter.key()) {
                return Ok(None);
            }
            let entry = (iter.key().to_vec(), iter.value().to_vec());
            if matches!(self.bound, Bound::Exact(_)) {
                self.done = true;
            }
            return Ok(Some(entry));
        }
    }
}

impl Iterator for TableIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                self.block_iter = None;
                None
            }
            Err(e) => {
                self.done = true;
                self.block_iter = None;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for TableIterator<'_> {}
