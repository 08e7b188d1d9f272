//! Error types for mtable.

use std::io;
use thiserror::Error;

/// The result type used throughout mtable.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for table, sorter and inspector operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A key was not strictly greater than the previously added key.
    #[error("Out of order: {0}")]
    OutOfOrder(String),

    /// The target path already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The requested path does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A data block failed validation.
    #[error("Corrupt block: {0}")]
    CorruptBlock(String),

    /// The index block or the trailer failed validation.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// The writer was already finalized, or failed and can no longer be used.
    #[error("Writer closed: {0}")]
    WriterClosed(String),

    /// The sorter was already closed or has already been written out.
    #[error("Sorter closed: {0}")]
    SorterClosed(String),

    /// Spilling or merging failed.
    #[error("Sort failed: {0}")]
    SortFailed(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates a new corrupt block error.
    pub fn corrupt_block(msg: impl Into<String>) -> Self {
        Error::CorruptBlock(msg.into())
    }

    /// Creates a new corrupt index error.
    pub fn corrupt_index(msg: impl Into<String>) -> Self {
        Error::CorruptIndex(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new sort failure.
    pub fn sort_failed(msg: impl Into<String>) -> Self {
        Error::SortFailed(msg.into())
    }

    /// Maps an I/O error raised while opening `path`, turning a missing file
    /// into [`Error::NotFound`].
    pub(crate) fn from_open(err: io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.display().to_string()),
            _ => Error::Io(err),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SortFailed(err.to_string())
    }
}
