//! # mtable - Immutable Sorted Key-Value Tables
//!
//! mtable stores opaque byte-string keys and values in immutable, sorted,
//! block-structured files. A table is written once, from keys in strictly
//! increasing order, and read any number of times afterwards.
//!
//! ## Components
//!
//! - **Block codec**: prefix-compressed entries with restart points
//! - **[`TableWriter`]**: turns presorted entries into a table file
//! - **[`TableReader`]** and **[`TableIterator`]**: point, prefix, range
//!   and full-scan lookups, decoding one block at a time
//! - **[`Sorter`]**: accepts entries in any order, spills sorted runs to
//!   temporary files and merges them into a writer, resolving duplicate
//!   keys with a [`MergeResolver`]
//! - **[`inspect`]**: file statistics read from the trailer alone
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use mtable::{Sorter, SorterOptions, TableReader, TableWriter, WriterOptions};
//!
//! # fn main() -> Result<(), mtable::Error> {
//! let mut sorter = Sorter::new(SorterOptions::default())?;
//! sorter.add(b"key2", b"value2")?;
//! sorter.add(b"key1", b"value1")?;
//!
//! let mut writer = TableWriter::new("./data.mtbl", WriterOptions::default())?;
//! sorter.write(&mut writer)?;
//! sorter.close()?;
//! writer.finalize()?;
//!
//! let reader = TableReader::open("./data.mtbl")?;
//! for entry in reader.get_prefix(b"key") {
//!     let (key, value) = entry?;
//!     println!("{:?} => {:?}", key, value);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod inspect;
pub mod sorter;
pub mod sstable;

// Re-exports
pub use config::{CompressionType, SorterOptions, WriterOptions};
pub use error::{Error, Result};
pub use inspect::{inspect, TableInfo};
pub use sorter::{KeepFirst, KeepLatest, MergeResolver, Sorter};
pub use sstable::{Metadata, TableIterator, TableReader, TableWriter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
