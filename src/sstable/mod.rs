//! Sorted table implementation.
//!
//! A table is an immutable, sorted file of key-value pairs. It is written
//! once, from strictly increasing keys, and read many times.
//!
//! ## File Format
//!
//! ```text
//! [Data Block 1]
//! [Data Block 2]
//! ...
//! [Data Block N]
//! [Index Block]     // last key of each data block -> block handle
//! [Trailer: 96B]    // file metadata, index offset, magic
//! ```
//!
//! Each block is framed with its length, a CRC32 of the stored payload
//! and the compression id; see [`footer`]. Data blocks may be compressed,
//! the index block never is.
//!
//! ## Block Format
//!
//! Each block contains:
//! - Prefix-compressed key-value entries
//! - Restart points (full keys) every `restart_interval` entries
//! - The restart offset array and its length

pub mod block;
pub mod builder;
pub mod compression;
pub mod footer;
pub mod index;
pub mod iterator;
pub mod reader;

pub use block::{decode_block, encode_block, Block, BlockBuilder, BlockIterator, DecodedBlock};
pub use builder::TableWriter;
pub use footer::{BlockHandle, Metadata};
pub use index::IndexBlock;
pub use iterator::TableIterator;
pub use reader::TableReader;

pub use crate::config::CompressionType;

/// Trailer size in bytes (fixed)
pub const FOOTER_SIZE: usize = 96;

/// Block frame header: payload length, CRC32, compression id.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Magic number closing every finalized table ("MTABLE01" in ASCII).
pub const MAGIC_NUMBER: u64 = 0x3130_454c_4241_544d;
