// Diff-file persistence.
//
// - `varint`: Variable-length integer encoding (base-128, big-endian)
// - `header`: File header (magic, version, flags, record count)
// - `compression`: Pluggable payload compression (LZMA, Zlib, custom)
// - `codec`: Record encoding, DiffReader, write_diffs/read_diffs

pub mod codec;
pub mod compression;
pub mod header;
pub mod varint;

pub use codec::{
    DiffReader, ReadOptions, WriteOptions, WriteStats, read_diffs, read_diffs_with, write_diffs,
};
pub use compression::{CompressBackend, PayloadCompression};
pub use header::{DIFF_MAGIC, FileHeader, HeaderFlags};

use std::io;

/// Errors raised while encoding or decoding a diff file.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("checksum mismatch for {name}: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),
}
