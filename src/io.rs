// File-level helpers for resource diffs.
//
// Provides `diff_dirs()` and `restore_dir()` convenience functions that wire
// directory collections, the diff generator and the diff-file codec together
// with buffered I/O. Optionally computes a streaming SHA-256 of the written
// diff file (feature-gated behind `file-io`).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::collection::dir::resource_path;
use crate::collection::{DirCollection, ResourceCollection};
use crate::diff::generator::{DiffGenerator, DiffOptions};
use crate::diff::record::{DiffSummary, ResourceDiff};
use crate::error::DiffError;
use crate::format::{FormatError, ReadOptions, WriteOptions, WriteStats, read_diffs_with, write_diffs};
use crate::restore::restore_base;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `diff_dirs()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Resources listed by the base collection.
    pub base_resources: u64,
    /// Resources listed by the derived collection.
    pub derived_resources: u64,
    /// Per-kind record counts.
    pub summary: DiffSummary,
    /// Encoding statistics of the diff file.
    pub write: WriteStats,
    /// Diff file size in bytes.
    pub diff_size: u64,
    /// SHA-256 of the diff file (if `file-io` feature is enabled).
    pub diff_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `restore_dir()`.
#[derive(Debug, Clone)]
pub struct RestoreStats {
    /// Records in the diff file.
    pub records: u64,
    /// Files copied unchanged from the derived tree.
    pub copied: u64,
    /// Files written from diff payloads.
    pub restored: u64,
    /// Derived files left out as added.
    pub skipped: u64,
    /// Total bytes written to the output tree.
    pub output_size: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Diff generation or restore error.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),
    /// Diff-file encoding/decoding error.
    #[error("diff file error: {0}")]
    Format(#[from] FormatError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// diff_dirs
// ---------------------------------------------------------------------------

/// Diff the tree at `base_dir` against `derived_dir`, writing the diff to
/// `diff_path`.
pub fn diff_dirs(
    base_dir: &Path,
    derived_dir: &Path,
    diff_path: &Path,
    diff_opts: DiffOptions,
    write_opts: &WriteOptions,
) -> Result<DiffStats, IoError> {
    let base = DirCollection::open(base_dir)?;
    let derived = DirCollection::open(derived_dir)?;
    let base_resources = base.names()?.len() as u64;
    let derived_resources = derived.names()?.len() as u64;

    let diffs = DiffGenerator::new(diff_opts).generate(base, derived)?;
    let summary = DiffSummary::of(&diffs);
    let (write, diff_size, diff_sha256) = write_diff_file(diff_path, &diffs, write_opts)?;

    Ok(DiffStats {
        base_resources,
        derived_resources,
        summary,
        write,
        diff_size,
        diff_sha256,
    })
}

/// Write `diffs` to `path`, returning encode stats, file size and SHA-256.
pub fn write_diff_file(
    path: &Path,
    diffs: &[ResourceDiff],
    opts: &WriteOptions,
) -> Result<(WriteStats, u64, Option<[u8; 32]>), IoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, file);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    #[cfg(feature = "file-io")]
    let stats = {
        let mut hashing_writer = HashingWriter {
            inner: &mut writer,
            hasher: &mut hasher,
        };
        write_diffs(&mut hashing_writer, diffs, opts)?
    };

    #[cfg(not(feature = "file-io"))]
    let stats = write_diffs(&mut writer, diffs, opts)?;

    let size = writer
        .into_inner()
        .map_err(|e| e.into_error())?
        .metadata()?
        .len();

    #[cfg(feature = "file-io")]
    let sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let sha256: Option<[u8; 32]> = None;

    Ok((stats, size, sha256))
}

/// Read every record of the diff file at `path`.
pub fn read_diff_file(path: &Path, verify_checksum: bool) -> Result<Vec<ResourceDiff>, IoError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(BUF_SIZE, file);
    let opts = ReadOptions {
        verify_checksum,
        ..Default::default()
    };
    Ok(read_diffs_with(reader, opts)?)
}

// ---------------------------------------------------------------------------
// restore_dir
// ---------------------------------------------------------------------------

/// Rebuild the base tree into `output_dir` from `derived_dir` and the diff
/// file at `diff_path`.
///
/// `output_dir` is created if needed; existing files in it are overwritten.
pub fn restore_dir(
    derived_dir: &Path,
    diff_path: &Path,
    output_dir: &Path,
) -> Result<RestoreStats, IoError> {
    let diffs = read_diff_file(diff_path, true)?;
    let derived = DirCollection::open(derived_dir)?;
    fs::create_dir_all(output_dir)?;

    let counts = restore_base(derived, &diffs, |name, bytes| {
        let path = resource_path(output_dir, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)
    })?;

    Ok(RestoreStats {
        records: diffs.len() as u64,
        copied: counts.copied as u64,
        restored: counts.restored as u64,
        skipped: counts.skipped as u64,
        output_size: counts.bytes,
    })
}

// ---------------------------------------------------------------------------
// Hashing writer (used with file-io feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
struct HashingWriter<'a, W: Write> {
    inner: &'a mut W,
    hasher: &'a mut sha2::Sha256,
}

#[cfg(feature = "file-io")]
impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
