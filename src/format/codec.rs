// Record encoding/decoding for diff files.
//
// Record layout (after the file header):
//   kind (1 byte) | name length (varint) | name (UTF-8)
//   removed/modified only:
//     payload indicator (1 byte) | raw length (varint) | stored length (varint)
//     stored bytes | [Adler-32 of raw bytes, 4 bytes BE, if CHECKSUM]

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::sync::Arc;

use super::compression::{CompressBackend, PayloadCompression, backend_for_id, compress_payload};
use super::header::{FileHeader, HeaderFlags};
use super::{FormatError, varint};
use crate::diff::record::{DiffKind, ResourceDiff};

/// Payload stored as-is.
const PAYLOAD_RAW: u8 = 0;
/// Payload compressed with the header's codec.
const PAYLOAD_COMPRESSED: u8 = 1;

/// Longest accepted resource name, in bytes.
pub const MAX_NAME_LEN: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Configuration for writing a diff file.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Compression applied to stored base bytes.
    pub compression: PayloadCompression,
    /// Whether to append an Adler-32 per payload (needs the `adler32` feature).
    pub checksum: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: PayloadCompression::None,
            checksum: true,
        }
    }
}

/// Configuration for reading a diff file.
#[derive(Clone)]
pub struct ReadOptions {
    /// Verify per-payload checksums when present.
    pub verify_checksum: bool,
    /// Backend for a custom codec ID. Built-in codecs need nothing here.
    pub backend: Option<Arc<dyn CompressBackend>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            backend: None,
        }
    }
}

/// Statistics returned by [`write_diffs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Records written.
    pub records: u64,
    /// Raw base bytes carried by removed/modified records.
    pub payload_bytes: u64,
    /// Bytes actually stored for those payloads.
    pub stored_bytes: u64,
    /// Payloads stored compressed.
    pub compressed_payloads: u64,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize `diffs` to `w`.
pub fn write_diffs<W: Write>(
    w: &mut W,
    diffs: &[ResourceDiff],
    opts: &WriteOptions,
) -> Result<WriteStats, FormatError> {
    let backend = opts.compression.backend();
    let checksum = opts.checksum && cfg!(feature = "adler32");
    if opts.checksum && !checksum {
        log::debug!("adler32 feature disabled; writing diff without checksums");
    }

    let mut flags = HeaderFlags::empty();
    flags.set(HeaderFlags::CHECKSUM, checksum);
    flags.set(HeaderFlags::COMPRESSED, backend.is_some());
    let header = FileHeader {
        flags,
        codec_id: backend.as_ref().map(|b| b.id()),
        record_count: diffs.len() as u64,
    };
    header.encode(w)?;

    let mut stats = WriteStats::default();
    for diff in diffs {
        write_record(w, diff, backend.as_deref(), checksum, &mut stats)?;
    }
    Ok(stats)
}

fn write_record<W: Write>(
    w: &mut W,
    diff: &ResourceDiff,
    backend: Option<&dyn CompressBackend>,
    checksum: bool,
    stats: &mut WriteStats,
) -> Result<(), FormatError> {
    let name = diff.name().as_bytes();
    if name.len() > MAX_NAME_LEN {
        return Err(FormatError::InvalidInput(format!(
            "resource name of {} bytes exceeds {MAX_NAME_LEN}",
            name.len()
        )));
    }

    w.write_all(&[diff.kind().code()])?;
    varint::write_usize(w, name.len())?;
    w.write_all(name)?;

    if let Some(raw) = diff.bytes() {
        let packed = match backend {
            Some(b) => compress_payload(b, raw)?,
            None => None,
        };
        let (indicator, stored) = match &packed {
            Some(p) => (PAYLOAD_COMPRESSED, p.as_slice()),
            None => (PAYLOAD_RAW, raw),
        };
        w.write_all(&[indicator])?;
        varint::write_usize(w, raw.len())?;
        varint::write_usize(w, stored.len())?;
        w.write_all(stored)?;
        if checksum {
            w.write_all(&adler32(raw).to_be_bytes())?;
        }

        stats.payload_bytes += raw.len() as u64;
        stats.stored_bytes += stored.len() as u64;
        stats.compressed_payloads += u64::from(indicator == PAYLOAD_COMPRESSED);
    }
    stats.records += 1;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Streaming reader yielding one record at a time.
pub struct DiffReader<R: Read> {
    inner: R,
    header: FileHeader,
    backend: Option<Arc<dyn CompressBackend>>,
    verify_checksum: bool,
    remaining: u64,
}

impl<R: Read> DiffReader<R> {
    /// Read the header and prepare to decode records.
    pub fn new(inner: R) -> Result<Self, FormatError> {
        Self::with_options(inner, ReadOptions::default())
    }

    pub fn with_options(mut inner: R, opts: ReadOptions) -> Result<Self, FormatError> {
        let header = FileHeader::decode(&mut inner)?;
        let backend = match header.codec_id {
            None => None,
            Some(id) => match opts.backend {
                Some(custom) if custom.id() == id => Some(custom),
                _ => Some(Arc::from(backend_for_id(id)?)),
            },
        };
        let remaining = header.record_count;
        Ok(Self {
            inner,
            header,
            backend,
            verify_checksum: opts.verify_checksum,
            remaining,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Records not yet decoded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Decode the next record, or `None` once all records were read.
    pub fn next_record(&mut self) -> Result<Option<ResourceDiff>, FormatError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let record = self.read_record()?;
        self.remaining -= 1;
        Ok(Some(record))
    }

    /// Check that nothing follows the last record and return the reader.
    pub fn finish(mut self) -> Result<R, FormatError> {
        while self.next_record()?.is_some() {}
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(self.inner),
                Ok(_) => {
                    return Err(FormatError::InvalidInput(
                        "trailing data after last record".into(),
                    ));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_record(&mut self) -> Result<ResourceDiff, FormatError> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        let kind = DiffKind::from_code(byte[0]).ok_or_else(|| {
            FormatError::InvalidInput(format!("unknown record kind {:#04X}", byte[0]))
        })?;

        let name_len = varint::read_usize(&mut self.inner)?;
        if name_len > MAX_NAME_LEN {
            return Err(FormatError::InvalidInput(format!(
                "resource name length {name_len} exceeds {MAX_NAME_LEN}"
            )));
        }
        let name = read_exact_vec(&mut self.inner, name_len)?;
        let name = String::from_utf8(name)
            .map_err(|_| FormatError::InvalidInput("resource name is not UTF-8".into()))?;

        match kind {
            DiffKind::Added => Ok(ResourceDiff::added(name)),
            DiffKind::Removed => {
                let bytes = self.read_payload(&name)?;
                Ok(ResourceDiff::removed(name, bytes))
            }
            DiffKind::Modified => {
                let bytes = self.read_payload(&name)?;
                Ok(ResourceDiff::modified(name, bytes))
            }
        }
    }

    fn read_payload(&mut self, name: &str) -> Result<Vec<u8>, FormatError> {
        let mut indicator = [0u8; 1];
        self.inner.read_exact(&mut indicator)?;
        let raw_len = varint::read_usize(&mut self.inner)?;
        let stored_len = varint::read_usize(&mut self.inner)?;
        let stored = read_exact_vec(&mut self.inner, stored_len)?;

        let raw = match indicator[0] {
            PAYLOAD_RAW => {
                if stored_len != raw_len {
                    return Err(FormatError::InvalidInput(format!(
                        "{name}: raw payload length {stored_len} != declared {raw_len}"
                    )));
                }
                stored
            }
            PAYLOAD_COMPRESSED => {
                let Some(backend) = self.backend.as_deref() else {
                    return Err(FormatError::InvalidInput(format!(
                        "{name}: compressed payload in an uncompressed diff"
                    )));
                };
                let raw = backend.decompress(&stored, raw_len)?;
                if raw.len() != raw_len {
                    return Err(FormatError::InvalidInput(format!(
                        "{name}: decompressed {} bytes, expected {raw_len}",
                        raw.len()
                    )));
                }
                raw
            }
            other => {
                return Err(FormatError::InvalidInput(format!(
                    "{name}: unknown payload indicator {other:#04X}"
                )));
            }
        };

        if self.header.has_checksum() {
            let mut sum = [0u8; 4];
            self.inner.read_exact(&mut sum)?;
            let expected = u32::from_be_bytes(sum);
            if self.verify_checksum && cfg!(feature = "adler32") {
                let actual = adler32(&raw);
                if actual != expected {
                    return Err(FormatError::ChecksumMismatch {
                        name: name.to_owned(),
                        expected,
                        actual,
                    });
                }
            }
        }

        Ok(raw)
    }
}

impl<R: Read> Iterator for DiffReader<R> {
    type Item = Result<ResourceDiff, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                // A decode error leaves the stream at an unknown position.
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Read a complete diff file: every record, no duplicates, no trailing data.
pub fn read_diffs<R: Read>(r: R) -> Result<Vec<ResourceDiff>, FormatError> {
    read_diffs_with(r, ReadOptions::default())
}

/// [`read_diffs`] with explicit options.
pub fn read_diffs_with<R: Read>(r: R, opts: ReadOptions) -> Result<Vec<ResourceDiff>, FormatError> {
    let mut reader = DiffReader::with_options(r, opts)?;
    // The count is untrusted; don't let it drive a huge allocation.
    let mut diffs = Vec::with_capacity(reader.remaining().min(1024) as usize);
    let mut names = HashSet::new();
    while let Some(diff) = reader.next_record()? {
        if !names.insert(diff.name().to_owned()) {
            return Err(FormatError::InvalidInput(format!(
                "duplicate record for {}",
                diff.name()
            )));
        }
        diffs.push(diff);
    }
    reader.finish()?;
    Ok(diffs)
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_vec<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    r.take(len as u64).read_to_end(&mut out)?;
    if out.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, got {}", out.len()),
        ));
    }
    Ok(out)
}

#[cfg(feature = "adler32")]
fn adler32(data: &[u8]) -> u32 {
    let mut hasher = simd_adler32::Adler32::new();
    hasher.write(data);
    hasher.finish()
}

#[cfg(not(feature = "adler32"))]
fn adler32(_data: &[u8]) -> u32 {
    0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ResourceDiff> {
        vec![
            ResourceDiff::removed("java.base/java/lang/Gone.class", b"cafebabe".to_vec()),
            ResourceDiff::modified("java.base/module-info.class", b"module java.base {}".repeat(8)),
            ResourceDiff::modified("empty", Vec::new()),
            ResourceDiff::added("jdk.internal/generated/Added.class"),
        ]
    }

    fn encode(diffs: &[ResourceDiff], opts: &WriteOptions) -> Vec<u8> {
        let mut out = Vec::new();
        write_diffs(&mut out, diffs, opts).unwrap();
        out
    }

    #[test]
    fn records_survive_write_and_read() {
        let diffs = sample();
        let bytes = encode(&diffs, &WriteOptions::default());
        assert_eq!(read_diffs(&bytes[..]).unwrap(), diffs);
    }

    #[test]
    fn empty_diff_is_header_only() {
        let bytes = encode(&[], &WriteOptions::default());
        assert_eq!(&bytes[..4], b"RSDF");
        assert_eq!(*bytes.last().unwrap(), 0);
        assert!(read_diffs(&bytes[..]).unwrap().is_empty());
    }

    #[test]
    fn stats_count_payloads() {
        let mut out = Vec::new();
        let stats = write_diffs(&mut out, &sample(), &WriteOptions::default()).unwrap();
        assert_eq!(stats.records, 4);
        assert_eq!(stats.payload_bytes, 8 + 19 * 8);
        assert_eq!(stats.stored_bytes, stats.payload_bytes);
        assert_eq!(stats.compressed_payloads, 0);
    }

    #[cfg(feature = "zlib-payload")]
    #[test]
    fn zlib_compressed_payloads() {
        let diffs = sample();
        let opts = WriteOptions {
            compression: PayloadCompression::Zlib { level: 9 },
            ..Default::default()
        };
        let mut out = Vec::new();
        let stats = write_diffs(&mut out, &diffs, &opts).unwrap();
        assert_eq!(stats.compressed_payloads, 1);
        assert!(stats.stored_bytes < stats.payload_bytes);

        let reader = DiffReader::new(&out[..]).unwrap();
        assert!(reader.header().is_compressed());
        assert_eq!(reader.header().codec_id, Some(super::super::compression::ZLIB_ID));
        assert_eq!(read_diffs(&out[..]).unwrap(), diffs);
    }

    #[test]
    fn custom_backend_needs_read_option() {
        struct Reverse;
        impl CompressBackend for Reverse {
            fn id(&self) -> u8 {
                42
            }
            fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
                // Pretend to shrink by dropping a trailing byte we can restore.
                let mut out: Vec<u8> = data.iter().rev().copied().collect();
                out.pop();
                Ok(out)
            }
            fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, FormatError> {
                let mut out: Vec<u8> = data.iter().rev().copied().collect();
                out.insert(0, b'm');
                out.truncate(raw_len);
                Ok(out)
            }
        }

        let diffs = vec![ResourceDiff::modified("m", b"m".repeat(40))];
        let backend: Arc<dyn CompressBackend> = Arc::new(Reverse);
        let opts = WriteOptions {
            compression: PayloadCompression::Custom(Arc::clone(&backend)),
            ..Default::default()
        };
        let bytes = encode(&diffs, &opts);

        assert!(matches!(
            read_diffs(&bytes[..]),
            Err(FormatError::Unsupported(_))
        ));
        let read = read_diffs_with(
            &bytes[..],
            ReadOptions {
                backend: Some(backend),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(read, diffs);
    }

    #[cfg(feature = "adler32")]
    #[test]
    fn corrupted_payload_fails_checksum() {
        let diffs = vec![ResourceDiff::removed("r", b"payload".to_vec())];
        let mut bytes = encode(&diffs, &WriteOptions::default());
        // Layout: header(7) kind(1) len(1) "r"(1) ind(1) raw(1) stored(1) payload...
        let payload_at = 7 + 1 + 1 + 1 + 1 + 1 + 1;
        bytes[payload_at] ^= 0xFF;

        let err = read_diffs(&bytes[..]).unwrap_err();
        assert!(matches!(err, FormatError::ChecksumMismatch { ref name, .. } if name == "r"));

        let lenient = read_diffs_with(
            &bytes[..],
            ReadOptions {
                verify_checksum: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(lenient[0].bytes(), Some(&b"payload"[..]));
    }

    #[test]
    fn no_checksum_option_clears_flag() {
        let opts = WriteOptions {
            checksum: false,
            ..Default::default()
        };
        let bytes = encode(&sample(), &opts);
        let reader = DiffReader::new(&bytes[..]).unwrap();
        assert!(!reader.header().has_checksum());
        assert_eq!(reader.collect::<Result<Vec<_>, _>>().unwrap(), sample());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = encode(&sample(), &WriteOptions::default());
        for cut in [8, bytes.len() / 2, bytes.len() - 1] {
            let err = read_diffs(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, FormatError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof),
                "cut={cut}: {err}"
            );
        }
    }

    #[test]
    fn trailing_data_is_rejected() {
        let mut bytes = encode(&sample(), &WriteOptions::default());
        bytes.push(0);
        assert!(matches!(
            read_diffs(&bytes[..]),
            Err(FormatError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_records_are_rejected() {
        let diffs = vec![ResourceDiff::added("a"), ResourceDiff::added("a")];
        let bytes = encode(&diffs, &WriteOptions::default());
        let err = read_diffs(&bytes[..]).unwrap_err();
        assert!(err.to_string().contains("duplicate record for a"));
        // The streaming reader itself does not police names.
        assert_eq!(DiffReader::new(&bytes[..]).unwrap().count(), 2);
    }

    #[test]
    fn unknown_kind_and_bad_utf8_are_rejected() {
        let mut bytes = encode(&[ResourceDiff::added("a")], &WriteOptions::default());
        let kind_at = bytes.len() - 3;
        bytes[kind_at] = 9;
        assert!(matches!(
            read_diffs(&bytes[..]),
            Err(FormatError::InvalidInput(_))
        ));

        let mut bytes = encode(&[ResourceDiff::added("a")], &WriteOptions::default());
        let last = bytes.len() - 1;
        bytes[last] = 0xFF;
        assert!(matches!(
            read_diffs(&bytes[..]),
            Err(FormatError::InvalidInput(_))
        ));
    }

    fn hostile_payload(flags: u8, indicator: u8, raw_len: u64) -> Vec<u8> {
        let mut file = b"RSDF\x01".to_vec();
        file.push(flags);
        if flags & HeaderFlags::COMPRESSED.bits() != 0 {
            file.push(super::super::compression::ZLIB_ID);
        }
        file.extend_from_slice(&[1, DiffKind::Removed.code(), 1, b'a', indicator]);
        varint::write_u64(&mut file, raw_len).unwrap();
        varint::write_u64(&mut file, 0).unwrap();
        file
    }

    #[test]
    fn huge_declared_raw_length_is_an_error() {
        let compressed = HeaderFlags::COMPRESSED.bits();
        for raw_len in [1u64 << 63, u64::MAX] {
            for (flags, indicator) in [(compressed, PAYLOAD_COMPRESSED), (0, PAYLOAD_RAW)] {
                let file = hostile_payload(flags, indicator, raw_len);
                assert!(read_diffs(&file[..]).is_err(), "raw_len={raw_len} flags={flags}");
            }
        }
    }

    #[test]
    fn oversized_name_rejected_on_write() {
        let diffs = vec![ResourceDiff::added("n".repeat(MAX_NAME_LEN + 1))];
        let mut out = Vec::new();
        assert!(matches!(
            write_diffs(&mut out, &diffs, &WriteOptions::default()),
            Err(FormatError::InvalidInput(_))
        ));
    }
}
