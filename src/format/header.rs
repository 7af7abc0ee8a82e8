// Diff-file header encoding/decoding.
//
// Layout:
//   1. Magic "RSDF" (4 bytes) + version (1 byte)
//   2. Flags (1 byte)
//   3. [codec ID] (1 byte, if COMPRESSED)
//   4. Record count (varint)

use std::io::{self, Read, Write};

use bitflags::bitflags;

use super::{FormatError, varint};

// ---------------------------------------------------------------------------
// Magic and version
// ---------------------------------------------------------------------------

pub const DIFF_MAGIC: [u8; 4] = *b"RSDF";
pub const DIFF_VERSION: u8 = 0x01;

bitflags! {
    /// Header flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u8 {
        /// Every stored payload is followed by an Adler-32 of its raw bytes.
        const CHECKSUM = 1 << 0;
        /// A codec ID follows the flags; payloads may be compressed.
        const COMPRESSED = 1 << 1;
    }
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Parsed diff-file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub flags: HeaderFlags,
    /// Payload codec ID (if `COMPRESSED`).
    pub codec_id: Option<u8>,
    /// Number of records that follow.
    pub record_count: u64,
}

impl FileHeader {
    pub fn has_checksum(&self) -> bool {
        self.flags.contains(HeaderFlags::CHECKSUM)
    }

    pub fn is_compressed(&self) -> bool {
        self.flags.contains(HeaderFlags::COMPRESSED)
    }

    /// Encode the header to a writer.
    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&DIFF_MAGIC)?;
        w.write_all(&[DIFF_VERSION, self.flags.bits()])?;
        if self.is_compressed() {
            w.write_all(&[self.codec_id.unwrap_or(0)])?;
        }
        varint::write_u64(w, self.record_count)
    }

    /// Decode a header from a reader, validating magic, version and flags.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, FormatError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != DIFF_MAGIC {
            return Err(FormatError::InvalidInput(format!(
                "invalid diff magic: expected {:02X?}, got {magic:02X?}",
                DIFF_MAGIC
            )));
        }

        let mut buf = [0u8; 2];
        r.read_exact(&mut buf)?;
        let [version, raw_flags] = buf;
        if version != DIFF_VERSION {
            return Err(FormatError::Unsupported(format!(
                "diff file version {version:#04X}"
            )));
        }
        let flags = HeaderFlags::from_bits(raw_flags).ok_or_else(|| {
            FormatError::InvalidInput(format!("invalid header flag bits: {raw_flags:#04X}"))
        })?;

        let codec_id = if flags.contains(HeaderFlags::COMPRESSED) {
            let mut id = [0u8; 1];
            r.read_exact(&mut id)?;
            Some(id[0])
        } else {
            None
        };

        let record_count = varint::read_u64(r)?;

        Ok(Self {
            flags,
            codec_id,
            record_count,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
