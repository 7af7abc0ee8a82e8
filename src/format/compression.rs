// Payload compression for the base bytes stored in a diff file.
//
// Provides a pluggable `CompressBackend` trait with built-in implementations:
//   - LZMA (via lzma-rs, feature-gated `lzma-payload`)
//   - Zlib/Deflate (via flate2, feature-gated `zlib-payload`)
//   - External/custom compressors via the trait
//
// The file header records the codec ID once; each payload records whether it
// was actually compressed, since small or incompressible payloads are stored
// raw. `raw_len` comes from the file and is untrusted: decoders stop one byte
// past it and never size allocations from it alone.

use std::io;
use std::sync::Arc;

use super::FormatError;

/// Codec ID for LZMA.
pub const LZMA_ID: u8 = 2;
/// Codec ID for Zlib/Deflate.
pub const ZLIB_ID: u8 = 3;

/// Minimum payload size worth compressing.
const MIN_COMPRESS_SIZE: usize = 32;

/// Upper bound on the expansion assumed when preallocating decoder output.
const PREALLOC_RATIO: usize = 8;

/// Initial output capacity for decompressing `stored` bytes into `raw_len`.
fn output_capacity(stored: &[u8], raw_len: usize) -> usize {
    raw_len.min(stored.len().saturating_mul(PREALLOC_RATIO))
}

// ---------------------------------------------------------------------------
// CompressBackend trait
// ---------------------------------------------------------------------------

/// A pluggable compressor for stored resource bytes.
///
/// # Implementing a custom backend
///
/// ```no_run
/// use resdelta::format::compression::CompressBackend;
/// use resdelta::format::FormatError;
///
/// struct MyCompressor;
///
/// impl CompressBackend for MyCompressor {
///     fn id(&self) -> u8 { 42 }
///     fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
///         Ok(data.to_vec()) // placeholder
///     }
///     fn decompress(&self, data: &[u8], _raw_len: usize) -> Result<Vec<u8>, FormatError> {
///         Ok(data.to_vec()) // placeholder
///     }
/// }
/// ```
pub trait CompressBackend: Send + Sync {
    /// Codec ID stored in the file header.
    ///
    /// Built-in IDs: 2 (LZMA), 3 (Zlib). Custom implementations should use
    /// IDs that don't collide with these.
    fn id(&self) -> u8;

    /// Compress a payload.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress a payload of `raw_len` original bytes.
    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, FormatError>;

    /// Whether a payload is worth compressing. Default: skip if < 32 bytes.
    fn should_compress(&self, data: &[u8]) -> bool {
        data.len() >= MIN_COMPRESS_SIZE
    }
}

// ---------------------------------------------------------------------------
// LZMA backend
// ---------------------------------------------------------------------------

/// LZMA payload compressor (ID 2).
#[cfg(feature = "lzma-payload")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma-payload")]
impl CompressBackend for LzmaBackend {
    fn id(&self) -> u8 {
        LZMA_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, FormatError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = CappedWriter {
            buf: Vec::with_capacity(output_capacity(data, raw_len)),
            limit: raw_len.saturating_add(1),
        };
        lzma_rs::lzma_decompress(&mut input, &mut output)
            .map_err(|e| FormatError::InvalidInput(format!("LZMA decompression failed: {e}")))?;
        Ok(output.buf)
    }
}

/// Collects decoder output, failing once more than `limit` bytes arrive.
#[cfg(feature = "lzma-payload")]
struct CappedWriter {
    buf: Vec<u8>,
    limit: usize,
}

#[cfg(feature = "lzma-payload")]
impl io::Write for CappedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len().saturating_add(data.len()) > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "decompressed payload exceeds declared length",
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Zlib backend
// ---------------------------------------------------------------------------

/// Zlib/Deflate payload compressor (ID 3).
///
/// Uses zlib format (deflate + zlib header), not raw deflate,
/// so each payload is self-describing.
#[cfg(feature = "zlib-payload")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: flate2::Compression,
}

#[cfg(feature = "zlib-payload")]
impl ZlibBackend {
    /// Create a Zlib backend with the given compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }
}

#[cfg(feature = "zlib-payload")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "zlib-payload")]
impl CompressBackend for ZlibBackend {
    fn id(&self) -> u8 {
        ZLIB_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], raw_len: usize) -> Result<Vec<u8>, FormatError> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        // One byte past the expected length is enough to detect a mismatch.
        let limit = u64::try_from(raw_len).unwrap_or(u64::MAX).saturating_add(1);
        let mut decoder = ZlibDecoder::new(data).take(limit);
        let mut output = Vec::with_capacity(output_capacity(data, raw_len));
        decoder
            .read_to_end(&mut output)
            .map_err(|e| FormatError::InvalidInput(format!("Zlib decompression failed: {e}")))?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Compress a payload if the backend wants to and the result is smaller.
///
/// Returns `None` when the payload should be stored raw.
pub fn compress_payload(
    backend: &dyn CompressBackend,
    data: &[u8],
) -> io::Result<Option<Vec<u8>>> {
    if !backend.should_compress(data) {
        return Ok(None);
    }
    let compressed = backend.compress(data)?;
    if compressed.len() < data.len() {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

/// Built-in backend for a codec ID read from a file header.
pub fn backend_for_id(id: u8) -> Result<Box<dyn CompressBackend>, FormatError> {
    match id {
        #[cfg(feature = "lzma-payload")]
        LZMA_ID => Ok(Box::new(LzmaBackend)),
        #[cfg(feature = "zlib-payload")]
        ZLIB_ID => Ok(Box::new(ZlibBackend::default())),
        _ => Err(FormatError::Unsupported(format!(
            "payload codec ID {id} (not compiled in)"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Codec selection
// ---------------------------------------------------------------------------

/// The payload compression to use when writing a diff file.
#[derive(Clone, Default)]
pub enum PayloadCompression {
    /// Store every payload raw.
    #[default]
    None,
    /// LZMA (ID 2).
    #[cfg(feature = "lzma-payload")]
    Lzma,
    /// Zlib/Deflate (ID 3).
    #[cfg(feature = "zlib-payload")]
    Zlib {
        /// Zlib compression level (0-9). Default: 6.
        level: u32,
    },
    /// A custom backend provided by the caller.
    Custom(Arc<dyn CompressBackend>),
}

impl std::fmt::Debug for PayloadCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            #[cfg(feature = "lzma-payload")]
            Self::Lzma => write!(f, "Lzma"),
            #[cfg(feature = "zlib-payload")]
            Self::Zlib { level } => write!(f, "Zlib {{ level: {level} }}"),
            Self::Custom(b) => write!(f, "Custom(id={})", b.id()),
        }
    }
}

impl PayloadCompression {
    /// Return the backend implementation, or `None` for no compression.
    pub fn backend(&self) -> Option<Arc<dyn CompressBackend>> {
        match self {
            Self::None => None,
            #[cfg(feature = "lzma-payload")]
            Self::Lzma => Some(Arc::new(LzmaBackend)),
            #[cfg(feature = "zlib-payload")]
            Self::Zlib { level } => Some(Arc::new(ZlibBackend::new(*level))),
            Self::Custom(b) => Some(Arc::clone(b)),
        }
    }

    /// Whether payload compression is enabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
