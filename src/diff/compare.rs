// Chunked byte-equality over two streams.
//
// Both streams are read in lockstep, one chunk at a time. A chunk read keeps
// pulling from the underlying reader until the chunk is full or the stream
// ends, so readers that hand out short reads compare the same as readers that
// fill every buffer. When the first stream ends, one more read is issued on
// the second to confirm it ended too.

use std::io::{self, Read};

/// Default comparison chunk (matches the file buffer size used elsewhere).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024; // 64 KiB

/// Largest chunk actually buffered; bigger requests are clamped to it.
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024; // 8 MiB

/// Compares byte streams for exact equality.
///
/// The two chunk buffers are allocated on first use and reused by every
/// later comparison made through the same comparator.
#[derive(Debug, Clone)]
pub struct StreamComparator {
    chunk_size: usize,
    buf_a: Vec<u8>,
    buf_b: Vec<u8>,
}

impl Default for StreamComparator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StreamComparator {
    /// Create a comparator reading `chunk_size` bytes per step, clamped to
    /// `1..=MAX_CHUNK_SIZE`.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            buf_a: Vec::new(),
            buf_b: Vec::new(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns `true` iff both streams yield exactly the same bytes.
    ///
    /// Both streams are consumed and dropped before returning, on every path.
    /// Read failures are returned as errors, never as `false`.
    pub fn equal<A: Read, B: Read>(&mut self, mut a: A, mut b: B) -> io::Result<bool> {
        self.buf_a.resize(self.chunk_size, 0);
        self.buf_b.resize(self.chunk_size, 0);
        let (buf_a, buf_b) = (&mut self.buf_a[..], &mut self.buf_b[..]);

        loop {
            let n_a = fill_chunk(&mut a, buf_a)?;
            if n_a == 0 {
                // `a` is exhausted; equal only if `b` is exhausted as well.
                return Ok(fill_chunk(&mut b, buf_b)? == 0);
            }

            let n_b = fill_chunk(&mut b, buf_b)?;
            if n_a != n_b {
                return Ok(false);
            }
            if buf_a[..n_a] != buf_b[..n_b] {
                return Ok(false);
            }
        }
    }
}

/// Compare two streams with the default chunk size.
pub fn streams_equal<A: Read, B: Read>(a: A, b: B) -> io::Result<bool> {
    StreamComparator::default().equal(a, b)
}

/// Read until `buf` is full or the reader reports end-of-data.
fn fill_chunk<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
