//! Append-only region chains
//!
//! A region is a singly-linked chain of page-aligned chunks. Writes always
//! append at the tail's used offset; when the tail lacks room a new chunk
//! is allocated large enough for the write (minimum 16 pages) and linked.
//! Chunks are never freed except on teardown, and a non-tail chunk's `used`
//! is frozen, so the logical offset of a record (the sum of `used` over
//! preceding chunks plus its offset within its chunk) is stable for the
//! life of the volume.
//!
//! A record is always written wholly inside one chunk. Persistence streams
//! only the used bytes of each chunk, so on disk (and after load, where the
//! region is rebuilt as a single chunk) records are contiguous.

use tephra_core::limits::{MIN_CHUNK_PAGES, PAGE_SIZE};
use tephra_core::{Result, TephraError};

/// One page-aligned chunk of a region chain
#[derive(Debug)]
struct Chunk {
    /// Zero-initialized backing pages
    buf: Vec<u8>,
    /// Bytes appended so far; frozen once the chunk is no longer the tail
    used: usize,
}

impl Chunk {
    fn with_capacity(bytes: usize) -> Chunk {
        Chunk {
            buf: vec![0u8; bytes],
            used: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }
}

/// Growable, page-backed, append-only byte arena
///
/// One region each backs content records, ref records, and
/// view/branch/quota records. Total size and total used are sums across
/// chunks; `used` is monotonic.
#[derive(Debug)]
pub struct Region {
    /// Region name, reported in `Full` errors and stats
    kind: &'static str,
    chunks: Vec<Chunk>,
    /// Optional cap on total allocated bytes; growth past it fails `Full`
    limit: Option<u64>,
}

impl Region {
    /// Create an empty, unbounded region
    pub fn new(kind: &'static str) -> Region {
        Region {
            kind,
            chunks: Vec::new(),
            limit: None,
        }
    }

    /// Create an empty region whose total allocation may not exceed `limit`
    pub fn with_limit(kind: &'static str, limit: u64) -> Region {
        Region {
            kind,
            chunks: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Region name
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Total bytes appended across all chunks
    pub fn used(&self) -> u64 {
        self.chunks.iter().map(|c| c.used as u64).sum()
    }

    /// Total bytes allocated across all chunks
    pub fn total(&self) -> u64 {
        self.chunks.iter().map(|c| c.buf.len() as u64).sum()
    }

    /// Append `bytes`, returning the record's stable logical offset
    ///
    /// The write lands wholly inside one chunk; a new chunk is linked when
    /// the tail lacks room. Fails `Full` if growth would exceed the
    /// configured limit.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let needs_new = match self.chunks.last() {
            Some(tail) => tail.remaining() < bytes.len(),
            None => true,
        };
        if needs_new {
            self.grow(bytes.len())?;
        }
        // Offset = used bytes of every chunk before the tail + tail offset.
        let offset: u64 = self.used();
        let tail = self.chunks.last_mut().expect("grow linked a tail chunk");
        tail.buf[tail.used..tail.used + bytes.len()].copy_from_slice(bytes);
        tail.used += bytes.len();
        Ok(offset)
    }

    /// Copy `buf.len()` bytes starting at logical offset `offset`
    ///
    /// Fails `Corrupt` if the range is not wholly inside appended bytes of
    /// a single chunk.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let slice = self.slice_at(offset, buf.len())?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    /// Borrow `len` bytes starting at logical offset `offset`
    pub fn slice_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let mut base = 0u64;
        for chunk in &self.chunks {
            let chunk_used = chunk.used as u64;
            if offset < base + chunk_used {
                let within = (offset - base) as usize;
                if within + len > chunk.used {
                    return Err(TephraError::corrupt(format!(
                        "record at offset {} overruns {} region chunk",
                        offset, self.kind
                    )));
                }
                return Ok(&chunk.buf[within..within + len]);
            }
            base += chunk_used;
        }
        Err(TephraError::corrupt(format!(
            "offset {} past end of {} region (used {})",
            offset,
            self.kind,
            self.used()
        )))
    }

    /// Visit each chunk's used bytes in order (for persistence streaming)
    pub fn for_each_chunk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        for chunk in &self.chunks {
            f(&chunk.buf[..chunk.used])?;
        }
        Ok(())
    }

    /// Rebuild this region as a single chunk sized for `bytes` used bytes
    ///
    /// Used on load: the stored byte stream is read into the fresh chunk
    /// and `used` is set to the stored count. Fails `Full` if the size
    /// exceeds the configured limit.
    pub fn reset_to(&mut self, bytes: u64) -> Result<&mut [u8]> {
        let pages = (bytes as usize).div_ceil(PAGE_SIZE).max(MIN_CHUNK_PAGES);
        let capacity = pages * PAGE_SIZE;
        if let Some(limit) = self.limit {
            if capacity as u64 > limit {
                return Err(TephraError::Full { region: self.kind });
            }
        }
        let mut chunk = Chunk::with_capacity(capacity);
        chunk.used = bytes as usize;
        self.chunks = vec![chunk];
        let tail = self.chunks.last_mut().expect("just linked");
        Ok(&mut tail.buf[..bytes as usize])
    }

    fn grow(&mut self, needed: usize) -> Result<()> {
        let pages = needed.div_ceil(PAGE_SIZE).max(MIN_CHUNK_PAGES);
        let capacity = pages * PAGE_SIZE;
        if let Some(limit) = self.limit {
            if self.total() + capacity as u64 > limit {
                return Err(TephraError::Full { region: self.kind });
            }
        }
        self.chunks.push(Chunk::with_capacity(capacity));
        Ok(())
    }
}
