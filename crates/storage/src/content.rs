//! Deduplicating content store
//!
//! Blobs are keyed by their SHA-256 digest and stored exactly once: a
//! second store of the same bytes increments the dedup counter and returns
//! the existing digest. Each blob is a [`ContentHeader`] followed by the
//! stored bytes, which are LZ4-compressed when the blob is at least 64
//! bytes and compression saves at least 10%.
//!
//! The index is a 256-bucket chained hash map keyed on the first digest
//! byte. It is derived state: on load it is rebuilt by scanning the raw
//! region (pass 1 of the volume rebuild).

use crate::format::{ContentHeader, CONTENT_HEADER_SIZE};
use crate::region::Region;
use tephra_core::limits::{COMPRESS_MAX_RATIO_PERCENT, MIN_COMPRESS_BYTES};
use tephra_core::{Digest, Result, TephraError};
use tracing::debug;

/// Index entry for one stored blob
#[derive(Debug, Clone, Copy)]
struct ContentEntry {
    digest: Digest,
    /// Logical region offset of the header
    offset: u64,
    stored_size: u64,
    uncompressed_size: u64,
    compressed: bool,
}

/// Outcome of a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOutcome {
    /// Digest of the stored bytes
    pub digest: Digest,
    /// Whether the bytes were already present
    pub deduplicated: bool,
}

/// Deduplicating blob store over an append-only region
#[derive(Debug)]
pub struct ContentStore {
    region: Region,
    /// 256-bucket chained index on the first digest byte
    buckets: Vec<Vec<ContentEntry>>,
    /// Sum of uncompressed sizes of unique blobs
    total_bytes: u64,
    /// Stores that returned an existing digest
    dedup_hits: u64,
}

impl ContentStore {
    /// Create an empty store over `region`
    pub fn new(region: Region) -> ContentStore {
        ContentStore {
            region,
            buckets: vec![Vec::new(); 256],
            total_bytes: 0,
            dedup_hits: 0,
        }
    }

    /// Store `bytes`, deduplicating against previously stored blobs
    pub fn store(&mut self, bytes: &[u8]) -> Result<StoreOutcome> {
        let digest = Digest::of(bytes);
        if self.lookup(&digest).is_some() {
            self.dedup_hits += 1;
            return Ok(StoreOutcome {
                digest,
                deduplicated: true,
            });
        }

        // Opportunistic compression: only worthwhile blobs, only when the
        // ratio test passes.
        let compressed_form = if bytes.len() >= MIN_COMPRESS_BYTES {
            let candidate = lz4_flex::compress(bytes);
            if candidate.len() * 100 <= bytes.len() * COMPRESS_MAX_RATIO_PERCENT {
                Some(candidate)
            } else {
                None
            }
        } else {
            None
        };

        let (header, payload): (ContentHeader, &[u8]) = match &compressed_form {
            Some(packed) => {
                debug!(
                    digest = %digest.short(),
                    original = bytes.len(),
                    stored = packed.len(),
                    "storing compressed blob"
                );
                (
                    ContentHeader::compressed(digest, packed.len() as u64, bytes.len() as u64),
                    packed,
                )
            }
            None => (ContentHeader::plain(digest, bytes.len() as u64), bytes),
        };

        let mut record = Vec::with_capacity(CONTENT_HEADER_SIZE + payload.len());
        record.extend_from_slice(&header.to_bytes());
        record.extend_from_slice(payload);
        let offset = self.region.append(&record)?;

        self.buckets[digest.bucket() as usize].push(ContentEntry {
            digest,
            offset,
            stored_size: header.stored_size,
            uncompressed_size: header.uncompressed_size,
            compressed: header.is_compressed(),
        });
        self.total_bytes += bytes.len() as u64;
        Ok(StoreOutcome {
            digest,
            deduplicated: false,
        })
    }

    /// Read a blob back, decompressing if needed
    ///
    /// A read failure after a successful store is `Corrupt`.
    pub fn read(&self, digest: &Digest) -> Result<Vec<u8>> {
        let entry = *self
            .lookup(digest)
            .ok_or_else(|| TephraError::not_found(format!("content {}", digest.short())))?;

        let header_bytes = self
            .region
            .slice_at(entry.offset, CONTENT_HEADER_SIZE)?;
        let header = ContentHeader::from_bytes(header_bytes)?;
        if header.digest != *digest {
            return Err(TephraError::corrupt(format!(
                "content header digest mismatch at offset {}",
                entry.offset
            )));
        }

        let stored = self.region.slice_at(
            entry.offset + CONTENT_HEADER_SIZE as u64,
            entry.stored_size as usize,
        )?;
        if header.is_compressed() {
            let out = lz4_flex::decompress(stored, header.uncompressed_size as usize)
                .map_err(|e| TephraError::corrupt(format!("blob decompression failed: {}", e)))?;
            if out.len() as u64 != header.uncompressed_size {
                return Err(TephraError::corrupt(
                    "decompressed blob size does not match header",
                ));
            }
            Ok(out)
        } else {
            Ok(stored.to_vec())
        }
    }

    /// Uncompressed byte count of a stored blob
    pub fn size(&self, digest: &Digest) -> Result<u64> {
        self.lookup(digest)
            .map(|e| e.uncompressed_size)
            .ok_or_else(|| TephraError::not_found(format!("content {}", digest.short())))
    }

    /// Whether a digest is indexed
    pub fn contains(&self, digest: &Digest) -> bool {
        self.lookup(digest).is_some()
    }

    /// Sum of uncompressed sizes of unique blobs
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Stores that deduplicated against an existing blob
    pub fn dedup_hits(&self) -> u64 {
        self.dedup_hits
    }

    /// Restore the dedup counter (volume load)
    pub fn set_dedup_hits(&mut self, hits: u64) {
        self.dedup_hits = hits;
    }

    /// Number of unique blobs indexed
    pub fn unique_blobs(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Backing region (persistence streaming)
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Backing region, mutable (load)
    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Rebuild the index by scanning raw content records
    ///
    /// Pass 1 of the volume rebuild: walk headers from offset 0 through the
    /// region's used bytes, validating each magic.
    pub fn rebuild_index(&mut self) -> Result<()> {
        self.buckets = vec![Vec::new(); 256];
        self.total_bytes = 0;
        let used = self.region.used();
        let mut offset = 0u64;
        while offset < used {
            let header_bytes = self.region.slice_at(offset, CONTENT_HEADER_SIZE)?;
            let header = ContentHeader::from_bytes(header_bytes)?;
            self.buckets[header.digest.bucket() as usize].push(ContentEntry {
                digest: header.digest,
                offset,
                stored_size: header.stored_size,
                uncompressed_size: header.uncompressed_size,
                compressed: header.is_compressed(),
            });
            self.total_bytes += header.uncompressed_size;
            offset += (CONTENT_HEADER_SIZE as u64) + header.stored_size;
        }
        if offset != used {
            return Err(TephraError::corrupt(
                "content region ends inside a record",
            ));
        }
        debug!(blobs = self.unique_blobs(), bytes = self.total_bytes, "content index rebuilt");
        Ok(())
    }

    /// Whether a stored blob sits compressed on disk (test support)
    #[doc(hidden)]
    pub fn is_compressed(&self, digest: &Digest) -> Option<bool> {
        self.lookup(digest).map(|e| e.compressed)
    }

    fn lookup(&self, digest: &Digest) -> Option<&ContentEntry> {
        self.buckets[digest.bucket() as usize]
            .iter()
            .find(|e| e.digest == *digest)
    }
}
