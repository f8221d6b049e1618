//! Content record header
//!
//! A stored blob is a 64-byte header followed by the stored bytes, which
//! are LZ4-compressed when that pays off. The 16-byte reserved area holds
//! the uncompressed size (first 8 bytes) when the compressed flag is set.
//!
//! ```text
//! ┌──────────┬──────────┬──────────────┬────────────┬─────────────┐
//! │ "CONT"   │ flags u32│ stored u64   │ digest 32B │ reserved 16B│
//! └──────────┴──────────┴──────────────┴────────────┴─────────────┘
//! ```

use super::{get_u32, get_u64, put_u32, put_u64};
use tephra_core::{Digest, Result, TephraError};

/// Magic bytes of a content record: "CONT"
pub const CONTENT_MAGIC: [u8; 4] = *b"CONT";

/// Content header size in bytes
pub const CONTENT_HEADER_SIZE: usize = 64;

/// Flag bit: stored bytes are LZ4-compressed
pub const CONTENT_FLAG_COMPRESSED: u32 = 1 << 0;

/// 64-byte header preceding every stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHeader {
    /// Flags (bit 0 = compressed)
    pub flags: u32,
    /// Byte count of the stored (possibly compressed) payload
    pub stored_size: u64,
    /// Digest of the original bytes
    pub digest: Digest,
    /// Original byte count when compressed, else equal to `stored_size`
    pub uncompressed_size: u64,
}

impl ContentHeader {
    /// Header for an uncompressed blob
    pub fn plain(digest: Digest, size: u64) -> Self {
        ContentHeader {
            flags: 0,
            stored_size: size,
            digest,
            uncompressed_size: size,
        }
    }

    /// Header for a compressed blob
    pub fn compressed(digest: Digest, stored_size: u64, uncompressed_size: u64) -> Self {
        ContentHeader {
            flags: CONTENT_FLAG_COMPRESSED,
            stored_size,
            digest,
            uncompressed_size,
        }
    }

    /// Whether the stored bytes are compressed
    pub fn is_compressed(&self) -> bool {
        self.flags & CONTENT_FLAG_COMPRESSED != 0
    }

    /// Serialize to the on-disk layout
    pub fn to_bytes(&self) -> [u8; CONTENT_HEADER_SIZE] {
        let mut buf = [0u8; CONTENT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&CONTENT_MAGIC);
        put_u32(&mut buf, 4, self.flags);
        put_u64(&mut buf, 8, self.stored_size);
        buf[16..48].copy_from_slice(self.digest.as_bytes());
        // Reserved area: the first 8 bytes carry the uncompressed size when
        // the compressed flag is set; the rest stays zero.
        if self.is_compressed() {
            put_u64(&mut buf, 48, self.uncompressed_size);
        }
        buf
    }

    /// Parse and validate the on-disk layout
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < CONTENT_HEADER_SIZE {
            return Err(TephraError::corrupt("truncated content header"));
        }
        if buf[0..4] != CONTENT_MAGIC {
            return Err(TephraError::corrupt(format!(
                "bad content magic {:02x?}",
                &buf[0..4]
            )));
        }
        let flags = get_u32(buf, 4);
        let stored_size = get_u64(buf, 8);
        let digest = Digest::from_bytes(buf[16..48].try_into().expect("32-byte digest"));
        let uncompressed_size = if flags & CONTENT_FLAG_COMPRESSED != 0 {
            get_u64(buf, 48)
        } else {
            stored_size
        };
        Ok(ContentHeader {
            flags,
            stored_size,
            digest,
            uncompressed_size,
        })
    }
}
