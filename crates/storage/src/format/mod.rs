//! On-disk record formats
//!
//! Every record starts with a four-byte magic (the superblock uses eight)
//! and is laid out with little-endian integers at fixed offsets. Regions
//! are otherwise unstructured byte streams: records are written
//! back-to-back with no padding between them, and the magic is the
//! dispatch key when indices are rebuilt from raw bytes on load.
//!
//! | Record | Magic | Size |
//! |---|---|---|
//! | Superblock | `TEPHRAFS` | 512 bytes |
//! | Content header | `CONT` | 64 bytes + stored bytes |
//! | Ref record | `GREF` | 128-byte header + 512-byte path buffer |
//! | View (v1) | `VIEW` | 96 bytes |
//! | View (v2) | `VIW2` | 104 bytes |
//! | Branch | `BRCH` | 104 bytes |
//! | Quota | `QOTA` | 48 bytes |

mod content;
mod meta;
mod refrec;
mod superblock;

pub use content::{ContentHeader, CONTENT_FLAG_COMPRESSED, CONTENT_HEADER_SIZE, CONTENT_MAGIC};
pub use meta::{
    BranchRecord, MetaRecord, QuotaRecord, ViewRecord, BRANCH_MAGIC, BRANCH_RECORD_SIZE,
    QUOTA_MAGIC, QUOTA_RECORD_SIZE, VIEW_MAGIC_V1, VIEW_MAGIC_V2, VIEW_RECORD_V1_SIZE,
    VIEW_RECORD_V2_SIZE,
};
pub use refrec::{RefRecord, REF_FLAG_HIDDEN, REF_MAGIC, REF_RECORD_SIZE};
pub use superblock::{
    RegionExtent, Superblock, SUPERBLOCK_MAGIC, SUPERBLOCK_SIZE, SUPERBLOCK_VERSION,
};

use tephra_core::{Result, TephraError};

// Little-endian field helpers shared by the record layouts.

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().expect("4-byte field"))
}

pub(crate) fn get_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().expect("8-byte field"))
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], off: usize, value: u64) {
    buf[off..off + 8].copy_from_slice(&value.to_le_bytes());
}

/// Decode a NUL-padded fixed-size string buffer
pub(crate) fn get_padded_str(buf: &[u8], what: &str) -> Result<String> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end])
        .map(str::to_owned)
        .map_err(|_| TephraError::corrupt(format!("{} is not valid UTF-8", what)))
}

/// Encode a string into a NUL-padded fixed-size buffer
///
/// The caller validates length; this truncating copy is the last line of
/// defense against a corrupted in-memory string.
pub(crate) fn put_padded_str(buf: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    for b in &mut buf[n..] {
        *b = 0;
    }
}
