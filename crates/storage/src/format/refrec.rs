//! Ref record layout
//!
//! A ref binds a path to a content digest, stamped with the view that
//! created it. Records are fixed-size: a 128-byte header followed by a
//! 512-byte NUL-padded path buffer.
//!
//! ```text
//! ┌────────┬───────┬────────────┬────────────┬──────┬──────┬─────────┬──────┬──────┬───────┬─────┬──────────┐
//! │ "GREF" │ flags │ path hash  │ digest     │ view │ tick │ path len│ type │ perm │ owner │ pad │ path 512B│
//! └────────┴───────┴────────────┴────────────┴──────┴──────┴─────────┴──────┴──────┴───────┴─────┴──────────┘
//! ```

use super::{get_u32, get_u64, put_u32, put_u64};
use tephra_core::limits::{MAX_PATH_BYTES, PATH_BUF_BYTES};
use tephra_core::{Digest, FileType, Permissions, Result, TephraError, Tick, ViewId};

/// Magic bytes of a ref record: "GREF"
pub const REF_MAGIC: [u8; 4] = *b"GREF";

/// Total ref record size: 128-byte header + 512-byte path buffer
pub const REF_RECORD_SIZE: usize = 128 + PATH_BUF_BYTES;

/// Flag bit: this ref is a hidden marker
pub const REF_FLAG_HIDDEN: u32 = 1 << 0;

/// One path→content binding, as laid out on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRecord {
    /// Hidden marker flag
    pub hidden: bool,
    /// Digest of the path string
    pub path_hash: Digest,
    /// Content digest ([`Digest::ZERO`] for hidden markers)
    pub content: Digest,
    /// View that created this ref
    pub view: ViewId,
    /// Creation stamp
    pub tick: Tick,
    /// File type
    pub file_type: FileType,
    /// Permission bits
    pub perms: Permissions,
    /// Owner user id
    pub owner: u64,
    /// The path itself
    pub path: String,
}

impl RefRecord {
    /// Serialize to the on-disk layout
    ///
    /// The path must already be within [`MAX_PATH_BYTES`]; the engine
    /// validates before appending.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; REF_RECORD_SIZE];
        buf[0..4].copy_from_slice(&REF_MAGIC);
        let flags = if self.hidden { REF_FLAG_HIDDEN } else { 0 };
        put_u32(&mut buf, 4, flags);
        buf[8..40].copy_from_slice(self.path_hash.as_bytes());
        buf[40..72].copy_from_slice(self.content.as_bytes());
        put_u64(&mut buf, 72, self.view.as_u64());
        put_u64(&mut buf, 80, self.tick.as_u64());
        put_u32(&mut buf, 88, self.path.len() as u32);
        put_u32(&mut buf, 92, self.file_type.as_u32());
        put_u32(&mut buf, 96, self.perms.to_bits());
        // 100..104 pad, keeps owner 8-byte aligned
        put_u64(&mut buf, 104, self.owner);
        // 112..128 pad
        let n = self.path.len().min(MAX_PATH_BYTES);
        buf[128..128 + n].copy_from_slice(&self.path.as_bytes()[..n]);
        buf
    }

    /// Parse and validate the on-disk layout
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < REF_RECORD_SIZE {
            return Err(TephraError::corrupt("truncated ref record"));
        }
        if buf[0..4] != REF_MAGIC {
            return Err(TephraError::corrupt(format!(
                "bad ref magic {:02x?}",
                &buf[0..4]
            )));
        }
        let flags = get_u32(buf, 4);
        let path_hash = Digest::from_bytes(buf[8..40].try_into().expect("32-byte hash"));
        let content = Digest::from_bytes(buf[40..72].try_into().expect("32-byte digest"));
        let view = ViewId(get_u64(buf, 72));
        let tick = Tick::from_u64(get_u64(buf, 80));
        let path_len = get_u32(buf, 88) as usize;
        if path_len > MAX_PATH_BYTES {
            return Err(TephraError::corrupt(format!(
                "ref path length {} exceeds buffer",
                path_len
            )));
        }
        let file_type = FileType::from_u32(get_u32(buf, 92))
            .ok_or_else(|| TephraError::corrupt("unknown ref file type"))?;
        let perms = Permissions::from_bits(get_u32(buf, 96));
        let owner = get_u64(buf, 104);
        let path = std::str::from_utf8(&buf[128..128 + path_len])
            .map_err(|_| TephraError::corrupt("ref path is not valid UTF-8"))?
            .to_owned();
        Ok(RefRecord {
            hidden: flags & REF_FLAG_HIDDEN != 0,
            path_hash,
            content,
            view,
            tick,
            file_type,
            perms,
            owner,
            path,
        })
    }
}
