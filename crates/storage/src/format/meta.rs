//! View, branch, and quota record layouts
//!
//! All three record kinds share one region. On load the rebuild pass
//! dispatches on the four-byte magic: view records insert DAG nodes
//! (v1 records predate branches and are promoted to branch 0), branch and
//! quota records apply last-writer-wins per id/scope.

use super::{get_padded_str, get_u64, put_padded_str, put_u32, put_u64};
use tephra_core::limits::NAME_BUF_BYTES;
use tephra_core::{BranchId, Result, TephraError, Tick, ViewId};

/// Magic bytes of a v1 view record: "VIEW"
pub const VIEW_MAGIC_V1: [u8; 4] = *b"VIEW";

/// Magic bytes of a v2 view record: "VIW2"
pub const VIEW_MAGIC_V2: [u8; 4] = *b"VIW2";

/// Magic bytes of a branch record: "BRCH"
pub const BRANCH_MAGIC: [u8; 4] = *b"BRCH";

/// Magic bytes of a quota record: "QOTA"
pub const QUOTA_MAGIC: [u8; 4] = *b"QOTA";

/// v1 view record size (no branch id)
pub const VIEW_RECORD_V1_SIZE: usize = 96;

/// v2 view record size
pub const VIEW_RECORD_V2_SIZE: usize = 104;

/// Branch record size
pub const BRANCH_RECORD_SIZE: usize = 104;

/// Quota record size
pub const QUOTA_RECORD_SIZE: usize = 48;

// =============================================================================
// View records
// =============================================================================

/// One snapshot node of the DAG, as laid out on disk
///
/// Writers always emit v2 (`VIW2`); v1 records are accepted on load with
/// their branch promoted to main.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRecord {
    /// View id
    pub id: ViewId,
    /// Parent view id (0 = null parent)
    pub parent: ViewId,
    /// Branch this view was created on
    pub branch: BranchId,
    /// Creation stamp
    pub tick: Tick,
    /// Human-readable label
    pub label: String,
}

impl ViewRecord {
    /// Serialize to the v2 on-disk layout
    pub fn to_bytes(&self) -> [u8; VIEW_RECORD_V2_SIZE] {
        let mut buf = [0u8; VIEW_RECORD_V2_SIZE];
        buf[0..4].copy_from_slice(&VIEW_MAGIC_V2);
        put_u32(&mut buf, 4, 0); // flags
        put_u64(&mut buf, 8, self.id.as_u64());
        put_u64(&mut buf, 16, self.parent.as_u64());
        put_u64(&mut buf, 24, self.branch.as_u64());
        put_u64(&mut buf, 32, self.tick.as_u64());
        put_padded_str(&mut buf[40..40 + NAME_BUF_BYTES], &self.label);
        buf
    }

    /// Parse a v2 record
    pub fn from_bytes_v2(buf: &[u8]) -> Result<Self> {
        if buf.len() < VIEW_RECORD_V2_SIZE {
            return Err(TephraError::corrupt("truncated v2 view record"));
        }
        if buf[0..4] != VIEW_MAGIC_V2 {
            return Err(TephraError::corrupt("bad v2 view magic"));
        }
        Ok(ViewRecord {
            id: ViewId(get_u64(buf, 8)),
            parent: ViewId(get_u64(buf, 16)),
            branch: BranchId(get_u64(buf, 24)),
            tick: Tick::from_u64(get_u64(buf, 32)),
            label: get_padded_str(&buf[40..40 + NAME_BUF_BYTES], "view label")?,
        })
    }

    /// Parse a v1 record, promoting its branch to main
    pub fn from_bytes_v1(buf: &[u8]) -> Result<Self> {
        if buf.len() < VIEW_RECORD_V1_SIZE {
            return Err(TephraError::corrupt("truncated v1 view record"));
        }
        if buf[0..4] != VIEW_MAGIC_V1 {
            return Err(TephraError::corrupt("bad v1 view magic"));
        }
        Ok(ViewRecord {
            id: ViewId(get_u64(buf, 8)),
            parent: ViewId(get_u64(buf, 16)),
            branch: BranchId::MAIN,
            tick: Tick::from_u64(get_u64(buf, 24)),
            label: get_padded_str(&buf[32..32 + NAME_BUF_BYTES], "view label")?,
        })
    }
}

// =============================================================================
// Branch records
// =============================================================================

/// One branch head, as laid out on disk
///
/// Successive records for the same id are appended as the head advances;
/// the latest record per id wins on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    /// Branch id
    pub id: BranchId,
    /// View the branch forked from
    pub base: ViewId,
    /// Current head view
    pub head: ViewId,
    /// Creation stamp of this record
    pub tick: Tick,
    /// Unique branch name
    pub name: String,
}

impl BranchRecord {
    /// Serialize to the on-disk layout
    pub fn to_bytes(&self) -> [u8; BRANCH_RECORD_SIZE] {
        let mut buf = [0u8; BRANCH_RECORD_SIZE];
        buf[0..4].copy_from_slice(&BRANCH_MAGIC);
        put_u32(&mut buf, 4, 0); // flags
        put_u64(&mut buf, 8, self.id.as_u64());
        put_u64(&mut buf, 16, self.base.as_u64());
        put_u64(&mut buf, 24, self.head.as_u64());
        put_u64(&mut buf, 32, self.tick.as_u64());
        put_padded_str(&mut buf[40..40 + NAME_BUF_BYTES], &self.name);
        buf
    }

    /// Parse and validate the on-disk layout
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < BRANCH_RECORD_SIZE {
            return Err(TephraError::corrupt("truncated branch record"));
        }
        if buf[0..4] != BRANCH_MAGIC {
            return Err(TephraError::corrupt("bad branch magic"));
        }
        Ok(BranchRecord {
            id: BranchId(get_u64(buf, 8)),
            base: ViewId(get_u64(buf, 16)),
            head: ViewId(get_u64(buf, 24)),
            tick: Tick::from_u64(get_u64(buf, 32)),
            name: get_padded_str(&buf[40..40 + NAME_BUF_BYTES], "branch name")?,
        })
    }
}

// =============================================================================
// Quota records
// =============================================================================

/// One quota assignment, as laid out on disk
///
/// Scope is a branch id or `u64::MAX` for volume-wide. A limit of 0 means
/// unlimited. Last writer wins per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRecord {
    /// Branch id or `QUOTA_SCOPE_VOLUME`
    pub scope: u64,
    /// Content byte cap (0 = unlimited)
    pub max_content_bytes: u64,
    /// Ref count cap (0 = unlimited)
    pub max_ref_count: u64,
    /// View count cap (0 = unlimited)
    pub max_view_count: u64,
    /// Creation stamp of this record
    pub tick: Tick,
}

impl QuotaRecord {
    /// Serialize to the on-disk layout
    pub fn to_bytes(&self) -> [u8; QUOTA_RECORD_SIZE] {
        let mut buf = [0u8; QUOTA_RECORD_SIZE];
        buf[0..4].copy_from_slice(&QUOTA_MAGIC);
        put_u32(&mut buf, 4, 0); // flags
        put_u64(&mut buf, 8, self.scope);
        put_u64(&mut buf, 16, self.max_content_bytes);
        put_u64(&mut buf, 24, self.max_ref_count);
        put_u64(&mut buf, 32, self.max_view_count);
        put_u64(&mut buf, 40, self.tick.as_u64());
        buf
    }

    /// Parse and validate the on-disk layout
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < QUOTA_RECORD_SIZE {
            return Err(TephraError::corrupt("truncated quota record"));
        }
        if buf[0..4] != QUOTA_MAGIC {
            return Err(TephraError::corrupt("bad quota magic"));
        }
        Ok(QuotaRecord {
            scope: get_u64(buf, 8),
            max_content_bytes: get_u64(buf, 16),
            max_ref_count: get_u64(buf, 24),
            max_view_count: get_u64(buf, 32),
            tick: Tick::from_u64(get_u64(buf, 40)),
        })
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// One record of the view/branch/quota region, dispatched by magic
#[derive(Debug, Clone, PartialEq)]
pub enum MetaRecord {
    /// A view node (either on-disk version)
    View(ViewRecord),
    /// A branch head record
    Branch(BranchRecord),
    /// A quota assignment
    Quota(QuotaRecord),
}

impl MetaRecord {
    /// Parse the record at the start of `buf`, returning it and its size
    ///
    /// Fails `Corrupt` on an unknown magic: the region contains nothing but
    /// these record kinds.
    pub fn parse(buf: &[u8]) -> Result<(MetaRecord, usize)> {
        if buf.len() < 4 {
            return Err(TephraError::corrupt("truncated record magic"));
        }
        let magic: [u8; 4] = buf[0..4].try_into().expect("4-byte magic");
        match magic {
            VIEW_MAGIC_V2 => Ok((
                MetaRecord::View(ViewRecord::from_bytes_v2(buf)?),
                VIEW_RECORD_V2_SIZE,
            )),
            VIEW_MAGIC_V1 => Ok((
                MetaRecord::View(ViewRecord::from_bytes_v1(buf)?),
                VIEW_RECORD_V1_SIZE,
            )),
            BRANCH_MAGIC => Ok((
                MetaRecord::Branch(BranchRecord::from_bytes(buf)?),
                BRANCH_RECORD_SIZE,
            )),
            QUOTA_MAGIC => Ok((
                MetaRecord::Quota(QuotaRecord::from_bytes(buf)?),
                QUOTA_RECORD_SIZE,
            )),
            other => Err(TephraError::corrupt(format!(
                "unknown record magic {:02x?}",
                other
            ))),
        }
    }
}
