//! Public result and metadata types
//!
//! Everything a caller gets back from the volume (stats snapshots, stat
//! results, view/branch listings, diffs, merge outcomes) lives here as
//! plain serializable data.

use serde::{Deserialize, Serialize};
use tephra_core::limits::QUOTA_SCOPE_VOLUME;
use tephra_core::{BranchId, Digest, FileType, Permissions, Tick, ViewId};

/// Counters and sizes snapshot of a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Sum of uncompressed sizes of unique blobs
    pub content_bytes: u64,
    /// Unique blobs in the content store
    pub unique_blobs: u64,
    /// Stores that deduplicated against an existing blob
    pub dedup_hits: u64,
    /// Path resolutions served
    pub lookup_count: u64,
    /// Total ref records
    pub total_refs: u64,
    /// Total views in the DAG
    pub total_views: u64,
    /// Total branches
    pub total_branches: u64,
    /// Current view
    pub current_view: ViewId,
    /// Current branch
    pub current_branch: BranchId,
    /// Next view id to reserve
    pub next_view: ViewId,
    /// Next branch id to reserve
    pub next_branch: BranchId,
    /// Bytes appended to the content region
    pub content_region_used: u64,
    /// Bytes appended to the ref region
    pub ref_region_used: u64,
    /// Bytes appended to the view/branch/quota region
    pub meta_region_used: u64,
}

/// Full stat of one visible ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefStat {
    /// The path
    pub path: String,
    /// Content digest
    pub content: Digest,
    /// Uncompressed content size in bytes
    pub size: u64,
    /// File type
    pub file_type: FileType,
    /// Permission bits
    pub perms: Permissions,
    /// Owner user id
    pub owner: u64,
    /// View that created the winning ref
    pub view: ViewId,
    /// Creation stamp of the winning ref
    pub tick: Tick,
}

/// One view of the DAG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    /// View id
    pub id: ViewId,
    /// Parent view id (0 = null parent)
    pub parent: ViewId,
    /// Branch the view was created on
    pub branch: BranchId,
    /// Creation stamp
    pub tick: Tick,
    /// Label
    pub label: String,
}

/// One branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Branch id
    pub id: BranchId,
    /// View the branch forked from
    pub base: ViewId,
    /// Current head view
    pub head: ViewId,
    /// Creation stamp
    pub tick: Tick,
    /// Unique name
    pub name: String,
}

/// Scope of a quota assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotaScope {
    /// Applies to the whole volume
    Volume,
    /// Applies to one branch
    Branch(BranchId),
}

impl QuotaScope {
    /// On-disk scope id
    pub fn as_u64(&self) -> u64 {
        match self {
            QuotaScope::Volume => QUOTA_SCOPE_VOLUME,
            QuotaScope::Branch(id) => id.as_u64(),
        }
    }

    /// Parse the on-disk scope id
    pub fn from_u64(raw: u64) -> Self {
        if raw == QUOTA_SCOPE_VOLUME {
            QuotaScope::Volume
        } else {
            QuotaScope::Branch(BranchId(raw))
        }
    }
}

/// Quota limits for one scope; 0 means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Content byte cap
    pub max_content_bytes: u64,
    /// Ref count cap
    pub max_ref_count: u64,
    /// View count cap
    pub max_view_count: u64,
}

/// Usage reported for a quota scope
///
/// Per-branch scopes report volume-shared totals; see `Volume::quota_usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Uncompressed bytes of unique content
    pub content_bytes: u64,
    /// Total ref records
    pub ref_count: u64,
    /// Total views
    pub view_count: u64,
}

/// One line matched by a content grep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    /// Path of the matching file
    pub path: String,
    /// 1-based line number
    pub line_number: u64,
    /// The matching line
    pub line: String,
}

/// One path that differs between two views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// The path
    pub path: String,
    /// Content digest on the first view (None if not visible there)
    pub from: Option<Digest>,
    /// Content digest on the second view (None if not visible there)
    pub to: Option<Digest>,
}

/// Complete diff between two views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// First view compared
    pub from_view: ViewId,
    /// Second view compared
    pub to_view: ViewId,
    /// Paths visible only in the second view
    pub added: Vec<DiffEntry>,
    /// Paths visible only in the first view
    pub removed: Vec<DiffEntry>,
    /// Paths visible in both with different content
    pub modified: Vec<DiffEntry>,
}

impl DiffResult {
    /// Total differing paths
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Whether the two views are content-identical
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Outcome of a conflict-free (or partially applied) merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The merge view deposited on the target branch
    pub merge_view: ViewId,
    /// Source branch merged from
    pub source: BranchId,
    /// Common ancestor the three-way diff ran against
    pub ancestor: ViewId,
    /// Refs applied into the merge view
    pub applied: u64,
    /// Source changes skipped because the target already had identical content
    pub skipped: u64,
}
