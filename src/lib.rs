//! # Tephra
//!
//! An append-only, content-addressed, geologically-versioned filesystem
//! engine: deduplicated block storage, snapshot views, branches, and
//! three-way merge, with bit-exact persistence.
//!
//! Tephra never overwrites or erases data. Every state change deposits a
//! new record in one of three append-only regions; even deletion is a
//! marker ("hide") that suppresses a path in later views while earlier
//! views keep the content. Snapshots ("views") form a DAG; branches carry
//! movable heads over it, and time travel is a view switch away.
//!
//! # Quick Start
//!
//! ```
//! use tephra::{MemDisk, Volume};
//!
//! fn main() -> tephra::Result<()> {
//!     let mut volume = Volume::create()?;
//!
//!     // Content-addressed files: identical bytes are stored once.
//!     volume.file_write("/notes", b"strata all the way down")?;
//!     assert_eq!(volume.file_read("/notes")?, b"strata all the way down");
//!
//!     // Branch isolation (like git branches).
//!     volume.branch_create("experiment")?;
//!     volume.file_write("/scratch", b"only here")?;
//!     volume.branch_switch_name("main")?;
//!     assert!(volume.file_read("/scratch").is_err()); // isolated
//!
//!     // Merge the experiment back.
//!     volume.branch_merge_name("experiment")?;
//!     assert_eq!(volume.file_read("/scratch")?, b"only here");
//!
//!     // Persist to sector storage and restore, indices rebuilt from raw
//!     // records.
//!     let mut disk = MemDisk::new(4096);
//!     volume.save(&mut disk, 2048)?;
//!     let restored = Volume::load(&mut disk, 2048)?;
//!     assert_eq!(restored.file_read("/notes")?, b"strata all the way down");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Operation surface
//!
//! | Area | Key methods |
//! |------|-------------|
//! | **Volume** | `create`, `destroy`, `stats`, `save`, `load` |
//! | **Content** | `content_store`, `content_read`, `content_size` |
//! | **Files** | `file_write`, `file_read`, `file_append`, `mkdir`, `list`, `find`, `grep`, `stat`, `chmod`, `chown`, `rename`, `copy`, `hardlink`, `symlink`, `readlink` |
//! | **Views** | `view_create`, `view_switch`, `view_current`, `view_hide`, `view_list`, `view_diff` |
//! | **Branches** | `branch_create`, `branch_switch`, `branch_switch_name`, `branch_list`, `branch_diff`, `branch_merge` |
//! | **Quotas** | `quota_set`, `quota_get`, `quota_usage` |
//! | **Access** | `set_context`, `get_context` |
//! | **Raw I/O** | `import_sectors`, `export_sectors` |
//!
//! The engine is single-writer and synchronous; callers serialize access
//! to a [`Volume`] externally. Internal crates (core, storage, engine) are
//! re-exported here as the stable surface.

pub use tephra_core::{
    AccessContext, BranchId, Clock, Digest, FileType, MonotonicClock, Permissions, Result,
    TephraError, Tick, ViewId, CAP_FS_ADMIN, CAP_KERNEL,
};
pub use tephra_engine::{
    BranchInfo, DiffEntry, DiffResult, GrepMatch, MergeOutcome, QuotaLimits, QuotaScope,
    QuotaUsage, RefStat, ViewInfo, Volume, VolumeConfig, VolumeStats,
};
pub use tephra_storage::{FileDisk, MemDisk, SectorDevice};
