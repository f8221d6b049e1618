//! Storage layer for the Tephra engine
//!
//! This crate owns everything below the volume:
//! - region: growable, page-backed, append-only byte arenas
//! - format: on-disk record layouts (superblock, content, ref, view,
//!   branch, quota) with magic validation
//! - content: deduplicating blob store with opportunistic LZ4 compression
//! - refs: the append-only reference table and its bucketed index
//! - sector: sector-addressed device abstraction with memory- and
//!   file-backed implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod content;
pub mod format;
pub mod refs;
pub mod region;
pub mod sector;

pub use content::{ContentStore, StoreOutcome};
pub use refs::RefTable;
pub use region::Region;
pub use sector::{FileDisk, MemDisk, SectorDevice};
