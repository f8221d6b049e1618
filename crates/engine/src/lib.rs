//! Engine layer for the Tephra filesystem
//!
//! This crate implements the volume: the view/branch DAG, the ancestry
//! visibility resolver, file operations, three-way branch merge, access
//! and quota gating, and bit-exact persistence with full index rebuild.
//!
//! The [`Volume`] handle is the entire public surface. It is single-writer:
//! callers serialize access externally, reads take `&self`, writes take
//! `&mut self`, and every state change appends records to one of three
//! storage regions; nothing is overwritten or erased.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod branches;
mod files;
mod info;
mod merge;
mod persist;
mod quota;
mod views;
mod visibility;
mod volume;

pub use info::{
    BranchInfo, DiffEntry, DiffResult, GrepMatch, MergeOutcome, QuotaLimits, QuotaScope,
    QuotaUsage, RefStat, ViewInfo, VolumeStats,
};
pub use volume::{Volume, VolumeConfig};
