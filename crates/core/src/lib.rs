//! Core types for the Tephra engine
//!
//! This crate defines the foundational types used throughout the system:
//! - Digest: 32-byte SHA-256 content/path identity
//! - ViewId / BranchId / Tick: arena ids and creation stamps
//! - FileType / Permissions: ref metadata
//! - AccessContext: ambient caller identity and capability bits
//! - TephraError: the stable error taxonomy
//! - Clock: the creation-stamp source
//! - limits: on-disk constants and engine bounds

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod clock;
pub mod digest;
pub mod error;
pub mod limits;
pub mod types;

pub use access::{AccessContext, CAP_FS_ADMIN, CAP_KERNEL};
pub use clock::{Clock, MonotonicClock};
pub use digest::Digest;
pub use error::{Result, TephraError};
pub use types::{BranchId, FileType, Permissions, Tick, ViewId};
