//! Error types for the Tephra engine
//!
//! The [`TephraError`] taxonomy is stable and surfaced to callers verbatim.
//! There is no retry and no rollback: a failed write may leave region bytes
//! unused, but never corrupts prior records, and read paths recompute
//! visibility each time.
//!
//! We use `thiserror` for automatic `Display` and `Error` implementations.

use crate::types::ViewId;
use std::io;
use thiserror::Error;

/// Result type alias for Tephra operations
pub type Result<T> = std::result::Result<T, TephraError>;

/// Error taxonomy for the Tephra engine
///
/// | Kind | When |
/// |---|---|
/// | `Invalid` | Null or out-of-range input |
/// | `NotFound` | Path, view, branch, or digest absent in current ancestry |
/// | `Exists` | Duplicate branch name, rename target exists, mkdir on existing path |
/// | `Full` | Region cannot grow further |
/// | `Corrupt` | Bad magic, header/data mismatch, truncated record, bad decompression |
/// | `IsDir` / `NotDir` | Operation refused by file type |
/// | `Permission` | Access gate denied |
/// | `Quota` | Limit would be exceeded |
/// | `Conflict` | Merge saw divergent content for the same path |
/// | `SymLoop` | Symlink chain exceeded the hop bound |
/// | `Io` | Underlying sector operation failed |
#[derive(Debug, Error)]
pub enum TephraError {
    /// Null or out-of-range input
    #[error("invalid argument: {reason}")]
    Invalid {
        /// What was wrong with the input
        reason: String,
    },

    /// Path, view, branch, or digest absent in the current ancestry
    #[error("not found: {what}")]
    NotFound {
        /// Path or name that did not resolve
        what: String,
    },

    /// Duplicate name or already-occupied target path
    #[error("already exists: {what}")]
    Exists {
        /// Name or path that collided
        what: String,
    },

    /// A storage region cannot grow further
    #[error("region full: {region}")]
    Full {
        /// Which region refused the append
        region: &'static str,
    },

    /// On-disk data failed validation
    #[error("corrupt: {detail}")]
    Corrupt {
        /// What failed to validate
        detail: String,
    },

    /// Operation refused because the path is a directory
    #[error("is a directory: {path}")]
    IsDir {
        /// The offending path
        path: String,
    },

    /// Operation refused because the path is not a directory
    #[error("not a directory: {path}")]
    NotDir {
        /// The offending path
        path: String,
    },

    /// Access gate denied the write
    #[error("permission denied: {path}")]
    Permission {
        /// The protected path
        path: String,
    },

    /// A quota limit would be exceeded
    #[error("quota exceeded: {resource} (limit {limit}, requested {requested})")]
    Quota {
        /// Which resource hit its limit
        resource: &'static str,
        /// The configured limit
        limit: u64,
        /// What the write would have brought the total to
        requested: u64,
    },

    /// Merge saw divergent content for the same path
    #[error("merge conflict: {conflicts} path(s) diverged (merge view {merge_view})")]
    Conflict {
        /// Number of conflicting paths
        conflicts: u64,
        /// The merge view that carries the non-conflicting changes
        merge_view: ViewId,
    },

    /// Symlink chain exceeded the hop bound
    #[error("symlink loop resolving {path}")]
    SymLoop {
        /// The path whose resolution looped
        path: String,
    },

    /// Underlying sector operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TephraError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create an `Invalid` error
    pub fn invalid(reason: impl Into<String>) -> Self {
        TephraError::Invalid {
            reason: reason.into(),
        }
    }

    /// Create a `NotFound` error
    pub fn not_found(what: impl Into<String>) -> Self {
        TephraError::NotFound { what: what.into() }
    }

    /// Create an `Exists` error
    pub fn exists(what: impl Into<String>) -> Self {
        TephraError::Exists { what: what.into() }
    }

    /// Create a `Corrupt` error
    pub fn corrupt(detail: impl Into<String>) -> Self {
        TephraError::Corrupt {
            detail: detail.into(),
        }
    }

    /// Create a `Permission` error
    pub fn permission(path: impl Into<String>) -> Self {
        TephraError::Permission { path: path.into() }
    }

    /// Create a `SymLoop` error
    pub fn sym_loop(path: impl Into<String>) -> Self {
        TephraError::SymLoop { path: path.into() }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Whether this error means the target simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, TephraError::NotFound { .. })
    }

    /// Whether this error reports a merge conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, TephraError::Conflict { .. })
    }

    /// Whether this error indicates on-disk corruption
    ///
    /// Corruption is the only unrecoverable kind; everything else describes
    /// a refused operation on an intact volume.
    pub fn is_corruption(&self) -> bool {
        matches!(self, TephraError::Corrupt { .. })
    }

    /// Whether this error reports an exhausted resource (region or quota)
    pub fn is_resource(&self) -> bool {
        matches!(self, TephraError::Full { .. } | TephraError::Quota { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid() {
        let e = TephraError::invalid("path is empty");
        assert!(e.to_string().contains("invalid argument"));
        assert!(e.to_string().contains("path is empty"));
    }

    #[test]
    fn test_display_not_found() {
        let e = TephraError::not_found("/etc/motd");
        assert!(e.to_string().contains("not found"));
        assert!(e.to_string().contains("/etc/motd"));
        assert!(e.is_not_found());
    }

    #[test]
    fn test_display_quota() {
        let e = TephraError::Quota {
            resource: "content bytes",
            limit: 100,
            requested: 150,
        };
        let msg = e.to_string();
        assert!(msg.contains("quota exceeded"));
        assert!(msg.contains("100"));
        assert!(msg.contains("150"));
        assert!(e.is_resource());
    }

    #[test]
    fn test_display_conflict() {
        let e = TephraError::Conflict {
            conflicts: 3,
            merge_view: ViewId(12),
        };
        assert!(e.to_string().contains("3 path(s)"));
        assert!(e.is_conflict());
    }

    #[test]
    fn test_from_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let e: TephraError = io_err.into();
        assert!(matches!(e, TephraError::Io(_)));
        assert!(e.to_string().contains("I/O error"));
    }

    #[test]
    fn test_classification_is_exclusive() {
        let corrupt = TephraError::corrupt("bad magic");
        assert!(corrupt.is_corruption());
        assert!(!corrupt.is_not_found());
        assert!(!corrupt.is_conflict());
        assert!(!corrupt.is_resource());

        let full = TephraError::Full { region: "content" };
        assert!(full.is_resource());
        assert!(!full.is_corruption());
    }

    #[test]
    fn test_result_alias() {
        fn ok() -> Result<u32> {
            Ok(7)
        }
        fn err() -> Result<u32> {
            Err(TephraError::invalid("nope"))
        }
        assert_eq!(ok().unwrap(), 7);
        assert!(err().is_err());
    }
}
