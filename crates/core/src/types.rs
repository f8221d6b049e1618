//! Core identifier and metadata types
//!
//! This module defines the foundational types:
//! - ViewId / BranchId: arena-indexed identifiers in the snapshot DAG
//! - Tick: monotonic creation stamp
//! - FileType: discriminates regular files, directories, and symlinks
//! - Permissions: read/write/execute bits carried on every ref
//!
//! Identifiers are plain `u64` newtypes. The DAG's back-edges (view →
//! parent view) are expressed as ids rather than references, so the whole
//! structure lives in flat arenas owned by the volume.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a view (snapshot node) in the DAG
///
/// View id 0 is the null parent; view 1 is Genesis, created at volume
/// initialization. Ids are reserved monotonically and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId(pub u64);

impl ViewId {
    /// The null parent id
    pub const NULL: ViewId = ViewId(0);

    /// Genesis, the first view of every volume
    pub const GENESIS: ViewId = ViewId(1);

    /// Raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this is the null parent
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a branch
///
/// Branch id 0 is "main", created at volume initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub u64);

impl BranchId {
    /// The main branch, present in every volume
    pub const MAIN: BranchId = BranchId(0);

    /// Raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Monotonic creation stamp
///
/// Every appended record carries the tick at which it was created. Ticks
/// are strictly increasing within a volume; visibility resolution picks
/// the greatest tick among candidate refs, so ordering is total.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    /// The zero tick, predating every record
    pub const ZERO: Tick = Tick(0);

    /// Create a tick from a raw counter value
    #[inline]
    pub const fn from_u64(raw: u64) -> Self {
        Tick(raw)
    }

    /// Raw counter value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The tick immediately after this one
    #[inline]
    pub const fn next(&self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// File type carried on every ref
///
/// The numeric values are part of the on-disk ref record format and MUST
/// NOT change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum FileType {
    /// Regular file
    Regular = 0,
    /// Directory (content is the directory marker sentinel)
    Directory = 1,
    /// Symbolic link (content is the target path)
    Symlink = 2,
}

impl FileType {
    /// Convert to the on-disk representation
    pub const fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// Try to parse the on-disk representation
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(FileType::Regular),
            1 => Some(FileType::Directory),
            2 => Some(FileType::Symlink),
            _ => None,
        }
    }
}

/// Permission bits carried on every ref
///
/// Packed to a 3-bit field on disk: read = bit 0, write = bit 1,
/// execute = bit 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions {
    /// Read permission
    pub read: bool,
    /// Write permission
    pub write: bool,
    /// Execute permission
    pub execute: bool,
}

impl Permissions {
    /// Read and write, no execute; the default for new refs
    pub const RW: Permissions = Permissions {
        read: true,
        write: true,
        execute: false,
    };

    /// Read only
    pub const RO: Permissions = Permissions {
        read: true,
        write: false,
        execute: false,
    };

    /// Pack to the on-disk bit field
    pub const fn to_bits(&self) -> u32 {
        (self.read as u32) | ((self.write as u32) << 1) | ((self.execute as u32) << 2)
    }

    /// Unpack from the on-disk bit field; bits above the low three are ignored
    pub const fn from_bits(bits: u32) -> Self {
        Permissions {
            read: bits & 0b001 != 0,
            write: bits & 0b010 != 0,
            execute: bits & 0b100 != 0,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::RW
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_id_constants() {
        assert!(ViewId::NULL.is_null());
        assert!(!ViewId::GENESIS.is_null());
        assert_eq!(ViewId::GENESIS.as_u64(), 1);
    }

    #[test]
    fn test_view_id_display() {
        assert_eq!(ViewId(7).to_string(), "v7");
        assert_eq!(BranchId::MAIN.to_string(), "b0");
    }

    #[test]
    fn test_tick_ordering_and_next() {
        let t = Tick::from_u64(41);
        assert!(t < t.next());
        assert_eq!(t.next().as_u64(), 42);
        assert_eq!(Tick::ZERO.as_u64(), 0);
    }

    #[test]
    fn test_file_type_roundtrip() {
        for ft in [FileType::Regular, FileType::Directory, FileType::Symlink] {
            assert_eq!(FileType::from_u32(ft.as_u32()), Some(ft));
        }
        assert_eq!(FileType::from_u32(3), None);
        assert_eq!(FileType::from_u32(u32::MAX), None);
    }

    #[test]
    fn test_permissions_bit_packing() {
        assert_eq!(Permissions::RW.to_bits(), 0b011);
        assert_eq!(Permissions::RO.to_bits(), 0b001);
        let all = Permissions {
            read: true,
            write: true,
            execute: true,
        };
        assert_eq!(all.to_bits(), 0b111);
        assert_eq!(Permissions::from_bits(0b111), all);
        // High bits are ignored
        assert_eq!(Permissions::from_bits(0xFFF8), Permissions::from_bits(0));
    }

    #[test]
    fn test_permissions_display() {
        assert_eq!(Permissions::RW.to_string(), "rw-");
        assert_eq!(Permissions::RO.to_string(), "r--");
        assert_eq!(
            Permissions {
                read: true,
                write: false,
                execute: true
            }
            .to_string(),
            "r-x"
        );
    }

    #[test]
    fn test_permissions_default_is_rw() {
        assert_eq!(Permissions::default(), Permissions::RW);
    }

    #[test]
    fn test_ids_serde_roundtrip() {
        let v = ViewId(9);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(serde_json::from_str::<ViewId>(&json).unwrap(), v);
    }
}
