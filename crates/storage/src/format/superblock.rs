//! Volume superblock
//!
//! Exactly 512 bytes at the volume's start sector. Carries the volume
//! counters, the layout of the three persisted regions, and a SHA-256
//! checksum over their streamed bytes.
//!
//! Version history: v1 volumes predate branches; their superblocks omit
//! the branch counters and their view regions contain `VIEW` records.
//! Writers emit v2. Load accepts 1 or 2 and rejects everything else.

use super::{get_u32, get_u64, put_u32, put_u64};
use tephra_core::limits::SECTOR_SIZE;
use tephra_core::{BranchId, Result, TephraError, Tick, ViewId};

/// Magic bytes of the superblock
pub const SUPERBLOCK_MAGIC: [u8; 8] = *b"TEPHRAFS";

/// Superblock size: one sector
pub const SUPERBLOCK_SIZE: usize = SECTOR_SIZE;

/// Superblock version written by this engine
pub const SUPERBLOCK_VERSION: u32 = 2;

/// Placement of one persisted region on the sector device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionExtent {
    /// Used byte count of the region
    pub used: u64,
    /// First sector of the region
    pub start_sector: u64,
    /// Sectors occupied (used bytes rounded up to sectors)
    pub sector_count: u64,
}

/// The 512-byte volume superblock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Format version (1 or 2)
    pub version: u32,
    /// Flags (reserved, zero)
    pub flags: u32,
    /// View the volume was on at save time
    pub current_view: ViewId,
    /// Next view id to reserve
    pub next_view: ViewId,
    /// Tick at volume creation
    pub created: Tick,
    /// Total uncompressed bytes of unique content
    pub content_bytes: u64,
    /// Total ref records
    pub ref_count: u64,
    /// Total view records
    pub view_count: u64,
    /// Deduplicated store hits
    pub dedup_hits: u64,
    /// Resolution lookups served
    pub lookup_count: u64,
    /// Content region placement
    pub content_region: RegionExtent,
    /// Ref region placement
    pub ref_region: RegionExtent,
    /// View/branch/quota region placement
    pub meta_region: RegionExtent,
    /// SHA-256 over the three regions' streamed bytes, in region order
    pub checksum: [u8; 32],
    /// Branch the volume was on at save time (v2)
    pub current_branch: BranchId,
    /// Next branch id to reserve (v2)
    pub next_branch: BranchId,
    /// Total branches (v2)
    pub branch_count: u64,
}

impl Superblock {
    /// Serialize to the on-disk layout (always v2)
    pub fn to_bytes(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..8].copy_from_slice(&SUPERBLOCK_MAGIC);
        put_u32(&mut buf, 8, self.version);
        put_u32(&mut buf, 12, self.flags);
        put_u64(&mut buf, 16, self.current_view.as_u64());
        put_u64(&mut buf, 24, self.next_view.as_u64());
        put_u64(&mut buf, 32, self.created.as_u64());
        put_u64(&mut buf, 40, self.content_bytes);
        put_u64(&mut buf, 48, self.ref_count);
        put_u64(&mut buf, 56, self.view_count);
        put_u64(&mut buf, 64, self.dedup_hits);
        put_u64(&mut buf, 72, self.lookup_count);
        for (i, extent) in [self.content_region, self.ref_region, self.meta_region]
            .iter()
            .enumerate()
        {
            let base = 80 + i * 24;
            put_u64(&mut buf, base, extent.used);
            put_u64(&mut buf, base + 8, extent.start_sector);
            put_u64(&mut buf, base + 16, extent.sector_count);
        }
        buf[152..184].copy_from_slice(&self.checksum);
        put_u64(&mut buf, 184, self.current_branch.as_u64());
        put_u64(&mut buf, 192, self.next_branch.as_u64());
        put_u64(&mut buf, 200, self.branch_count);
        buf
    }

    /// Parse and validate the on-disk layout
    ///
    /// Rejects unknown magic or version. v1 superblocks get main-branch
    /// defaults for the branch counters.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < SUPERBLOCK_SIZE {
            return Err(TephraError::corrupt("truncated superblock"));
        }
        if buf[0..8] != SUPERBLOCK_MAGIC {
            return Err(TephraError::corrupt(format!(
                "bad superblock magic {:02x?}",
                &buf[0..8]
            )));
        }
        let version = get_u32(buf, 8);
        if version != 1 && version != 2 {
            return Err(TephraError::corrupt(format!(
                "unsupported superblock version {}",
                version
            )));
        }
        let read_extent = |base: usize| RegionExtent {
            used: get_u64(buf, base),
            start_sector: get_u64(buf, base + 8),
            sector_count: get_u64(buf, base + 16),
        };
        let (current_branch, next_branch, branch_count) = if version >= 2 {
            (
                BranchId(get_u64(buf, 184)),
                BranchId(get_u64(buf, 192)),
                get_u64(buf, 200),
            )
        } else {
            (BranchId::MAIN, BranchId(1), 1)
        };
        Ok(Superblock {
            version,
            flags: get_u32(buf, 12),
            current_view: ViewId(get_u64(buf, 16)),
            next_view: ViewId(get_u64(buf, 24)),
            created: Tick::from_u64(get_u64(buf, 32)),
            content_bytes: get_u64(buf, 40),
            ref_count: get_u64(buf, 48),
            view_count: get_u64(buf, 56),
            dedup_hits: get_u64(buf, 64),
            lookup_count: get_u64(buf, 72),
            content_region: read_extent(80),
            ref_region: read_extent(104),
            meta_region: read_extent(128),
            checksum: buf[152..184].try_into().expect("32-byte checksum"),
            current_branch,
            next_branch,
            branch_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Superblock {
        Superblock {
            version: SUPERBLOCK_VERSION,
            flags: 0,
            current_view: ViewId(9),
            next_view: ViewId(10),
            created: Tick::from_u64(1),
            content_bytes: 1234,
            ref_count: 8,
            view_count: 9,
            dedup_hits: 2,
            lookup_count: 55,
            content_region: RegionExtent {
                used: 2048,
                start_sector: 2049,
                sector_count: 4,
            },
            ref_region: RegionExtent {
                used: 1280,
                start_sector: 2053,
                sector_count: 3,
            },
            meta_region: RegionExtent {
                used: 500,
                start_sector: 2056,
                sector_count: 1,
            },
            checksum: [7u8; 32],
            current_branch: BranchId(1),
            next_branch: BranchId(2),
            branch_count: 2,
        }
    }

    #[test]
    fn test_superblock_roundtrip() {
        let sb = sample();
        let parsed = Superblock::from_bytes(&sb.to_bytes()).unwrap();
        assert_eq!(parsed, sb);
    }

    #[test]
    fn test_superblock_is_exactly_one_sector() {
        assert_eq!(sample().to_bytes().len(), 512);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'?';
        assert!(Superblock::from_bytes(&bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[8..12].copy_from_slice(&3u32.to_le_bytes());
        assert!(Superblock::from_bytes(&bytes).unwrap_err().is_corruption());
    }

    #[test]
    fn test_v1_superblock_defaults_branch_counters() {
        let mut bytes = sample().to_bytes();
        bytes[8..12].copy_from_slice(&1u32.to_le_bytes());
        // v1 writers left the trailing area zeroed.
        for b in &mut bytes[184..] {
            *b = 0;
        }
        let parsed = Superblock::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.current_branch, BranchId::MAIN);
        assert_eq!(parsed.next_branch, BranchId(1));
        assert_eq!(parsed.branch_count, 1);
    }
}
