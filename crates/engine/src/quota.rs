//! Quota operations
//!
//! Quotas are append-only records like everything else: setting one
//! appends a `QOTA` record and updates the in-memory table, last writer
//! wins per scope. A limit of 0 means unlimited. The gates themselves run
//! inside every write path (see `Volume::check_*_quota`).

use crate::info::{QuotaLimits, QuotaScope, QuotaUsage};
use crate::volume::Volume;
use tephra_core::Result;
use tephra_storage::format::QuotaRecord;

impl Volume {
    /// Assign limits to a scope, superseding any earlier assignment
    pub fn quota_set(&mut self, scope: QuotaScope, limits: QuotaLimits) -> Result<()> {
        if let QuotaScope::Branch(id) = scope {
            self.branch(id)?;
        }
        let tick = self.tick();
        self.append_quota_record(QuotaRecord {
            scope: scope.as_u64(),
            max_content_bytes: limits.max_content_bytes,
            max_ref_count: limits.max_ref_count,
            max_view_count: limits.max_view_count,
            tick,
        })
    }

    /// Current limits for a scope, if any were assigned
    pub fn quota_get(&self, scope: QuotaScope) -> Option<QuotaLimits> {
        self.quotas.get(&scope.as_u64()).copied()
    }

    /// Usage counted against a scope
    ///
    /// Per-branch scopes report the volume-shared totals: content is
    /// deduplicated across branches, so no exact per-branch byte count
    /// exists.
    pub fn quota_usage(&self, _scope: QuotaScope) -> QuotaUsage {
        QuotaUsage {
            content_bytes: self.content.total_bytes(),
            ref_count: self.refs.len() as u64,
            view_count: self.views.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tephra_core::TephraError;

    #[test]
    fn test_quota_set_get_last_writer_wins() {
        let mut volume = Volume::create().unwrap();
        assert_eq!(volume.quota_get(QuotaScope::Volume), None);

        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_content_bytes: 100,
                    ..Default::default()
                },
            )
            .unwrap();
        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_content_bytes: 200,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            volume.quota_get(QuotaScope::Volume).unwrap().max_content_bytes,
            200
        );
    }

    #[test]
    fn test_quota_for_unknown_branch_fails() {
        let mut volume = Volume::create().unwrap();
        let err = volume
            .quota_set(
                QuotaScope::Branch(tephra_core::BranchId(9)),
                QuotaLimits::default(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_content_quota_blocks_oversized_write() {
        let mut volume = Volume::create().unwrap();
        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_content_bytes: 10,
                    ..Default::default()
                },
            )
            .unwrap();
        volume.file_write("/small", b"tiny").unwrap();
        let err = volume.file_write("/big", b"way too many bytes").unwrap_err();
        assert!(matches!(err, TephraError::Quota { .. }));
        // The refused write left nothing behind.
        assert!(volume.file_read("/big").unwrap_err().is_not_found());
    }

    #[test]
    fn test_deduplicated_write_passes_content_quota() {
        let mut volume = Volume::create().unwrap();
        volume.file_write("/a", b"payload!").unwrap();
        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_content_bytes: 8,
                    ..Default::default()
                },
            )
            .unwrap();
        // Same bytes add nothing, so the quota is not exceeded.
        volume.file_write("/b", b"payload!").unwrap();
        assert_eq!(volume.stats().dedup_hits, 1);
    }

    #[test]
    fn test_ref_quota_blocks_append() {
        let mut volume = Volume::create().unwrap();
        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_ref_count: 1,
                    ..Default::default()
                },
            )
            .unwrap();
        volume.file_write("/one", b"1").unwrap();
        assert!(matches!(
            volume.file_write("/two", b"2").unwrap_err(),
            TephraError::Quota { .. }
        ));
    }

    #[test]
    fn test_view_quota_blocks_deposit() {
        let mut volume = Volume::create().unwrap();
        volume
            .quota_set(
                QuotaScope::Volume,
                QuotaLimits {
                    max_view_count: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        volume.view_create("allowed").unwrap();
        assert!(matches!(
            volume.view_create("blocked").unwrap_err(),
            TephraError::Quota { .. }
        ));
    }

    #[test]
    fn test_branch_scope_gates_only_that_branch() {
        let mut volume = Volume::create().unwrap();
        volume.branch_create("capped").unwrap();
        volume
            .quota_set(
                QuotaScope::Branch(volume.branch_current()),
                QuotaLimits {
                    max_content_bytes: 4,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            volume.file_write("/big", b"eleven bytes").unwrap_err(),
            TephraError::Quota { .. }
        ));
        // The main branch is not capped.
        volume.branch_switch_name("main").unwrap();
        volume.file_write("/big", b"eleven bytes").unwrap();
    }

    #[test]
    fn test_usage_reports_volume_totals() {
        let mut volume = Volume::create().unwrap();
        volume.file_write("/a", b"four").unwrap();
        let usage = volume.quota_usage(QuotaScope::Volume);
        assert_eq!(usage.content_bytes, 4);
        assert_eq!(usage.ref_count, 1);
        assert_eq!(usage.view_count, 2);
        // Branch scope reports the same shared totals.
        let branch_usage = volume.quota_usage(QuotaScope::Branch(volume.branch_current()));
        assert_eq!(branch_usage, usage);
    }
}
