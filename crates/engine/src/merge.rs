//! Branch merge
//!
//! Three-way merge of a source branch into the current branch. The common
//! ancestor is the first view of the source's ancestry that also lies in
//! the target's ancestry; changes the source introduced after it are
//! replayed into a fresh `Merge:` stratum on the target. A path both sides
//! changed to different content is a conflict: it is counted, reported,
//! and left untouched on the target. Conflicts are never auto-resolved.
//!
//! Non-conflicting changes are applied even when conflicts are reported;
//! a change the target already carries with identical content is skipped,
//! which makes conflict-free merges idempotent.

use crate::info::MergeOutcome;
use crate::volume::Volume;
use std::collections::HashSet;
use tephra_core::{BranchId, Result, TephraError, ViewId};
use tracing::{info, warn};

impl Volume {
    /// Merge a source branch into the current branch, by id
    pub fn branch_merge(&mut self, source: BranchId) -> Result<MergeOutcome> {
        if source == self.current_branch {
            return Err(TephraError::invalid("cannot merge a branch into itself"));
        }
        let source_rec = self.branch(source)?.clone();
        let target_head = self.branch(self.current_branch)?.head;

        let target_chain = self.ancestry_of(target_head)?;
        let source_chain = self.ancestry_of(source_rec.head)?;

        // First source-side view that the target also descends from.
        let ancestor = source_chain
            .chain
            .iter()
            .copied()
            .find(|v| target_chain.set.contains(v))
            .ok_or_else(|| {
                TephraError::corrupt(format!(
                    "branches {} and {} share no ancestor",
                    source, self.current_branch
                ))
            })?;
        let ancestor_set = self.ancestry_of(ancestor)?.set;

        // Views the source deposited past the shared history, and the
        // views the target deposited past the ancestor.
        let source_after: HashSet<ViewId> = source_chain
            .set
            .difference(&target_chain.set)
            .copied()
            .collect();
        let target_after: HashSet<ViewId> = target_chain
            .set
            .difference(&ancestor_set)
            .copied()
            .collect();

        // Plan before touching the regions: per changed path, decide
        // apply / skip / conflict against the target side.
        let mut plan = Vec::new();
        let mut skipped = 0u64;
        let mut conflicts = 0u64;
        let mut seen = HashSet::new();
        for record in self.refs.entries() {
            if !source_after.contains(&record.view) || !seen.insert(record.path.as_str()) {
                continue;
            }
            let source_winner = match self.winner_in(&record.path, &source_chain.set) {
                Some(w) if !w.hidden => w,
                _ => continue,
            };
            match self.winner_in(&record.path, &target_after) {
                Some(target_winner) if !target_winner.hidden => {
                    if target_winner.content == source_winner.content {
                        skipped += 1;
                    } else {
                        conflicts += 1;
                    }
                }
                _ => plan.push(source_winner.clone()),
            }
        }

        self.check_ref_quota(plan.len() as u64)?;
        self.check_view_quota()?;

        let merge_view = self.deposit_view(&format!("Merge: {}", source_rec.name))?;
        let applied = plan.len() as u64;
        for entry in plan {
            self.push_ref(
                &entry.path,
                entry.content,
                entry.file_type,
                entry.perms,
                entry.owner,
                false,
            )?;
        }

        if conflicts > 0 {
            warn!(
                source = %source,
                target = %self.current_branch,
                conflicts,
                applied,
                "merge reported conflicts"
            );
            return Err(TephraError::Conflict {
                conflicts,
                merge_view,
            });
        }
        info!(
            source = %source,
            target = %self.current_branch,
            ancestor = %ancestor,
            applied,
            skipped,
            "merge complete"
        );
        Ok(MergeOutcome {
            merge_view,
            source,
            ancestor,
            applied,
            skipped,
        })
    }

    /// Merge a source branch into the current branch, by name
    pub fn branch_merge_name(&mut self, name: &str) -> Result<MergeOutcome> {
        let id = self.branch_id_by_name(name)?;
        self.branch_merge(id)
    }
}
