//! View operations
//!
//! Views are the strata of the timeline: immutable snapshot nodes chained
//! by parent pointers. Switching views is time travel: the ancestry cache
//! is rebuilt and the whole visible filesystem changes with it. Hiding is
//! the append-only substitute for deletion: a marker ref deposited in a
//! fresh view suppresses the path there and onward while every earlier
//! view keeps the pre-hidden content.

use crate::info::{DiffEntry, DiffResult, ViewInfo};
use crate::volume::Volume;
use std::collections::HashMap;
use tephra_core::limits::MAX_LABEL_BYTES;
use tephra_core::{Digest, Result, TephraError, ViewId};
use tracing::info;

impl Volume {
    /// Deposit an empty labelled stratum on the current branch
    pub fn view_create(&mut self, label: &str) -> Result<ViewId> {
        if label.len() > MAX_LABEL_BYTES {
            return Err(TephraError::invalid(format!(
                "label exceeds {} bytes",
                MAX_LABEL_BYTES
            )));
        }
        self.deposit_view(label)
    }

    /// Switch the current view, rebuilding visibility
    ///
    /// The current branch is left untouched; depositing new strata from an
    /// older view forks history inside the branch.
    pub fn view_switch(&mut self, view: ViewId) -> Result<()> {
        self.view(view)?;
        self.current_view = view;
        self.invalidate_ancestry();
        Ok(())
    }

    /// The current view
    pub fn view_current(&self) -> ViewId {
        self.current_view
    }

    /// Hide `path`: deposit a `Hide:` stratum carrying a hidden-marker ref
    ///
    /// Past views retain the pre-hidden ref; reads in the new view and its
    /// descendants fail `NotFound`.
    pub fn view_hide(&mut self, path: &str) -> Result<ViewId> {
        let entry = match self.lookup_visible(path)? {
            Some(e) if !e.hidden => e,
            _ => return Err(TephraError::not_found(path)),
        };
        self.gate_write(path, Some(&entry))?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;

        let view = self.deposit_view(&format!("Hide: {}", path))?;
        self.push_ref(
            path,
            Digest::ZERO,
            entry.file_type,
            entry.perms,
            entry.owner,
            true,
        )?;
        info!(path, view = %view, "path hidden");
        Ok(view)
    }

    /// All views, in creation order
    pub fn view_list(&self) -> Vec<ViewInfo> {
        self.views
            .iter()
            .map(|v| ViewInfo {
                id: v.id,
                parent: v.parent,
                branch: v.branch,
                tick: v.tick,
                label: v.label.clone(),
            })
            .collect()
    }

    /// Content difference between two views
    ///
    /// Compares the winning non-hidden refs per path under each view's
    /// ancestry.
    pub fn view_diff(&self, from: ViewId, to: ViewId) -> Result<DiffResult> {
        let map_from = self.visible_map_at(from)?;
        let map_to = self.visible_map_at(to)?;

        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut modified = Vec::new();

        for (path, digest_to) in &map_to {
            match map_from.get(path) {
                None => added.push(DiffEntry {
                    path: path.clone(),
                    from: None,
                    to: Some(*digest_to),
                }),
                Some(digest_from) if digest_from != digest_to => modified.push(DiffEntry {
                    path: path.clone(),
                    from: Some(*digest_from),
                    to: Some(*digest_to),
                }),
                Some(_) => {}
            }
        }
        for (path, digest_from) in &map_from {
            if !map_to.contains_key(path) {
                removed.push(DiffEntry {
                    path: path.clone(),
                    from: Some(*digest_from),
                    to: None,
                });
            }
        }
        added.sort_by(|a, b| a.path.cmp(&b.path));
        removed.sort_by(|a, b| a.path.cmp(&b.path));
        modified.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(DiffResult {
            from_view: from,
            to_view: to,
            added,
            removed,
            modified,
        })
    }

    /// Winning non-hidden digest per path, as seen from `view`
    pub(crate) fn visible_map_at(&self, view: ViewId) -> Result<HashMap<String, Digest>> {
        let ancestry = self.ancestry_of(view)?;
        let mut seen = std::collections::HashSet::new();
        let mut map = HashMap::new();
        for record in self.refs.entries() {
            if !seen.insert(record.path.as_str()) {
                continue;
            }
            if let Some(winner) = self.winner_in(&record.path, &ancestry.set) {
                if !winner.hidden {
                    map.insert(record.path.clone(), winner.content);
                }
            }
        }
        Ok(map)
    }
}
