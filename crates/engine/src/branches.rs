//! Branch operations
//!
//! A branch is a named movable head over the view DAG. Creating one forks
//! history at the current view without depositing anything: the head stays
//! at the fork point until the first stratum lands on the new branch.
//! Switching resets the current view to the target branch's head.

use crate::info::{BranchInfo, DiffResult};
use crate::volume::{validate_name, Volume};
use tephra_core::{BranchId, Result, TephraError, ViewId};
use tephra_storage::format::BranchRecord;
use tracing::info;

impl Volume {
    /// Create a branch forking at the current view and switch to it
    ///
    /// The name must be unique; the head stays at the fork point until the
    /// next view deposit.
    pub fn branch_create(&mut self, name: &str) -> Result<BranchId> {
        validate_name(name)?;
        if self.branches.iter().any(|b| b.name == name) {
            return Err(TephraError::exists(name));
        }
        let id = self.next_branch;
        let tick = self.tick();
        let record = BranchRecord {
            id,
            base: self.current_view,
            head: self.current_view,
            tick,
            name: name.to_string(),
        };
        self.meta.append(&record.to_bytes())?;
        self.insert_branch(record);
        self.next_branch = BranchId(id.as_u64() + 1);
        self.current_branch = id;
        // current_view stays at the fork point; ancestry is unchanged but
        // cheap to clear alongside every other branch transition.
        self.invalidate_ancestry();
        info!(branch = %id, name, base = %self.current_view, "branch created");
        Ok(id)
    }

    /// Switch to a branch by id, landing on its head view
    pub fn branch_switch(&mut self, id: BranchId) -> Result<()> {
        let head = self.branch(id)?.head;
        self.current_branch = id;
        self.current_view = head;
        self.invalidate_ancestry();
        Ok(())
    }

    /// Switch to a branch by name, landing on its head view
    pub fn branch_switch_name(&mut self, name: &str) -> Result<()> {
        let id = self
            .branches
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.id)
            .ok_or_else(|| TephraError::not_found(format!("branch {:?}", name)))?;
        self.branch_switch(id)
    }

    /// The current branch
    pub fn branch_current(&self) -> BranchId {
        self.current_branch
    }

    /// Look up a branch id by name
    pub fn branch_id_by_name(&self, name: &str) -> Result<BranchId> {
        self.branches
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.id)
            .ok_or_else(|| TephraError::not_found(format!("branch {:?}", name)))
    }

    /// All branches, in creation order
    pub fn branch_list(&self) -> Vec<BranchInfo> {
        self.branches
            .iter()
            .map(|b| BranchInfo {
                id: b.id,
                base: b.base,
                head: b.head,
                tick: b.tick,
                name: b.name.clone(),
            })
            .collect()
    }

    /// Content difference between two branches' heads
    pub fn branch_diff(&self, from: BranchId, to: BranchId) -> Result<DiffResult> {
        let from_head = self.branch(from)?.head;
        let to_head = self.branch(to)?.head;
        self.view_diff(from_head, to_head)
    }

    /// Head view of a branch
    pub fn branch_head(&self, id: BranchId) -> Result<ViewId> {
        Ok(self.branch(id)?.head)
    }
}
