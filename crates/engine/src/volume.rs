//! The volume handle
//!
//! A [`Volume`] is the single-writer entry point to one filesystem: it owns
//! the three append-only regions, the content and ref indices, the
//! view/branch arenas, the quota table, and the ambient access context.
//! Everything mutates by appending records; in-memory indices are derived
//! state that load rebuilds from raw bytes.
//!
//! Every state-changing operation deposits a new view ("stratum") on the
//! current branch, labelled by the operation, then stamps its ref records
//! with that view. The branch head advances with each deposit.

use crate::info::{QuotaLimits, QuotaScope, VolumeStats};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tephra_core::limits::{MAX_LABEL_BYTES, MAX_NAME_BYTES, MAX_PATH_BYTES};
use tephra_core::{
    AccessContext, BranchId, Clock, MonotonicClock, Result, TephraError, Tick, ViewId,
};
use tephra_storage::format::{BranchRecord, QuotaRecord, RefRecord, ViewRecord};
use tephra_storage::{ContentStore, RefTable, Region};
use tracing::{debug, info};

/// Derived ancestry of the current (branch, view)
///
/// The chain runs from the current view up to (but excluding) the null
/// parent; the set mirrors it for membership tests during resolution.
#[derive(Debug)]
pub(crate) struct Ancestry {
    pub(crate) chain: Vec<ViewId>,
    pub(crate) set: HashSet<ViewId>,
}

/// Creation-time configuration
pub struct VolumeConfig {
    /// Optional cap on each region's total allocation, in bytes
    pub region_limit: Option<u64>,
    /// Creation-stamp source; defaults to a deterministic counter
    pub clock: Box<dyn Clock>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig {
            region_limit: None,
            clock: Box::new(MonotonicClock::new()),
        }
    }
}

impl std::fmt::Debug for VolumeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeConfig")
            .field("region_limit", &self.region_limit)
            .finish_non_exhaustive()
    }
}

/// A mounted volume: the single-writer engine handle
///
/// Callers must serialize access externally; read paths take `&self`,
/// writes take `&mut self`. All operations are synchronous.
pub struct Volume {
    pub(crate) content: ContentStore,
    pub(crate) refs: RefTable,
    /// View/branch/quota records share this region
    pub(crate) meta: Region,

    /// View arena, in record order, plus id lookup
    pub(crate) views: Vec<ViewRecord>,
    pub(crate) view_index: HashMap<ViewId, usize>,
    /// Branch arena (latest state per id) plus id lookup
    pub(crate) branches: Vec<BranchRecord>,
    pub(crate) branch_index: HashMap<BranchId, usize>,
    /// Quota table, last writer wins per scope id
    pub(crate) quotas: HashMap<u64, QuotaLimits>,

    pub(crate) current_view: ViewId,
    pub(crate) current_branch: BranchId,
    pub(crate) next_view: ViewId,
    pub(crate) next_branch: BranchId,
    pub(crate) created: Tick,
    pub(crate) last_tick: Tick,

    pub(crate) clock: Box<dyn Clock>,
    pub(crate) ctx: AccessContext,
    pub(crate) lookup_count: AtomicU64,
    /// Lazily rebuilt; cleared by every view/branch change
    pub(crate) ancestry: RwLock<Option<std::sync::Arc<Ancestry>>>,
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("current_view", &self.current_view)
            .field("current_branch", &self.current_branch)
            .field("views", &self.views.len())
            .field("branches", &self.branches.len())
            .field("refs", &self.refs.len())
            .finish_non_exhaustive()
    }
}

impl Volume {
    /// Create a fresh volume with Genesis (view 1) on main (branch 0)
    pub fn create() -> Result<Volume> {
        Self::create_with_config(VolumeConfig::default())
    }

    /// Create a fresh volume with explicit configuration
    pub fn create_with_config(config: VolumeConfig) -> Result<Volume> {
        let region = |kind| match config.region_limit {
            Some(limit) => Region::with_limit(kind, limit),
            None => Region::new(kind),
        };
        let mut volume = Volume {
            content: ContentStore::new(region("content")),
            refs: RefTable::new(region("refs")),
            meta: region("views"),
            views: Vec::new(),
            view_index: HashMap::new(),
            branches: Vec::new(),
            branch_index: HashMap::new(),
            quotas: HashMap::new(),
            current_view: ViewId::NULL,
            current_branch: BranchId::MAIN,
            next_view: ViewId::GENESIS,
            next_branch: BranchId::MAIN,
            created: Tick::ZERO,
            last_tick: Tick::ZERO,
            clock: config.clock,
            ctx: AccessContext::KERNEL,
            lookup_count: AtomicU64::new(0),
            ancestry: RwLock::new(None),
        };

        // Genesis stratum and the main branch that points at it.
        let genesis_tick = volume.tick();
        volume.created = genesis_tick;
        let genesis = ViewRecord {
            id: ViewId::GENESIS,
            parent: ViewId::NULL,
            branch: BranchId::MAIN,
            tick: genesis_tick,
            label: "Genesis".to_string(),
        };
        volume.meta.append(&genesis.to_bytes())?;
        volume.insert_view(genesis);
        volume.next_view = ViewId(2);
        volume.current_view = ViewId::GENESIS;

        let main = BranchRecord {
            id: BranchId::MAIN,
            base: ViewId::GENESIS,
            head: ViewId::GENESIS,
            tick: genesis_tick,
            name: "main".to_string(),
        };
        volume.meta.append(&main.to_bytes())?;
        volume.insert_branch(main);
        volume.next_branch = BranchId(1);

        info!(view = %ViewId::GENESIS, "volume created");
        Ok(volume)
    }

    /// Tear the volume down, releasing regions and indices together
    ///
    /// A debug operation: the append-only model has no other way to make
    /// data unreachable.
    pub fn destroy(self) {
        info!(
            views = self.views.len(),
            refs = self.refs.len(),
            "volume destroyed"
        );
    }

    /// Counters and sizes snapshot
    pub fn stats(&self) -> VolumeStats {
        VolumeStats {
            content_bytes: self.content.total_bytes(),
            unique_blobs: self.content.unique_blobs() as u64,
            dedup_hits: self.content.dedup_hits(),
            lookup_count: self.lookup_count.load(Ordering::Relaxed),
            total_refs: self.refs.len() as u64,
            total_views: self.views.len() as u64,
            total_branches: self.branches.len() as u64,
            current_view: self.current_view,
            current_branch: self.current_branch,
            next_view: self.next_view,
            next_branch: self.next_branch,
            content_region_used: self.content.region().used(),
            ref_region_used: self.refs.region().used(),
            meta_region_used: self.meta.used(),
        }
    }

    // =========================================================================
    // Access context
    // =========================================================================

    /// Install the ambient caller identity
    ///
    /// The engine does not authenticate; it trusts whatever the caller
    /// installs here.
    pub fn set_context(&mut self, ctx: AccessContext) {
        self.ctx = ctx;
    }

    /// The currently installed caller identity
    pub fn get_context(&self) -> AccessContext {
        self.ctx
    }

    // =========================================================================
    // Internal: ticks, arenas, strata
    // =========================================================================

    /// Next creation stamp, strictly greater than every stamp handed out
    pub(crate) fn tick(&mut self) -> Tick {
        let raw = self.clock.now().as_u64().max(self.last_tick.as_u64() + 1);
        self.last_tick = Tick::from_u64(raw);
        self.last_tick
    }

    pub(crate) fn insert_view(&mut self, record: ViewRecord) {
        self.view_index.insert(record.id, self.views.len());
        self.views.push(record);
    }

    pub(crate) fn insert_branch(&mut self, record: BranchRecord) {
        match self.branch_index.get(&record.id) {
            Some(&idx) => self.branches[idx] = record,
            None => {
                self.branch_index.insert(record.id, self.branches.len());
                self.branches.push(record);
            }
        }
    }

    pub(crate) fn view(&self, id: ViewId) -> Result<&ViewRecord> {
        self.view_index
            .get(&id)
            .map(|&idx| &self.views[idx])
            .ok_or_else(|| TephraError::not_found(format!("view {}", id)))
    }

    pub(crate) fn branch(&self, id: BranchId) -> Result<&BranchRecord> {
        self.branch_index
            .get(&id)
            .map(|&idx| &self.branches[idx])
            .ok_or_else(|| TephraError::not_found(format!("branch {}", id)))
    }

    /// Deposit a new view on the current branch and advance its head
    ///
    /// Appends the view record, then the updated branch record: the view
    /// always hits the region before the head update that points at it.
    pub(crate) fn deposit_view(&mut self, label: &str) -> Result<ViewId> {
        self.check_view_quota()?;
        let id = self.next_view;
        let tick = self.tick();
        let record = ViewRecord {
            id,
            parent: self.current_view,
            branch: self.current_branch,
            tick,
            label: clip_name(label, MAX_LABEL_BYTES),
        };
        self.meta.append(&record.to_bytes())?;
        self.insert_view(record);
        self.next_view = ViewId(id.as_u64() + 1);
        self.current_view = id;

        let idx = self.branch_index[&self.current_branch];
        self.branches[idx].head = id;
        let head_update = self.branches[idx].clone();
        self.meta.append(&head_update.to_bytes())?;

        self.invalidate_ancestry();
        debug!(view = %id, branch = %self.current_branch, label, "stratum deposited");
        Ok(id)
    }

    pub(crate) fn invalidate_ancestry(&self) {
        *self.ancestry.write() = None;
    }

    // =========================================================================
    // Internal: gates
    // =========================================================================

    /// Access gate: every write against an existing visible ref passes
    /// through here
    ///
    /// Kernel and fs-admin capabilities bypass the check; otherwise the
    /// caller must own the ref or the ref must carry the write bit.
    pub(crate) fn gate_write(&self, path: &str, existing: Option<&RefRecord>) -> Result<()> {
        if self.ctx.is_privileged() {
            return Ok(());
        }
        if let Some(entry) = existing {
            if entry.owner != self.ctx.user && !entry.perms.write {
                return Err(TephraError::permission(path));
            }
        }
        Ok(())
    }

    /// Quota gate for writes that add content bytes
    pub(crate) fn check_content_quota(&self, added: u64) -> Result<()> {
        if added == 0 {
            return Ok(());
        }
        let requested = self.content.total_bytes() + added;
        for scope in [
            QuotaScope::Branch(self.current_branch),
            QuotaScope::Volume,
        ] {
            if let Some(limits) = self.quotas.get(&scope.as_u64()) {
                if limits.max_content_bytes != 0 && requested > limits.max_content_bytes {
                    return Err(TephraError::Quota {
                        resource: "content bytes",
                        limit: limits.max_content_bytes,
                        requested,
                    });
                }
            }
        }
        Ok(())
    }

    /// Quota gate for ref appends
    pub(crate) fn check_ref_quota(&self, added: u64) -> Result<()> {
        let requested = self.refs.len() as u64 + added;
        for scope in [
            QuotaScope::Branch(self.current_branch),
            QuotaScope::Volume,
        ] {
            if let Some(limits) = self.quotas.get(&scope.as_u64()) {
                if limits.max_ref_count != 0 && requested > limits.max_ref_count {
                    return Err(TephraError::Quota {
                        resource: "ref count",
                        limit: limits.max_ref_count,
                        requested,
                    });
                }
            }
        }
        Ok(())
    }

    /// Quota gate for view deposits
    pub(crate) fn check_view_quota(&self) -> Result<()> {
        let requested = self.views.len() as u64 + 1;
        for scope in [
            QuotaScope::Branch(self.current_branch),
            QuotaScope::Volume,
        ] {
            if let Some(limits) = self.quotas.get(&scope.as_u64()) {
                if limits.max_view_count != 0 && requested > limits.max_view_count {
                    return Err(TephraError::Quota {
                        resource: "view count",
                        limit: limits.max_view_count,
                        requested,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Internal: quota records
    // =========================================================================

    pub(crate) fn append_quota_record(&mut self, record: QuotaRecord) -> Result<()> {
        self.meta.append(&record.to_bytes())?;
        self.quotas.insert(
            record.scope,
            QuotaLimits {
                max_content_bytes: record.max_content_bytes,
                max_ref_count: record.max_ref_count,
                max_view_count: record.max_view_count,
            },
        );
        Ok(())
    }
}

/// Validate an absolute path for write operations
pub(crate) fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(TephraError::invalid(format!(
            "path must be absolute: {:?}",
            path
        )));
    }
    if path.len() > MAX_PATH_BYTES {
        return Err(TephraError::invalid(format!(
            "path exceeds {} bytes",
            MAX_PATH_BYTES
        )));
    }
    if path == "/" {
        return Err(TephraError::invalid("the root itself is not addressable"));
    }
    if path.ends_with('/') {
        return Err(TephraError::invalid(format!(
            "path has a trailing slash: {:?}",
            path
        )));
    }
    if path.contains("//") {
        return Err(TephraError::invalid(format!(
            "path has an empty component: {:?}",
            path
        )));
    }
    Ok(())
}

/// Validate a branch name
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TephraError::invalid("name is empty"));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(TephraError::invalid(format!(
            "name exceeds {} bytes",
            MAX_NAME_BYTES
        )));
    }
    Ok(())
}

/// Clip a generated label to the on-disk buffer, on a char boundary
pub(crate) fn clip_name(label: &str, max: usize) -> String {
    if label.len() <= max {
        return label.to_string();
    }
    let mut end = max;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}
