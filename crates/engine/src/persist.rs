//! Persistence: save and load
//!
//! Save lays the volume out on a sector device: a 512-byte superblock at
//! the start sector, then the three regions streamed to consecutive
//! sectors through a one-sector staging buffer that crosses chunk
//! boundaries transparently. Load validates the superblock (magic, version
//! 1 or 2, region checksum), reads the regions back, and rebuilds every
//! index from raw records in three passes: content headers, ref records,
//! then view/branch/quota records dispatched by magic with last-writer-wins
//! for branch heads and quotas.

use crate::info::QuotaLimits;
use crate::volume::{Volume, VolumeConfig};
use parking_lot::RwLock;
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use tephra_core::limits::SECTOR_SIZE;
use tephra_core::{AccessContext, BranchId, MonotonicClock, Result, TephraError, Tick, ViewId};
use tephra_storage::format::{
    BranchRecord, MetaRecord, RegionExtent, Superblock, SUPERBLOCK_SIZE, SUPERBLOCK_VERSION,
};
use tephra_storage::{ContentStore, RefTable, Region, SectorDevice};
use tracing::info;

/// One-sector staging buffer feeding a device sequentially
struct SectorStream<'a> {
    device: &'a mut dyn SectorDevice,
    next_sector: u64,
    staging: [u8; SECTOR_SIZE],
    fill: usize,
}

impl<'a> SectorStream<'a> {
    fn new(device: &'a mut dyn SectorDevice, start_sector: u64) -> Self {
        SectorStream {
            device,
            next_sector: start_sector,
            staging: [0u8; SECTOR_SIZE],
            fill: 0,
        }
    }

    /// Queue bytes, flushing full sectors as they accumulate
    fn push(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = SECTOR_SIZE - self.fill;
            let take = room.min(bytes.len());
            self.staging[self.fill..self.fill + take].copy_from_slice(&bytes[..take]);
            self.fill += take;
            bytes = &bytes[take..];
            if self.fill == SECTOR_SIZE {
                self.device.write_sectors(self.next_sector, &self.staging)?;
                self.next_sector += 1;
                self.fill = 0;
            }
        }
        Ok(())
    }

    /// Zero-pad and flush the final partial sector
    fn finish(mut self) -> Result<u64> {
        if self.fill > 0 {
            for b in &mut self.staging[self.fill..] {
                *b = 0;
            }
            self.device.write_sectors(self.next_sector, &self.staging)?;
            self.next_sector += 1;
        }
        Ok(self.next_sector)
    }
}

fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE as u64)
}

/// SHA-256 over the three regions' used bytes, chained in region order
fn region_checksum(regions: [&Region; 3]) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    for region in regions {
        region.for_each_chunk(|bytes| {
            hasher.update(bytes);
            Ok(())
        })?;
    }
    Ok(hasher.finalize().into())
}

impl Volume {
    /// Serialize the whole volume to a sector device at `start_sector`
    pub fn save(&self, device: &mut dyn SectorDevice, start_sector: u64) -> Result<()> {
        let content_used = self.content.region().used();
        let ref_used = self.refs.region().used();
        let meta_used = self.meta.used();

        let content_start = start_sector + 1;
        let ref_start = content_start + sectors_for(content_used);
        let meta_start = ref_start + sectors_for(ref_used);
        let end = meta_start + sectors_for(meta_used);
        if end > device.sector_count() {
            return Err(TephraError::invalid(format!(
                "volume needs sectors {}..{} but device has {}",
                start_sector,
                end,
                device.sector_count()
            )));
        }

        let checksum =
            region_checksum([self.content.region(), self.refs.region(), &self.meta])?;
        let stats = self.stats();
        let superblock = Superblock {
            version: SUPERBLOCK_VERSION,
            flags: 0,
            current_view: self.current_view,
            next_view: self.next_view,
            created: self.created,
            content_bytes: stats.content_bytes,
            ref_count: stats.total_refs,
            view_count: stats.total_views,
            dedup_hits: stats.dedup_hits,
            lookup_count: stats.lookup_count,
            content_region: RegionExtent {
                used: content_used,
                start_sector: content_start,
                sector_count: sectors_for(content_used),
            },
            ref_region: RegionExtent {
                used: ref_used,
                start_sector: ref_start,
                sector_count: sectors_for(ref_used),
            },
            meta_region: RegionExtent {
                used: meta_used,
                start_sector: meta_start,
                sector_count: sectors_for(meta_used),
            },
            checksum,
            current_branch: self.current_branch,
            next_branch: self.next_branch,
            branch_count: stats.total_branches,
        };
        device.write_sectors(start_sector, &superblock.to_bytes())?;

        for (region, start) in [
            (self.content.region(), content_start),
            (self.refs.region(), ref_start),
            (&self.meta, meta_start),
        ] {
            let mut stream = SectorStream::new(device, start);
            region.for_each_chunk(|bytes| stream.push(bytes))?;
            stream.finish()?;
        }
        device.flush()?;
        info!(
            start_sector,
            sectors = end - start_sector,
            refs = stats.total_refs,
            views = stats.total_views,
            "volume saved"
        );
        Ok(())
    }

    /// Restore a volume from a sector device
    pub fn load(device: &mut dyn SectorDevice, start_sector: u64) -> Result<Volume> {
        Self::load_with_config(device, start_sector, VolumeConfig::default())
    }

    /// Restore a volume with explicit configuration
    pub fn load_with_config(
        device: &mut dyn SectorDevice,
        start_sector: u64,
        config: VolumeConfig,
    ) -> Result<Volume> {
        let mut sb_buf = [0u8; SUPERBLOCK_SIZE];
        device.read_sectors(start_sector, &mut sb_buf)?;
        let sb = Superblock::from_bytes(&sb_buf)?;

        let region = |kind| match config.region_limit {
            Some(limit) => Region::with_limit(kind, limit),
            None => Region::new(kind),
        };
        let mut content_region = region("content");
        let mut ref_region = region("refs");
        let mut meta_region = region("views");
        for (target, extent) in [
            (&mut content_region, sb.content_region),
            (&mut ref_region, sb.ref_region),
            (&mut meta_region, sb.meta_region),
        ] {
            if sectors_for(extent.used) > extent.sector_count {
                return Err(TephraError::corrupt(
                    "region used bytes exceed its sector extent",
                ));
            }
            let in_range = extent
                .start_sector
                .checked_add(extent.sector_count)
                .is_some_and(|end| end <= device.sector_count());
            if !in_range {
                return Err(TephraError::corrupt(
                    "region extent lies outside the device",
                ));
            }
            let mut raw = vec![0u8; extent.sector_count as usize * SECTOR_SIZE];
            device.read_sectors(extent.start_sector, &mut raw)?;
            let buf = target.reset_to(extent.used)?;
            buf.copy_from_slice(&raw[..extent.used as usize]);
        }

        let checksum = region_checksum([&content_region, &ref_region, &meta_region])?;
        if checksum != sb.checksum {
            return Err(TephraError::corrupt("region checksum mismatch"));
        }

        // Pass 1: content headers. Pass 2: ref records.
        let mut content = ContentStore::new(content_region);
        content.rebuild_index()?;
        content.set_dedup_hits(sb.dedup_hits);
        let mut refs = RefTable::new(ref_region);
        refs.rebuild_index()?;

        // Pass 3: dispatch view/branch/quota records by magic.
        let mut volume = Volume {
            content,
            refs,
            meta: meta_region,
            views: Vec::new(),
            view_index: HashMap::new(),
            branches: Vec::new(),
            branch_index: HashMap::new(),
            quotas: HashMap::new(),
            current_view: sb.current_view,
            current_branch: sb.current_branch,
            next_view: sb.next_view,
            next_branch: sb.next_branch,
            created: sb.created,
            last_tick: Tick::ZERO,
            clock: Box::new(MonotonicClock::new()),
            ctx: AccessContext::KERNEL,
            lookup_count: AtomicU64::new(sb.lookup_count),
            ancestry: RwLock::new(None),
        };
        let mut last_tick = Tick::ZERO;
        let used = volume.meta.used();
        let mut offset = 0u64;
        while offset < used {
            let remaining = (used - offset) as usize;
            let window = volume.meta.slice_at(offset, remaining)?;
            let (record, size) = MetaRecord::parse(window)?;
            match record {
                MetaRecord::View(view) => {
                    if volume.view_index.contains_key(&view.id) {
                        return Err(TephraError::corrupt(format!(
                            "duplicate view record for {}",
                            view.id
                        )));
                    }
                    last_tick = last_tick.max(view.tick);
                    volume.insert_view(view);
                }
                MetaRecord::Branch(branch) => {
                    last_tick = last_tick.max(branch.tick);
                    volume.insert_branch(branch);
                }
                MetaRecord::Quota(quota) => {
                    last_tick = last_tick.max(quota.tick);
                    volume.quotas.insert(
                        quota.scope,
                        QuotaLimits {
                            max_content_bytes: quota.max_content_bytes,
                            max_ref_count: quota.max_ref_count,
                            max_view_count: quota.max_view_count,
                        },
                    );
                }
            }
            offset += size as u64;
        }
        for record in volume.refs.entries() {
            last_tick = last_tick.max(record.tick);
        }
        // v1 volumes predate branches and carry no branch records; promote
        // them by synthesizing main at the saved current view. The record
        // is appended to the region as well, so the next save persists it.
        if sb.version == 1 && !volume.branch_index.contains_key(&BranchId::MAIN) {
            let main = BranchRecord {
                id: BranchId::MAIN,
                base: ViewId::GENESIS,
                head: sb.current_view,
                tick: sb.created,
                name: "main".to_string(),
            };
            volume.meta.append(&main.to_bytes())?;
            volume.insert_branch(main);
        }
        // Ticks resume past everything persisted; the clamp in `tick` keeps
        // them strictly increasing even if the configured clock restarts.
        volume.last_tick = last_tick;
        volume.clock = config.clock;

        volume.verify_after_load(&sb)?;
        // A fresh walk proves the restored DAG is acyclic and bounded.
        volume.current_ancestry()?;
        info!(
            views = volume.views.len(),
            branches = volume.branches.len(),
            refs = volume.refs.len(),
            "volume loaded"
        );
        Ok(volume)
    }

    /// Check volume invariants against the rebuilt indices
    fn verify_after_load(&self, sb: &Superblock) -> Result<()> {
        if self.content.total_bytes() != sb.content_bytes {
            return Err(TephraError::corrupt(
                "rebuilt content bytes disagree with superblock",
            ));
        }
        if self.refs.len() as u64 != sb.ref_count {
            return Err(TephraError::corrupt(
                "rebuilt ref count disagrees with superblock",
            ));
        }
        if self.views.len() as u64 != sb.view_count {
            return Err(TephraError::corrupt(
                "rebuilt view count disagrees with superblock",
            ));
        }
        if self.branches.len() as u64 != sb.branch_count {
            return Err(TephraError::corrupt(
                "rebuilt branch count disagrees with superblock",
            ));
        }
        self.view(self.current_view)?;
        self.branch(self.current_branch)?;
        for view in &self.views {
            if view.id >= self.next_view {
                return Err(TephraError::corrupt(format!(
                    "view {} is not below next_view {}",
                    view.id, self.next_view
                )));
            }
            if !view.parent.is_null() {
                let parent = self.view(view.parent)?;
                if parent.tick > view.tick {
                    return Err(TephraError::corrupt(format!(
                        "view {} predates its parent",
                        view.id
                    )));
                }
            }
        }
        for branch in &self.branches {
            if branch.id >= self.next_branch {
                return Err(TephraError::corrupt(format!(
                    "branch {} is not below next_branch {}",
                    branch.id, self.next_branch
                )));
            }
            self.view(branch.head)?;
            self.view(branch.base)?;
        }
        for record in self.refs.entries() {
            self.view(record.view).map_err(|_| {
                TephraError::corrupt(format!("ref {} stamps a missing view", record.path))
            })?;
            if !record.hidden && !self.content.contains(&record.content) {
                return Err(TephraError::corrupt(format!(
                    "ref {} points at missing content",
                    record.path
                )));
            }
        }
        Ok(())
    }
}
