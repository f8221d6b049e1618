//! Reference table
//!
//! Refs are appended to their region as fixed-size records and indexed in
//! memory two ways: a 256-bucket chained hash map keyed on the first byte
//! of the path digest (resolution), and the insertion-ordered entry arena
//! itself (iteration). Nothing is ever removed; superseding and hiding are
//! expressed by appending newer records.

use crate::format::{RefRecord, REF_RECORD_SIZE};
use crate::region::Region;
use tephra_core::{Digest, Result, TephraError};
use tracing::debug;

/// Append-only table of path→content bindings
#[derive(Debug)]
pub struct RefTable {
    region: Region,
    /// Insertion-ordered arena of all refs
    entries: Vec<RefRecord>,
    /// 256-bucket chained index on the first path-hash byte; values are
    /// indices into `entries`
    buckets: Vec<Vec<usize>>,
}

impl RefTable {
    /// Create an empty table over `region`
    pub fn new(region: Region) -> RefTable {
        RefTable {
            region,
            entries: Vec::new(),
            buckets: vec![Vec::new(); 256],
        }
    }

    /// Append a ref record and index it
    pub fn append(&mut self, record: RefRecord) -> Result<usize> {
        self.region.append(&record.to_bytes())?;
        let idx = self.entries.len();
        self.buckets[record.path_hash.bucket() as usize].push(idx);
        self.entries.push(record);
        Ok(idx)
    }

    /// All refs in insertion order
    pub fn entries(&self) -> &[RefRecord] {
        &self.entries
    }

    /// Indices of refs whose path hash shares a bucket with `path_hash`
    ///
    /// Callers filter on the full hash; the bucket only narrows the scan.
    pub fn bucket<'a>(
        &'a self,
        path_hash: &Digest,
    ) -> impl Iterator<Item = (usize, &'a RefRecord)> + 'a {
        self.buckets[path_hash.bucket() as usize]
            .iter()
            .map(move |&idx| (idx, &self.entries[idx]))
    }

    /// Total ref records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backing region (persistence streaming)
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Backing region, mutable (load)
    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Rebuild both indices by scanning raw ref records
    ///
    /// Pass 2 of the volume rebuild: records are fixed-size, so the walk is
    /// a straight stride over the region's used bytes.
    pub fn rebuild_index(&mut self) -> Result<()> {
        self.entries.clear();
        self.buckets = vec![Vec::new(); 256];
        let used = self.region.used();
        if used % REF_RECORD_SIZE as u64 != 0 {
            return Err(TephraError::corrupt(
                "ref region size is not a whole number of records",
            ));
        }
        let mut offset = 0u64;
        while offset < used {
            let bytes = self.region.slice_at(offset, REF_RECORD_SIZE)?;
            let record = RefRecord::from_bytes(bytes)?;
            let idx = self.entries.len();
            self.buckets[record.path_hash.bucket() as usize].push(idx);
            self.entries.push(record);
            offset += REF_RECORD_SIZE as u64;
        }
        debug!(refs = self.entries.len(), "ref index rebuilt");
        Ok(())
    }
}
