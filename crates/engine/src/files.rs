//! File operations
//!
//! Every write follows the same spine: validate → gate (access + quota) →
//! store content → deposit a stratum → append the ref. Reads resolve
//! through the visibility algorithm and decompress through the content
//! store. Nothing here mutates in place; overwriting, renaming, and even
//! deletion (hiding) append records.

use crate::info::{GrepMatch, RefStat};
use crate::volume::{validate_path, Volume};
use tephra_core::limits::{DIR_MARKER, MAX_PATH_BYTES, MAX_SYMLINK_HOPS, SECTOR_SIZE};
use tephra_core::{Digest, FileType, Permissions, Result, TephraError};
use tephra_storage::format::RefRecord;
use tephra_storage::SectorDevice;
use tracing::debug;

impl Volume {
    // =========================================================================
    // Write paths
    // =========================================================================

    /// Write `bytes` to `path`, creating or superseding the ref
    ///
    /// Follows symlinks to the final target. Returns the content digest.
    pub fn file_write(&mut self, path: &str, bytes: &[u8]) -> Result<Digest> {
        validate_path(path)?;
        let (target, existing) = self.write_target(path)?;
        if let Some(entry) = &existing {
            if entry.file_type == FileType::Directory {
                return Err(TephraError::IsDir { path: target });
            }
        }
        self.gate_write(&target, existing.as_ref())?;

        let digest = Digest::of(bytes);
        let added = if self.content.contains(&digest) {
            0
        } else {
            bytes.len() as u64
        };
        self.check_content_quota(added)?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;

        let outcome = self.content.store(bytes)?;
        self.deposit_view(&format!("Write: {}", target))?;
        // Overwrites keep the prior ref's ownership and mode; fresh paths
        // are stamped with the caller.
        let (perms, owner) = match &existing {
            Some(entry) => (entry.perms, entry.owner),
            None => (Permissions::RW, self.ctx.user),
        };
        self.push_ref(&target, outcome.digest, FileType::Regular, perms, owner, false)?;
        Ok(outcome.digest)
    }

    /// Append `bytes` to `path`, writing the concatenation as a new blob
    ///
    /// Behaves as `file_write` when the path does not exist yet.
    pub fn file_append(&mut self, path: &str, bytes: &[u8]) -> Result<Digest> {
        validate_path(path)?;
        let (target, existing) = self.write_target(path)?;
        let combined = match &existing {
            Some(entry) if entry.file_type == FileType::Directory => {
                return Err(TephraError::IsDir { path: target });
            }
            Some(entry) => {
                let mut current = self.content.read(&entry.content)?;
                current.extend_from_slice(bytes);
                current
            }
            None => bytes.to_vec(),
        };
        self.gate_write(&target, existing.as_ref())?;

        let digest = Digest::of(&combined);
        let added = if self.content.contains(&digest) {
            0
        } else {
            combined.len() as u64
        };
        self.check_content_quota(added)?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;

        let outcome = self.content.store(&combined)?;
        self.deposit_view(&format!("Append: {}", target))?;
        let (perms, owner) = match &existing {
            Some(entry) => (entry.perms, entry.owner),
            None => (Permissions::RW, self.ctx.user),
        };
        self.push_ref(&target, outcome.digest, FileType::Regular, perms, owner, false)?;
        Ok(outcome.digest)
    }

    /// Create a directory-marker ref at `path`
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        if let Some(entry) = self.lookup_visible(path)? {
            if !entry.hidden {
                return Err(TephraError::exists(path));
            }
        }
        self.check_content_quota(if self.content.contains(&Digest::of(DIR_MARKER.as_bytes())) {
            0
        } else {
            DIR_MARKER.len() as u64
        })?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;

        let outcome = self.content.store(DIR_MARKER.as_bytes())?;
        self.deposit_view(&format!("Mkdir: {}", path))?;
        let owner = self.ctx.user;
        self.push_ref(path, outcome.digest, FileType::Directory, Permissions::RW, owner, false)?;
        Ok(())
    }

    /// Replace the permission bits of the ref at `path`
    pub fn chmod(&mut self, path: &str, perms: Permissions) -> Result<()> {
        let (target, entry) = self.resolve_path(path)?;
        self.gate_write(&target, Some(&entry))?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;
        self.deposit_view(&format!("Chmod: {}", target))?;
        self.push_ref(&target, entry.content, entry.file_type, perms, entry.owner, false)?;
        Ok(())
    }

    /// Replace the owner of the ref at `path`
    pub fn chown(&mut self, path: &str, owner: u64) -> Result<()> {
        let (target, entry) = self.resolve_path(path)?;
        self.gate_write(&target, Some(&entry))?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;
        self.deposit_view(&format!("Chown: {}", target))?;
        self.push_ref(&target, entry.content, entry.file_type, entry.perms, owner, false)?;
        Ok(())
    }

    /// Move the ref at `old` to `new`
    ///
    /// The old path is hidden in the same stratum that carries the new ref.
    /// Symlinks are renamed as links, not followed.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        validate_path(old)?;
        validate_path(new)?;
        let entry = match self.lookup_visible(old)? {
            Some(e) if !e.hidden => e,
            _ => return Err(TephraError::not_found(old)),
        };
        if let Some(existing) = self.lookup_visible(new)? {
            if !existing.hidden {
                return Err(TephraError::exists(new));
            }
        }
        self.gate_write(old, Some(&entry))?;
        self.check_ref_quota(2)?;
        self.check_view_quota()?;

        self.deposit_view(&format!("Rename: {}", old))?;
        self.push_ref(new, entry.content, entry.file_type, entry.perms, entry.owner, false)?;
        self.push_ref(old, Digest::ZERO, entry.file_type, entry.perms, entry.owner, true)?;
        Ok(())
    }

    /// Copy the file at `src` to `dst`
    ///
    /// The copy shares the source's content digest, so no content bytes are
    /// added. Directories are refused.
    pub fn copy(&mut self, src: &str, dst: &str) -> Result<()> {
        validate_path(dst)?;
        let (_, entry) = self.resolve_path(src)?;
        if entry.file_type == FileType::Directory {
            return Err(TephraError::IsDir {
                path: src.to_string(),
            });
        }
        if let Some(existing) = self.lookup_visible(dst)? {
            if !existing.hidden {
                return Err(TephraError::exists(dst));
            }
        }
        self.check_ref_quota(1)?;
        self.check_view_quota()?;
        self.deposit_view(&format!("Copy: {}", dst))?;
        let owner = self.ctx.user;
        self.push_ref(dst, entry.content, FileType::Regular, entry.perms, owner, false)?;
        Ok(())
    }

    /// Create a hard link: a second ref sharing the target's content digest
    pub fn hardlink(&mut self, target: &str, link: &str) -> Result<()> {
        validate_path(link)?;
        let (_, entry) = self.resolve_path(target)?;
        if entry.file_type == FileType::Directory {
            return Err(TephraError::IsDir {
                path: target.to_string(),
            });
        }
        if let Some(existing) = self.lookup_visible(link)? {
            if !existing.hidden {
                return Err(TephraError::exists(link));
            }
        }
        self.check_ref_quota(1)?;
        self.check_view_quota()?;
        self.deposit_view(&format!("Link: {}", link))?;
        let owner = self.ctx.user;
        self.push_ref(link, entry.content, FileType::Regular, entry.perms, owner, false)?;
        Ok(())
    }

    /// Create a symlink at `link` pointing at `target`
    ///
    /// The target is stored as the link's content and need not exist.
    pub fn symlink(&mut self, target: &str, link: &str) -> Result<()> {
        validate_path(link)?;
        if target.is_empty() || target.len() > MAX_PATH_BYTES {
            return Err(TephraError::invalid("symlink target length"));
        }
        if let Some(existing) = self.lookup_visible(link)? {
            if !existing.hidden {
                return Err(TephraError::exists(link));
            }
        }
        let digest = Digest::of(target.as_bytes());
        let added = if self.content.contains(&digest) {
            0
        } else {
            target.len() as u64
        };
        self.check_content_quota(added)?;
        self.check_ref_quota(1)?;
        self.check_view_quota()?;

        let outcome = self.content.store(target.as_bytes())?;
        self.deposit_view(&format!("Symlink: {}", link))?;
        let owner = self.ctx.user;
        self.push_ref(link, outcome.digest, FileType::Symlink, Permissions::RW, owner, false)?;
        Ok(())
    }

    // =========================================================================
    // Read paths
    // =========================================================================

    /// Read the content at `path`, following symlinks
    pub fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        let (target, entry) = self.resolve_path(path)?;
        if entry.file_type == FileType::Directory {
            return Err(TephraError::IsDir { path: target });
        }
        self.content.read(&entry.content)
    }

    /// Uncompressed size of the content at `path`
    pub fn file_size(&self, path: &str) -> Result<u64> {
        let (target, entry) = self.resolve_path(path)?;
        if entry.file_type == FileType::Directory {
            return Err(TephraError::IsDir { path: target });
        }
        self.content.size(&entry.content)
    }

    /// Full stat of the ref at `path`, following symlinks
    pub fn stat(&self, path: &str) -> Result<RefStat> {
        let (target, entry) = self.resolve_path(path)?;
        Ok(RefStat {
            size: self.content.size(&entry.content)?,
            path: target,
            content: entry.content,
            file_type: entry.file_type,
            perms: entry.perms,
            owner: entry.owner,
            view: entry.view,
            tick: entry.tick,
        })
    }

    /// Read a symlink's target without following it
    pub fn readlink(&self, path: &str) -> Result<String> {
        let entry = match self.lookup_visible(path)? {
            Some(e) if !e.hidden => e,
            _ => return Err(TephraError::not_found(path)),
        };
        if entry.file_type != FileType::Symlink {
            return Err(TephraError::invalid(format!("{} is not a symlink", path)));
        }
        let bytes = self.content.read(&entry.content)?;
        String::from_utf8(bytes)
            .map_err(|_| TephraError::corrupt("symlink target is not valid UTF-8"))
    }

    /// Search visible regular files for a substring, line by line
    pub fn grep(&self, needle: &str) -> Result<Vec<GrepMatch>> {
        let mut matches = Vec::new();
        for (path, entry) in self.visible_entries()? {
            if entry.file_type != FileType::Regular {
                continue;
            }
            let bytes = self.content.read(&entry.content)?;
            let text = String::from_utf8_lossy(&bytes);
            for (idx, line) in text.lines().enumerate() {
                if line.contains(needle) {
                    matches.push(GrepMatch {
                        path: path.clone(),
                        line_number: idx as u64 + 1,
                        line: line.to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }

    // =========================================================================
    // Raw content access
    // =========================================================================

    /// Store a blob directly, without binding a path to it
    ///
    /// Deduplicates like every other store; the digest can later be bound
    /// to paths through the file operations or read back directly.
    pub fn content_store(&mut self, bytes: &[u8]) -> Result<Digest> {
        let digest = Digest::of(bytes);
        let added = if self.content.contains(&digest) {
            0
        } else {
            bytes.len() as u64
        };
        self.check_content_quota(added)?;
        Ok(self.content.store(bytes)?.digest)
    }

    /// Read a blob by digest
    pub fn content_read(&self, digest: &Digest) -> Result<Vec<u8>> {
        self.content.read(digest)
    }

    /// Uncompressed size of a blob by digest
    pub fn content_size(&self, digest: &Digest) -> Result<u64> {
        self.content.size(digest)
    }

    // =========================================================================
    // Raw sector exchange
    // =========================================================================

    /// Import `sector_count` raw sectors from a device into a file
    pub fn import_sectors(
        &mut self,
        device: &mut dyn SectorDevice,
        start_sector: u64,
        sector_count: u64,
        path: &str,
    ) -> Result<Digest> {
        if sector_count == 0 {
            return Err(TephraError::invalid("import of zero sectors"));
        }
        let mut buf = vec![0u8; sector_count as usize * SECTOR_SIZE];
        device.read_sectors(start_sector, &mut buf)?;
        debug!(path, sectors = sector_count, "importing raw sectors");
        self.file_write(path, &buf)
    }

    /// Export a file's content to raw sectors, zero-padding the tail
    ///
    /// Returns the number of sectors written.
    pub fn export_sectors(
        &self,
        path: &str,
        device: &mut dyn SectorDevice,
        start_sector: u64,
    ) -> Result<u64> {
        let bytes = self.file_read(path)?;
        let sectors = bytes.len().div_ceil(SECTOR_SIZE).max(1) as u64;
        let mut buf = vec![0u8; sectors as usize * SECTOR_SIZE];
        buf[..bytes.len()].copy_from_slice(&bytes);
        device.write_sectors(start_sector, &buf)?;
        device.flush()?;
        debug!(path, sectors, "exported to raw sectors");
        Ok(sectors)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Resolve the final write target, following symlinks
    ///
    /// Unlike the read path, absent and hidden entries terminate the walk:
    /// writing over a hidden marker recreates the path.
    fn write_target(&self, path: &str) -> Result<(String, Option<RefRecord>)> {
        let mut current = path.to_string();
        for _ in 0..=MAX_SYMLINK_HOPS {
            let entry = match self.lookup_visible(&current)? {
                Some(e) if !e.hidden => e,
                _ => return Ok((current, None)),
            };
            if entry.file_type != FileType::Symlink {
                return Ok((current, Some(entry)));
            }
            let target_bytes = self.content.read(&entry.content)?;
            let target = String::from_utf8(target_bytes)
                .map_err(|_| TephraError::corrupt("symlink target is not valid UTF-8"))?;
            current = crate::visibility::join_target(&current, &target);
        }
        Err(TephraError::sym_loop(path))
    }

    /// Append one ref record stamped with the current view and a fresh tick
    pub(crate) fn push_ref(
        &mut self,
        path: &str,
        content: Digest,
        file_type: FileType,
        perms: Permissions,
        owner: u64,
        hidden: bool,
    ) -> Result<()> {
        let tick = self.tick();
        let record = RefRecord {
            hidden,
            path_hash: Digest::of(path.as_bytes()),
            content,
            view: self.current_view,
            tick,
            file_type,
            perms,
            owner,
            path: path.to_string(),
        };
        self.refs.append(record)?;
        Ok(())
    }
}
