//! Visibility resolution
//!
//! The central algorithm of the engine. The ancestry of the current
//! (branch, view) is the chain of views reached by following parent
//! pointers to the null parent; a path resolves to the greatest-tick ref
//! among bucket matches whose view lies in that ancestry. Hidden winners
//! resolve as `NotFound`; symlink winners are chased up to the hop bound.
//!
//! The ancestry is cached and rebuilt lazily: every view or branch change
//! clears it, the next resolution recomputes it with one bounded parent
//! walk.

use crate::volume::{Ancestry, Volume};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tephra_core::limits::{MAX_ANCESTRY_DEPTH, MAX_SYMLINK_HOPS};
use tephra_core::{Digest, FileType, Result, TephraError, ViewId};
use tephra_storage::format::RefRecord;

impl Volume {
    /// Ancestry of the current view, cached
    pub(crate) fn current_ancestry(&self) -> Result<Arc<Ancestry>> {
        if let Some(cached) = self.ancestry.read().as_ref() {
            return Ok(Arc::clone(cached));
        }
        let built = Arc::new(self.ancestry_of(self.current_view)?);
        *self.ancestry.write() = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Ancestry of an arbitrary view, uncached
    ///
    /// The walk is bounded: a chain deeper than the limit means a cycle
    /// crept into the on-disk records, which is corruption.
    pub(crate) fn ancestry_of(&self, view: ViewId) -> Result<Ancestry> {
        let mut chain = Vec::new();
        let mut set = HashSet::new();
        let mut cursor = view;
        while !cursor.is_null() {
            if chain.len() >= MAX_ANCESTRY_DEPTH || !set.insert(cursor) {
                return Err(TephraError::corrupt(format!(
                    "ancestry of {} exceeds depth bound",
                    view
                )));
            }
            chain.push(cursor);
            cursor = self.view(cursor)?.parent;
        }
        Ok(Ancestry { chain, set })
    }

    /// Winning ref for `path` within `set`, ignoring hidden semantics
    ///
    /// Returns the greatest-tick match; the caller decides what a hidden
    /// winner means.
    pub(crate) fn winner_in<'a>(
        &'a self,
        path: &str,
        set: &HashSet<ViewId>,
    ) -> Option<&'a RefRecord> {
        let path_hash = Digest::of(path.as_bytes());
        self.refs
            .bucket(&path_hash)
            .filter(|(_, r)| r.path_hash == path_hash && r.path == path && set.contains(&r.view))
            .max_by_key(|(_, r)| r.tick)
            .map(|(_, r)| r)
    }

    /// Winning ref for `path` in the current ancestry
    ///
    /// Counts toward the volume's lookup statistics.
    pub(crate) fn lookup_visible(&self, path: &str) -> Result<Option<RefRecord>> {
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
        let ancestry = self.current_ancestry()?;
        Ok(self.winner_in(path, &ancestry.set).cloned())
    }

    /// Resolve `path` to its final non-symlink ref, following links
    ///
    /// Returns the final path alongside the ref. Hidden winners and absent
    /// paths fail `NotFound`; chains longer than the hop bound fail
    /// `SymLoop`.
    pub(crate) fn resolve_path(&self, path: &str) -> Result<(String, RefRecord)> {
        let mut current = path.to_string();
        for _ in 0..=MAX_SYMLINK_HOPS {
            let entry = self
                .lookup_visible(&current)?
                .ok_or_else(|| TephraError::not_found(current.clone()))?;
            if entry.hidden {
                return Err(TephraError::not_found(current));
            }
            if entry.file_type != FileType::Symlink {
                return Ok((current, entry));
            }
            let target_bytes = self.content.read(&entry.content)?;
            let target = String::from_utf8(target_bytes)
                .map_err(|_| TephraError::corrupt("symlink target is not valid UTF-8"))?;
            current = join_target(&current, &target);
        }
        Err(TephraError::sym_loop(path))
    }

    /// Resolve `path` to its content digest
    pub fn resolve(&self, path: &str) -> Result<Digest> {
        Ok(self.resolve_path(path)?.1.content)
    }

    /// All currently visible (path, winning ref) pairs, in first-write order
    pub(crate) fn visible_entries(&self) -> Result<Vec<(String, RefRecord)>> {
        let ancestry = self.current_ancestry()?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in self.refs.entries() {
            if !seen.insert(record.path.clone()) {
                continue;
            }
            if let Some(winner) = self.winner_in(&record.path, &ancestry.set) {
                if !winner.hidden {
                    out.push((record.path.clone(), winner.clone()));
                }
            }
        }
        Ok(out)
    }

    /// List the direct children of a directory
    ///
    /// Returns full child paths, sorted. The directory must resolve to a
    /// directory-marker ref (the root always lists).
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = self.dir_prefix(dir)?;
        let mut children: Vec<String> = self
            .visible_entries()?
            .into_iter()
            .filter(|(path, _)| is_direct_child(path, &prefix))
            .map(|(path, _)| path)
            .collect();
        children.sort();
        Ok(children)
    }

    /// List every visible path below a directory, descending into
    /// directory-marker children
    pub fn list_recursive(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = self.dir_prefix(dir)?;
        let mut paths: Vec<String> = self
            .visible_entries()?
            .into_iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, _)| path)
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// All visible paths matching a wildcard pattern
    ///
    /// `*` matches any run of characters (including separators), `?` any
    /// single character.
    pub fn find(&self, pattern: &str) -> Result<Vec<String>> {
        let mut hits: Vec<String> = self
            .visible_entries()?
            .into_iter()
            .filter(|(path, _)| wildcard_match(pattern, path))
            .map(|(path, _)| path)
            .collect();
        hits.sort();
        Ok(hits)
    }

    /// Normalized `dir/` prefix, validating that `dir` is a directory
    fn dir_prefix(&self, dir: &str) -> Result<String> {
        if dir == "/" {
            return Ok("/".to_string());
        }
        let (resolved, entry) = self.resolve_path(dir)?;
        if entry.file_type != FileType::Directory {
            return Err(TephraError::NotDir {
                path: dir.to_string(),
            });
        }
        Ok(format!("{}/", resolved))
    }
}

/// Whether `path` is a direct child of the normalized `prefix`
fn is_direct_child(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => !rest.is_empty() && !rest.contains('/'),
        None => false,
    }
}

/// Join a symlink target onto the link's parent directory when relative
pub(crate) fn join_target(link: &str, target: &str) -> String {
    if target.starts_with('/') {
        return target.to_string();
    }
    match link.rfind('/') {
        Some(0) | None => format!("/{}", target),
        Some(idx) => format!("{}/{}", &link[..idx], target),
    }
}

/// Minimal wildcard matcher: `*` spans anything, `?` one character
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    // Classic two-pointer scan with one backtrack point for `*`.
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matcher() {
        assert!(wildcard_match("/a/*", "/a/b"));
        assert!(wildcard_match("/a/*", "/a/b/c"));
        assert!(wildcard_match("*.txt", "/docs/note.txt"));
        assert!(wildcard_match("/?", "/a"));
        assert!(!wildcard_match("/?", "/ab"));
        assert!(!wildcard_match("*.txt", "/docs/note.md"));
        assert!(wildcard_match("*", "/anything/at/all"));
        assert!(wildcard_match("/a/?/c", "/a/b/c"));
        assert!(!wildcard_match("/a/?/c", "/a/bb/c"));
    }

    #[test]
    fn test_direct_child_detection() {
        assert!(is_direct_child("/a", "/"));
        assert!(is_direct_child("/dir/x", "/dir/"));
        assert!(!is_direct_child("/dir/x/y", "/dir/"));
        assert!(!is_direct_child("/dir", "/dir/"));
        assert!(!is_direct_child("/other/x", "/dir/"));
    }

    #[test]
    fn test_symlink_target_join() {
        assert_eq!(join_target("/a/link", "/abs"), "/abs");
        assert_eq!(join_target("/a/link", "peer"), "/a/peer");
        assert_eq!(join_target("/link", "peer"), "/peer");
    }

    #[test]
    fn test_ancestry_walk_terminates_at_null() {
        let mut volume = Volume::create().unwrap();
        volume.deposit_view("one").unwrap();
        volume.deposit_view("two").unwrap();
        let ancestry = volume.current_ancestry().unwrap();
        assert_eq!(ancestry.chain, vec![ViewId(3), ViewId(2), ViewId(1)]);
        assert!(ancestry.set.contains(&ViewId::GENESIS));
    }

    #[test]
    fn test_ancestry_cache_invalidated_by_deposit() {
        let mut volume = Volume::create().unwrap();
        let before = volume.current_ancestry().unwrap().chain.clone();
        volume.deposit_view("next").unwrap();
        let after = volume.current_ancestry().unwrap().chain.clone();
        assert_ne!(before, after);
        assert_eq!(after.len(), before.len() + 1);
    }
}
