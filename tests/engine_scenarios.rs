//! End-to-end engine scenarios
//!
//! Each test walks one complete caller-visible flow through the public
//! surface: write/read/dedup accounting, hide and time travel, branch
//! isolation, merge conflicts, and save/load.

use tephra::{MemDisk, Volume};

// ============================================================================
// Write, read, dedup accounting
// ============================================================================

#[test]
fn write_then_read_back_with_stats() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"hi").unwrap();

    assert_eq!(volume.file_read("/a").unwrap(), b"hi");
    assert_eq!(volume.file_size("/a").unwrap(), 2);

    let stats = volume.stats();
    assert_eq!(stats.content_bytes, 2);
    assert_eq!(stats.dedup_hits, 0);
    assert_eq!(stats.total_refs, 1);
}

#[test]
fn rewriting_identical_bytes_deduplicates() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"hi").unwrap();
    volume.file_write("/a", b"hi").unwrap();

    let stats = volume.stats();
    assert_eq!(stats.content_bytes, 2, "no new content bytes stored");
    assert_eq!(stats.dedup_hits, 1);
    assert_eq!(stats.total_refs, 2, "each write appends a ref");
    assert_eq!(volume.file_read("/a").unwrap(), b"hi");
}

#[test]
fn different_paths_same_bytes_share_one_blob() {
    let mut volume = Volume::create().unwrap();
    let d1 = volume.file_write("/a", b"shared payload").unwrap();
    let d2 = volume.file_write("/b", b"shared payload").unwrap();
    assert_eq!(d1, d2);
    assert_eq!(volume.stats().content_bytes, 14);
    assert_eq!(volume.stats().dedup_hits, 1);
}

// ============================================================================
// Hide and time travel
// ============================================================================

#[test]
fn hide_then_switch_back_restores_content() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"hi").unwrap();
    let previous_view = volume.view_current();

    volume.view_hide("/a").unwrap();
    assert!(volume.file_read("/a").unwrap_err().is_not_found());

    volume.view_switch(previous_view).unwrap();
    assert_eq!(volume.file_read("/a").unwrap(), b"hi");
}

#[test]
fn every_change_deposits_a_labelled_stratum() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"1").unwrap();
    volume.view_hide("/a").unwrap();

    let labels: Vec<String> = volume.view_list().into_iter().map(|v| v.label).collect();
    assert_eq!(labels, ["Genesis", "Write: /a", "Hide: /a"]);
}

// ============================================================================
// Branch isolation
// ============================================================================

#[test]
fn branch_writes_are_invisible_to_main() {
    let mut volume = Volume::create().unwrap();
    volume.branch_create("feature").unwrap();
    volume.file_write("/x", b"X").unwrap();

    volume.branch_switch_name("main").unwrap();
    assert!(volume.file_read("/x").unwrap_err().is_not_found());

    volume.branch_switch_name("feature").unwrap();
    assert_eq!(volume.file_read("/x").unwrap(), b"X");
}

// ============================================================================
// Merge conflicts
// ============================================================================

#[test]
fn divergent_writes_conflict_and_target_is_unchanged() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"base").unwrap();

    volume.branch_create("feature").unwrap();
    volume.file_write("/a", b"feature version").unwrap();

    volume.branch_switch_name("main").unwrap();
    volume.file_write("/a", b"main version").unwrap();

    let err = volume.branch_merge_name("feature").unwrap_err();
    match err {
        tephra::TephraError::Conflict { conflicts, .. } => assert_eq!(conflicts, 1),
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(volume.file_read("/a").unwrap(), b"main version");
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn save_destroy_load_preserves_every_visible_path() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"alpha").unwrap();
    volume.mkdir("/dir").unwrap();
    volume.file_write("/dir/b", b"beta").unwrap();
    volume.symlink("/a", "/link").unwrap();
    volume.branch_create("side").unwrap();
    volume.file_write("/side-only", b"gamma").unwrap();
    volume.branch_switch_name("main").unwrap();

    let mut disk = MemDisk::new(8192);
    volume.save(&mut disk, 2048).unwrap();
    volume.destroy();

    let restored = Volume::load(&mut disk, 2048).unwrap();
    assert_eq!(restored.file_read("/a").unwrap(), b"alpha");
    assert_eq!(restored.file_read("/dir/b").unwrap(), b"beta");
    assert_eq!(restored.file_read("/link").unwrap(), b"alpha");
    assert_eq!(restored.readlink("/link").unwrap(), "/a");
    // The side branch and its content survived too.
    let mut restored = restored;
    restored.branch_switch_name("side").unwrap();
    assert_eq!(restored.file_read("/side-only").unwrap(), b"gamma");
}

// ============================================================================
// File operations
// ============================================================================

#[test]
fn directory_listing_returns_direct_children_only() {
    let mut volume = Volume::create().unwrap();
    volume.mkdir("/dir").unwrap();
    volume.file_write("/dir/a", b"1").unwrap();
    volume.file_write("/dir/b", b"2").unwrap();
    volume.file_write("/dir/sub-not-listed/c", b"3").unwrap();
    volume.file_write("/outside", b"4").unwrap();

    assert_eq!(volume.list("/dir").unwrap(), ["/dir/a", "/dir/b"]);
    assert_eq!(
        volume.list_recursive("/dir").unwrap(),
        ["/dir/a", "/dir/b", "/dir/sub-not-listed/c"]
    );
    assert_eq!(volume.list("/").unwrap(), ["/dir", "/outside"]);
}

#[test]
fn listing_a_regular_file_is_refused() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/file", b"data").unwrap();
    assert!(matches!(
        volume.list("/file").unwrap_err(),
        tephra::TephraError::NotDir { .. }
    ));
}

#[test]
fn reading_a_directory_is_refused() {
    let mut volume = Volume::create().unwrap();
    volume.mkdir("/dir").unwrap();
    assert!(matches!(
        volume.file_read("/dir").unwrap_err(),
        tephra::TephraError::IsDir { .. }
    ));
}

#[test]
fn mkdir_on_existing_path_is_refused() {
    let mut volume = Volume::create().unwrap();
    volume.mkdir("/dir").unwrap();
    assert!(matches!(
        volume.mkdir("/dir").unwrap_err(),
        tephra::TephraError::Exists { .. }
    ));
}

#[test]
fn rename_moves_and_hides_the_old_path() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/old", b"payload").unwrap();
    volume.rename("/old", "/new").unwrap();

    assert_eq!(volume.file_read("/new").unwrap(), b"payload");
    assert!(volume.file_read("/old").unwrap_err().is_not_found());
    // No content bytes were copied.
    assert_eq!(volume.stats().content_bytes, 7);
}

#[test]
fn rename_onto_existing_target_is_refused() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/a", b"1").unwrap();
    volume.file_write("/b", b"2").unwrap();
    assert!(matches!(
        volume.rename("/a", "/b").unwrap_err(),
        tephra::TephraError::Exists { .. }
    ));
}

#[test]
fn copy_and_hardlink_share_the_content_digest() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/orig", b"to share").unwrap();
    volume.copy("/orig", "/copied").unwrap();
    volume.hardlink("/orig", "/linked").unwrap();

    assert_eq!(volume.file_read("/copied").unwrap(), b"to share");
    assert_eq!(volume.file_read("/linked").unwrap(), b"to share");
    let orig = volume.stat("/orig").unwrap();
    let copied = volume.stat("/copied").unwrap();
    let linked = volume.stat("/linked").unwrap();
    assert_eq!(orig.content, copied.content);
    assert_eq!(orig.content, linked.content);
    assert_eq!(volume.stats().content_bytes, 8);
}

#[test]
fn append_concatenates() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/log", b"line one\n").unwrap();
    volume.file_append("/log", b"line two\n").unwrap();
    assert_eq!(volume.file_read("/log").unwrap(), b"line one\nline two\n");
    // Appending to a missing path creates it.
    volume.file_append("/fresh", b"start").unwrap();
    assert_eq!(volume.file_read("/fresh").unwrap(), b"start");
}

#[test]
fn chmod_and_chown_supersede_metadata() {
    use tephra::Permissions;
    let mut volume = Volume::create().unwrap();
    volume.file_write("/f", b"x").unwrap();
    volume.chmod("/f", Permissions::RO).unwrap();
    volume.chown("/f", 42).unwrap();

    let stat = volume.stat("/f").unwrap();
    assert_eq!(stat.perms, Permissions::RO);
    assert_eq!(stat.owner, 42);
    // Content is untouched by metadata changes.
    assert_eq!(volume.file_read("/f").unwrap(), b"x");
}

#[test]
fn find_matches_wildcards() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/docs/a.txt", b"1").unwrap();
    volume.file_write("/docs/b.txt", b"2").unwrap();
    volume.file_write("/docs/c.md", b"3").unwrap();

    assert_eq!(
        volume.find("*.txt").unwrap(),
        ["/docs/a.txt", "/docs/b.txt"]
    );
    assert_eq!(volume.find("/docs/?.md").unwrap(), ["/docs/c.md"]);
}

#[test]
fn grep_reports_path_line_number_and_line() {
    let mut volume = Volume::create().unwrap();
    volume
        .file_write("/poem", b"tephra falls\non the caldera\ntephra stays\n")
        .unwrap();
    volume.file_write("/other", b"nothing here\n").unwrap();

    let hits = volume.grep("tephra").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/poem");
    assert_eq!(hits[0].line_number, 1);
    assert_eq!(hits[0].line, "tephra falls");
    assert_eq!(hits[1].line_number, 3);
}

// ============================================================================
// Symlinks
// ============================================================================

#[test]
fn symlink_resolution_follows_chains() {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/target", b"end of chain").unwrap();
    volume.symlink("/target", "/hop1").unwrap();
    volume.symlink("/hop1", "/hop2").unwrap();

    assert_eq!(volume.file_read("/hop2").unwrap(), b"end of chain");
    assert_eq!(volume.readlink("/hop2").unwrap(), "/hop1");
    // Writing through a symlink lands on the target.
    volume.file_write("/hop2", b"rewritten").unwrap();
    assert_eq!(volume.file_read("/target").unwrap(), b"rewritten");
}

#[test]
fn symlink_cycles_fail_with_symloop() {
    let mut volume = Volume::create().unwrap();
    volume.symlink("/b", "/a").unwrap();
    volume.symlink("/a", "/b").unwrap();
    assert!(matches!(
        volume.file_read("/a").unwrap_err(),
        tephra::TephraError::SymLoop { .. }
    ));
}

// ============================================================================
// Access gate
// ============================================================================

#[test]
fn unprivileged_caller_cannot_overwrite_protected_ref() {
    use tephra::{AccessContext, Permissions};
    let mut volume = Volume::create().unwrap();
    volume.file_write("/protected", b"secret").unwrap();
    volume.chmod("/protected", Permissions::RO).unwrap();
    volume.chown("/protected", 1).unwrap();

    volume.set_context(AccessContext::user(2));
    assert!(matches!(
        volume.file_write("/protected", b"overwrite").unwrap_err(),
        tephra::TephraError::Permission { .. }
    ));

    // The owner still may, and so does fs-admin.
    volume.set_context(AccessContext::user(1));
    volume.file_write("/protected", b"by owner").unwrap();
    volume.set_context(AccessContext::with_caps(9, tephra::CAP_FS_ADMIN));
    volume.file_write("/protected", b"by admin").unwrap();
}

// ============================================================================
// Raw content access
// ============================================================================

#[test]
fn content_ops_work_without_paths() {
    let mut volume = Volume::create().unwrap();
    let digest = volume.content_store(b"unbound blob").unwrap();
    assert_eq!(volume.content_read(&digest).unwrap(), b"unbound blob");
    assert_eq!(volume.content_size(&digest).unwrap(), 12);

    // A later file write of the same bytes deduplicates against it.
    volume.file_write("/bound", b"unbound blob").unwrap();
    assert_eq!(volume.stats().dedup_hits, 1);
    assert_eq!(volume.stats().content_bytes, 12);

    // Unknown digests are simply absent.
    let missing = tephra::Digest::of(b"never stored");
    assert!(volume.content_read(&missing).unwrap_err().is_not_found());
}

// ============================================================================
// Raw sector exchange
// ============================================================================

#[test]
fn import_export_roundtrip_through_raw_sectors() {
    let mut volume = Volume::create().unwrap();
    let payload = vec![0x42u8; 1024];
    volume.file_write("/blob", &payload).unwrap();

    let mut disk = MemDisk::new(64);
    let sectors = volume.export_sectors("/blob", &mut disk, 10).unwrap();
    assert_eq!(sectors, 2);

    let mut other = Volume::create().unwrap();
    other.import_sectors(&mut disk, 10, sectors, "/imported").unwrap();
    assert_eq!(other.file_read("/imported").unwrap(), payload);
}
