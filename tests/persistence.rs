//! Persistence round-trips
//!
//! Save to sector devices (memory- and file-backed), load back, and check
//! that content, the view/branch DAG, quotas, and counters survive
//! bit-exactly in logical structure.

use tephra::{
    FileDisk, MemDisk, QuotaLimits, QuotaScope, SectorDevice, TephraError, Volume,
};

fn populated_volume() -> Volume {
    let mut volume = Volume::create().unwrap();
    volume.file_write("/readme", b"tephra engine").unwrap();
    volume.mkdir("/etc").unwrap();
    volume.file_write("/etc/conf", b"threshold = 9\n").unwrap();
    volume.symlink("/etc/conf", "/conf-link").unwrap();
    volume
        .file_write("/big", &vec![0x11u8; 20_000])
        .unwrap();

    volume.branch_create("staging").unwrap();
    volume.file_write("/staging-note", b"work in progress").unwrap();
    volume.view_hide("/readme").unwrap();

    volume.branch_switch_name("main").unwrap();
    volume
        .quota_set(
            QuotaScope::Volume,
            QuotaLimits {
                max_content_bytes: 1_000_000,
                max_ref_count: 10_000,
                max_view_count: 10_000,
            },
        )
        .unwrap();
    volume
}

#[test]
fn memdisk_roundtrip_preserves_the_dag() {
    let volume = populated_volume();
    let views_before = volume.view_list();
    let branches_before = volume.branch_list();
    let stats_before = volume.stats();

    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 2048).unwrap();
    let restored = Volume::load(&mut disk, 2048).unwrap();

    // The DAG is preserved bit-for-bit in logical structure.
    assert_eq!(restored.view_list(), views_before);
    assert_eq!(restored.branch_list(), branches_before);

    let stats_after = restored.stats();
    assert_eq!(stats_after.content_bytes, stats_before.content_bytes);
    assert_eq!(stats_after.total_refs, stats_before.total_refs);
    assert_eq!(stats_after.total_views, stats_before.total_views);
    assert_eq!(stats_after.total_branches, stats_before.total_branches);
    assert_eq!(stats_after.next_view, stats_before.next_view);
    assert_eq!(stats_after.next_branch, stats_before.next_branch);
    assert_eq!(stats_after.current_view, stats_before.current_view);
    assert_eq!(stats_after.current_branch, stats_before.current_branch);
    assert_eq!(stats_after.dedup_hits, stats_before.dedup_hits);
    assert_eq!(stats_after.lookup_count, stats_before.lookup_count);
}

#[test]
fn every_view_resolves_the_same_content_after_load() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();
    let mut restored = Volume::load(&mut disk, 0).unwrap();

    // Walk every view on both volumes and compare the resolved world.
    let mut original = volume;
    for view in original.view_list() {
        original.view_switch(view.id).unwrap();
        restored.view_switch(view.id).unwrap();
        let paths = original.list_recursive("/").unwrap();
        assert_eq!(restored.list_recursive("/").unwrap(), paths);
        for path in paths {
            let stat = original.stat(&path).unwrap();
            if stat.file_type == tephra::FileType::Regular {
                assert_eq!(
                    restored.file_read(&path).unwrap(),
                    original.file_read(&path).unwrap(),
                    "content of {} differs in {}",
                    path,
                    view.id
                );
            }
        }
    }
}

#[test]
fn quotas_survive_load() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();
    let restored = Volume::load(&mut disk, 0).unwrap();

    let limits = restored.quota_get(QuotaScope::Volume).unwrap();
    assert_eq!(limits.max_content_bytes, 1_000_000);
    assert_eq!(limits.max_ref_count, 10_000);
}

#[test]
fn hidden_paths_stay_hidden_after_load() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();
    let mut restored = Volume::load(&mut disk, 0).unwrap();

    restored.branch_switch_name("staging").unwrap();
    assert!(restored.file_read("/readme").unwrap_err().is_not_found());
    restored.branch_switch_name("main").unwrap();
    assert_eq!(restored.file_read("/readme").unwrap(), b"tephra engine");
}

#[test]
fn filedisk_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("volume.img");

    let volume = populated_volume();
    {
        let mut disk = FileDisk::create(&path, 16_384).unwrap();
        volume.save(&mut disk, 512).unwrap();
    }
    let mut disk = FileDisk::open(&path).unwrap();
    let restored = Volume::load(&mut disk, 512).unwrap();
    assert_eq!(restored.file_read("/etc/conf").unwrap(), b"threshold = 9\n");
    assert_eq!(restored.file_read("/big").unwrap(), vec![0x11u8; 20_000]);
}

#[test]
fn load_rejects_forged_superblock_version() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();

    let mut sector = vec![0u8; 512];
    disk.read_sectors(0, &mut sector).unwrap();
    sector[8..12].copy_from_slice(&7u32.to_le_bytes());
    disk.write_sectors(0, &sector).unwrap();

    assert!(Volume::load(&mut disk, 0).unwrap_err().is_corruption());
}

#[test]
fn load_rejects_tampered_checksum() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();

    let mut sector = vec![0u8; 512];
    disk.read_sectors(0, &mut sector).unwrap();
    sector[160] ^= 0x01; // inside the 32-byte checksum field
    disk.write_sectors(0, &sector).unwrap();

    assert!(Volume::load(&mut disk, 0).unwrap_err().is_corruption());
}

#[test]
fn save_load_save_is_stable() {
    let volume = populated_volume();
    let mut disk_a = MemDisk::new(16_384);
    volume.save(&mut disk_a, 0).unwrap();

    let restored = Volume::load(&mut disk_a, 0).unwrap();
    let mut disk_b = MemDisk::new(16_384);
    restored.save(&mut disk_b, 0).unwrap();

    let twice = Volume::load(&mut disk_b, 0).unwrap();
    assert_eq!(twice.view_list(), restored.view_list());
    assert_eq!(twice.branch_list(), restored.branch_list());
    assert_eq!(
        twice.list_recursive("/").unwrap(),
        restored.list_recursive("/").unwrap()
    );
}

#[test]
fn work_continues_after_load() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 0).unwrap();
    let mut restored = Volume::load(&mut disk, 0).unwrap();

    // New writes, branches, and merges behave normally on the restored
    // volume.
    restored.file_write("/after-load", b"fresh").unwrap();
    restored.branch_create("post-restore").unwrap();
    restored.file_write("/branch-file", b"on branch").unwrap();
    restored.branch_switch_name("main").unwrap();
    restored.branch_merge_name("post-restore").unwrap();
    assert_eq!(restored.file_read("/branch-file").unwrap(), b"on branch");
    assert_eq!(restored.file_read("/after-load").unwrap(), b"fresh");

    // And the twice-written volume still round-trips.
    let mut disk2 = MemDisk::new(16_384);
    restored.save(&mut disk2, 100).unwrap();
    let again = Volume::load(&mut disk2, 100).unwrap();
    assert_eq!(again.file_read("/branch-file").unwrap(), b"on branch");
}

#[test]
fn v1_image_loads_with_views_promoted_to_main() {
    use tephra::{BranchId, Digest, FileType, Permissions, Tick, ViewId};
    use tephra_storage::format::{ContentHeader, RefRecord, RegionExtent, Superblock};

    // Hand-build a complete v1 volume image: one blob, one ref, two v1
    // view records, and no branch records (v1 predates branches).
    let digest = Digest::of(b"hi");
    let mut content = ContentHeader::plain(digest, 2).to_bytes().to_vec();
    content.extend_from_slice(b"hi");

    let refs = RefRecord {
        hidden: false,
        path_hash: Digest::of(b"/a"),
        content: digest,
        view: ViewId(2),
        tick: Tick::from_u64(2),
        file_type: FileType::Regular,
        perms: Permissions::RW,
        owner: 0,
        path: "/a".to_string(),
    }
    .to_bytes();

    fn v1_view(id: u64, parent: u64, tick: u64, label: &str) -> Vec<u8> {
        let mut buf = vec![0u8; 96];
        buf[0..4].copy_from_slice(b"VIEW");
        buf[8..16].copy_from_slice(&id.to_le_bytes());
        buf[16..24].copy_from_slice(&parent.to_le_bytes());
        buf[24..32].copy_from_slice(&tick.to_le_bytes());
        buf[32..32 + label.len()].copy_from_slice(label.as_bytes());
        buf
    }
    let mut meta = v1_view(1, 0, 1, "Genesis");
    meta.extend(v1_view(2, 1, 2, "Write: /a"));

    // The superblock checksum chains the regions in order.
    let mut chained = content.clone();
    chained.extend_from_slice(&refs);
    chained.extend_from_slice(&meta);
    let checksum = *Digest::of(&chained).as_bytes();

    let extent = |bytes: &[u8], start: u64| RegionExtent {
        used: bytes.len() as u64,
        start_sector: start,
        sector_count: (bytes.len() as u64).div_ceil(512),
    };
    let sb = Superblock {
        version: 1,
        flags: 0,
        current_view: ViewId(2),
        next_view: ViewId(3),
        created: Tick::from_u64(1),
        content_bytes: 2,
        ref_count: 1,
        view_count: 2,
        dedup_hits: 0,
        lookup_count: 0,
        content_region: extent(&content, 1),
        ref_region: extent(&refs, 2),
        meta_region: extent(&meta, 4),
        checksum,
        current_branch: BranchId::MAIN,
        next_branch: BranchId(1),
        branch_count: 1,
    };
    // v1 writers left the trailing branch-counter area zeroed.
    let mut sb_bytes = sb.to_bytes();
    for b in &mut sb_bytes[184..208] {
        *b = 0;
    }

    fn padded(bytes: &[u8]) -> Vec<u8> {
        let sectors = (bytes.len() as u64).div_ceil(512) as usize;
        let mut out = vec![0u8; sectors * 512];
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }
    let mut disk = MemDisk::new(64);
    disk.write_sectors(0, &sb_bytes).unwrap();
    disk.write_sectors(1, &padded(&content)).unwrap();
    disk.write_sectors(2, &padded(&refs)).unwrap();
    disk.write_sectors(4, &padded(&meta)).unwrap();

    let restored = Volume::load(&mut disk, 0).unwrap();
    assert_eq!(restored.file_read("/a").unwrap(), b"hi");

    // Views were promoted onto main, and main itself was synthesized at
    // the saved head.
    let views = restored.view_list();
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v.branch == BranchId::MAIN));
    let branches = restored.branch_list();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
    assert_eq!(branches[0].head, ViewId(2));

    // Saving again writes a v2 image that round-trips.
    let mut disk2 = MemDisk::new(1024);
    restored.save(&mut disk2, 0).unwrap();
    let again = Volume::load(&mut disk2, 0).unwrap();
    assert_eq!(again.file_read("/a").unwrap(), b"hi");
    assert_eq!(again.branch_list().len(), 1);
}

#[test]
fn load_from_wrong_sector_fails_cleanly() {
    let volume = populated_volume();
    let mut disk = MemDisk::new(16_384);
    volume.save(&mut disk, 2048).unwrap();
    // Sector 0 holds zeroes, not a superblock.
    match Volume::load(&mut disk, 0).unwrap_err() {
        TephraError::Corrupt { .. } => {}
        other => panic!("expected Corrupt, got {:?}", other),
    }
}
