#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for opening, editing and saving AFS archives

mod common;

use afster_storage::{
    Archive, ArchiveBuilder, EntryMetadata, ErrorKind, NameTarget, StorageConfig, Timestamp,
};
use common::{
    FOREIGN_METADATA, FOREIGN_OFFSETS, FOREIGN_PAYLOADS, FOREIGN_RESERVED, foreign_archive_bytes,
    init_tracing, write_foreign_archive,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn open_reads_layout_and_metadata() {
    init_tracing();
    let dir = tempdir().unwrap();
    let archive = Archive::open(write_foreign_archive(dir.path())).expect("open");

    assert_eq!(archive.entry_count(), 3);
    for id in 0..3usize {
        assert_eq!(archive.entry_offset(id).unwrap(), FOREIGN_OFFSETS[id]);
        assert_eq!(archive.entry_reserved_space(id).unwrap(), FOREIGN_RESERVED[id]);
        assert_eq!(archive.extract_to_buffer(id).unwrap(), FOREIGN_PAYLOADS[id]);
    }

    assert_eq!(archive.name(0).unwrap(), "alpha.bin");
    assert_eq!(archive.name(1).unwrap(), "beta.bin");
    assert_eq!(archive.name(2).unwrap(), "");
    assert_eq!(
        archive.last_modified(0).unwrap(),
        Some(Timestamp::new(2004, 3, 28, 14, 5, 59))
    );
    assert_eq!(archive.last_modified(1).unwrap(), None);
    assert_eq!(
        archive.entry_metadata(1).unwrap(),
        EntryMetadata {
            size: 0x30,
            entry_name: "beta.bin".to_string(),
            last_modified: None,
        }
    );
}

#[test]
fn size_never_exceeds_reserved_space() {
    let dir = tempdir().unwrap();
    let archive = Archive::open(write_foreign_archive(dir.path())).unwrap();
    for entry in archive.entries() {
        assert!(entry.size <= entry.reserved, "entry {}", entry.id);
    }
}

#[test]
fn noop_save_is_byte_identical() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    for config in [StorageConfig::default(), StorageConfig::new().with_mmap(false)] {
        let mut archive = Archive::open_with_config(&path, config).unwrap();
        assert!(!archive.has_unsaved_changes());
        archive.save().expect("save");
        archive.close();
        assert_eq!(std::fs::read(&path).unwrap(), foreign_archive_bytes());
    }
}

#[test]
fn overlay_rename_save_is_byte_identical() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let mut archive = Archive::open(&path).unwrap();
    archive
        .rename(0, "shown_only.bin", NameTarget::OverlayOnly)
        .unwrap();
    archive.save().unwrap();

    assert_eq!(archive.name(0).unwrap(), "shown_only.bin");
    assert_eq!(std::fs::read(&path).unwrap(), foreign_archive_bytes());
}

#[test]
fn persisted_rename_rewrites_only_the_record() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let mut archive = Archive::open(&path).unwrap();
    archive
        .rename(1, "gamma.bin", NameTarget::PersistToHeader)
        .unwrap();
    archive.save().unwrap();

    let before = foreign_archive_bytes();
    let after = std::fs::read(&path).unwrap();
    assert_eq!(after.len(), before.len());

    let record = FOREIGN_METADATA as usize + 0x30;
    for (pos, (a, b)) in before.iter().zip(&after).enumerate() {
        if !(record..record + 0x20).contains(&pos) {
            assert_eq!(a, b, "byte {pos:#x} changed");
        }
    }
    assert_eq!(Archive::open(&path).unwrap().name(1).unwrap(), "gamma.bin");
}

#[test]
fn in_place_replace_keeps_slot() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let mut archive = Archive::open(&path).unwrap();
    let data = vec![0x11; 0x40];
    archive.replace_entry(0, &data).unwrap();

    assert_eq!(archive.entry_offset(0).unwrap(), 0x40);
    assert_eq!(archive.entry_reserved_space(0).unwrap(), 0x40);
    assert_eq!(archive.extract_to_buffer(0).unwrap(), data);
    assert_eq!(archive.entry_metadata(0).unwrap().size, 0x40);

    archive.save().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 0x1C0);
    assert_eq!(&bytes[0x40..0x80], data.as_slice());

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.extract_to_buffer(0).unwrap(), data);
    assert_eq!(reopened.extract_to_buffer(1).unwrap(), FOREIGN_PAYLOADS[1]);
}

#[test]
fn shrinking_zero_fills_slack() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let mut archive = Archive::open(&path).unwrap();
    archive.replace_entry(1, b"tiny").unwrap();
    archive.save().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0x80..0x84], b"tiny");
    assert!(bytes[0x84..0x100].iter().all(|&b| b == 0));
}

#[test]
fn shrinking_without_zero_fill_leaves_old_bytes() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let config = StorageConfig::new().with_zero_fill_slack(false);
    let mut archive = Archive::open_with_config(&path, config).unwrap();
    archive.replace_entry(1, b"tiny").unwrap();
    archive.save().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0x80..0x84], b"tiny");
    assert_eq!(bytes[0x84], 0x5A);
}

#[test]
fn growing_entry_moves_to_aligned_end() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());

    let mut archive = Archive::open(&path).unwrap();
    let data = vec![0x77; 0x21];
    archive.replace_entry(2, &data).unwrap();

    assert_eq!(archive.entry_offset(2).unwrap(), 0x800);
    assert_eq!(archive.entry_reserved_space(2).unwrap(), 0x800);
    for id in 0..2usize {
        assert_eq!(archive.entry_offset(id).unwrap(), FOREIGN_OFFSETS[id]);
        assert_eq!(archive.entry_reserved_space(id).unwrap(), FOREIGN_RESERVED[id]);
    }

    archive.save().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0x1000);

    let reopened = Archive::open(&path).unwrap();
    assert_eq!(reopened.extract_to_buffer(2).unwrap(), data);
    assert_eq!(reopened.entry_offset(2).unwrap(), 0x800);
    assert_eq!(reopened.entry_reserved_space(2).unwrap(), 0x800);
    assert_eq!(reopened.extract_to_buffer(0).unwrap(), FOREIGN_PAYLOADS[0]);
    assert_eq!(reopened.extract_to_buffer(1).unwrap(), FOREIGN_PAYLOADS[1]);
    assert_eq!(reopened.name(0).unwrap(), "alpha.bin");
}

#[test]
fn save_as_leaves_original_untouched() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());
    let copy = dir.path().join("patched.afs");

    let mut archive = Archive::open(&path).unwrap();
    archive.replace_entry(0, &[9; 0x100]).unwrap();
    archive.save_as(&copy).expect("save_as");

    assert_eq!(std::fs::read(&path).unwrap(), foreign_archive_bytes());
    assert_eq!(
        Archive::open(&copy).unwrap().extract_to_buffer(0).unwrap(),
        vec![9; 0x100]
    );

    // Staged changes still target the original
    assert!(archive.has_unsaved_changes());
    archive.save().unwrap();
    assert_eq!(
        Archive::open(&path).unwrap().extract_to_buffer(0).unwrap(),
        vec![9; 0x100]
    );
}

#[test]
fn new_replace_save_as_scenario() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.afs");

    let mut archive = Archive::new(3, dir.path().join("never_saved.afs")).unwrap();
    assert_eq!(archive.entry_count(), 3);
    archive.replace_entry(1, &[0x01, 0x02, 0x03]).unwrap();
    archive.save_as(&out).unwrap();
    archive.close();

    let reopened = Archive::open(&out).unwrap();
    assert_eq!(reopened.entry_count(), 3);
    assert_eq!(reopened.extract_to_buffer(1).unwrap(), vec![0x01, 0x02, 0x03]);
    assert!(reopened.extract_to_buffer(0).unwrap().is_empty());
    assert!(!dir.path().join("never_saved.afs").exists());
}

#[test]
fn entry_count_limit() {
    let dir = tempdir().unwrap();
    let max = Archive::new(65_535, dir.path().join("max.afs")).unwrap();
    assert_eq!(max.entry_count(), 65_535);

    let err = Archive::new(65_536, dir.path().join("over.afs")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
}

#[test]
fn out_of_range_ids() {
    let dir = tempdir().unwrap();
    let mut archive = Archive::open(write_foreign_archive(dir.path())).unwrap();
    let count = archive.entry_count();

    assert_eq!(archive.name(count).unwrap_err().kind(), ErrorKind::InvalidId);
    assert_eq!(archive.name(-1).unwrap_err().kind(), ErrorKind::InvalidId);
    assert_eq!(
        archive.extract_to_buffer(-1).unwrap_err().kind(),
        ErrorKind::InvalidId
    );
    assert_eq!(
        archive.replace_entry(count, b"x").unwrap_err().kind(),
        ErrorKind::InvalidId
    );
    assert_eq!(
        archive.entry_offset(i64::MAX).unwrap_err().kind(),
        ErrorKind::InvalidId
    );
}

#[test]
fn malformed_archives_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.afs");

    let mut bad_magic = foreign_archive_bytes();
    bad_magic[0] = b'X';
    let mut overlapping = foreign_archive_bytes();
    overlapping[8..12].copy_from_slice(&0x84u32.to_le_bytes());
    let mut past_end = foreign_archive_bytes();
    past_end[20..24].copy_from_slice(&0x1000u32.to_le_bytes());
    let truncated = foreign_archive_bytes()[..20].to_vec();

    for bytes in [bad_magic, overlapping, past_end, truncated] {
        std::fs::write(&path, &bytes).unwrap();
        let err = Archive::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFormat, "{err}");
    }

    let err = Archive::open(dir.path().join("missing.afs")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn persisted_name_allocates_missing_metadata_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bare.afs");

    let mut bytes = foreign_archive_bytes();
    bytes[32..40].fill(0);
    std::fs::write(&path, &bytes).unwrap();

    let mut archive = Archive::open(&path).unwrap();
    assert!(!archive.has_metadata_table());
    assert_eq!(archive.name(0).unwrap(), "");

    archive
        .rename(2, "late.bin", NameTarget::PersistToHeader)
        .unwrap();
    archive.save().unwrap();

    let reopened = Archive::open(&path).unwrap();
    assert!(reopened.has_metadata_table());
    assert_eq!(reopened.name(2).unwrap(), "late.bin");
    assert_eq!(reopened.name(0).unwrap(), "");
    assert_eq!(reopened.extract_to_buffer(1).unwrap(), FOREIGN_PAYLOADS[1]);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0x1000);
}

#[test]
fn persisted_metadata_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());
    let stamp = Timestamp::new(2010, 10, 10, 10, 10, 10);

    let mut archive = Archive::open(&path).unwrap();
    archive
        .set_entry_metadata(
            2,
            &EntryMetadata {
                size: 0,
                entry_name: "third.bin".to_string(),
                last_modified: Some(stamp),
            },
            NameTarget::PersistToHeader,
        )
        .unwrap();
    archive.save().unwrap();

    let reopened = Archive::open(&path).unwrap();
    let meta = reopened.entry_metadata(2).unwrap();
    assert_eq!(meta.entry_name, "third.bin");
    assert_eq!(meta.last_modified, Some(stamp));
    assert_eq!(meta.size, 7);
}

#[test]
fn extract_all_names_and_deduplicates() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());
    let out = dir.path().join("out");

    let mut archive = Archive::open(&path).unwrap();
    archive.rename(1, "alpha.bin", NameTarget::OverlayOnly).unwrap();

    let report = archive.extract_all(&out).expect("extract");
    assert!(report.is_complete());
    assert_eq!(report.written.len(), 3);
    assert_eq!(std::fs::read(out.join("alpha.bin")).unwrap(), FOREIGN_PAYLOADS[0]);
    assert_eq!(
        std::fs::read(out.join("alpha(1).bin")).unwrap(),
        FOREIGN_PAYLOADS[1]
    );
    assert_eq!(std::fs::read(out.join("blank_2")).unwrap(), FOREIGN_PAYLOADS[2]);

    // A second run keeps the first run's files
    let report = archive.extract_all(&out).unwrap();
    assert_eq!(report.written[0].1, out.join("alpha(2).bin"));
}

#[test]
fn extract_to_file_creates_directory() {
    let dir = tempdir().unwrap();
    let archive = Archive::open(write_foreign_archive(dir.path())).unwrap();

    let nested = dir.path().join("a").join("b");
    let written = archive.extract_to_file(1, &nested).unwrap();
    assert_eq!(written, nested.join("beta.bin"));
    assert_eq!(std::fs::read(written).unwrap(), FOREIGN_PAYLOADS[1]);
}

#[test]
fn extract_to_file_replaces_existing_file() {
    let dir = tempdir().unwrap();
    let archive = Archive::open(write_foreign_archive(dir.path())).unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("alpha.bin"), b"stale contents").unwrap();

    let written = archive.extract_to_file(0, &out).unwrap();
    assert_eq!(std::fs::read(written).unwrap(), FOREIGN_PAYLOADS[0]);
}

#[cfg(unix)]
#[test]
fn extraction_never_follows_links_out_of_the_directory() {
    let dir = tempdir().unwrap();
    let archive = Archive::open(write_foreign_archive(dir.path())).unwrap();
    let out = dir.path().join("out");
    let outside = dir.path().join("outside");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(outside.join("stolen.bin"), out.join("alpha.bin")).unwrap();

    let err = archive
        .extract_to_file(0, &out)
        .expect_err("a link is not a regular file");
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(!outside.join("stolen.bin").exists());

    let report = archive.extract_all(&out).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written[0].1, out.join("alpha(1).bin"));
    assert_eq!(
        std::fs::read(out.join("alpha(1).bin")).unwrap(),
        FOREIGN_PAYLOADS[0]
    );
    assert!(!outside.join("stolen.bin").exists());
    assert!(
        std::fs::symlink_metadata(out.join("alpha.bin"))
            .unwrap()
            .file_type()
            .is_symlink()
    );
}

#[test]
fn extract_all_continues_past_a_failing_entry() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());
    let out = dir.path().join("out");

    let config = StorageConfig::new().with_mmap(false);
    let archive = Archive::open_with_config(&path, config).unwrap();

    // Cut the file off where entry 2 starts
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(u64::from(FOREIGN_OFFSETS[2]))
        .unwrap();

    let report = archive.extract_all(&out).expect("extract");
    assert!(!report.is_complete());
    assert_eq!(report.failed_ids(), vec![2]);
    assert_eq!(report.failed[0].1.kind(), ErrorKind::Io);
    assert_eq!(report.written.len(), 2);
    assert_eq!(std::fs::read(out.join("alpha.bin")).unwrap(), FOREIGN_PAYLOADS[0]);
    assert_eq!(std::fs::read(out.join("beta.bin")).unwrap(), FOREIGN_PAYLOADS[1]);
    assert!(!out.join("blank_2").exists());
}

#[test]
fn create_from_compacts_with_canonical_layout() {
    let dir = tempdir().unwrap();
    let mut source = Archive::open(write_foreign_archive(dir.path())).unwrap();
    source.rename(2, "gamma.bin", NameTarget::OverlayOnly).unwrap();
    source.replace_entry(0, b"staged").unwrap();

    let copy = Archive::create_from(&source, dir.path().join("copy.afs")).expect("create");
    assert_eq!(copy.entry_count(), 3);
    assert_eq!(copy.entry_offset(0).unwrap(), 0x800);
    assert_eq!(copy.entry_offset(1).unwrap(), 0x1000);
    assert_eq!(copy.entry_offset(2).unwrap(), 0x1800);
    assert_eq!(copy.extract_to_buffer(0).unwrap(), b"staged");
    assert_eq!(copy.extract_to_buffer(1).unwrap(), FOREIGN_PAYLOADS[1]);
    assert_eq!(copy.name(2).unwrap(), "gamma.bin");
    assert_eq!(
        copy.last_modified(0).unwrap(),
        Some(Timestamp::new(2004, 3, 28, 14, 5, 59))
    );

    let offsets = copy.entries().iter().map(|e| e.offset).collect::<Vec<_>>();
    assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn import_directory_replaces_matching_names() {
    let dir = tempdir().unwrap();
    let path = write_foreign_archive(dir.path());
    let patch = dir.path().join("patch");
    std::fs::create_dir(&patch).unwrap();
    std::fs::write(patch.join("beta.bin"), b"new beta").unwrap();
    std::fs::write(patch.join("unrelated.txt"), b"ignored").unwrap();

    let mut archive = Archive::open(&path).unwrap();
    let import = archive.import_directory(&patch).expect("import");

    assert_eq!(import.replaced, vec![(1, patch.join("beta.bin"))]);
    assert_eq!(import.unmatched, vec![patch.join("unrelated.txt")]);
    assert_eq!(archive.extract_to_buffer(1).unwrap(), b"new beta");
    assert_eq!(archive.extract_to_buffer(0).unwrap(), FOREIGN_PAYLOADS[0]);
}

#[test]
fn builder_output_opens() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("built.afs");
    ArchiveBuilder::new()
        .add_entry("one.bin", vec![1; 3000], None)
        .unwrap()
        .add_entry("two.bin", Vec::new(), None)
        .unwrap()
        .write(&path)
        .unwrap();

    let archive = Archive::open(&path).unwrap();
    assert_eq!(archive.entry_reserved_space(0).unwrap(), 0x1000);
    assert_eq!(archive.entry_reserved_space(1).unwrap(), 0);
    assert_eq!(archive.name(1).unwrap(), "two.bin");
    assert_eq!(archive.extract_to_buffer(0).unwrap(), vec![1; 3000]);
}
