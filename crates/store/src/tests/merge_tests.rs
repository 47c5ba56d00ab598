use super::helpers::{count_data_files, count_hint_files, flip_last_byte_in_place};
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Preconditions ---------------------

#[test]
fn merge_without_immutable_segments_is_a_noop() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;

    store.put(b"k", b"v")?;
    store.merge()?;

    assert_eq!(count_data_files(dir.path()), 1);
    assert_eq!(count_hint_files(dir.path()), 0);
    assert_eq!(store.get(b"k")?, b"v");
    Ok(())
}

// --------------------- Collapsing redundancy ---------------------

#[test]
fn merge_collapses_redundant_records() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(100);

    store.put(b"key1", b"value1")?;
    store.put(b"key1", b"value1-new")?; // supersedes the first record
    store.delete(b"key2")?; // tombstone only
    store.put(b"key3", b"value3")?; // crosses the threshold, rotates

    store.merge()?;

    assert_eq!(store.get(b"key1")?, b"value1-new");
    assert!(matches!(store.get(b"key2"), Err(StoreError::KeyNotFound)));
    assert_eq!(store.get(b"key3")?, b"value3");

    // Same answers after a restart.
    store.close()?;
    let store = Store::open(dir.path())?;
    assert_eq!(store.get(b"key1")?, b"value1-new");
    assert!(matches!(store.get(b"key2"), Err(StoreError::KeyNotFound)));
    assert_eq!(store.get(b"key3")?, b"value3");
    Ok(())
}

#[test]
fn merge_drops_dead_records_and_tombstones_from_disk() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(100);

    store.put(b"key1", b"value1")?;
    store.put(b"key1", b"value1-new")?;
    store.delete(b"key2")?;
    store.put(b"key3", b"value3")?; // rotates

    store.merge()?;

    // The merged segment holds exactly one live record: key1's latest
    // (20 + 4 + 10 bytes). The stale value and the tombstone are gone.
    let merged = fs::metadata(dir.path().join("0.data"))?.len();
    assert_eq!(merged, (record::HEADER_LEN + 4 + 10) as u64);
    Ok(())
}

#[test]
fn merge_reclaims_space_from_overwrites() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(200);

    // Overwrite one key enough times to roll through several segments.
    for i in 0..40u32 {
        store.put(b"hot-key", format!("value-{:04}", i).as_bytes())?;
    }
    assert!(count_data_files(dir.path()) > 2);
    let before: u64 = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum();

    store.merge()?;

    // Only the merged target and the active segment remain.
    assert_eq!(count_data_files(dir.path()), 2);
    let after: u64 = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.metadata().map(|m| m.len()).unwrap_or(0))
        .sum();
    assert!(after < before, "merge should shrink the directory");
    assert_eq!(store.get(b"hot-key")?, b"value-0039");
    Ok(())
}

// --------------------- The CRC guardian ---------------------

#[test]
fn merge_refuses_to_propagate_corrupt_records() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(100);

    store.put(b"key1", b"value1")?;
    store.put(b"key2", b"value2")?;
    store.put(b"key3", b"value3")?;
    store.put(b"key4", b"value4")?; // rotates; segment 0 is sealed

    // Damage the last live record of the sealed segment behind the
    // store's back (key3's value bytes sit at the end of the file).
    flip_last_byte_in_place(&dir.path().join("0.data"));

    assert!(matches!(store.merge(), Err(StoreError::Corruption(_))));

    // The failed pass left no temporaries and no half-retired state.
    assert!(!dir.path().join("merge.data").exists());
    assert!(!dir.path().join("merge.hint").exists());
    assert!(dir.path().join("0.data").exists());
    assert!(dir.path().join("1.data").exists());
    assert_eq!(store.segment_count(), 2);

    // Untouched records are still served; only the damaged one faults.
    assert_eq!(store.get(b"key1")?, b"value1");
    assert_eq!(store.get(b"key2")?, b"value2");
    assert!(matches!(store.get(b"key3"), Err(StoreError::Corruption(_))));
    assert_eq!(store.get(b"key4")?, b"value4");
    Ok(())
}

// --------------------- Idempotence ---------------------

#[test]
fn merge_twice_equals_merge_once() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(100);

    store.put(b"key1", b"value1")?;
    store.put(b"key1", b"value1-new")?;
    store.delete(b"key2")?;
    store.put(b"key3", b"value3")?; // rotates

    store.merge()?;
    let data_files = count_data_files(dir.path());
    let merged_size = fs::metadata(dir.path().join("0.data"))?.len();

    store.merge()?;
    assert_eq!(count_data_files(dir.path()), data_files);
    assert_eq!(fs::metadata(dir.path().join("0.data"))?.len(), merged_size);
    assert_eq!(store.get(b"key1")?, b"value1-new");
    assert!(matches!(store.get(b"key2"), Err(StoreError::KeyNotFound)));
    assert_eq!(store.get(b"key3")?, b"value3");
    Ok(())
}

// --------------------- Segment numbering ---------------------

#[test]
fn merge_reuses_the_smallest_subsumed_id() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(64);

    for i in 0..12u32 {
        store.put(format!("key-{}", i).as_bytes(), b"0123456789abcdef")?;
    }
    let segments_before = store.segment_count();
    assert!(segments_before > 2);

    store.merge()?;

    // Everything immutable collapsed into segment 0; the active segment
    // keeps its high ID.
    assert!(dir.path().join("0.data").exists());
    assert!(dir.path().join("0.hint").exists());
    assert_eq!(store.segment_count(), 2);
    for i in 0..12u32 {
        assert_eq!(store.get(format!("key-{}", i).as_bytes())?, b"0123456789abcdef");
    }
    Ok(())
}

#[test]
fn merged_store_keeps_accepting_writes() -> Result<()> {
    let dir = tempdir()?;
    let store = Store::open(dir.path())?;
    store.set_max_file_size(100);

    store.put(b"key1", b"value1")?;
    store.put(b"key2", b"value2")?;
    store.put(b"key3", b"value3")?;
    store.put(b"key4", b"value4")?; // rotates
    store.merge()?;

    store.put(b"key1", b"value1-after-merge")?;
    store.delete(b"key2")?;
    assert_eq!(store.get(b"key1")?, b"value1-after-merge");
    assert!(matches!(store.get(b"key2"), Err(StoreError::KeyNotFound)));

    store.close()?;
    let store = Store::open(dir.path())?;
    assert_eq!(store.get(b"key1")?, b"value1-after-merge");
    assert!(matches!(store.get(b"key2"), Err(StoreError::KeyNotFound)));
    assert_eq!(store.get(b"key3")?, b"value3");
    Ok(())
}
