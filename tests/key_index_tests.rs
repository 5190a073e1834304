//! Tests for KeyIndex
//!
//! These tests verify:
//! - Lookup and upsert semantics
//! - The on-disk format after each atomic rewrite
//! - Failed rewrites leave both file and memory untouched
//! - Rebuild from the record log (last write wins)

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use logcask::index::KeyIndex;
use logcask::log::{Record, RecordLog};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_index() -> (TempDir, PathBuf, KeyIndex) {
    let temp_dir = TempDir::new().unwrap();
    let index_path = temp_dir.path().join("reference");
    let index = KeyIndex::open(&index_path).unwrap();
    (temp_dir, index_path, index)
}

// =============================================================================
// Lookup / Upsert Tests
// =============================================================================

#[test]
fn test_lookup_missing_key() {
    let (_temp, _path, index) = setup_temp_index();

    assert_eq!(index.lookup("missing"), None);
    assert!(index.is_empty());
}

#[test]
fn test_upsert_then_lookup() {
    let (_temp, _path, index) = setup_temp_index();

    index.upsert("a", 0).unwrap();
    index.upsert("b", 4).unwrap();

    assert_eq!(index.lookup("a"), Some(0));
    assert_eq!(index.lookup("b"), Some(4));
    assert_eq!(index.len(), 2);
}

#[test]
fn test_upsert_supersedes_prior_mapping() {
    let (_temp, path, index) = setup_temp_index();

    index.upsert("a", 0).unwrap();
    index.upsert("a", 8).unwrap();

    assert_eq!(index.lookup("a"), Some(8));
    assert_eq!(index.len(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), "a=8\n");
}

#[test]
fn test_index_file_has_one_line_per_key() {
    let (_temp, path, index) = setup_temp_index();

    index.upsert("b", 4).unwrap();
    index.upsert("a", 0).unwrap();
    index.upsert("c", 8).unwrap();
    index.upsert("b", 12).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "a=0\nb=12\nc=8\n");
}

#[test]
fn test_no_temp_file_left_behind() {
    let (temp, _path, index) = setup_temp_index();

    index.upsert("a", 0).unwrap();

    assert!(!temp.path().join("reference.tmp").exists());
}

#[test]
fn test_escaped_keys_survive_reopen() {
    let (_temp, path, index) = setup_temp_index();
    index.upsert("we=ird\nkey", 42).unwrap();
    drop(index);

    let index = KeyIndex::open(&path).unwrap();
    assert_eq!(index.lookup("we=ird\nkey"), Some(42));
}

#[test]
fn test_reopen_loads_persisted_entries() {
    let (_temp, path, index) = setup_temp_index();
    index.upsert("a", 0).unwrap();
    index.upsert("b", 4).unwrap();
    drop(index);

    let index = KeyIndex::open(&path).unwrap();
    assert_eq!(index.lookup("a"), Some(0));
    assert_eq!(index.lookup("b"), Some(4));
}

#[test]
fn test_open_rejects_malformed_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("reference");
    fs::write(&path, "a=0\nnot-an-entry\n").unwrap();

    assert!(KeyIndex::open(&path).is_err());
}

#[test]
fn test_lookup_with_runs_only_on_hit() {
    let (_temp, _path, index) = setup_temp_index();
    index.upsert("a", 7).unwrap();

    let mut seen = Vec::new();
    assert_eq!(index.lookup_with("a", |offset| seen.push(offset)), Some(7));
    assert_eq!(index.lookup_with("b", |offset| seen.push(offset)), None);
    assert_eq!(seen, vec![7]);
}

#[test]
fn test_replace_all() {
    let (_temp, path, index) = setup_temp_index();
    index.upsert("old", 0).unwrap();

    let mut entries = BTreeMap::new();
    entries.insert("x".to_string(), 3u64);
    index.replace_all(entries).unwrap();

    assert_eq!(index.lookup("old"), None);
    assert_eq!(index.lookup("x"), Some(3));
    assert_eq!(fs::read_to_string(&path).unwrap(), "x=3\n");
}

// =============================================================================
// Rebuild Tests
// =============================================================================

#[test]
fn test_rebuild_from_log_last_write_wins() {
    let (temp, _path, index) = setup_temp_index();
    let log = RecordLog::open(&temp.path().join("data")).unwrap();

    log.append(&Record::new("a", "1")).unwrap();
    let b = log.append(&Record::new("b", "2")).unwrap();
    let a2 = log.append(&Record::new("a", "3")).unwrap();

    let stats = index.rebuild_from_log(&log).unwrap();

    assert_eq!(stats.records, 3);
    assert_eq!(index.lookup("a"), Some(a2));
    assert_eq!(index.lookup("b"), Some(b));
    assert_eq!(index.len(), 2);
}

#[test]
fn test_rebuild_replaces_stale_entries() {
    let (temp, _path, index) = setup_temp_index();
    let log = RecordLog::open(&temp.path().join("data")).unwrap();
    index.upsert("ghost", 99).unwrap();

    let a = log.append(&Record::new("a", "1")).unwrap();
    index.rebuild_from_log(&log).unwrap();

    assert_eq!(index.lookup("ghost"), None);
    assert_eq!(index.lookup("a"), Some(a));
}

#[test]
fn test_rebuild_from_empty_log() {
    let (temp, path, index) = setup_temp_index();
    let log = RecordLog::open(&temp.path().join("data")).unwrap();

    let stats = index.rebuild_from_log(&log).unwrap();

    assert_eq!(stats.records, 0);
    assert!(index.is_empty());
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}
