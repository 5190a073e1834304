//! Tests for RecordLog
//!
//! These tests verify:
//! - Appending records and the offsets returned
//! - Reading records back by offset
//! - Rollback of the last append
//! - Sequential replay and torn-tail detection

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use logcask::log::{Record, RecordLog};
use logcask::CaskError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf, RecordLog) {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("data");
    let log = RecordLog::open(&log_path).unwrap();
    (temp_dir, log_path, log)
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_open_creates_empty_log() {
    let (_temp, log_path, log) = setup_temp_log();

    assert!(log_path.exists());
    assert!(log.is_empty());
    assert_eq!(log.len(), 0);
}

#[test]
fn test_append_returns_byte_offsets() {
    let (_temp, log_path, log) = setup_temp_log();

    let first = log.append(&Record::new("a", "1")).unwrap();
    log.commit_last();
    let second = log.append(&Record::new("bb", "22")).unwrap();
    log.commit_last();

    assert_eq!(first, 0);
    assert_eq!(second, 4); // "a=1\n"
    assert_eq!(log.len(), 10);
    assert_eq!(fs::read_to_string(&log_path).unwrap(), "a=1\nbb=22\n");
}

#[test]
fn test_update_appends_new_record() {
    let (_temp, _path, log) = setup_temp_log();

    let old = log.append(&Record::new("a", "1")).unwrap();
    log.commit_last();
    let new = log.append(&Record::new("a", "2")).unwrap();
    log.commit_last();

    assert_ne!(old, new);
    assert_eq!(log.read_at(old).unwrap().value, "1");
    assert_eq!(log.read_at(new).unwrap().value, "2");
}

#[test]
fn test_reopen_continues_at_tail() {
    let (_temp, log_path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();
    drop(log);

    let log = RecordLog::open(&log_path).unwrap();
    let offset = log.append(&Record::new("b", "2")).unwrap();

    assert_eq!(offset, 4);
    assert_eq!(log.read_at(0).unwrap(), Record::new("a", "1"));
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_read_at_returns_key_and_value() {
    let (_temp, _path, log) = setup_temp_log();
    let offset = log.append(&Record::new("user:1", "alice")).unwrap();

    assert_eq!(log.read_at(offset).unwrap(), Record::new("user:1", "alice"));
}

#[test]
fn test_read_past_end_is_record_not_found() {
    let (_temp, _path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();

    match log.read_at(4) {
        Err(CaskError::RecordNotFound { offset }) => assert_eq!(offset, 4),
        other => panic!("expected RecordNotFound, got {:?}", other),
    }
    assert!(matches!(log.read_at(1_000), Err(CaskError::RecordNotFound { .. })));
}

#[test]
fn test_read_mid_record_does_not_parse() {
    let (_temp, _path, log) = setup_temp_log();
    log.append(&Record::new("key", "value")).unwrap();

    // Offset 4 is the start of the value, not of a record
    assert!(matches!(log.read_at(4), Err(CaskError::RecordNotFound { .. })));
}

#[test]
fn test_values_with_reserved_bytes_round_trip() {
    let (_temp, _path, log) = setup_temp_log();
    let record = Record::new("k=v", "multi\nline = value\\with\r\nescapes");

    let offset = log.append(&record).unwrap();
    let next = log.append(&Record::new("after", "x")).unwrap();

    assert_eq!(log.read_at(offset).unwrap(), record);
    assert_eq!(log.read_at(next).unwrap(), Record::new("after", "x"));
}

// =============================================================================
// Rollback Tests
// =============================================================================

#[test]
fn test_rollback_truncates_to_pre_append_length() {
    let (_temp, log_path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();
    log.commit_last();

    log.append(&Record::new("x", "9")).unwrap();
    log.rollback_last().unwrap();

    assert_eq!(log.len(), 4);
    assert_eq!(fs::read_to_string(&log_path).unwrap(), "a=1\n");
}

#[test]
fn test_rollback_handles_value_containing_newline() {
    let (_temp, log_path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();
    log.commit_last();

    log.append(&Record::new("x", "line1\nline2\n")).unwrap();
    log.rollback_last().unwrap();

    assert_eq!(fs::read_to_string(&log_path).unwrap(), "a=1\n");
}

#[test]
fn test_rollback_without_pending_append_fails() {
    let (_temp, _path, log) = setup_temp_log();
    assert!(log.rollback_last().is_err());

    log.append(&Record::new("a", "1")).unwrap();
    log.commit_last();
    assert!(log.rollback_last().is_err());
    assert_eq!(log.len(), 4);
}

#[test]
fn test_rollback_is_single_shot() {
    let (_temp, _path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();
    log.append(&Record::new("b", "2")).unwrap();

    log.rollback_last().unwrap();
    assert!(log.rollback_last().is_err());
    assert_eq!(log.len(), 4);
}

#[test]
fn test_read_rolled_back_offset_fails() {
    let (_temp, _path, log) = setup_temp_log();
    let offset = log.append(&Record::new("x", "9")).unwrap();
    log.rollback_last().unwrap();

    assert!(matches!(log.read_at(offset), Err(CaskError::RecordNotFound { .. })));
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_yields_records_with_offsets() {
    let (_temp, _path, log) = setup_temp_log();
    let offsets: Vec<u64> = ["a", "b", "a"]
        .iter()
        .enumerate()
        .map(|(i, key)| log.append(&Record::new(*key, i.to_string())).unwrap())
        .collect();

    let (entries, stats) = log.replay().unwrap().collect_all().unwrap();

    assert_eq!(stats.records, 3);
    assert_eq!(stats.torn_tail, None);
    assert_eq!(stats.valid_len, log.len());
    let replayed: Vec<u64> = entries.iter().map(|e| e.offset).collect();
    assert_eq!(replayed, offsets);
    assert_eq!(entries[2].record, Record::new("a", "2"));
}

#[test]
fn test_replay_reports_torn_tail() {
    let (_temp, log_path, log) = setup_temp_log();
    log.append(&Record::new("a", "1")).unwrap();
    drop(log);

    let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(b"partial=rec").unwrap();
    drop(file);

    let log = RecordLog::open(&log_path).unwrap();
    let (entries, stats) = log.replay().unwrap().collect_all().unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(stats.torn_tail, Some(4));
    assert_eq!(stats.valid_len, 4);
}

#[test]
fn test_replay_skips_malformed_lines() {
    let (_temp, log_path, _log) = setup_temp_log();
    fs::write(&log_path, "a=1\ngarbage\nb=2\n").unwrap();

    let log = RecordLog::open(&log_path).unwrap();
    let (entries, stats) = log.replay().unwrap().collect_all().unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(stats.malformed, 1);
    assert_eq!(entries[1].offset, 12);
    assert_eq!(entries[1].record, Record::new("b", "2"));
}
