//! Instance Log Tests
//!
//! Tests for opening, writing and closing per-instance log files.

use std::fs;

use simbridge::session::InstanceLog;
use simbridge::BridgeError;
use tempfile::TempDir;

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("new.log");

    let log = InstanceLog::open(&path, 1).unwrap();
    assert_eq!(log.path(), path);
    assert!(path.exists());
}

#[test]
fn test_open_step_one_truncates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inst.log");
    fs::write(&path, "old contents\n").unwrap();

    let log = InstanceLog::open(&path, 1).unwrap();
    log.close().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn test_open_later_step_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inst.log");
    fs::write(&path, "old contents\n").unwrap();

    let mut log = InstanceLog::open(&path, 2).unwrap();
    log.entry("X1", 5000, format_args!("Beginning Step {}", 2))
        .unwrap();
    log.close().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "old contents\nInst X1 Port 5000: Beginning Step 2\n"
    );
}

#[test]
fn test_open_step_zero_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inst.log");
    fs::write(&path, "a\n").unwrap();

    InstanceLog::open(&path, 0).unwrap().close().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
}

#[test]
fn test_open_missing_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("inst.log");

    match InstanceLog::open(&path, 1) {
        Err(BridgeError::LogOpen { path: got, source }) => {
            assert_eq!(got, path);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("Expected LogOpen, got {:?}", other),
    }
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inst.log");

    let mut log = InstanceLog::open(&path, 1).unwrap();
    log.entry("R12", 61000, format_args!("Beginning Simulation..."))
        .unwrap();
    log.entry("R12", 61000, format_args!("MaxStep():  t={:e}, retVal={:e}", 0.25, 1e-6))
        .unwrap();
    log.close().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Inst R12 Port 61000: Beginning Simulation...\n\
         Inst R12 Port 61000: MaxStep():  t=2.5e-1, retVal=1e-6\n"
    );
}

#[test]
fn test_entries_visible_before_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inst.log");

    let mut log = InstanceLog::open(&path, 1).unwrap();
    log.entry("X1", 1, format_args!("line")).unwrap();

    // Line-buffered: each entry reaches the file when it is written
    assert_eq!(fs::read_to_string(&path).unwrap(), "Inst X1 Port 1: line\n");
    drop(log);
}

#[test]
fn test_debug_shows_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dbg.log");

    let log = InstanceLog::open(&path, 1).unwrap();
    let debug = format!("{:?}", log);
    assert!(debug.contains("InstanceLog"));
    assert!(debug.contains("dbg.log"));
}
