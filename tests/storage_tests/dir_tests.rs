//! Tests for CollectionDir and the document writer
//!
//! These tests verify:
//! - Key validation and path layout
//! - Directory scans (only regular `*.json` files become keys)
//! - Idempotent single removal
//! - Bulk removal, including a missing directory

use std::fs;
use std::path::Path;

use splitstore::storage::{validate_segment, write_atomic, write_atomic_async, CollectionDir};
use splitstore::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, CollectionDir) {
    let temp_dir = TempDir::new().unwrap();
    let dir = CollectionDir::new(temp_dir.path().join("users"));
    dir.ensure_exists().unwrap();
    (temp_dir, dir)
}

fn touch(dir: &CollectionDir, file_name: &str) {
    fs::write(dir.path().join(file_name), "{}").unwrap();
}

// =============================================================================
// Key Validation Tests
// =============================================================================

#[test]
fn test_validate_segment_accepts_plain_names() {
    assert!(validate_segment("alice").is_ok());
    assert!(validate_segment("user-42_settings").is_ok());
    assert!(validate_segment("with.dots").is_ok());
    assert!(validate_segment("ünïcode").is_ok());
}

#[test]
fn test_validate_segment_rejects_escaping_names() {
    assert!(validate_segment("").is_err());
    assert!(validate_segment(".").is_err());
    assert!(validate_segment("..").is_err());
    assert!(validate_segment("a/b").is_err());
    assert!(validate_segment("a\\b").is_err());
    assert!(validate_segment("nul\0byte").is_err());
}

#[test]
fn test_check_key_returns_invalid_key() {
    let result = CollectionDir::check_key("../etc/passwd");
    assert!(matches!(result, Err(StoreError::InvalidKey(_))));
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_record_and_temp_paths() {
    let dir = CollectionDir::new("/data/users");

    assert_eq!(dir.record_path("alice"), Path::new("/data/users/alice.json"));
    assert_eq!(dir.temp_path("alice"), Path::new("/data/users/.alice.json.tmp"));
}

#[test]
fn test_parse_key() {
    assert_eq!(CollectionDir::parse_key(Path::new("/d/alice.json")), Some("alice".to_string()));
    assert_eq!(CollectionDir::parse_key(Path::new("/d/v1.2.json")), Some("v1.2".to_string()));
    assert_eq!(CollectionDir::parse_key(Path::new("/d/notes.txt")), None);
    assert_eq!(CollectionDir::parse_key(Path::new("/d/.alice.json.tmp")), None);
    assert_eq!(CollectionDir::parse_key(Path::new("/d/README")), None);
}

#[test]
fn test_key_round_trips_through_path() {
    let dir = CollectionDir::new("/data/users");
    for key in ["alice", "bob.smith", "x-1"] {
        assert_eq!(CollectionDir::parse_key(&dir.record_path(key)), Some(key.to_string()));
    }
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_ensure_exists_creates_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let dir = CollectionDir::new(temp_dir.path().join("a").join("b").join("users"));

    dir.ensure_exists().unwrap();
    dir.ensure_exists().unwrap(); // idempotent

    assert!(dir.path().is_dir());
}

#[test]
fn test_scan_missing_directory_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let dir = CollectionDir::new(temp_dir.path().join("nope"));

    assert!(dir.scan_keys().unwrap().is_empty());
}

#[test]
fn test_scan_filters_and_sorts_keys() {
    let (_temp, dir) = setup_temp_dir();
    touch(&dir, "carol.json");
    touch(&dir, "alice.json");
    touch(&dir, "notes.txt");
    touch(&dir, ".bob.json.tmp");
    fs::create_dir(dir.path().join("nested.json")).unwrap();

    assert_eq!(dir.scan_keys().unwrap(), vec!["alice", "carol"]);
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_record_is_idempotent() {
    let (_temp, dir) = setup_temp_dir();
    touch(&dir, "alice.json");

    assert!(dir.remove_record("alice").unwrap());
    assert!(!dir.remove_record("alice").unwrap());
    assert!(!dir.record_path("alice").exists());
}

#[test]
fn test_remove_all_removes_every_file() {
    let (_temp, dir) = setup_temp_dir();
    touch(&dir, "alice.json");
    touch(&dir, "bob.json");
    touch(&dir, "notes.txt");
    fs::create_dir(dir.path().join("keep")).unwrap();

    let removal = dir.remove_all().unwrap();
    assert!(removal.is_complete());
    assert_eq!(removal.removed(), 3);
    assert_eq!(removal.failed(), 0);
    let mut keys: Vec<String> = removal.removed_keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["alice", "bob"]);
    assert!(dir.scan_keys().unwrap().is_empty());
    assert!(!dir.path().join("notes.txt").exists());
    assert!(dir.path().join("keep").is_dir());
}

#[test]
fn test_remove_all_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let dir = CollectionDir::new(temp_dir.path().join("gone"));

    let removal = dir.remove_all().unwrap();
    assert!(removal.is_complete());
    assert_eq!(removal.removed(), 0);
}

#[test]
fn test_remove_all_unlistable_directory_removes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("users");
    fs::write(&path, "not a directory").unwrap();
    let dir = CollectionDir::new(&path);

    assert!(matches!(dir.remove_all(), Err(StoreError::Io(_))));
    assert!(path.is_file());
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_write_atomic_replaces_file() {
    let (_temp, dir) = setup_temp_dir();
    let target = dir.record_path("k");
    let temp = dir.temp_path("k");

    write_atomic(&target, &temp, b"{\"v\":1}", false).unwrap();
    write_atomic(&target, &temp, b"{\"v\":2}", true).unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"{\"v\":2}".to_vec());
    assert!(!temp.exists());
}

// =============================================================================
// Async Tests
// =============================================================================

#[tokio::test]
async fn test_async_scan_and_remove() {
    let temp_dir = TempDir::new().unwrap();
    let dir = CollectionDir::new(temp_dir.path().join("users"));

    assert!(dir.scan_keys_async().await.unwrap().is_empty());
    assert_eq!(dir.remove_all_async().await.unwrap().removed(), 0);

    dir.ensure_exists_async().await.unwrap();
    touch(&dir, "bob.json");
    touch(&dir, "alice.json");
    touch(&dir, "scratch.txt");

    assert_eq!(dir.scan_keys_async().await.unwrap(), vec!["alice", "bob"]);

    assert!(dir.remove_record_async("bob").await.unwrap());
    assert!(!dir.remove_record_async("bob").await.unwrap());

    let removal = dir.remove_all_async().await.unwrap();
    assert!(removal.is_complete());
    assert_eq!(removal.removed(), 2);
    assert_eq!(removal.removed_keys().collect::<Vec<_>>(), vec!["alice"]);
    assert!(dir.scan_keys_async().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_async_write_atomic() {
    let (_temp, dir) = setup_temp_dir();
    let target = dir.record_path("k");
    let temp = dir.temp_path("k");

    write_atomic_async(&target, &temp, b"[1]", true).await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"[1]".to_vec());
    assert!(!temp.exists());
}

#[tokio::test]
async fn test_async_remove_all_unlistable_directory_removes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("users");
    fs::write(&path, "not a directory").unwrap();
    let dir = CollectionDir::new(&path);

    assert!(matches!(dir.remove_all_async().await, Err(StoreError::Io(_))));
    assert!(path.is_file());
}
