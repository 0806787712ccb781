//! Tests for StoreOptions and its builder

use std::path::PathBuf;

use splitstore::{StoreError, StoreOptions, WritePolicy};

#[test]
fn test_builder_defaults() {
    let options = StoreOptions::builder().name("users").base_dir("/data").build().unwrap();

    assert_eq!(options.name, "users");
    assert_eq!(options.base_dir, PathBuf::from("/data"));
    assert_eq!(options.write_policy, WritePolicy::OnChange);
    assert!(options.pretty);
    assert!(!options.durable_writes);
    assert_eq!(options.collection_dir(), PathBuf::from("/data/users"));
}

#[test]
fn test_builder_overrides() {
    let options = StoreOptions::builder()
        .name("settings")
        .base_dir("/tmp/app")
        .write_policy(WritePolicy::Deferred)
        .pretty(false)
        .durable_writes(true)
        .build()
        .unwrap();

    assert_eq!(options.write_policy, WritePolicy::Deferred);
    assert!(!options.pretty);
    assert!(options.durable_writes);
}

#[test]
fn test_base_dir_defaults_to_current_directory() {
    let options = StoreOptions::new("users").unwrap();

    assert_eq!(options.base_dir, std::env::current_dir().unwrap());
}

#[test]
fn test_name_is_required() {
    let result = StoreOptions::builder().base_dir("/data").build();

    assert!(matches!(result, Err(StoreError::Config(_))));
}

#[test]
fn test_name_must_be_a_single_segment() {
    for bad in ["", "..", "a/b"] {
        let result = StoreOptions::builder().name(bad).base_dir("/data").build();
        assert!(matches!(result, Err(StoreError::Config(_))), "accepted {:?}", bad);
    }
}
