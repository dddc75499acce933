//! Tests for StoreRegistry
//!
//! These tests verify:
//! - One shared store per canonical path
//! - File-name convenience operations
//! - Closing single stores and the whole registry

use std::sync::Arc;
use std::thread;

use flatkv::{MatchSpec, ScanItem, SelectMode, Selection, StoreConfig, StoreRegistry};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_registry() -> (TempDir, StoreRegistry) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder().prefilter(false).build();
    (temp_dir, StoreRegistry::new(config))
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_returns_shared_store() {
    let (temp_dir, registry) = setup_registry();
    let path = temp_dir.path().join("a.db");

    let first = registry.open(&path).unwrap();
    let second = registry.open(temp_dir.path().join(".").join("a.db")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_open_distinct_files() {
    let (temp_dir, registry) = setup_registry();

    registry.open(temp_dir.path().join("a.db")).unwrap();
    registry.open(temp_dir.path().join("b.db")).unwrap();

    assert_eq!(registry.len(), 2);
}

#[test]
fn test_open_failure() {
    let (temp_dir, registry) = setup_registry();

    let result = registry.open(temp_dir.path().join("missing").join("a.db"));

    assert!(result.is_err());
    assert!(registry.is_empty());
}

// =============================================================================
// Convenience API Tests
// =============================================================================

#[test]
fn test_put_get_del_by_path() {
    let (temp_dir, registry) = setup_registry();
    let path = temp_dir.path().join("a.db");

    registry.put(&path, b"key", b"value").unwrap();
    assert_eq!(registry.get(&path, b"key").unwrap(), Some(b"value".to_vec()));

    assert!(registry.del(&path, b"key").unwrap());
    assert_eq!(registry.get(&path, b"key").unwrap(), None);
}

#[test]
fn test_select_by_path() {
    let (temp_dir, registry) = setup_registry();
    let path = temp_dir.path().join("a.db");
    registry.put(&path, b"k1", b"red apple").unwrap();
    registry.put(&path, b"k2", b"green pear").unwrap();

    let selection = registry
        .select(&path, &MatchSpec::from("apple"), SelectMode::Keys, true)
        .unwrap();

    assert_eq!(selection, Selection::Keys(vec![b"k1".to_vec()]));
}

#[test]
fn test_incremental_scan_by_path() {
    let (temp_dir, registry) = setup_registry();
    let path = temp_dir.path().join("a.db");
    registry.put(&path, b"k1", b"red apple").unwrap();
    registry.put(&path, b"k2", b"green pear").unwrap();
    registry.put(&path, b"k3", b"red cherry").unwrap();

    registry
        .begin(&path, &MatchSpec::from("red"), SelectMode::Keys, true)
        .unwrap();
    assert_eq!(registry.next(&path).unwrap(), Some(ScanItem::Key(b"k1".to_vec())));
    assert_eq!(registry.next(&path).unwrap(), Some(ScanItem::Key(b"k3".to_vec())));
    assert_eq!(registry.next(&path).unwrap(), None);
    registry.end(&path).unwrap();

    assert!(!registry.open(&path).unwrap().lock().is_scanning());
}

#[test]
fn test_stores_are_independent() {
    let (temp_dir, registry) = setup_registry();
    let a = temp_dir.path().join("a.db");
    let b = temp_dir.path().join("b.db");

    registry.put(&a, b"k", b"in a").unwrap();

    assert_eq!(registry.get(&b, b"k").unwrap(), None);
}

#[test]
fn test_concurrent_writers_share_store() {
    let (temp_dir, registry) = setup_registry();
    let registry = Arc::new(registry);
    let path = temp_dir.path().join("a.db");

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let path = path.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("t{}-{:02}", t, i);
                    registry.put(&path, key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = registry.open(&path).unwrap();
    let all = store
        .lock()
        .select(&MatchSpec::from("v"), SelectMode::Keys, true)
        .unwrap();
    assert_eq!(all.len(), 100);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_single_store() {
    let (temp_dir, registry) = setup_registry();
    let path = temp_dir.path().join("a.db");
    registry.put(&path, b"k", b"v").unwrap();

    assert!(registry.close(&path).unwrap());
    assert!(!registry.close(&path).unwrap());
    assert!(registry.is_empty());

    // Reopens on demand with the data intact
    assert_eq!(registry.get(&path, b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_close_unknown_path() {
    let (temp_dir, registry) = setup_registry();

    assert!(!registry.close(temp_dir.path().join("never.db")).unwrap());
}

#[test]
fn test_close_all() {
    let (temp_dir, registry) = setup_registry();
    registry.open(temp_dir.path().join("a.db")).unwrap();
    registry.open(temp_dir.path().join("b.db")).unwrap();

    registry.close_all().unwrap();

    assert!(registry.is_empty());
}
