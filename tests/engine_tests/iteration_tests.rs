//! Tests for iteration
//!
//! These tests verify:
//! - keys/values/items visit every live record exactly once
//! - The handle cursor (iter_init/iter_next) and its reset semantics
//! - Independent iterators do not disturb each other
//! - Mutation during a cursor scan never reads freed space
//! - Closed handles end iteration with ClosedHandle

use std::collections::{BTreeMap, BTreeSet};

use depotkv::{Config, Depot, DepotError, OpenMode};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_depot(buckets: u32) -> (TempDir, Depot) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("iter.db"))
        .mode(OpenMode::CreateTruncate)
        .bucket_hint(buckets)
        .build();
    let depot = Depot::open(config).unwrap();
    (temp_dir, depot)
}

fn fill(depot: &Depot, count: usize) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut expected = BTreeMap::new();
    for i in 0..count {
        let key = format!("key{:04}", i).into_bytes();
        let value = format!("value{}", i).into_bytes();
        depot.put(&key, &value).unwrap();
        expected.insert(key, value);
    }
    expected
}

// =============================================================================
// Borrowing Iterator Tests
// =============================================================================

#[test]
fn test_keys_yield_each_live_key_once() {
    let (_temp, depot) = setup_temp_depot(7);
    let mut expected = fill(&depot, 300);
    for i in (0..300).step_by(7) {
        let key = format!("key{:04}", i).into_bytes();
        depot.delete(&key).unwrap();
        expected.remove(&key);
    }

    let keys: Vec<Vec<u8>> = depot.keys().collect::<depotkv::Result<_>>().unwrap();
    let unique: BTreeSet<Vec<u8>> = keys.iter().cloned().collect();

    assert_eq!(keys.len(), expected.len());
    assert_eq!(unique, expected.keys().cloned().collect());
}

#[test]
fn test_items_match_contents() {
    let (_temp, depot) = setup_temp_depot(13);
    let expected = fill(&depot, 100);

    let items: BTreeMap<Vec<u8>, Vec<u8>> = depot.items().collect::<depotkv::Result<_>>().unwrap();

    assert_eq!(items, expected);
}

#[test]
fn test_values_follow_keys_order() {
    let (_temp, depot) = setup_temp_depot(13);
    fill(&depot, 50);

    let keys = depot.list_keys().unwrap();
    let values: Vec<Vec<u8>> = depot.values().collect::<depotkv::Result<_>>().unwrap();

    assert_eq!(keys.len(), values.len());
    for (key, value) in keys.iter().zip(&values) {
        assert_eq!(&depot.get(key).unwrap(), value);
    }
}

#[test]
fn test_iterators_on_empty_depot() {
    let (_temp, depot) = setup_temp_depot(5);

    assert_eq!(depot.keys().count(), 0);
    assert_eq!(depot.items().count(), 0);
    assert!(depot.list_keys().unwrap().is_empty());
}

#[test]
fn test_independent_iterators() {
    let (_temp, depot) = setup_temp_depot(3);
    fill(&depot, 20);

    let mut first = depot.keys();
    let mut second = depot.keys();
    let a = first.next().unwrap().unwrap();
    let b = second.next().unwrap().unwrap();
    first.next().unwrap().unwrap();

    assert_eq!(a, b);
    assert_eq!(first.count() + 2, 20);
    assert_eq!(second.count() + 1, 20);
}

#[test]
fn test_iterator_after_close_yields_error_once() {
    let (_temp, depot) = setup_temp_depot(5);
    fill(&depot, 5);

    let mut keys = depot.keys();
    keys.next().unwrap().unwrap();
    depot.close().unwrap();

    assert!(matches!(keys.next(), Some(Err(DepotError::ClosedHandle))));
    assert!(keys.next().is_none());
}

#[test]
fn test_iteration_on_read_only_handle() {
    let (temp, depot) = setup_temp_depot(11);
    let expected = fill(&depot, 40);
    depot.close().unwrap();

    let depot = Depot::open_path(temp.path().join("iter.db"), OpenMode::ReadOnly, None).unwrap();
    let items: BTreeMap<Vec<u8>, Vec<u8>> = depot.items().collect::<depotkv::Result<_>>().unwrap();

    assert_eq!(items, expected);
}

// =============================================================================
// Handle Cursor Tests
// =============================================================================

#[test]
fn test_cursor_visits_everything_then_stops() {
    let (_temp, depot) = setup_temp_depot(7);
    let expected = fill(&depot, 60);

    depot.iter_init().unwrap();
    let mut seen = BTreeMap::new();
    while let Some((key, value)) = depot.iter_next().unwrap() {
        assert!(seen.insert(key, value).is_none());
    }

    assert_eq!(seen, expected);
    // Exhausted cursors do not wrap around.
    assert!(depot.iter_next().unwrap().is_none());
}

#[test]
fn test_cursor_reset_restarts() {
    let (_temp, depot) = setup_temp_depot(7);
    fill(&depot, 10);

    depot.iter_init().unwrap();
    let first = depot.iter_next().unwrap().unwrap();
    depot.iter_next().unwrap().unwrap();

    depot.iter_init().unwrap();
    assert_eq!(depot.iter_next().unwrap().unwrap(), first);
}

#[test]
fn test_cursor_on_empty_depot() {
    let (_temp, depot) = setup_temp_depot(7);

    depot.iter_init().unwrap();

    assert!(depot.iter_next().unwrap().is_none());
}

#[test]
fn test_cursor_survives_deleting_visited_records() {
    let (_temp, depot) = setup_temp_depot(1);
    fill(&depot, 30);

    depot.iter_init().unwrap();
    let mut visited = 0;
    while let Some((key, _)) = depot.iter_next().unwrap() {
        // Deleting what was just read frees its span; the cursor must
        // re-walk the chain instead of following the stale pointer.
        depot.delete(&key).unwrap();
        depot.put(b"filler", &[0u8; 64]).unwrap();
        depot.delete(b"filler").unwrap();
        visited += 1;
        assert!(visited <= 30);
    }

    assert!(visited > 0);
}

#[test]
fn test_cursor_with_overwrites_only_returns_live_values() {
    let (_temp, depot) = setup_temp_depot(3);
    fill(&depot, 30);

    depot.iter_init().unwrap();
    while let Some((key, value)) = depot.iter_next().unwrap() {
        assert_eq!(depot.get(&key).unwrap(), value);
        depot.put(&key, b"rewritten").unwrap();
    }

    for (_, value) in depot.items().map(Result::unwrap) {
        assert!(value == b"rewritten" || value.starts_with(b"value"));
    }
}

#[test]
fn test_iterator_survives_optimize() {
    let (temp, depot) = setup_temp_depot(1);
    let mut expected = fill(&depot, 20);
    for i in (0..20).step_by(3) {
        let key = format!("key{:04}", i).into_bytes();
        depot.put(&key, b"rewritten").unwrap();
        expected.insert(key, b"rewritten".to_vec());
    }
    depot.close().unwrap();

    let depot = Depot::open_path(temp.path().join("iter.db"), OpenMode::ReadWrite, None).unwrap();
    let mut items = depot.items();
    let (first, _) = items.next().unwrap().unwrap();
    depot.optimize(None).unwrap();
    let rest: Vec<(Vec<u8>, Vec<u8>)> = items.collect::<depotkv::Result<_>>().unwrap();

    // The rewrite may reorder the chain, but the cursor keeps its position.
    assert!(expected.contains_key(&first));
    assert_eq!(rest.len(), expected.len() - 1);
    for (key, value) in &rest {
        assert_eq!(expected.get(key), Some(value));
    }
}

