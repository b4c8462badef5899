//! Tests for the free-span pool
//!
//! These tests verify:
//! - Best-fit selection
//! - Splitting of large spans and padding of small leftovers
//! - Coalescing with both neighbours
//! - Overlap rejection

use depotkv::freelist::{FreePool, Span};
use depotkv::record::MIN_FREE_SPAN;

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_allocate_from_empty_pool() {
    let mut pool = FreePool::new();
    assert!(pool.allocate(64).is_none());
}

#[test]
fn test_allocate_picks_best_fit() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 500));
    pool.insert(Span::new(2000, 100));
    pool.insert(Span::new(3000, 200));

    let allocation = pool.allocate(90).unwrap();

    assert_eq!(allocation.span.offset, 2000);
    assert_eq!(allocation.span.len, 100);
    assert!(allocation.remainder.is_none());
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_allocate_exact_fit() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 128));

    let allocation = pool.allocate(128).unwrap();

    assert_eq!(allocation.span, Span::new(1000, 128));
    assert!(pool.is_empty());
    assert_eq!(pool.free_bytes(), 0);
}

#[test]
fn test_allocate_splits_large_span() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 400));

    let allocation = pool.allocate(100).unwrap();

    assert_eq!(allocation.span, Span::new(1000, 100));
    assert_eq!(allocation.remainder, Some(Span::new(1100, 300)));
    assert_eq!(pool.iter().collect::<Vec<_>>(), vec![Span::new(1100, 300)]);
    assert_eq!(pool.free_bytes(), 300);
}

#[test]
fn test_small_leftover_becomes_padding() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 100 + MIN_FREE_SPAN - 1));

    let allocation = pool.allocate(100).unwrap();

    assert_eq!(allocation.span.len, 100 + MIN_FREE_SPAN - 1);
    assert!(allocation.remainder.is_none());
    assert!(pool.is_empty());
}

#[test]
fn test_allocate_too_large_leaves_pool_untouched() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 64));

    assert!(pool.allocate(65).is_none());
    assert_eq!(pool.len(), 1);
}

// =============================================================================
// Release / Coalescing Tests
// =============================================================================

#[test]
fn test_release_merges_with_previous() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 100));

    let merged = pool.release(Span::new(1100, 50));

    assert_eq!(merged, Span::new(1000, 150));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_release_merges_with_next() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1100, 100));

    let merged = pool.release(Span::new(1000, 100));

    assert_eq!(merged, Span::new(1000, 200));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_release_bridges_two_neighbours() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 100));
    pool.insert(Span::new(1200, 100));

    let merged = pool.release(Span::new(1100, 100));

    assert_eq!(merged, Span::new(1000, 300));
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.free_bytes(), 300);
}

#[test]
fn test_release_without_neighbours() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 100));

    let merged = pool.release(Span::new(2000, 100));

    assert_eq!(merged, Span::new(2000, 100));
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.last(), Some(Span::new(2000, 100)));
}

#[test]
fn test_insert_rejects_overlap() {
    let mut pool = FreePool::new();
    assert!(pool.insert(Span::new(1000, 100)));

    assert!(!pool.insert(Span::new(1050, 100)));
    assert!(!pool.insert(Span::new(950, 100)));
    assert!(!pool.insert(Span::new(1000, 10)));
    assert!(pool.insert(Span::new(1100, 10)));
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_take_removes_span() {
    let mut pool = FreePool::new();
    pool.insert(Span::new(1000, 100));

    assert_eq!(pool.take(1000), Some(Span::new(1000, 100)));
    assert_eq!(pool.take(1000), None);
    assert_eq!(pool.free_bytes(), 0);
}

#[test]
fn test_churn_keeps_accounting_consistent() {
    let mut pool = FreePool::new();
    for i in 0..20u64 {
        pool.release(Span::new(i * 200, 100));
    }
    for _ in 0..10 {
        pool.allocate(60);
    }

    let sum: u64 = pool.iter().map(|s| s.len).sum();
    assert_eq!(sum, pool.free_bytes());

    let spans: Vec<Span> = pool.iter().collect();
    for pair in spans.windows(2) {
        assert!(pair[0].end() <= pair[1].offset);
    }
}
