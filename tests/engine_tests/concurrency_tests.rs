//! Tests for concurrent access to one Depot handle
//!
//! These tests verify:
//! - Many readers at once see consistent values
//! - Writers are serialized (no lost updates, exact count)
//! - Readers run alongside a writer without errors
//! - set_default is atomic under contention

use std::sync::atomic::{AtomicUsize, Ordering};

use depotkv::{Config, Depot, OpenMode, PutMode};
use tempfile::TempDir;

fn setup_temp_depot() -> (TempDir, Depot) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("concurrent.db"))
        .mode(OpenMode::CreateTruncate)
        .bucket_hint(127)
        .build();
    let depot = Depot::open(config).unwrap();
    (temp_dir, depot)
}

#[test]
fn test_depot_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Depot>();
}

#[test]
fn test_concurrent_reads() {
    let (_temp, depot) = setup_temp_depot();
    for i in 0..100 {
        depot.put(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes()).unwrap();
    }

    crossbeam::scope(|s| {
        for _ in 0..8 {
            s.spawn(|_| {
                for i in 0..100 {
                    let value = depot.get(format!("key{}", i).as_bytes()).unwrap();
                    assert_eq!(value, format!("value{}", i).into_bytes());
                }
            });
        }
    })
    .unwrap();
}

#[test]
fn test_concurrent_writes() {
    let (_temp, depot) = setup_temp_depot();

    crossbeam::scope(|s| {
        for t in 0..4 {
            let depot = &depot;
            s.spawn(move |_| {
                for i in 0..100 {
                    depot.put(format!("t{}-key{}", t, i).as_bytes(), b"v").unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(depot.count().unwrap(), 400);
    assert_eq!(depot.list_keys().unwrap().len(), 400);
}

#[test]
fn test_readers_alongside_writer() {
    let (_temp, depot) = setup_temp_depot();
    for i in 0..50 {
        depot.put(format!("key{}", i).as_bytes(), b"initial").unwrap();
    }

    crossbeam::scope(|s| {
        s.spawn(|_| {
            for round in 0..20 {
                for i in 0..50 {
                    let value = format!("round{}", round);
                    depot.put(format!("key{}", i).as_bytes(), value.as_bytes()).unwrap();
                }
            }
        });
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..20 {
                    for i in 0..50 {
                        let value = depot.get(format!("key{}", i).as_bytes()).unwrap();
                        assert!(value == b"initial" || value.starts_with(b"round"));
                    }
                    let keys: Vec<_> = depot.keys().collect::<depotkv::Result<_>>().unwrap();
                    assert!(keys.len() <= 50);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(depot.count().unwrap(), 50);
    assert_eq!(depot.get(b"key0").unwrap(), b"round19");
}

#[test]
fn test_set_default_is_atomic() {
    let (_temp, depot) = setup_temp_depot();
    let inserted = AtomicUsize::new(0);

    crossbeam::scope(|s| {
        for t in 0..8 {
            let (depot, inserted) = (&depot, &inserted);
            s.spawn(move |_| {
                let mine = format!("thread{}", t);
                let value = depot.set_default(b"shared", mine.as_bytes()).unwrap();
                if value == mine.as_bytes() {
                    inserted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(inserted.load(Ordering::SeqCst), 1);
    assert_eq!(depot.count().unwrap(), 1);
}

#[test]
fn test_keep_mode_single_winner() {
    let (_temp, depot) = setup_temp_depot();
    let winners = AtomicUsize::new(0);

    crossbeam::scope(|s| {
        for t in 0..8 {
            let (depot, winners) = (&depot, &winners);
            s.spawn(move |_| {
                if depot
                    .put_with(b"slot", format!("{}", t).as_bytes(), PutMode::Keep)
                    .is_ok()
                {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(winners.load(Ordering::SeqCst), 1);
}
