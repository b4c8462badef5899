//! Borrowing iterators over a `Depot`
//!
//! Each iterator owns its cursor, so several can run at once without
//! touching the handle's own `iter_init`/`iter_next` position. The store
//! is read-locked for one step at a time only. An error is yielded once,
//! after which the iterator is finished.

use std::iter::FusedIterator;

use crate::engine::Depot;
use crate::error::Result;
use crate::index::Located;
use crate::storage::Store;

use super::Cursor;

struct Scan<'a> {
    depot: &'a Depot,
    cursor: Cursor,
    done: bool,
}

impl<'a> Scan<'a> {
    fn new(depot: &'a Depot) -> Self {
        Self {
            depot,
            cursor: Cursor::new(),
            done: false,
        }
    }

    fn step<T>(&mut self, read: impl FnOnce(&Store, &Located) -> Result<T>) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let cursor = &mut self.cursor;
        let stepped = self.depot.with_store(|store| match cursor.advance(store)? {
            Some(located) => read(store, &located).map(Some),
            None => Ok(None),
        });
        match stepped {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Keys in traversal order
pub struct Keys<'a>(Scan<'a>);

impl<'a> Keys<'a> {
    pub(crate) fn new(depot: &'a Depot) -> Self {
        Self(Scan::new(depot))
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.step(|store, located| store.read_key(located))
    }
}

impl FusedIterator for Keys<'_> {}

/// Values in traversal order
pub struct Values<'a>(Scan<'a>);

impl<'a> Values<'a> {
    pub(crate) fn new(depot: &'a Depot) -> Self {
        Self(Scan::new(depot))
    }
}

impl Iterator for Values<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .step(|store, located| store.read_record(located).map(|record| record.value))
    }
}

impl FusedIterator for Values<'_> {}

/// `(key, value)` pairs in traversal order
pub struct Items<'a>(Scan<'a>);

impl<'a> Items<'a> {
    pub(crate) fn new(depot: &'a Depot) -> Self {
        Self(Scan::new(depot))
    }
}

impl Iterator for Items<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.step(|store, located| {
            store
                .read_record(located)
                .map(|record| (record.key, record.value))
        })
    }
}

impl FusedIterator for Items<'_> {}
