//! Cursor Module
//!
//! Resumable traversal over every live record: buckets in index order, each
//! chain from head to tail (newest first).
//!
//! ## Position
//! A cursor remembers `(bucket, position-in-chain)` plus the offset of the
//! record it will visit next. The cached offset is only trusted while the
//! store's generation is unchanged; after any mutation the cursor walks its
//! bucket again to `position`. A mutation during traversal may therefore
//! make the cursor skip or repeat records of the current bucket, but it
//! never follows a pointer into a released span.
//!
//! Once exhausted a cursor stays exhausted until reset.

mod iter;

pub use iter::{Items, Keys, Values};

use crate::error::{DepotError, Result};
use crate::index::{read_live, ChainWalk, Link, Located};
use crate::record::NO_OFFSET;
use crate::storage::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    bucket: u32,
    /// Records of `bucket` already visited
    position: u64,
    /// Next record offset, valid for `generation` only
    pending: Option<u64>,
    /// Offset of the record visited last in `bucket`
    last: u64,
    generation: u64,
    exhausted: bool,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind to the first record
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Step to the next live record
    ///
    /// Errors leave the cursor where it was.
    pub fn advance(&mut self, store: &Store) -> Result<Option<Located>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.generation != store.generation() {
            self.pending = None;
            self.generation = store.generation();
        }

        loop {
            if self.bucket >= store.bucket_count() {
                self.exhausted = true;
                return Ok(None);
            }

            let found = match self.pending {
                Some(NO_OFFSET) => None,
                Some(offset) => {
                    if self.position >= store.region().max_spans() {
                        return Err(DepotError::corrupt(format!(
                            "chain of bucket {} does not terminate",
                            self.bucket
                        )));
                    }
                    let header = read_live(store.file(), store.region(), offset)?;
                    let link = match self.position {
                        0 => Link::Bucket(self.bucket),
                        _ => Link::Record(self.last),
                    };
                    Some(Located { link, offset, header })
                }
                None => self.seek(store)?,
            };

            let Some(located) = found else {
                self.bucket += 1;
                self.position = 0;
                self.pending = None;
                continue;
            };

            self.pending = Some(located.header.next);
            self.last = located.offset;
            self.position += 1;
            return Ok(Some(located));
        }
    }

    /// The record at `position` in the current bucket
    fn seek(&self, store: &Store) -> Result<Option<Located>> {
        let walk = ChainWalk::new(store.file(), store.buckets(), self.bucket, store.region());
        for (index, item) in walk.enumerate() {
            let located = item?;
            if index as u64 == self.position {
                return Ok(Some(located));
            }
        }
        Ok(None)
    }
}
