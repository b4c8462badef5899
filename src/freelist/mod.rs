//! Free-Space Allocator Module
//!
//! Tracks spans reclaimed by deletes and overwrites and hands them back to
//! new records, so the file only grows when nothing reusable is left.
//!
//! ## Policy
//! - Allocation is best-fit (smallest span that holds the whole record)
//! - Leftovers of at least `MIN_FREE_SPAN` bytes are split off, smaller
//!   ones become record padding
//! - Released spans coalesce with adjacent free spans
//! - A free span that reaches the end of the data region is given back to
//!   the filesystem instead of being pooled (done by the store)

mod disk;
mod pool;

pub use disk::{load, mark_free, persist};
pub use pool::{Allocation, FreePool, Span};
