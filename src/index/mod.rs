//! Bucket/Hash Index Module
//!
//! Maps keys to records through a fixed-size bucket table and per-bucket
//! collision chains.
//!
//! ## Responsibilities
//! - Stable key → bucket hashing (xxHash64)
//! - Bucket heads, written through to disk on every change
//! - Chain walks with full-key comparison, bounds and cycle checks
//! - Linking and unlinking records with a single pointer write

mod buckets;
mod chain;
mod hash;

pub use buckets::{slot_offset, BucketTable};
pub use chain::{find, read_live, write_link, ChainWalk, DataRegion, Link, Located};
pub use hash::{bucket_index, fingerprint, hash64, KeyHash};
