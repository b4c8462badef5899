//! Stable key hashing
//!
//! xxHash64 with seed 0, never `std`'s `DefaultHasher`: bucket placement is
//! persisted, so the mapping must not change across toolchains or platforms.

use std::hash::Hasher;

use twox_hash::XxHash64;

/// 64-bit stable hash of a key
pub fn hash64(key: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(key);
    hasher.finish()
}

/// Bucket index from a 64-bit hash
#[inline]
pub fn bucket_index(hash: u64, buckets: u32) -> u32 {
    debug_assert!(buckets > 0, "buckets must be > 0");
    (hash % buckets as u64) as u32
}

/// Fingerprint stored in each record header to skip most key compares
#[inline]
pub fn fingerprint(hash: u64) -> u32 {
    (hash >> 32) as u32
}

/// Where a key lives in the bucket table, and how to recognise it cheaply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHash {
    pub bucket: u32,
    pub fingerprint: u32,
}

impl KeyHash {
    pub fn new(key: &[u8], buckets: u32) -> Self {
        let hash = hash64(key);
        Self {
            bucket: bucket_index(hash, buckets),
            fingerprint: fingerprint(hash),
        }
    }
}
