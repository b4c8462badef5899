//! Bucket table
//!
//! In-memory copy of the on-disk head pointers. Every update is written
//! through immediately, so the table on disk always matches the chains.

use bytes::Buf;

use crate::error::{DepotError, Result};
use crate::record::{FILE_HEADER_SIZE, NO_OFFSET};
use crate::storage::DataFile;

/// Head offsets of every bucket chain
#[derive(Debug, Clone)]
pub struct BucketTable {
    heads: Vec<u64>,
}

impl BucketTable {
    /// Zero the table area of a new file and return an empty table
    ///
    /// Extending with `set_len` leaves the table zero-filled (all empty).
    pub fn create(file: &DataFile, buckets: u32) -> Result<Self> {
        file.set_len(FILE_HEADER_SIZE + 8 * buckets as u64)?;
        Ok(Self {
            heads: vec![NO_OFFSET; buckets as usize],
        })
    }

    /// Load the table of an existing file
    pub fn load(file: &DataFile, buckets: u32) -> Result<Self> {
        let raw = file.read_vec_at(FILE_HEADER_SIZE, 8 * buckets as usize)?;
        let mut buf = &raw[..];
        let mut heads = Vec::with_capacity(buckets as usize);
        while buf.has_remaining() {
            heads.push(buf.get_u64_le());
        }
        Ok(Self { heads })
    }

    /// Number of buckets
    pub fn len(&self) -> u32 {
        self.heads.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Head offset of `bucket` (0 when empty)
    pub fn head(&self, bucket: u32) -> Result<u64> {
        self.heads
            .get(bucket as usize)
            .copied()
            .ok_or_else(|| out_of_range(bucket, self.len()))
    }

    /// Point `bucket` at `offset`, on disk and in memory
    pub fn set_head(&mut self, file: &DataFile, bucket: u32, offset: u64) -> Result<()> {
        let len = self.len();
        let slot = self
            .heads
            .get_mut(bucket as usize)
            .ok_or_else(|| out_of_range(bucket, len))?;
        file.write_u64_at(slot_offset(bucket), offset)?;
        *slot = offset;
        Ok(())
    }

    /// Buckets whose chain is non-empty
    pub fn used(&self) -> u32 {
        self.heads.iter().filter(|&&h| h != NO_OFFSET).count() as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.heads.iter().enumerate().map(|(i, &h)| (i as u32, h))
    }
}

/// File offset of the head slot for `bucket`
pub fn slot_offset(bucket: u32) -> u64 {
    FILE_HEADER_SIZE + 8 * bucket as u64
}

fn out_of_range(bucket: u32, len: u32) -> DepotError {
    DepotError::corrupt(format!("bucket {} out of range 0..{}", bucket, len))
}
