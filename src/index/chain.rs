//! Collision chains
//!
//! Records sharing a bucket are singly linked through the `next` field of
//! their headers, newest first. Lookups walk the whole chain and compare
//! full keys; the fingerprint only skips obvious mismatches.

use crate::error::{DepotError, Result};
use crate::record::{RecordHeader, NEXT_FIELD_OFFSET, NO_OFFSET, RECORD_HEADER_SIZE};
use crate::storage::DataFile;

use super::{BucketTable, KeyHash};

/// Where the pointer to a record is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The record is the head of this bucket
    Bucket(u32),

    /// The record follows the record at this offset
    Record(u64),
}

/// A live record found on a chain
#[derive(Debug, Clone, Copy)]
pub struct Located {
    /// Pointer that currently refers to this record
    pub link: Link,
    pub offset: u64,
    pub header: RecordHeader,
}

/// Byte range holding record spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegion {
    pub start: u64,
    pub end: u64,
}

impl DataRegion {
    /// Whether a whole record header fits at `offset`
    pub fn holds_header(&self, offset: u64) -> bool {
        offset >= self.start && offset.saturating_add(RECORD_HEADER_SIZE) <= self.end
    }

    /// Upper bound on the number of spans; walks longer than this loop
    pub fn max_spans(&self) -> u64 {
        self.end.saturating_sub(self.start) / RECORD_HEADER_SIZE + 1
    }
}

/// Iterator over the records of one bucket chain
pub struct ChainWalk<'a> {
    file: &'a DataFile,
    region: DataRegion,
    bucket: u32,
    link: Link,
    next: u64,
    remaining: u64,
    pending_error: Option<DepotError>,
    failed: bool,
}

impl<'a> ChainWalk<'a> {
    pub fn new(file: &'a DataFile, table: &BucketTable, bucket: u32, region: DataRegion) -> Self {
        let (next, pending_error) = match table.head(bucket) {
            Ok(head) => (head, None),
            Err(e) => (NO_OFFSET, Some(e)),
        };
        Self {
            file,
            region,
            bucket,
            link: Link::Bucket(bucket),
            next,
            remaining: region.max_spans(),
            pending_error,
            failed: false,
        }
    }

    fn step(&mut self) -> Result<Located> {
        let offset = self.next;
        if self.remaining == 0 {
            return Err(DepotError::corrupt(format!(
                "chain of bucket {} does not terminate",
                self.bucket
            )));
        }

        let header = read_live(self.file, self.region, offset)?;
        let located = Located {
            link: self.link,
            offset,
            header,
        };
        self.link = Link::Record(offset);
        self.next = header.next;
        self.remaining -= 1;
        Ok(located)
    }
}

impl Iterator for ChainWalk<'_> {
    type Item = Result<Located>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_error.take() {
            self.failed = true;
            return Some(Err(e));
        }
        if self.failed || self.next == NO_OFFSET {
            return None;
        }
        match self.step() {
            Ok(located) => Some(Ok(located)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Read the header at `offset`, which must start a live record inside `region`
pub fn read_live(file: &DataFile, region: DataRegion, offset: u64) -> Result<RecordHeader> {
    if !region.holds_header(offset) {
        return Err(DepotError::corrupt(format!(
            "record pointer outside the data region (offset {})",
            offset
        )));
    }

    let mut raw = [0u8; RECORD_HEADER_SIZE as usize];
    file.read_exact_at(offset, &mut raw)?;
    let header = RecordHeader::decode(&raw)?;
    if !header.is_live() {
        return Err(DepotError::corrupt(format!(
            "record pointer reaches a free span at offset {}",
            offset
        )));
    }
    if offset.saturating_add(header.span_len()) > region.end {
        return Err(DepotError::corrupt(format!(
            "record at offset {} runs past the data region",
            offset
        )));
    }
    Ok(header)
}

/// Find the live record for `key`
pub fn find(
    file: &DataFile,
    table: &BucketTable,
    region: DataRegion,
    key: &[u8],
    hash: KeyHash,
) -> Result<Option<Located>> {
    for item in ChainWalk::new(file, table, hash.bucket, region) {
        let located = item?;
        if located.header.fingerprint != hash.fingerprint
            || located.header.key_len as usize != key.len()
        {
            continue;
        }
        let stored = file.read_vec_at(located.offset + RECORD_HEADER_SIZE, key.len())?;
        if stored == key {
            return Ok(Some(located));
        }
    }
    Ok(None)
}

/// Redirect `link` to `target`
///
/// This single 8-byte write is the commit point of every insert, replace,
/// and delete.
pub fn write_link(file: &DataFile, table: &mut BucketTable, link: Link, target: u64) -> Result<()> {
    match link {
        Link::Bucket(bucket) => table.set_head(file, bucket, target),
        Link::Record(offset) => file.write_u64_at(offset + NEXT_FIELD_OFFSET, target),
    }
}
