//! Crash recovery
//!
//! Runs when a file is opened without the clean flag. Bucket heads and
//! chain links are always consistent on disk (every write commits through a
//! single pointer), but the record count, data end, and free chain in the
//! header may be stale. They are rebuilt here:
//!
//! 1. Walk every chain to collect the reachable records
//! 2. Scan the data region in file order; whatever is not reachable
//!    (free spans, replaced records, torn writes) becomes free space
//! 3. Free space at the end of the file is cut off
//!
//! On a read-only handle the rebuilt state lives only in memory.

use std::collections::BTreeMap;

use crate::error::{DepotError, Result};
use crate::freelist::{self, FreePool, Span};
use crate::index::{BucketTable, ChainWalk, DataRegion};
use crate::record::{FileHeader, RecordHeader, MAX_SPAN, RECORD_HEADER_SIZE};

use super::DataFile;

/// State rebuilt by a recovery scan
#[derive(Debug)]
pub struct Recovered {
    pub record_count: u64,
    pub data_end: u64,
    pub free: FreePool,
    /// Unreachable live-tagged records turned into free space
    pub reclaimed_records: u64,
    /// Bytes cut from the end of the file
    pub truncated_bytes: u64,
}

pub fn recover(file: &DataFile, header: &FileHeader, buckets: &BucketTable) -> Result<Recovered> {
    let len = file.len()?;
    let region = DataRegion {
        start: header.data_start(),
        end: len,
    };

    let live = reachable(file, buckets, region)?;

    let mut free = FreePool::new();
    let mut reclaimed_records = 0u64;
    let mut leaked = 0u64;
    let mut visited = 0usize;
    let mut pos = region.start;

    while pos < len {
        if let Some(&span_len) = live.get(&pos) {
            visited += 1;
            pos += span_len;
            continue;
        }

        // Unreachable bytes end at the next reachable record at the latest.
        let limit = live
            .range(pos + 1..)
            .next()
            .map_or(len, |(&offset, _)| offset);

        let (span_len, was_live) = match probe(file, pos, limit) {
            Some(found) => (found.span_len(), found.is_live()),
            None => ((limit - pos).min(MAX_SPAN), false),
        };
        if was_live {
            reclaimed_records += 1;
        }

        let span = Span::new(pos, span_len);
        let merged = free.release(span);
        if merged.len < RECORD_HEADER_SIZE {
            // Too short to carry a free header and nothing to merge into.
            free.take(merged.offset);
            leaked += span_len;
        }
        pos += span_len;
    }

    if visited != live.len() {
        return Err(DepotError::corrupt(format!(
            "{} reachable records overlap other records",
            live.len() - visited
        )));
    }

    let mut data_end = len;
    if let Some(tail) = free.last() {
        if tail.end() == len {
            free.take(tail.offset);
            data_end = tail.offset;
        }
    }

    if leaked > 0 {
        tracing::warn!(bytes = leaked, "unreachable fragments too small to reuse");
    }

    let truncated_bytes = len - data_end;
    if file.is_writable() {
        for span in free.iter() {
            freelist::mark_free(file, span)?;
        }
        if truncated_bytes > 0 {
            file.set_len(data_end)?;
        }
    }

    Ok(Recovered {
        record_count: live.len() as u64,
        data_end,
        free,
        reclaimed_records,
        truncated_bytes,
    })
}

/// Offsets and span lengths of every record reachable from a bucket
fn reachable(file: &DataFile, buckets: &BucketTable, region: DataRegion) -> Result<BTreeMap<u64, u64>> {
    let mut live = BTreeMap::new();
    for (bucket, _) in buckets.iter().filter(|&(_, head)| head != 0) {
        for item in ChainWalk::new(file, buckets, bucket, region) {
            let located = item?;
            if live
                .insert(located.offset, located.header.span_len())
                .is_some()
            {
                return Err(DepotError::corrupt(format!(
                    "record at offset {} is linked from two places",
                    located.offset
                )));
            }
        }
    }
    Ok(live)
}

/// Decode a header at `pos` whose span fits before `limit`
fn probe(file: &DataFile, pos: u64, limit: u64) -> Option<RecordHeader> {
    if pos + RECORD_HEADER_SIZE > limit {
        return None;
    }
    let mut raw = [0u8; RECORD_HEADER_SIZE as usize];
    file.read_exact_at(pos, &mut raw).ok()?;
    let header = RecordHeader::decode(&raw).ok()?;
    (header.span_len() >= RECORD_HEADER_SIZE && pos.saturating_add(header.span_len()) <= limit)
        .then_some(header)
}
