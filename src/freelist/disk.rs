//! On-disk free chain
//!
//! Every free span starts with a free record header. While a handle is
//! open the `next` fields are stale; a clean sync/close rewrites them in
//! offset order and stores the first span in the file header.

use crate::error::{DepotError, Result};
use crate::index::DataRegion;
use crate::record::{RecordHeader, NO_OFFSET, RECORD_HEADER_SIZE};
use crate::storage::DataFile;

use super::{FreePool, Span};

/// Stamp a free header (with no successor) over `span`
pub fn mark_free(file: &DataFile, span: Span) -> Result<()> {
    file.write_all_at(span.offset, &RecordHeader::free(span.len, NO_OFFSET).encode())
}

/// Link every pooled span in offset order; returns the chain anchor
pub fn persist(file: &DataFile, pool: &FreePool) -> Result<u64> {
    let spans: Vec<Span> = pool.iter().collect();
    for (i, span) in spans.iter().enumerate() {
        let next = spans.get(i + 1).map_or(NO_OFFSET, |s| s.offset);
        file.write_all_at(span.offset, &RecordHeader::free(span.len, next).encode())?;
    }
    Ok(spans.first().map_or(NO_OFFSET, |s| s.offset))
}

/// Rebuild the pool from a chain persisted by a clean close
pub fn load(file: &DataFile, anchor: u64, region: DataRegion) -> Result<FreePool> {
    let mut pool = FreePool::new();
    let mut next = anchor;
    let mut remaining = region.max_spans();

    while next != NO_OFFSET {
        if remaining == 0 {
            return Err(DepotError::corrupt("free chain does not terminate"));
        }
        if !region.holds_header(next) {
            return Err(DepotError::corrupt(format!(
                "free chain points outside the data region (offset {})",
                next
            )));
        }

        let mut raw = [0u8; RECORD_HEADER_SIZE as usize];
        file.read_exact_at(next, &mut raw)?;
        let header = RecordHeader::decode(&raw)?;
        if header.is_live() {
            return Err(DepotError::corrupt(format!(
                "free chain reaches a live record at offset {}",
                next
            )));
        }

        let span = Span::new(next, header.span_len());
        if span.end() > region.end || !pool.insert(span) {
            return Err(DepotError::corrupt(format!(
                "free span at offset {} overlaps other data",
                next
            )));
        }

        next = header.next;
        remaining -= 1;
    }

    Ok(pool)
}
