//! Free-span pool
//!
//! Best-fit allocation over reclaimed spans, with splitting and
//! coalescing. Pure bookkeeping: callers write the matching headers.

use std::collections::{BTreeMap, BTreeSet};

use crate::record::{MAX_SPAN, MIN_FREE_SPAN};

/// A contiguous byte range of the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub offset: u64,
    pub len: u64,
}

impl Span {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// First byte after the span
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Result of a successful allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Span handed to the caller; may be larger than requested
    pub span: Span,

    /// Split-off tail that stays in the pool and needs a free header
    pub remainder: Option<Span>,
}

/// Registry of free spans, indexed by offset and by size
#[derive(Debug, Clone, Default)]
pub struct FreePool {
    by_offset: BTreeMap<u64, u64>,
    by_size: BTreeSet<(u64, u64)>,
    free_bytes: u64,
}

impl FreePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of free spans
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }

    /// Total bytes held by free spans
    pub fn free_bytes(&self) -> u64 {
        self.free_bytes
    }

    /// Spans in file order
    pub fn iter(&self) -> impl Iterator<Item = Span> + '_ {
        self.by_offset.iter().map(|(&offset, &len)| Span { offset, len })
    }

    /// Span with the highest offset
    pub fn last(&self) -> Option<Span> {
        self.by_offset
            .iter()
            .next_back()
            .map(|(&offset, &len)| Span { offset, len })
    }

    /// Register a span as-is, without coalescing
    ///
    /// Returns false (and changes nothing) if it overlaps a registered span.
    pub fn insert(&mut self, span: Span) -> bool {
        if self.overlaps(span) {
            return false;
        }
        self.by_offset.insert(span.offset, span.len);
        self.by_size.insert((span.len, span.offset));
        self.free_bytes += span.len;
        true
    }

    /// Remove the span starting at `offset`
    pub fn take(&mut self, offset: u64) -> Option<Span> {
        let len = self.by_offset.remove(&offset)?;
        self.by_size.remove(&(len, offset));
        self.free_bytes -= len;
        Some(Span { offset, len })
    }

    /// Best fit: the smallest span of at least `size` bytes
    ///
    /// A leftover of at least `MIN_FREE_SPAN` is split off and stays free;
    /// a smaller leftover goes to the caller as padding.
    pub fn allocate(&mut self, size: u64) -> Option<Allocation> {
        let &(len, offset) = self.by_size.range((size, 0)..).next()?;
        self.take(offset);

        if len - size >= MIN_FREE_SPAN {
            let remainder = Span::new(offset + size, len - size);
            self.insert(remainder);
            Some(Allocation {
                span: Span::new(offset, size),
                remainder: Some(remainder),
            })
        } else {
            Some(Allocation {
                span: Span::new(offset, len),
                remainder: None,
            })
        }
    }

    /// Return a span, merging it with free neighbours
    ///
    /// Merges never produce a span larger than `MAX_SPAN`. Returns the span
    /// that now holds the released bytes.
    pub fn release(&mut self, span: Span) -> Span {
        debug_assert!(!self.overlaps(span), "released span overlaps free space");
        let mut merged = span;

        let prev = self
            .by_offset
            .range(..span.offset)
            .next_back()
            .map(|(&offset, &len)| Span { offset, len });
        if let Some(prev) = prev {
            if prev.end() == merged.offset && prev.len + merged.len <= MAX_SPAN {
                self.take(prev.offset);
                merged = Span::new(prev.offset, prev.len + merged.len);
            }
        }

        if let Some(&next_len) = self.by_offset.get(&merged.end()) {
            if merged.len + next_len <= MAX_SPAN {
                self.take(merged.end());
                merged.len += next_len;
            }
        }

        self.insert(merged);
        merged
    }

    fn overlaps(&self, span: Span) -> bool {
        let before = self.by_offset.range(..=span.offset).next_back();
        if let Some((&offset, &len)) = before {
            if offset + len > span.offset {
                return true;
            }
        }
        self.by_offset
            .range(span.offset..span.end())
            .next()
            .is_some()
    }
}
