//! Record Codec Module
//!
//! Fixed-size headers plus variable-length payloads, for both the file
//! header and every span of the data region.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ File Header (64 bytes)                                  │
//! │   Magic "DEPOTKV\0" (8) | Version u32 | Flags u32       │
//! │   Buckets u32 | Reserved u32 | Records u64              │
//! │   FreeAnchor u64 | DataEnd u64 | CRC32 u32 | Pad (12)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Bucket Table (8 × buckets)                              │
//! │   [HeadOffset: u64] ... (0 = empty bucket)              │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Region (variable)                                  │
//! │   [RecordHeader (32)][Key][Value][Padding]              │
//! │   ... live records and free spans, back to back ...     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Header (32 bytes)
//! ```text
//! ┌─────────┬─────────┬────────┬────────┬────────┬─────────┬──────────┐
//! │ Tag (4) │ FP (4)  │KLen (4)│VLen (4)│PLen (4)│ CRC (4) │ Next (8) │
//! └─────────┴─────────┴────────┴────────┴────────┴─────────┴──────────┘
//! ```
//! A free span reuses the layout with zero key/value lengths; its padding
//! covers the rest of the span and `Next` chains free spans together.

mod codec;
mod file_header;

pub use codec::{checksum, encode_record, Record, RecordHeader, SpanKind};
pub use file_header::FileHeader;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a depot file
pub const FILE_MAGIC: &[u8; 8] = b"DEPOTKV\0";

/// Current file format version
pub const FILE_VERSION: u32 = 1;

/// File header size, bucket table starts right after it
pub const FILE_HEADER_SIZE: u64 = 64;

/// Header flag: set only by a successful sync or close
pub const FLAG_CLEAN: u32 = 0x1;

/// Record header size
pub const RECORD_HEADER_SIZE: u64 = 32;

/// Byte offset of the `next` pointer inside a record header
pub const NEXT_FIELD_OFFSET: u64 = 24;

/// Tag of a live record ("KVL1")
pub const LIVE_TAG: u32 = u32::from_le_bytes(*b"KVL1");

/// Tag of a free span ("KVF1")
pub const FREE_TAG: u32 = u32::from_le_bytes(*b"KVF1");

/// Smallest span worth splitting off as a separate free block
pub const MIN_FREE_SPAN: u64 = RECORD_HEADER_SIZE + 16;

/// Largest span a header can describe (padding is a u32)
pub const MAX_SPAN: u64 = RECORD_HEADER_SIZE + u32::MAX as u64;

/// Largest key + value payload accepted by a write
pub const MAX_PAYLOAD: u64 = u32::MAX as u64 - 2 * MIN_FREE_SPAN;

/// Null offset: end of a chain, empty bucket, or empty free list
pub const NO_OFFSET: u64 = 0;
