//! Storage Module
//!
//! Owns the database file and everything that touches its bytes.
//!
//! ## Responsibilities
//! - Positional I/O over the single data file (`DataFile`)
//! - Open/create/truncate, header validation, optional advisory lock
//! - Copy-on-write record updates committed by one pointer write
//! - Clean-flag bookkeeping and crash recovery on open
//! - Compaction into a fresh file
//!
//! ## File Format (V1)
//! ```text
//! ┌────────────────────────────────────────┐
//! │ File Header (64 bytes)                 │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Magic (8) │Ver/Flags │Buckets/Counts│ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Bucket Table (8 bytes × buckets)       │
//! ├────────────────────────────────────────┤
//! │ Data Region                            │
//! │ ┌────────────┬─────┬───────┬───────┐   │
//! │ │Header (32) │ Key │ Value │  Pad  │   │
//! │ └────────────┴─────┴───────┴───────┘   │
//! │ ... live records and free spans       │
//! └────────────────────────────────────────┘
//! ```

mod file;
mod recovery;
mod store;

pub use file::DataFile;
pub use recovery::Recovered;
pub use store::{PutMode, Stat, Store};
