//! # depotkv
//!
//! A single-file, disk-backed hash key-value store with:
//! - Fixed bucket table with per-bucket collision chains
//! - Copy-on-write record updates committed by one pointer write
//! - Free-space reuse with best-fit allocation and coalescing
//! - Crash recovery driven by a clean-shutdown flag
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Depot                                │
//! │              (RwLock: one writer / many readers)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store                                │
//! │        (open / recovery / put / delete / sync / close)      │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!  │    Index    │    │  Freelist   │    │   Cursor    │
//!  │  (buckets)  │    │ (best fit)  │    │ (traversal) │
//!  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!         └──────────────────┼──────────────────┘
//!                            ▼
//!                     ┌─────────────┐
//!                     │   Record    │
//!                     │   (codec)   │
//!                     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use depotkv::{Config, Depot, OpenMode};
//!
//! let depot = Depot::open(Config::new("fruit.db", OpenMode::CreateIfMissing))?;
//! depot.put(b"apple", b"red")?;
//! assert_eq!(depot.get(b"apple")?, b"red");
//! depot.close()?;
//! # Ok::<(), depotkv::DepotError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod index;
pub mod freelist;
pub mod cursor;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DepotError, ErrorKind, Result};
pub use config::{Config, ConfigBuilder, OpenMode, SyncStrategy};
pub use cursor::{Items, Keys, Values};
pub use engine::Depot;
pub use storage::{PutMode, Stat};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of depotkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
