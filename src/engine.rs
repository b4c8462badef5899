//! Engine Module
//!
//! `Depot`, the public handle over one database file.
//!
//! ## Responsibilities
//! - Open/close lifecycle, including close-on-drop
//! - Route reads and writes to the store under the handle's lock
//! - Handle-owned cursor plus independent borrowing iterators
//! - Compaction (`optimize`) by rewrite-and-rename

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::{Config, OpenMode, MAX_BUCKETS};
use crate::cursor::{Items, Keys, Values};
use crate::error::{DepotError, Result};
use crate::storage::{PutMode, Stat, Store};

/// An open database
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Reads** (get/exists/count/value_len/stat, iterator steps): shared
///   side of `state`. The store reads with positional I/O, so readers never
///   contend on a file offset.
///
/// - **Writes** (put/delete/set_default, sync, optimize, close) and the
///   handle cursor (`iter_init`/`iter_next`): exclusive side of `state`.
///
/// `state` is `None` once the handle is closed; every operation then
/// fails with `ClosedHandle`.
///
/// Only one handle (in any process) may write a file at a time. Set
/// `Config::lock_file` to have that enforced with an advisory lock.
pub struct Depot {
    config: Config,
    state: RwLock<Option<Store>>,
}

impl Depot {
    /// Open or create a depot with the given config
    pub fn open(config: Config) -> Result<Self> {
        let store = Store::open(&config)?;
        Ok(Self {
            config,
            state: RwLock::new(Some(store)),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// `bucket_hint` only matters when a new file is created.
    pub fn open_path(path: impl Into<PathBuf>, mode: OpenMode, bucket_hint: Option<u32>) -> Result<Self> {
        let mut config = Config::new(path, mode);
        config.bucket_hint = bucket_hint;
        Self::open(config)
    }

    /// Open, run `f`, and close, whatever `f` returns
    ///
    /// An error from `f` wins over an error from closing.
    pub fn scoped<T>(config: Config, f: impl FnOnce(&Depot) -> Result<T>) -> Result<T> {
        let depot = Self::open(config)?;
        let outcome = f(&depot);
        let closed = depot.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Persist everything and release the file
    ///
    /// Closing an already-closed handle does nothing.
    pub fn close(&self) -> Result<()> {
        match self.state.write().take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn with_store<T>(&self, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        let store = guard.as_ref().ok_or(DepotError::ClosedHandle)?;
        f(store)
    }

    fn with_store_mut<T>(&self, f: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write();
        let store = guard.as_mut().ok_or(DepotError::ClosedHandle)?;
        f(store)
    }

    /// Value stored under `key`, or `NotFound`
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_store(|store| store.get(key))
    }

    /// Value stored under `key`, or a copy of `default`
    pub fn get_or_default(&self, key: &[u8], default: &[u8]) -> Result<Vec<u8>> {
        match self.get(key) {
            Err(DepotError::NotFound) => Ok(default.to_vec()),
            other => other,
        }
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.with_store(|store| store.contains(key))
    }

    /// Number of live records
    pub fn count(&self) -> Result<u64> {
        self.with_store(|store| Ok(store.record_count()))
    }

    /// Length of the value stored under `key`, without reading it
    pub fn value_len(&self, key: &[u8]) -> Result<u64> {
        self.with_store(|store| store.value_len(key))
    }

    pub fn stat(&self) -> Result<Stat> {
        self.with_store(|store| store.stat())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_with(key, value, PutMode::Overwrite)
    }

    pub fn put_with(&self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        self.with_store_mut(|store| store.put(key, value, mode))
    }

    /// Remove `key`, or `NotFound`
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_store_mut(|store| store.delete(key))
    }

    /// Existing value of `key`; otherwise store `default` and return it
    ///
    /// Lookup and insert happen under one write lock.
    pub fn set_default(&self, key: &[u8], default: &[u8]) -> Result<Vec<u8>> {
        self.with_store_mut(|store| store.set_default(key, default))
    }

    /// Persist metadata and fsync without closing
    pub fn sync(&self) -> Result<()> {
        self.with_store_mut(|store| store.sync())
    }

    /// Rewrite the file without free space, optionally with a new bucket count
    ///
    /// The compacted copy is written next to the file and renamed over it;
    /// the handle is reopened read-write on the new file. The handle's
    /// cursor starts over.
    pub fn optimize(&self, bucket_hint: Option<u32>) -> Result<()> {
        let mut guard = self.state.write();
        let store = guard.as_mut().ok_or(DepotError::ClosedHandle)?;
        store.ensure_writable()?;

        let buckets = match bucket_hint {
            Some(hint) if hint > 0 => hint.min(MAX_BUCKETS),
            _ => store.bucket_count(),
        };
        let path = store.path().to_path_buf();
        let tmp = compaction_path(&path);
        let generation = store.generation();

        let copied = match store.compact_into(&tmp, buckets) {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        if let Some(old) = guard.take() {
            old.discard();
        }

        let reopen = Config {
            path: path.clone(),
            mode: OpenMode::ReadWrite,
            bucket_hint: Some(buckets),
            ..self.config.clone()
        };
        let renamed = fs::rename(&tmp, &path);
        if renamed.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        let mut store = match Store::open(&reopen) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to reopen depot after optimize, handle is closed"
                );
                return Err(e);
            }
        };
        store.succeed(generation);
        *guard = Some(store);
        renamed?;

        tracing::info!(
            path = %path.display(),
            records = copied,
            buckets,
            "optimized depot"
        );
        Ok(())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Rewind the handle's cursor
    pub fn iter_init(&self) -> Result<()> {
        self.with_store_mut(|store| {
            store.iter_init();
            Ok(())
        })
    }

    /// Next `(key, value)` of the handle's cursor; `None` at the end
    pub fn iter_next(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.with_store_mut(|store| {
            Ok(store
                .iter_next()?
                .map(|record| (record.key, record.value)))
        })
    }

    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    pub fn values(&self) -> Values<'_> {
        Values::new(self)
    }

    pub fn items(&self) -> Items<'_> {
        Items::new(self)
    }

    /// Every key, collected eagerly
    pub fn list_keys(&self) -> Result<Vec<Vec<u8>>> {
        self.keys().collect()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Mode the file is currently open in
    ///
    /// `optimize` reopens the file read-write, whatever mode it was opened
    /// with; a closed handle reports its original mode.
    pub fn mode(&self) -> OpenMode {
        self.state
            .read()
            .as_ref()
            .map_or(self.config.mode, |store| store.mode())
    }

    /// Get the configuration the handle was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Depot {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(
                path = %self.config.path.display(),
                error = %e,
                "failed to close depot on drop"
            );
        }
    }
}

/// Sibling path the compacted copy is built at
fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".optimize");
    path.with_file_name(name)
}
