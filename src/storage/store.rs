//! Store
//!
//! Single-threaded core of a depot: owns the file, the bucket table, the
//! free pool, and the handle's cursor. `Depot` wraps it in a lock.
//!
//! ## Write Protocol
//! Writes are copy-on-write per record:
//! 1. Allocate a span (free pool first, then the end of the data region)
//! 2. Write header + key + value into it
//! 3. Redirect one pointer (bucket head or predecessor `next`) to it
//! 4. Release the replaced span, if any
//!
//! Step 3 is the commit point, so a crash never exposes a partial record.
//! Record count, data end, and the free chain are only written to the file
//! header on sync/close; the header's clean flag is cleared before the first
//! mutation so an unclean file is rebuilt by `recovery` on the next open.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::config::{Config, OpenMode, SyncStrategy};
use crate::cursor::Cursor;
use crate::error::{DepotError, Result};
use crate::freelist::{self, FreePool, Span};
use crate::index::{self, BucketTable, ChainWalk, DataRegion, KeyHash, Link, Located};
use crate::record::{
    encode_record, FileHeader, Record, RecordHeader, FILE_HEADER_SIZE, MAX_PAYLOAD,
    RECORD_HEADER_SIZE,
};

use super::recovery;
use super::DataFile;

/// How `put` treats an existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutMode {
    /// Replace the existing value
    #[default]
    Overwrite,

    /// Fail with `KeyExists` if the key is present
    Keep,

    /// Append to the existing value (insert if absent)
    Append,
}

/// Snapshot of a depot's shape and usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub path: PathBuf,
    pub mode: OpenMode,
    pub writable: bool,
    pub file_size: u64,
    pub bucket_count: u32,
    pub used_buckets: u32,
    pub record_count: u64,
    pub free_spans: usize,
    pub free_bytes: u64,
}

/// Open database file plus its in-memory index state
pub struct Store {
    file: DataFile,
    /// Live view: `record_count` and `data_end` track every mutation
    header: FileHeader,
    buckets: BucketTable,
    free: FreePool,
    mode: OpenMode,
    sync_strategy: SyncStrategy,
    /// Whether the header on disk currently carries the clean flag
    on_disk_clean: bool,
    /// Set when a write failed part-way; blocks further writes
    fatal: bool,
    /// Bumped by every mutation; cursors re-seek when it changes
    generation: u64,
    cursor: Cursor,
}

impl Store {
    /// Open or create the file described by `config`
    ///
    /// The file handle is dropped (and its lock released) on every error path.
    pub fn open(config: &Config) -> Result<Self> {
        let mut file = DataFile::open(&config.path, config.mode)?;
        if config.lock_file {
            file.lock()?;
        }
        // Truncate only once the lock (if any) is held.
        if config.mode.truncates() {
            file.set_len(0)?;
        }

        let len = file.len()?;
        if len == 0 {
            if !config.mode.is_writable() {
                return Err(DepotError::corrupt(format!(
                    "{} is empty",
                    config.path.display()
                )));
            }
            return Self::initialize(file, config);
        }
        if len < FILE_HEADER_SIZE {
            return Err(DepotError::corrupt(format!(
                "{} is shorter than its {}-byte header",
                config.path.display(),
                FILE_HEADER_SIZE
            )));
        }

        let raw = file.read_vec_at(0, FILE_HEADER_SIZE as usize)?;
        let header = FileHeader::decode(&raw)?;
        if len < header.data_start() {
            return Err(DepotError::corrupt(format!(
                "bucket table truncated: file has {} bytes, table ends at {}",
                len,
                header.data_start()
            )));
        }
        let buckets = BucketTable::load(&file, header.bucket_count)?;

        let mut store = Self {
            on_disk_clean: header.is_clean(),
            file,
            header,
            buckets,
            free: FreePool::new(),
            mode: config.mode,
            sync_strategy: config.sync_strategy,
            fatal: false,
            generation: 0,
            cursor: Cursor::new(),
        };

        if store.header.is_clean() {
            store.load_clean(len)?;
        } else {
            tracing::warn!(
                path = %config.path.display(),
                "depot was not closed cleanly, rebuilding record count and free space"
            );
            let recovered = recovery::recover(&store.file, &store.header, &store.buckets)?;
            tracing::info!(
                path = %config.path.display(),
                records = recovered.record_count,
                free_spans = recovered.free.len(),
                reclaimed = recovered.reclaimed_records,
                truncated_bytes = recovered.truncated_bytes,
                "recovery finished"
            );
            store.header.record_count = recovered.record_count;
            store.header.data_end = recovered.data_end;
            store.free = recovered.free;
        }

        tracing::debug!(
            path = %config.path.display(),
            mode = %config.mode,
            buckets = store.header.bucket_count,
            records = store.header.record_count,
            "opened depot"
        );
        Ok(store)
    }

    fn initialize(file: DataFile, config: &Config) -> Result<Self> {
        let header = FileHeader::new(config.bucket_count());
        let buckets = BucketTable::create(&file, header.bucket_count)?;
        file.write_all_at(0, &header.encode())?;
        file.sync_all()?;

        tracing::debug!(
            path = %config.path.display(),
            buckets = header.bucket_count,
            "initialized new depot file"
        );

        Ok(Self {
            file,
            header,
            buckets,
            free: FreePool::new(),
            mode: config.mode,
            sync_strategy: config.sync_strategy,
            on_disk_clean: true,
            fatal: false,
            generation: 0,
            cursor: Cursor::new(),
        })
    }

    /// Trust the header of a cleanly closed file
    fn load_clean(&mut self, len: u64) -> Result<()> {
        if self.header.data_end > len {
            return Err(DepotError::corrupt(format!(
                "data region truncated: header says {} bytes, file has {}",
                self.header.data_end, len
            )));
        }
        self.free = freelist::load(&self.file, self.header.free_anchor, self.region())?;

        if len > self.header.data_end && self.file.is_writable() {
            tracing::debug!(
                stale_bytes = len - self.header.data_end,
                "discarding bytes past the recorded data end"
            );
            self.file.set_len(self.header.data_end)?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.file.is_writable()
    }

    pub fn record_count(&self) -> u64 {
        self.header.record_count
    }

    pub fn bucket_count(&self) -> u32 {
        self.header.bucket_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Continue numbering from a store this one replaces
    ///
    /// Cursors created against the old store then re-seek instead of
    /// trusting offsets from the old file.
    pub(crate) fn succeed(&mut self, previous_generation: u64) {
        self.generation = self.generation.max(previous_generation + 1);
    }

    pub(crate) fn file(&self) -> &DataFile {
        &self.file
    }

    pub(crate) fn buckets(&self) -> &BucketTable {
        &self.buckets
    }

    pub(crate) fn region(&self) -> DataRegion {
        DataRegion {
            start: self.header.data_start(),
            end: self.header.data_end,
        }
    }

    /// Rewind the handle's own cursor
    pub fn iter_init(&mut self) {
        self.cursor.reset();
    }

    /// Step the handle's own cursor; `None` once every record was visited
    pub fn iter_next(&mut self) -> Result<Option<Record>> {
        let mut cursor = std::mem::take(&mut self.cursor);
        let stepped = cursor
            .advance(self)
            .and_then(|found| found.map(|located| self.read_record(&located)).transpose());
        self.cursor = cursor;
        stepped
    }

    pub fn stat(&self) -> Result<Stat> {
        Ok(Stat {
            path: self.file.path().to_path_buf(),
            mode: self.mode,
            writable: self.file.is_writable(),
            file_size: self.file.len()?,
            bucket_count: self.header.bucket_count,
            used_buckets: self.buckets.used(),
            record_count: self.header.record_count,
            free_spans: self.free.len(),
            free_bytes: self.free.free_bytes(),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Locate the live record for `key`
    pub fn locate(&self, key: &[u8]) -> Result<Option<Located>> {
        let hash = KeyHash::new(key, self.header.bucket_count);
        index::find(&self.file, &self.buckets, self.region(), key, hash)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let located = self.locate(key)?.ok_or(DepotError::NotFound)?;
        Ok(self.read_record(&located)?.value)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.locate(key)?.is_some())
    }

    pub fn value_len(&self, key: &[u8]) -> Result<u64> {
        let located = self.locate(key)?.ok_or(DepotError::NotFound)?;
        Ok(located.header.value_len as u64)
    }

    /// Read and verify the full record behind `located`
    pub fn read_record(&self, located: &Located) -> Result<Record> {
        let payload = self.file.read_vec_at(
            located.offset + RECORD_HEADER_SIZE,
            located.header.payload_len(),
        )?;
        Record::from_payload(&located.header, payload)
    }

    /// Read only the key behind `located`
    pub fn read_key(&self, located: &Located) -> Result<Vec<u8>> {
        self.file.read_vec_at(
            located.offset + RECORD_HEADER_SIZE,
            located.header.key_len as usize,
        )
    }

    /// Every live record in bucket-then-chain order
    pub fn records(&self) -> impl Iterator<Item = Result<Located>> + '_ {
        let region = self.region();
        (0..self.header.bucket_count)
            .flat_map(move |bucket| ChainWalk::new(&self.file, &self.buckets, bucket, region))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn put(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        validate(key, value.len() as u64)?;
        if mode == PutMode::Append {
            if let Some(found) = self.locate(key)? {
                validate(key, found.header.value_len as u64 + value.len() as u64)?;
            }
        }
        self.mutate(|store| store.put_inner(key, value, mode))
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.mutate(|store| store.delete_inner(key))
    }

    /// Existing value, or insert `default` and return it
    pub fn set_default(&mut self, key: &[u8], default: &[u8]) -> Result<Vec<u8>> {
        match self.get(key) {
            Ok(value) => Ok(value),
            Err(DepotError::NotFound) => {
                self.put(key, default, PutMode::Keep)?;
                Ok(default.to_vec())
            }
            Err(e) => Err(e),
        }
    }

    /// Run one mutation under the failure fence and sync policy
    fn mutate<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_writable()?;

        match op(self) {
            Ok(value) => {
                self.generation += 1;
                if self.sync_strategy == SyncStrategy::EveryWrite {
                    self.file.sync_data()?;
                }
                Ok(value)
            }
            Err(e @ (DepotError::NotFound | DepotError::KeyExists)) => Err(e),
            Err(e) => {
                tracing::warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "write failed part-way, handle is now read-only until reopened"
                );
                self.fatal = true;
                self.generation += 1;
                Err(e)
            }
        }
    }

    pub fn ensure_writable(&self) -> Result<()> {
        if !self.file.is_writable() {
            return Err(DepotError::read_only());
        }
        if self.fatal {
            return Err(DepotError::corrupt(
                "an earlier write failed part-way; reopen the depot to recover",
            ));
        }
        Ok(())
    }

    /// Clear the on-disk clean flag before the first change
    ///
    /// Called once an operation knows it will write, so rejected
    /// operations leave a clean file clean.
    fn mark_dirty(&mut self) -> Result<()> {
        if !self.on_disk_clean {
            return Ok(());
        }
        let mut header = self.header.clone();
        header.set_clean(false);
        self.file.write_all_at(0, &header.encode())?;
        self.file.sync_data()?;
        self.header.flags = header.flags;
        self.on_disk_clean = false;
        Ok(())
    }

    fn put_inner(&mut self, key: &[u8], value: &[u8], mode: PutMode) -> Result<()> {
        let hash = KeyHash::new(key, self.header.bucket_count);
        let existing = index::find(&self.file, &self.buckets, self.region(), key, hash)?;

        let value: Cow<'_, [u8]> = match (&existing, mode) {
            (Some(_), PutMode::Keep) => return Err(DepotError::KeyExists),
            (Some(found), PutMode::Append) => {
                let mut joined = self.read_record(found)?.value;
                joined.extend_from_slice(value);
                Cow::Owned(joined)
            }
            _ => Cow::Borrowed(value),
        };

        let (link, next) = match &existing {
            Some(found) => (found.link, found.header.next),
            None => (Link::Bucket(hash.bucket), self.buckets.head(hash.bucket)?),
        };

        self.mark_dirty()?;

        let offset = self.write_record(hash.fingerprint, key, &value, next)?;
        index::write_link(&self.file, &mut self.buckets, link, offset)?;

        match existing {
            Some(found) => self.release(Span::new(found.offset, found.header.span_len()))?,
            None => self.header.record_count += 1,
        }
        Ok(())
    }

    fn delete_inner(&mut self, key: &[u8]) -> Result<()> {
        let found = self.locate(key)?.ok_or(DepotError::NotFound)?;
        self.mark_dirty()?;
        index::write_link(&self.file, &mut self.buckets, found.link, found.header.next)?;
        self.release(Span::new(found.offset, found.header.span_len()))?;
        self.header.record_count = self.header.record_count.saturating_sub(1);
        Ok(())
    }

    /// Write a record into a fresh span and return its offset
    fn write_record(&mut self, fingerprint: u32, key: &[u8], value: &[u8], next: u64) -> Result<u64> {
        let needed = RECORD_HEADER_SIZE + key.len() as u64 + value.len() as u64;
        let span = self.allocate(needed)?;
        let header = RecordHeader::live(fingerprint, key, value, (span.len - needed) as u32, next);
        self.file
            .write_all_at(span.offset, &encode_record(&header, key, value))?;
        Ok(span.offset)
    }

    fn allocate(&mut self, size: u64) -> Result<Span> {
        if let Some(allocation) = self.free.allocate(size) {
            if let Some(remainder) = allocation.remainder {
                freelist::mark_free(&self.file, remainder)?;
            }
            return Ok(allocation.span);
        }
        let span = Span::new(self.header.data_end, size);
        self.header.data_end = span.end();
        Ok(span)
    }

    fn release(&mut self, span: Span) -> Result<()> {
        let merged = self.free.release(span);
        if merged.end() == self.header.data_end {
            self.free.take(merged.offset);
            self.header.data_end = merged.offset;
            self.file.set_len(merged.offset)?;
        } else {
            freelist::mark_free(&self.file, merged)?;
        }
        Ok(())
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Persist metadata and fsync; a no-op when nothing changed
    pub fn sync(&mut self) -> Result<()> {
        if !self.file.is_writable() || self.on_disk_clean {
            return Ok(());
        }
        self.ensure_writable()?;
        self.checkpoint()
    }

    fn checkpoint(&mut self) -> Result<()> {
        // Records and links must be durable before the header vouches for them.
        self.file.sync_data()?;

        let anchor = freelist::persist(&self.file, &self.free)?;
        let mut header = self.header.clone();
        header.free_anchor = anchor;
        header.set_clean(true);
        self.file.write_all_at(0, &header.encode())?;
        self.file.sync_all()?;

        self.header = header;
        self.on_disk_clean = true;
        Ok(())
    }

    /// Persist everything and release the file
    pub fn close(mut self) -> Result<()> {
        let persisted = if !self.file.is_writable() || self.on_disk_clean {
            Ok(())
        } else if self.fatal {
            Err(DepotError::corrupt(
                "closing after a failed write; the next open will rebuild the index",
            ))
        } else {
            self.checkpoint()
        };

        let unlocked = self.file.unlock();
        tracing::debug!(
            path = %self.file.path().display(),
            records = self.header.record_count,
            "closed depot"
        );
        persisted.and(unlocked)
    }

    /// Drop the file without persisting anything
    pub fn discard(mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(error = %e, "failed to release depot file lock");
        }
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Copy every live record into a new, hole-free file at `path`
    ///
    /// Returns the number of records copied.
    pub fn compact_into(&self, path: &Path, bucket_count: u32) -> Result<u64> {
        let config = Config::builder()
            .path(path)
            .mode(OpenMode::CreateTruncate)
            .bucket_hint(bucket_count)
            .build();
        let mut target = Store::open(&config)?;

        let mut copied = 0u64;
        for item in self.records() {
            let located = item?;
            let record = self.read_record(&located)?;
            target.put(&record.key, &record.value, PutMode::Overwrite)?;
            copied += 1;
        }

        target.close()?;
        Ok(copied)
    }
}

/// Reject keys and values the format cannot hold
fn validate(key: &[u8], value_len: u64) -> Result<()> {
    if key.is_empty() {
        return Err(DepotError::invalid_input("key must not be empty"));
    }
    if key.len() as u64 + value_len > MAX_PAYLOAD {
        return Err(DepotError::invalid_input(format!(
            "key + value of {} bytes exceeds the {}-byte record limit",
            key.len() as u64 + value_len,
            MAX_PAYLOAD
        )));
    }
    Ok(())
}
