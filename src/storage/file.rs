//! Data file handle
//!
//! Positional reads and writes over the single database file. Reads take
//! `&self` and never touch a shared seek position, so several readers can
//! use one handle at the same time.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::config::OpenMode;
use crate::error::{DepotError, Result};

/// The open database file
#[derive(Debug)]
pub struct DataFile {
    file: File,
    path: PathBuf,
    writable: bool,
    locked: bool,
}

impl DataFile {
    /// Open `path` according to `mode`
    ///
    /// Any failure here is reported as `CannotOpen`.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if mode.is_writable() {
            options.write(true);
        }
        if mode.creates() {
            options.create(true);
        }

        let file = options
            .open(path)
            .map_err(|e| DepotError::cannot_open(path, e))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            writable: mode.is_writable(),
            locked: false,
        })
    }

    /// Take a non-blocking advisory lock: exclusive for writers, shared for readers
    pub fn lock(&mut self) -> Result<()> {
        let result = if self.writable {
            FileExt::try_lock_exclusive(&self.file)
        } else {
            FileExt::try_lock_shared(&self.file)
        };
        result.map_err(|e| DepotError::cannot_open(&self.path, e))?;
        self.locked = true;
        Ok(())
    }

    /// Release the advisory lock, if held
    pub fn unlock(&mut self) -> Result<()> {
        if self.locked {
            self.locked = false;
            FileExt::unlock(&self.file)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Physical file length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Fill `buf` from `offset`; running off the end of the file is corruption
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        pread_exact(&self.file, buf, offset).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DepotError::corrupt(format!(
                    "read of {} bytes at offset {} runs past end of {}",
                    len,
                    offset,
                    self.path.display()
                ))
            } else {
                DepotError::Io(e)
            }
        })
    }

    /// Read `len` bytes at `offset` into a fresh buffer
    pub fn read_vec_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn write_all_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(DepotError::read_only());
        }
        pwrite_all(&self.file, buf, offset)?;
        Ok(())
    }

    pub fn write_u64_at(&self, offset: u64, value: u64) -> Result<()> {
        self.write_all_at(offset, &value.to_le_bytes())
    }

    pub fn set_len(&self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(DepotError::read_only());
        }
        self.file.set_len(len)?;
        Ok(())
    }

    /// fsync file data (metadata only when the length changed)
    pub fn sync_data(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

// =============================================================================
// Positional I/O
// =============================================================================

#[cfg(unix)]
fn pread_exact(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, offset)
}

#[cfg(unix)]
fn pwrite_all(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, buf, offset)
}

#[cfg(windows)]
fn pread_exact(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match std::os::windows::fs::FileExt::seek_read(file, buf, offset) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn pwrite_all(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    while !buf.is_empty() {
        match std::os::windows::fs::FileExt::seek_write(file, buf, offset) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
