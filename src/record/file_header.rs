//! File header
//!
//! The first 64 bytes of every depot file.

use bytes::{Buf, BufMut};

use crate::config::MAX_BUCKETS;
use crate::error::{DepotError, Result};

use super::{FILE_HEADER_SIZE, FILE_MAGIC, FILE_VERSION, FLAG_CLEAN, NO_OFFSET};

/// Offset of the CRC field; the CRC covers bytes 8..48
const CRC_OFFSET: usize = 48;

/// Decoded file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub flags: u32,
    pub bucket_count: u32,
    /// Live records as of the last sync/close
    pub record_count: u64,
    /// First free span of the persisted free chain
    pub free_anchor: u64,
    /// End of the data region as of the last sync/close
    pub data_end: u64,
}

impl FileHeader {
    /// Header of a freshly initialized file
    pub fn new(bucket_count: u32) -> Self {
        let mut header = Self {
            version: FILE_VERSION,
            flags: FLAG_CLEAN,
            bucket_count,
            record_count: 0,
            free_anchor: NO_OFFSET,
            data_end: 0,
        };
        header.data_end = header.data_start();
        header
    }

    /// First byte after the bucket table
    pub fn data_start(&self) -> u64 {
        FILE_HEADER_SIZE + 8 * self.bucket_count as u64
    }

    pub fn is_clean(&self) -> bool {
        self.flags & FLAG_CLEAN != 0
    }

    pub fn set_clean(&mut self, clean: bool) {
        if clean {
            self.flags |= FLAG_CLEAN;
        } else {
            self.flags &= !FLAG_CLEAN;
        }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE as usize] {
        let mut out = [0u8; FILE_HEADER_SIZE as usize];
        {
            let mut buf = &mut out[..];
            buf.put_slice(FILE_MAGIC);
            buf.put_u32_le(self.version);
            buf.put_u32_le(self.flags);
            buf.put_u32_le(self.bucket_count);
            buf.put_u32_le(0); // reserved
            buf.put_u64_le(self.record_count);
            buf.put_u64_le(self.free_anchor);
            buf.put_u64_le(self.data_end);
        }
        let crc = crc32fast::hash(&out[8..CRC_OFFSET]);
        out[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Decode and validate a header
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE as usize {
            return Err(DepotError::corrupt(format!(
                "file is shorter than its {}-byte header",
                FILE_HEADER_SIZE
            )));
        }

        if &bytes[0..8] != FILE_MAGIC {
            return Err(DepotError::corrupt(format!(
                "invalid magic: expected {:?}, got {:?}",
                FILE_MAGIC,
                &bytes[0..8]
            )));
        }

        let stored_crc = (&bytes[CRC_OFFSET..CRC_OFFSET + 4]).get_u32_le();
        let calc_crc = crc32fast::hash(&bytes[8..CRC_OFFSET]);
        if stored_crc != calc_crc {
            return Err(DepotError::corrupt(format!(
                "header CRC mismatch (stored={:#010x}, calc={:#010x})",
                stored_crc, calc_crc
            )));
        }

        let mut buf = &bytes[8..CRC_OFFSET];
        let version = buf.get_u32_le();
        if version != FILE_VERSION {
            return Err(DepotError::corrupt(format!(
                "unsupported file version {}",
                version
            )));
        }
        let flags = buf.get_u32_le();
        let bucket_count = buf.get_u32_le();
        let _reserved = buf.get_u32_le();
        let record_count = buf.get_u64_le();
        let free_anchor = buf.get_u64_le();
        let data_end = buf.get_u64_le();

        if bucket_count == 0 || bucket_count > MAX_BUCKETS {
            return Err(DepotError::corrupt(format!(
                "bucket count {} out of range 1..={}",
                bucket_count, MAX_BUCKETS
            )));
        }

        let header = Self {
            version,
            flags,
            bucket_count,
            record_count,
            free_anchor,
            data_end,
        };

        if header.data_end < header.data_start() {
            return Err(DepotError::corrupt(format!(
                "data end {} lies inside the bucket table",
                header.data_end
            )));
        }

        Ok(header)
    }
}
