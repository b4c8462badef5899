//! Record header encoding and decoding
//!
//! Records are written in one piece (header, key, value). Padding bytes are
//! never written; they only exist as slack inside a reused span.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DepotError, Result};

use super::{FREE_TAG, LIVE_TAG, MAX_SPAN, RECORD_HEADER_SIZE};

/// What a span of the data region holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// A live key/value record linked from a bucket chain
    Live,

    /// Reclaimed space available to the allocator
    Free,
}

impl SpanKind {
    fn tag(self) -> u32 {
        match self {
            SpanKind::Live => LIVE_TAG,
            SpanKind::Free => FREE_TAG,
        }
    }

    fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            LIVE_TAG => Some(SpanKind::Live),
            FREE_TAG => Some(SpanKind::Free),
            _ => None,
        }
    }
}

/// Fixed-size header at the start of every span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: SpanKind,
    /// Upper 32 bits of the key hash
    pub fingerprint: u32,
    pub key_len: u32,
    pub value_len: u32,
    /// Unused bytes after the value
    pub pad_len: u32,
    /// CRC32 over fingerprint, lengths, key, and value
    pub checksum: u32,
    /// Next record in the chain (or next free span), 0 when last
    pub next: u64,
}

impl RecordHeader {
    /// Header for a live record
    ///
    /// Lengths must already be validated against `MAX_PAYLOAD`.
    pub fn live(fingerprint: u32, key: &[u8], value: &[u8], pad_len: u32, next: u64) -> Self {
        Self {
            kind: SpanKind::Live,
            fingerprint,
            key_len: key.len() as u32,
            value_len: value.len() as u32,
            pad_len,
            checksum: checksum(fingerprint, key, value),
            next,
        }
    }

    /// Header for a free span covering `span_len` bytes
    pub fn free(span_len: u64, next: u64) -> Self {
        debug_assert!((RECORD_HEADER_SIZE..=MAX_SPAN).contains(&span_len));
        Self {
            kind: SpanKind::Free,
            fingerprint: 0,
            key_len: 0,
            value_len: 0,
            pad_len: (span_len - RECORD_HEADER_SIZE) as u32,
            checksum: 0,
            next,
        }
    }

    /// Total bytes the span occupies, header included
    pub fn span_len(&self) -> u64 {
        RECORD_HEADER_SIZE + self.payload_len() as u64 + self.pad_len as u64
    }

    /// Key plus value length
    pub fn payload_len(&self) -> usize {
        self.key_len as usize + self.value_len as usize
    }

    pub fn is_live(&self) -> bool {
        self.kind == SpanKind::Live
    }

    /// Append the 32-byte encoding to `buf`
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.kind.tag());
        buf.put_u32_le(self.fingerprint);
        buf.put_u32_le(self.key_len);
        buf.put_u32_le(self.value_len);
        buf.put_u32_le(self.pad_len);
        buf.put_u32_le(self.checksum);
        buf.put_u64_le(self.next);
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE as usize] {
        let mut out = [0u8; RECORD_HEADER_SIZE as usize];
        let mut cursor = &mut out[..];
        self.encode_into(&mut cursor);
        out
    }

    /// Decode a header; an unknown tag is corruption
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_HEADER_SIZE as usize {
            return Err(DepotError::corrupt(format!(
                "record header needs {} bytes, got {}",
                RECORD_HEADER_SIZE,
                buf.len()
            )));
        }

        let tag = buf.get_u32_le();
        let kind = SpanKind::from_tag(tag)
            .ok_or_else(|| DepotError::corrupt(format!("unknown record tag {:#010x}", tag)))?;

        let header = Self {
            kind,
            fingerprint: buf.get_u32_le(),
            key_len: buf.get_u32_le(),
            value_len: buf.get_u32_le(),
            pad_len: buf.get_u32_le(),
            checksum: buf.get_u32_le(),
            next: buf.get_u64_le(),
        };

        if header.kind == SpanKind::Free && header.payload_len() != 0 {
            return Err(DepotError::corrupt("free span carries a payload"));
        }

        Ok(header)
    }

    /// Check the payload against the stored checksum
    pub fn verify(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let actual = checksum(self.fingerprint, key, value);
        if actual != self.checksum {
            return Err(DepotError::corrupt(format!(
                "record checksum mismatch (stored={:#010x}, calc={:#010x})",
                self.checksum, actual
            )));
        }
        Ok(())
    }
}

/// CRC32 over the identifying fields and the payload
pub fn checksum(fingerprint: u32, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&fingerprint.to_le_bytes());
    hasher.update(&(key.len() as u32).to_le_bytes());
    hasher.update(&(value.len() as u32).to_le_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Encode header, key, and value into one contiguous buffer
pub fn encode_record(header: &RecordHeader, key: &[u8], value: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE as usize + key.len() + value.len());
    header.encode_into(&mut buf);
    buf.put_slice(key);
    buf.put_slice(value);
    buf
}

/// A decoded key/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// Split a payload read from disk into key and value, verifying it
    pub fn from_payload(header: &RecordHeader, mut payload: Vec<u8>) -> Result<Self> {
        if payload.len() != header.payload_len() {
            return Err(DepotError::corrupt(format!(
                "record payload is {} bytes, header says {}",
                payload.len(),
                header.payload_len()
            )));
        }
        let value = payload.split_off(header.key_len as usize);
        header.verify(&payload, &value)?;
        Ok(Self { key: payload, value })
    }
}
