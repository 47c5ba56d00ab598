//! # Record — On-Disk Record Codec
//!
//! Encodes and decodes the two binary layouts EmberKV persists: the data
//! record appended to `.data` segments and the hint entry emitted into
//! `.hint` sidecars during merge.
//!
//! ## Data Record Format
//!
//! ```text
//! [crc32: u32 BE][timestamp: u64 BE][key_size: u32 BE][value_size: u32 BE][key][value]
//! ```
//!
//! The CRC32 (IEEE) covers everything after itself: timestamp through the
//! last value byte. `value_size == 0xFFFF_FFFF` marks a **tombstone** — a
//! logical delete that carries no value bytes at all, so a tombstone record
//! is exactly `20 + key_size` bytes long.
//!
//! ## Hint Entry Format
//!
//! ```text
//! [crc32: u32 BE][timestamp: u64 BE][key_size: u32 BE][value_size: u32 BE][data_offset: u64 BE][key]
//! ```
//!
//! A hint entry points at the start of a live record inside its paired data
//! segment. The CRC covers the header tail (timestamp through data_offset)
//! followed by the key.
//!
//! ## Example
//!
//! ```rust
//! use record::{encode_record, RecordHeader, HEADER_LEN};
//!
//! let buf = encode_record(b"hello", Some(b"world"), 42);
//! let header = RecordHeader::decode(&buf[..HEADER_LEN]).unwrap();
//! assert_eq!(header.key_size, 5);
//! header.verify(b"hello", b"world").unwrap();
//! ```

use byteorder::{BigEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use std::io;
use thiserror::Error;

/// Fixed length of the data-record header (CRC + timestamp + sizes).
pub const HEADER_LEN: usize = 20;

/// Fixed length of the hint-entry header (CRC + timestamp + sizes + offset).
pub const HINT_HEADER_LEN: usize = 28;

/// Sentinel stored in the value_size field to mark a tombstone.
///
/// Writers must reject values whose length equals this sentinel; a
/// tombstone record carries no value bytes on disk.
pub const TOMBSTONE: u32 = u32::MAX;

/// Errors that can occur while decoding or verifying a record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record failed CRC validation or its header could not be parsed.
    #[error("corrupt record")]
    Corrupt,
}

/// The parsed fixed header of a data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// CRC32 stored in the first four bytes, covering everything after them.
    pub crc: u32,
    /// Nanosecond wall-clock time of the write. Informational only.
    pub timestamp: u64,
    /// Length of the key in bytes. Always > 0 for records EmberKV writes.
    pub key_size: u32,
    /// Length of the value in bytes, or [`TOMBSTONE`].
    pub value_size: u32,
}

impl RecordHeader {
    /// Parses the fixed 20-byte header from the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Corrupt`] if `buf` is shorter than
    /// [`HEADER_LEN`].
    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < HEADER_LEN {
            return Err(RecordError::Corrupt);
        }
        let mut r = buf;
        let crc = r.read_u32::<BigEndian>()?;
        let timestamp = r.read_u64::<BigEndian>()?;
        let key_size = r.read_u32::<BigEndian>()?;
        let value_size = r.read_u32::<BigEndian>()?;
        Ok(Self {
            crc,
            timestamp,
            key_size,
            value_size,
        })
    }

    /// Returns `true` if this record is a tombstone (logical delete).
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value_size == TOMBSTONE
    }

    /// Number of value bytes physically stored: 0 for tombstones.
    #[must_use]
    pub fn value_len(&self) -> usize {
        if self.is_tombstone() {
            0
        } else {
            self.value_size as usize
        }
    }

    /// Total on-disk length of the record: header + key + value bytes.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        HEADER_LEN as u64 + self.key_size as u64 + self.value_len() as u64
    }

    /// Recomputes the CRC over the 16-byte header tail followed by `key`
    /// then `value`, and compares it against the stored CRC.
    ///
    /// For tombstones pass an empty `value` slice — the on-disk CRC covers
    /// no value bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Corrupt`] on mismatch.
    pub fn verify(&self, key: &[u8], value: &[u8]) -> Result<(), RecordError> {
        let mut hasher = Crc32::new();
        hasher.update(&self.tail_bytes());
        hasher.update(key);
        hasher.update(value);
        if hasher.finalize() != self.crc {
            return Err(RecordError::Corrupt);
        }
        Ok(())
    }

    /// Re-encodes the post-CRC portion of the header, byte-identical to
    /// what the writer produced.
    fn tail_bytes(&self) -> [u8; 16] {
        let mut tail = [0u8; 16];
        tail[0..8].copy_from_slice(&self.timestamp.to_be_bytes());
        tail[8..12].copy_from_slice(&self.key_size.to_be_bytes());
        tail[12..16].copy_from_slice(&self.value_size.to_be_bytes());
        tail
    }
}

/// Encodes a full data record into a freshly allocated buffer.
///
/// `value: None` encodes a tombstone: the value_size field holds
/// [`TOMBSTONE`] and no value bytes follow the key. The caller is
/// responsible for rejecting keys and values whose lengths do not fit the
/// format (empty keys, values of sentinel length).
pub fn encode_record(key: &[u8], value: Option<&[u8]>, timestamp: u64) -> Vec<u8> {
    let payload = value.unwrap_or(&[]);
    let value_size = match value {
        Some(v) => v.len() as u32,
        None => TOMBSTONE,
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + key.len() + payload.len());
    buf.extend_from_slice(&[0u8; 4]); // CRC slot, filled below
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
    buf.extend_from_slice(&value_size.to_be_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(payload);

    let mut hasher = Crc32::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    buf[0..4].copy_from_slice(&crc.to_be_bytes());
    buf
}

/// The parsed fixed header of a hint entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintHeader {
    /// CRC32 over the header tail (timestamp through data_offset) + key.
    pub crc: u32,
    /// Timestamp copied from the paired data record.
    pub timestamp: u64,
    /// Length of the key that follows the header.
    pub key_size: u32,
    /// Value size copied from the paired data record.
    pub value_size: u32,
    /// Offset of the record start inside the paired data segment.
    pub data_offset: u64,
}

impl HintHeader {
    /// Parses the fixed 28-byte hint header from the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Corrupt`] if `buf` is shorter than
    /// [`HINT_HEADER_LEN`].
    pub fn decode(buf: &[u8]) -> Result<Self, RecordError> {
        if buf.len() < HINT_HEADER_LEN {
            return Err(RecordError::Corrupt);
        }
        let mut r = buf;
        let crc = r.read_u32::<BigEndian>()?;
        let timestamp = r.read_u64::<BigEndian>()?;
        let key_size = r.read_u32::<BigEndian>()?;
        let value_size = r.read_u32::<BigEndian>()?;
        let data_offset = r.read_u64::<BigEndian>()?;
        Ok(Self {
            crc,
            timestamp,
            key_size,
            value_size,
            data_offset,
        })
    }

    /// Recomputes the CRC over the 24-byte header tail followed by `key`
    /// and compares it against the stored CRC.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Corrupt`] on mismatch.
    pub fn verify(&self, key: &[u8]) -> Result<(), RecordError> {
        let mut hasher = Crc32::new();
        hasher.update(&self.tail_bytes());
        hasher.update(key);
        if hasher.finalize() != self.crc {
            return Err(RecordError::Corrupt);
        }
        Ok(())
    }

    fn tail_bytes(&self) -> [u8; 24] {
        let mut tail = [0u8; 24];
        tail[0..8].copy_from_slice(&self.timestamp.to_be_bytes());
        tail[8..12].copy_from_slice(&self.key_size.to_be_bytes());
        tail[12..16].copy_from_slice(&self.value_size.to_be_bytes());
        tail[16..24].copy_from_slice(&self.data_offset.to_be_bytes());
        tail
    }
}

/// Encodes one hint entry into a freshly allocated buffer.
///
/// `value_size` and `timestamp` are copied from the data record the entry
/// points at; `data_offset` is the record's start inside the merged
/// segment.
pub fn encode_hint(timestamp: u64, value_size: u32, data_offset: u64, key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HINT_HEADER_LEN + key.len());
    buf.extend_from_slice(&[0u8; 4]); // CRC slot, filled below
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
    buf.extend_from_slice(&value_size.to_be_bytes());
    buf.extend_from_slice(&data_offset.to_be_bytes());
    buf.extend_from_slice(key);

    let mut hasher = Crc32::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    buf[0..4].copy_from_slice(&crc.to_be_bytes());
    buf
}
