/// Read path: `get()`.
///
/// A lookup resolves the key dir entry, reads the record through the
/// segment's reader (the active writer handle read positionally, or the
/// mapped reader of an immutable segment), re-verifies the CRC, and
/// checks that the stored key matches the requested one before handing
/// back an owned copy of the value.
use crate::error::{Result, StoreError};
use crate::{Store, StoreInner};
use record::RecordHeader;
use std::io;
use std::os::unix::fs::FileExt;

impl Store {
    /// Looks up a key, returning a freshly allocated copy of its value —
    /// never a borrow into a mapping or shared buffer.
    ///
    /// # Errors
    ///
    /// - [`StoreError::KeyNotFound`] if the key has no live record.
    /// - [`StoreError::Corruption`] if the record fails its CRC or holds
    ///   a different key than the index claims.
    /// - [`StoreError::Internal`] if the key dir points at a segment that
    ///   no longer exists.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        inner.get(key)
    }
}

impl StoreInner {
    pub(crate) fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let pos = match self.key_dir.get(key) {
            Some(pos) => *pos,
            None => return Err(StoreError::KeyNotFound),
        };

        if pos.segment_id == self.active.id {
            // Positional view over the active writer handle.
            read_record(
                |buf, off| self.active.file.read_exact_at(buf, off),
                self.active.write_offset,
                pos.offset,
                key,
            )
        } else {
            let reader = self.older.get(&pos.segment_id).ok_or_else(|| {
                StoreError::Internal(format!(
                    "key dir points at missing segment {}",
                    pos.segment_id
                ))
            })?;
            read_record(
                |buf, off| reader.read_exact_at(buf, off),
                reader.size()?,
                pos.offset,
                key,
            )
        }
    }
}

/// Reads and validates the record at `offset`, returning an owned copy of
/// its value bytes.
fn read_record<F>(read_exact_at: F, segment_size: u64, offset: u64, key: &[u8]) -> Result<Vec<u8>>
where
    F: Fn(&mut [u8], u64) -> io::Result<()>,
{
    let mut header_buf = [0u8; record::HEADER_LEN];
    read_exact_at(&mut header_buf, offset)?;
    let header = RecordHeader::decode(&header_buf)?;

    if header.is_tombstone() {
        // Tombstones are materialized as key-dir absence; an entry that
        // resolves to one is a broken contract, not user data.
        return Err(StoreError::Internal(
            "key dir points at a tombstone record".into(),
        ));
    }
    if offset + header.record_len() > segment_size {
        return Err(StoreError::Corruption(format!(
            "record at offset {} extends past end of segment",
            offset
        )));
    }

    let mut data = vec![0u8; header.key_size as usize + header.value_len()];
    read_exact_at(&mut data, offset + record::HEADER_LEN as u64)?;
    let (stored_key, value) = data.split_at(header.key_size as usize);

    header
        .verify(stored_key, value)
        .map_err(|_| StoreError::Corruption(format!("crc mismatch at offset {}", offset)))?;
    if stored_key != key {
        return Err(StoreError::Corruption(format!(
            "record at offset {} holds a different key",
            offset
        )));
    }

    Ok(value.to_vec())
}
