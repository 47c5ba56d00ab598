/// Write path: `put()`, `delete()`, and segment rotation.
///
/// Every mutation appends one encoded record to the active segment under
/// the write lock. When the append would push the segment past
/// `max_file_size`, the active segment is sealed first and a fresh one
/// with the next ID takes its place.
use crate::error::{Result, StoreError};
use crate::{ActiveSegment, RecordPos, Store, StoreInner};
use segment::SegmentReader;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

impl Store {
    /// Inserts or overwrites a key-value pair.
    ///
    /// The record is appended to the active segment (rotating first if it
    /// would not fit) and the key dir is repointed at the new record. The
    /// call returns after the write reaches the file handle; it does not
    /// fsync.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for an empty key or a value
    /// whose length equals the tombstone sentinel.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        if value.len() as u64 >= u64::from(record::TOMBSTONE) {
            return Err(StoreError::InvalidArgument(format!(
                "value too large: {} bytes",
                value.len()
            )));
        }

        let mut inner = self.inner.write();
        let pos = inner.append_record(&self.dir, key, Some(value))?;
        inner.key_dir.insert(key.to_vec(), pos);
        Ok(())
    }

    /// Deletes a key by appending a tombstone record.
    ///
    /// The key is removed from the key dir (not marked — simply absent).
    /// Deleting a key that was never written still logs a tombstone
    /// durably and succeeds.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;

        let mut inner = self.inner.write();
        inner.append_record(&self.dir, key, None)?;
        inner.key_dir.remove(key);
        Ok(())
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument("key must not be empty".into()));
    }
    if key.len() as u64 > u64::from(u32::MAX) {
        return Err(StoreError::InvalidArgument(format!(
            "key too large: {} bytes",
            key.len()
        )));
    }
    Ok(())
}

impl StoreInner {
    /// Appends one record to the active segment, rotating first when the
    /// segment would grow past `max_file_size`. `value: None` appends a
    /// tombstone. Returns the position of the appended record.
    pub(crate) fn append_record(
        &mut self,
        dir: &Path,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> Result<RecordPos> {
        let record_size =
            (record::HEADER_LEN + key.len() + value.map_or(0, <[u8]>::len)) as u64;
        if self.active.write_offset + record_size > self.max_file_size {
            self.rotate(dir)?;
        }

        let buf = record::encode_record(key, value, wall_clock_nanos());
        self.active.file.write_all(&buf)?;

        let pos = RecordPos {
            segment_id: self.active.id,
            offset: self.active.write_offset,
        };
        self.active.write_offset += record_size;
        Ok(pos)
    }

    /// Seals the active segment and opens its successor.
    ///
    /// The sealed file is fsynced, its write handle closed, and the path
    /// re-opened as a mapped reader in `older`. Only then does the next
    /// append go to the fresh segment `id + 1`.
    fn rotate(&mut self, dir: &Path) -> Result<()> {
        self.active.file.sync_all()?;

        let sealed_id = self.active.id;
        let next = ActiveSegment {
            file: crate::open_active_file(&segment::data_path(dir, sealed_id + 1))?,
            id: sealed_id + 1,
            write_offset: 0,
        };
        // Close the write handle before the sealed file is mapped.
        drop(std::mem::replace(&mut self.active, next));

        let reader = SegmentReader::open_mmap(segment::data_path(dir, sealed_id))?;
        self.older.insert(sealed_id, reader);

        tracing::debug!(sealed = sealed_id, active = sealed_id + 1, "rotated active segment");
        Ok(())
    }
}

/// Nanosecond wall-clock timestamp for the record header. Informational
/// only — recovery resolves conflicts by scan order, never by timestamp.
fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
