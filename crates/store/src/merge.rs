/// Merge (compaction): rewrites only the live records of the immutable
/// segments into one fresh segment, emits a hint sidecar for it, and
/// atomically swaps the subsumed files out.
///
/// Tombstones never cross a merge: they are absent from the key dir, so
/// the rewrite loop simply never sees them. That is correct only because
/// every immutable segment of the store collapses together in a single
/// pass — there is no split-level ordering to preserve.
use crate::error::{Result, StoreError};
use crate::{RecordPos, Store, StoreInner};
use record::RecordHeader;
use segment::SegmentReader;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub(crate) const MERGE_DATA_NAME: &str = "merge.data";
pub(crate) const MERGE_HINT_NAME: &str = "merge.hint";

impl Store {
    /// Compacts all immutable segments into one.
    ///
    /// Live records are copied byte-for-byte into `merge.data` (with a
    /// matching `merge.hint` entry each), both temporaries are fsynced
    /// and renamed over the smallest subsumed ID — `rename()` atomically
    /// replaces the destination within the directory on POSIX semantics,
    /// so no pre-merge file is touched until the merged pair is in
    /// place. The key dir and readers are then repointed, and only after
    /// that are the remaining subsumed `.data`/`.hint` files removed, as
    /// pure disk reclamation. Records living in the active segment are
    /// untouched.
    ///
    /// A no-op when no immutable segment exists. Holds the write lock for
    /// the full duration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corruption`] if any record to be rewritten
    /// fails its CRC — merge refuses to propagate bytes it cannot prove
    /// intact. Every failure up to the renames removes the temporaries
    /// and leaves the pre-merge files and in-memory index unchanged.
    pub fn merge(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.older.is_empty() {
            return Ok(()); // nothing to merge
        }

        let result = inner.run_merge(&self.dir);
        if result.is_err() {
            // A failed pass must not leave temporaries behind.
            let _ = fs::remove_file(self.dir.join(MERGE_DATA_NAME));
            let _ = fs::remove_file(self.dir.join(MERGE_HINT_NAME));
        }
        result
    }
}

impl StoreInner {
    fn run_merge(&mut self, dir: &Path) -> Result<()> {
        let mut merge_ids: Vec<u64> = self.older.keys().copied().collect();
        merge_ids.sort_unstable();
        // The smallest subsumed ID is reused for the merged segment.
        let target_id = merge_ids[0];

        let tmp_data_path = dir.join(MERGE_DATA_NAME);
        let tmp_hint_path = dir.join(MERGE_HINT_NAME);
        let mut data_out = open_truncated(&tmp_data_path)?;
        let mut hint_out = open_truncated(&tmp_hint_path)?;

        // Rewrite every live record outside the active segment, tracking
        // where each lands in the merged file.
        let mut remapped: HashMap<Vec<u8>, RecordPos> = HashMap::new();
        let mut write_offset: u64 = 0;
        let mut record_buf = Vec::new();

        for (key, pos) in &self.key_dir {
            if pos.segment_id == self.active.id {
                continue;
            }
            let reader = self.older.get(&pos.segment_id).ok_or_else(|| {
                StoreError::Internal(format!(
                    "key dir points at missing segment {}",
                    pos.segment_id
                ))
            })?;

            let header = read_live_record(reader, *pos, &mut record_buf)?;
            data_out.write_all(&record_buf)?;
            hint_out.write_all(&record::encode_hint(
                header.timestamp,
                header.value_size,
                write_offset,
                key,
            ))?;

            remapped.insert(
                key.clone(),
                RecordPos {
                    segment_id: target_id,
                    offset: write_offset,
                },
            );
            write_offset += header.record_len();
        }

        data_out.sync_all()?;
        hint_out.sync_all()?;
        drop(data_out);
        drop(hint_out);

        // Swap the merged pair in over the target ID before touching any
        // other subsumed file. rename() atomically replaces the
        // destination, so every failure up to this point leaves the
        // pre-merge files and the in-memory state fully intact.
        fs::rename(&tmp_data_path, segment::data_path(dir, target_id))?;
        fs::rename(&tmp_hint_path, segment::hint_path(dir, target_id))?;

        // Rebind the target reader and repoint the key dir. The replaced
        // reader drops here, unmapping the pre-merge inode.
        let reader = SegmentReader::open_mmap(segment::data_path(dir, target_id))?;
        self.older.insert(target_id, reader);
        for (key, pos) in remapped {
            self.key_dir.insert(key, pos);
        }

        // The remaining subsumed segments are no longer referenced by the
        // key dir; removing their files is pure disk reclamation.
        for id in &merge_ids[1..] {
            self.older.remove(id);
            let _ = fs::remove_file(segment::data_path(dir, *id));
            let _ = fs::remove_file(segment::hint_path(dir, *id));
        }

        tracing::info!(
            target = target_id,
            subsumed = merge_ids.len(),
            bytes = write_offset,
            "merged immutable segments"
        );
        Ok(())
    }
}

/// Reads the full record at `pos` into `buf` and re-verifies its CRC.
fn read_live_record(
    reader: &SegmentReader,
    pos: RecordPos,
    buf: &mut Vec<u8>,
) -> Result<RecordHeader> {
    let mut header_buf = [0u8; record::HEADER_LEN];
    reader.read_exact_at(&mut header_buf, pos.offset)?;
    let header = RecordHeader::decode(&header_buf)?;

    if pos.offset + header.record_len() > reader.size()? {
        return Err(StoreError::Corruption(format!(
            "record at offset {} in segment {} extends past end of segment",
            pos.offset, pos.segment_id
        )));
    }

    buf.resize(header.record_len() as usize, 0);
    reader.read_exact_at(buf, pos.offset)?;

    let key_end = record::HEADER_LEN + header.key_size as usize;
    header
        .verify(&buf[record::HEADER_LEN..key_end], &buf[key_end..])
        .map_err(|_| {
            StoreError::Corruption(format!(
                "crc mismatch at offset {} in segment {}",
                pos.offset, pos.segment_id
            ))
        })?;
    Ok(header)
}

fn open_truncated(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}
