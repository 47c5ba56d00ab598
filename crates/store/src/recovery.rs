/// Cold-start recovery: rebuilding the key dir from hint files where
/// available, otherwise by scanning data segments front-to-back.
///
/// Segments are loaded in ascending ID order so that a later record for
/// the same key always wins, and a tombstone erases the key. Every record
/// and hint entry is CRC-verified; a single mismatch refuses the open.
use crate::error::{Result, StoreError};
use crate::{KeyDir, RecordPos};
use record::{HintHeader, RecordHeader, HEADER_LEN, HINT_HEADER_LEN};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Removes merge temporaries left behind by an interrupted compaction.
pub(crate) fn cleanup_merge_temps(dir: &Path) {
    for name in [crate::merge::MERGE_DATA_NAME, crate::merge::MERGE_HINT_NAME] {
        let p = dir.join(name);
        if p.exists() {
            let _ = std::fs::remove_file(&p);
        }
    }
}

/// Enumerates `<integer>.data` entries in `dir`, ascending by ID.
pub(crate) fn list_segment_ids(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(id) = segment::parse_data_file_id(name) {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Loads segment `id` into the key dir: from its hint sidecar when one
/// exists, otherwise by scanning the data file.
pub(crate) fn load_segment(dir: &Path, id: u64, key_dir: &mut KeyDir) -> Result<()> {
    let hint = segment::hint_path(dir, id);
    if hint.exists() {
        tracing::debug!(segment = id, "loading key dir from hint file");
        load_hint_file(&hint, id, key_dir)
    } else {
        tracing::debug!(segment = id, "scanning data segment");
        scan_data_file(&segment::data_path(dir, id), id, key_dir)
    }
}

/// Parses hint entries sequentially and inserts them into the key dir.
///
/// A hint file is an authoritative index of the live records of exactly
/// one immutable segment, so entries are inserted as-is at the data
/// offset they carry — no value bytes are ever read.
fn load_hint_file(path: &Path, id: u64, key_dir: &mut KeyDir) -> Result<()> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut offset: u64 = 0;
    let mut header_buf = [0u8; HINT_HEADER_LEN];
    while offset < file_size {
        read_exact_or_corrupt(&mut reader, &mut header_buf, path, offset)?;
        let header = HintHeader::decode(&header_buf)?;

        let entry_len = HINT_HEADER_LEN as u64 + u64::from(header.key_size);
        if header.key_size == 0 || offset + entry_len > file_size {
            return Err(corruption(path, offset, "inconsistent hint entry sizes"));
        }

        let mut key = vec![0u8; header.key_size as usize];
        read_exact_or_corrupt(&mut reader, &mut key, path, offset)?;
        header
            .verify(&key)
            .map_err(|_| corruption(path, offset, "hint crc mismatch"))?;

        key_dir.insert(
            key,
            RecordPos {
                segment_id: id,
                offset: header.data_offset,
            },
        );
        offset += entry_len;
    }
    Ok(())
}

/// Scans a data file front-to-back, verifying every record's CRC and
/// applying the latest-wins / tombstone-erases rule.
fn scan_data_file(path: &Path, id: u64, key_dir: &mut KeyDir) -> Result<()> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut offset: u64 = 0;
    let mut header_buf = [0u8; HEADER_LEN];
    while offset < file_size {
        read_exact_or_corrupt(&mut reader, &mut header_buf, path, offset)?;
        let header = RecordHeader::decode(&header_buf)?;

        if header.key_size == 0 || offset + header.record_len() > file_size {
            return Err(corruption(path, offset, "inconsistent record sizes"));
        }

        let mut key = vec![0u8; header.key_size as usize];
        read_exact_or_corrupt(&mut reader, &mut key, path, offset)?;
        let mut value = vec![0u8; header.value_len()];
        if !value.is_empty() {
            read_exact_or_corrupt(&mut reader, &mut value, path, offset)?;
        }
        header
            .verify(&key, &value)
            .map_err(|_| corruption(path, offset, "crc mismatch"))?;

        if header.is_tombstone() {
            key_dir.remove(&key);
        } else {
            key_dir.insert(
                key,
                RecordPos {
                    segment_id: id,
                    offset,
                },
            );
        }
        offset += header.record_len();
    }
    Ok(())
}

fn corruption(path: &Path, offset: u64, what: &str) -> StoreError {
    StoreError::Corruption(format!("{}: {} at offset {}", path.display(), what, offset))
}

/// `read_exact` that reports a torn tail as corruption rather than a bare
/// I/O error — a directory holding a partial record does not open.
fn read_exact_or_corrupt(
    reader: &mut impl Read,
    buf: &mut [u8],
    path: &Path,
    offset: u64,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => corruption(path, offset, "truncated record"),
        _ => StoreError::Io(e),
    })
}
