//! # Store — Per-Shard Bitcask Engine
//!
//! One store owns one directory of append-only segment files and serves
//! `put`/`get`/`delete`/`merge` against them through an in-memory index
//! (the *key dir*).
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                    STORE                        │
//! │                                                 │
//! │ write.rs → rotate if full → append to active    │
//! │              |                                  │
//! │              v                                  │
//! │        key_dir[key] = (segment, offset)         │
//! │                                                 │
//! │ read.rs  → key_dir lookup → positional read     │
//! │            (active file or mmap of older one)   │
//! │                                                 │
//! │ merge.rs → rewrite live records → hint sidecar  │
//! │            → atomic rename → rebind readers     │
//! │                                                 │
//! │ recovery.rs → hint fast path or full CRC scan   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                            |
//! |---------------|----------------------------------------------------|
//! | `lib.rs`      | `Store` struct, open, close, accessors, `Debug`    |
//! | `error`       | The `StoreError` taxonomy                          |
//! | `write`       | `put()`, `delete()`, rotation                      |
//! | `read`        | `get()` with CRC and key re-verification           |
//! | `recovery`    | Key-dir rebuild from hint files or data scans      |
//! | `merge`       | Compaction of immutable segments + hint emission   |
//!
//! ## Concurrency
//!
//! One reader/writer lock guards the whole store: `get` takes the read
//! lock (reads run in parallel across threads), while `put`, `delete`,
//! and `merge` take the write lock and serialize. Merge holds the write
//! lock for its full duration.
//!
//! ## Durability
//!
//! `put` and `delete` return after the write hits the active file handle;
//! there is no fsync per operation. Rotation and merge fsync the segment
//! being sealed or emitted. A record that survives a crash either passes
//! its CRC (it was fully written) or fails recovery — torn records are
//! never half-applied.

mod error;
mod merge;
mod read;
mod recovery;
mod write;

pub use error::{Result, StoreError};

use parking_lot::RwLock;
use segment::SegmentReader;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Default cap on a segment's size before rotation (10 MiB). A segment
/// may exceed it by at most one record.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Location of a live record: which segment, and the byte offset of the
/// record start (byte 0 of its CRC) inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPos {
    pub segment_id: u64,
    pub offset: u64,
}

/// The in-memory index. Tombstoned and never-written keys are both simply
/// absent.
pub(crate) type KeyDir = HashMap<Vec<u8>, RecordPos>;

/// The single segment currently open for append.
pub(crate) struct ActiveSegment {
    pub(crate) file: File,
    pub(crate) id: u64,
    /// Monotone append cursor; always equals the file's size.
    pub(crate) write_offset: u64,
}

pub(crate) struct StoreInner {
    /// Rotation threshold. A variable rather than a constant — tests
    /// shrink it to force rotation and merge with tiny segments.
    pub(crate) max_file_size: u64,
    pub(crate) active: ActiveSegment,
    pub(crate) older: HashMap<u64, SegmentReader>,
    pub(crate) key_dir: KeyDir,
}

/// A Bitcask store over a single directory.
pub struct Store {
    dir: PathBuf,
    inner: RwLock<StoreInner>,
}

impl Store {
    /// Opens the store in `dir`, creating the directory if it is missing,
    /// and rebuilds the key dir from the segments found there.
    ///
    /// Segments are loaded in ascending ID order; a segment with a valid
    /// `.hint` sidecar is indexed from it without reading any values,
    /// anything else is scanned front-to-back with every record's CRC
    /// verified. The highest-numbered segment becomes the active one
    /// (created fresh as segment 0 when the directory is empty).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corruption`] if any record or hint entry
    /// fails validation — a directory containing a corrupt segment does
    /// not open.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        // An interrupted merge may have left temporaries behind.
        recovery::cleanup_merge_temps(&dir);

        let ids = recovery::list_segment_ids(&dir)?;
        let mut key_dir = KeyDir::new();
        for &id in &ids {
            recovery::load_segment(&dir, id, &mut key_dir)?;
        }

        let mut older = HashMap::new();
        let active = match ids.split_last() {
            Some((&active_id, immutable)) => {
                for &id in immutable {
                    older.insert(id, SegmentReader::open_mmap(segment::data_path(&dir, id))?);
                }
                let file = open_active_file(&segment::data_path(&dir, active_id))?;
                let write_offset = file.metadata()?.len();
                ActiveSegment {
                    file,
                    id: active_id,
                    write_offset,
                }
            }
            None => ActiveSegment {
                file: open_active_file(&segment::data_path(&dir, 0))?,
                id: 0,
                write_offset: 0,
            },
        };

        tracing::info!(
            dir = %dir.display(),
            segments = older.len() + 1,
            keys = key_dir.len(),
            "opened store"
        );

        Ok(Self {
            dir,
            inner: RwLock::new(StoreInner {
                max_file_size: DEFAULT_MAX_FILE_SIZE,
                active,
                older,
                key_dir,
            }),
        })
    }

    /// Closes the store: syncs the active segment and releases every
    /// reader. Consuming `self` makes use-after-close unrepresentable.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        inner.active.file.sync_all()?;
        Ok(())
    }

    /// Current rotation threshold in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.inner.read().max_file_size
    }

    /// Updates the rotation threshold. Useful for testing or runtime
    /// tuning; takes effect on the next append.
    pub fn set_max_file_size(&self, size: u64) {
        self.inner.write().max_file_size = size;
    }

    /// Number of segments on disk, the active one included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.read().older.len() + 1
    }

    /// Number of live keys in the key dir.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.read().key_dir.len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Store")
            .field("dir", &self.dir)
            .field("max_file_size", &inner.max_file_size)
            .field("active_segment", &inner.active.id)
            .field("write_offset", &inner.active.write_offset)
            .field("immutable_segments", &inner.older.len())
            .field("keys", &inner.key_dir.len())
            .finish()
    }
}

/// Best-effort sync on drop. Errors are ignored because `Drop` cannot
/// propagate them; every surviving record is still CRC-validated on the
/// next open.
impl Drop for StoreInner {
    fn drop(&mut self) {
        let _ = self.active.file.sync_all();
    }
}

/// Opens a segment file for appending (created if missing) while keeping
/// it readable for the positional `get` path.
pub(crate) fn open_active_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?)
}

#[cfg(test)]
mod tests;
