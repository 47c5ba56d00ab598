//! # Segment — Data Files and Readers
//!
//! A store directory holds a sequence of append-only segment files named
//! `<ID>.data`, where ID is a non-negative integer without zero-padding,
//! plus optional `<ID>.hint` sidecars emitted by merge. Exactly one
//! segment per store is *active* (appended to); all others are immutable.
//!
//! This crate provides the path/naming helpers and the two read paths the
//! store dispatches between:
//!
//! - [`FileReader`] — positional reads through an open file handle; used
//!   for the active segment, which is still being extended.
//! - [`MmapReader`] — a shared read-only mapping of the whole file; used
//!   for immutable segments, where reads dominate and the zero-copy path
//!   pays off.
//!
//! [`SegmentReader`] is the closed dispatch over the two.

mod reader;

pub use reader::{FileReader, MmapReader, SegmentReader};

use std::path::{Path, PathBuf};

/// File extension of data segments.
pub const DATA_EXT: &str = "data";

/// File extension of hint sidecars.
pub const HINT_EXT: &str = "hint";

/// Path of the data file for segment `id` inside `dir`.
pub fn data_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}.{}", id, DATA_EXT))
}

/// Path of the hint sidecar for segment `id` inside `dir`.
pub fn hint_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}.{}", id, HINT_EXT))
}

/// Parses a directory-entry name of the form `<integer>.data` into its
/// segment ID. Returns `None` for anything else, including hint files and
/// the temporary `merge.data` file.
pub fn parse_data_file_id(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".data")?;
    stem.parse().ok()
}
