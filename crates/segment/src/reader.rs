use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Positional reader over an open file handle.
///
/// `read_at` is a thin wrapper around the OS positional read (`pread`), so
/// the reader never seeks and can be shared across threads behind `&self`.
pub struct FileReader {
    file: File,
}

impl FileReader {
    /// Opens `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Wraps an already open handle.
    pub fn from_file(file: File) -> Self {
        Self { file }
    }

    /// Reads up to `buf.len()` bytes at `offset`. Returns the number of
    /// bytes copied; 0 means end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    /// Fills `buf` exactly from `offset`, or fails with `UnexpectedEof`.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    /// Current size of the underlying file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Zero-copy reader over a shared read-only mapping of an immutable file.
///
/// The whole file is mapped at construction. An empty file yields a reader
/// with size 0 and no mapping (an empty file cannot be mapped). The
/// mapping is released when the reader drops, before the file handle
/// closes.
pub struct MmapReader {
    // Field order matters: `mmap` must drop (unmap) before `file` closes.
    mmap: Option<Mmap>,
    _file: File,
    size: u64,
}

impl MmapReader {
    /// Opens `path` and maps it read-only and shared.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        if size == 0 {
            return Ok(Self {
                mmap: None,
                _file: file,
                size: 0,
            });
        }

        // Safety: the segment is immutable once rotation or merge has
        // sealed it; no writer handle exists while the mapping is live.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Some(mmap),
            _file: file,
            size,
        })
    }

    /// Reads up to `buf.len()` bytes at `offset` out of the mapping.
    /// Returns the number of bytes copied; a short count or 0 means the
    /// read ran into the end of the file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let Some(mmap) = &self.mmap else {
            return Ok(0);
        };
        if offset >= self.size {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.size as usize - start);
        buf[..n].copy_from_slice(&mmap[start..start + n]);
        Ok(n)
    }

    /// Fills `buf` exactly from `offset`, or fails with `UnexpectedEof`.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let in_bounds = offset
            .checked_add(buf.len() as u64)
            .is_some_and(|end| end <= self.size);
        match &self.mmap {
            Some(mmap) if in_bounds => {
                let start = offset as usize;
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of mapped segment",
            )),
        }
    }

    /// Size of the mapped file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// The two concrete read paths over a segment.
///
/// The active segment is always read through the positional variant (it is
/// still being extended); immutable segments are read through the mapped
/// variant.
pub enum SegmentReader {
    File(FileReader),
    Mmap(MmapReader),
}

impl SegmentReader {
    /// Opens `path` as a positional file reader.
    pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::File(FileReader::open(path)?))
    }

    /// Opens `path` as a memory-mapped reader.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::Mmap(MmapReader::open(path)?))
    }

    /// Reads up to `buf.len()` bytes at `offset`; 0 means end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match self {
            Self::File(r) => r.read_at(buf, offset),
            Self::Mmap(r) => r.read_at(buf, offset),
        }
    }

    /// Fills `buf` exactly from `offset`, or fails with `UnexpectedEof`.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        match self {
            Self::File(r) => r.read_exact_at(buf, offset),
            Self::Mmap(r) => r.read_exact_at(buf, offset),
        }
    }

    /// Current size of the segment in bytes.
    pub fn size(&self) -> io::Result<u64> {
        match self {
            Self::File(r) => r.size(),
            Self::Mmap(r) => Ok(r.size()),
        }
    }
}
