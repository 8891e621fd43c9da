//! Destination file lifecycle: preallocate, positional writes, finalize.
//!
//! The engine writes into `<dest>.part` (preallocated up front, fallocate on
//! Linux when available) and renames it over the destination once every
//! segment has landed. Writes are pwrite-style so out-of-order segment
//! completion needs no locking; the byte ranges never overlap.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use thiserror::Error;

/// Filesystem failure while preparing or writing the destination.
/// Always fatal for the session; segment retries never route through here.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: io::Error,
    },
    #[error("preallocate {bytes} bytes: {source}")]
    Preallocate {
        bytes: u64,
        source: io::Error,
    },
    #[error("write {len} bytes at offset {offset}: {source}")]
    Write {
        offset: u64,
        len: usize,
        source: io::Error,
    },
    #[error("sync: {0}")]
    Sync(#[source] io::Error),
    #[error("rename {} to {}: {source}", from.display(), to.display())]
    Finalize {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Path of the working file: the destination with `.part` appended.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut p = dest.as_os_str().to_owned();
    p.push(".part");
    PathBuf::from(p)
}

/// Preallocated destination file accepting positional segment writes.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    part: PathBuf,
}

impl FileSink {
    /// Create (or truncate) `<dest>.part` and preallocate `len` bytes.
    /// On Unix tries `posix_fallocate` for real block allocation, falling
    /// back to `set_len` when the filesystem refuses.
    pub fn create_preallocated(dest: &Path, len: u64) -> Result<Self, SinkError> {
        let part = part_path(dest);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&part)
            .map_err(|source| SinkError::Create {
                path: part.clone(),
                source,
            })?;
        let sink = FileSink { file, part };
        sink.preallocate(len)?;
        Ok(sink)
    }

    fn preallocate(&self, len: u64) -> Result<(), SinkError> {
        if len == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let rc = unsafe { libc::posix_fallocate(self.file.as_raw_fd(), 0, len as libc::off_t) };
            if rc == 0 {
                return Ok(());
            }
            tracing::debug!(errno = rc, "posix_fallocate refused, using set_len");
        }
        self.file
            .set_len(len)
            .map_err(|source| SinkError::Preallocate { bytes: len, source })
    }

    /// Write `data` at `offset` without moving any file cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), SinkError> {
        self.file
            .write_all_at(data, offset)
            .map_err(|source| SinkError::Write {
                offset,
                len: data.len(),
                source,
            })
    }

    /// Seek-and-write fallback for non-Unix targets. The coordinator is the
    /// only writer there, so the shared cursor is harmless.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<(), SinkError> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))
            .and_then(|_| f.write_all(data))
            .map_err(|source| SinkError::Write {
                offset,
                len: data.len(),
                source,
            })
    }

    /// Flush file data to disk. Call before `finalize`.
    pub fn sync(&self) -> Result<(), SinkError> {
        self.file.sync_all().map_err(SinkError::Sync)
    }

    /// Working-file path (`<dest>.part`).
    pub fn part(&self) -> &Path {
        &self.part
    }

    /// Atomically rename the working file over `dest`. Consumes the sink;
    /// replaces a pre-existing destination file.
    pub fn finalize(self, dest: &Path) -> Result<(), SinkError> {
        let FileSink { file, part } = self;
        drop(file);
        std::fs::rename(&part, dest).map_err(|source| SinkError::Finalize {
            from: part,
            to: dest.to_path_buf(),
            source,
        })
    }
}
