//! Per-destination checksum cache.
//!
//! A flat, headerless file of fixed-width hex digests, one per block index in
//! ascending order. It lives next to the destination and lets the serving role
//! skip re-reading and re-hashing blocks it has already seen.
//!
//! Access is sequential: a cursor walks the entries in block order. Entries are
//! trusted as-is; a stale entry is corrected by overwriting it when the block
//! turns out to differ, never by re-hashing.
//!
//! No locking: only one session may use a destination (and its cache) at a time.

use crate::digest::{Digest, HashAlgorithm};
use crate::error::{Result, SyncError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Cache file location for a destination.
///
/// `<dest>.<block_size>.csum.cache` for SHA-1, with the algorithm name
/// inserted before `csum` for anything else so entries of different widths
/// never share a file.
pub fn cache_path(dest: &Path, block_size: u64, algorithm: HashAlgorithm) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    match algorithm {
        HashAlgorithm::Sha1 => name.push(format!(".{}.csum.cache", block_size)),
        other => name.push(format!(".{}.{}.csum.cache", block_size, other.name())),
    }
    PathBuf::from(name)
}

pub struct ChecksumCache {
    path: PathBuf,
    file: File,
    algorithm: HashAlgorithm,
    /// Whole entries present when the cache was opened.
    entry_count: u64,
    /// Byte position of the cursor.
    cursor: u64,
}

impl ChecksumCache {
    /// Open the cache at `path`, creating an empty one if absent.
    pub async fn open_or_create(path: &Path, algorithm: HashAlgorithm) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .await
            .map_err(|e| SyncError::device("open cache", path, e))?;

        let len = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| SyncError::device("seek cache", path, e))?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| SyncError::device("seek cache", path, e))?;

        let entry_count = len / algorithm.hex_width() as u64;
        tracing::debug!(
            "Opened checksum cache {} ({} entries)",
            path.display(),
            entry_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            algorithm,
            entry_count,
            cursor: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole entries the cache held when opened.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Entry index the cursor currently points at.
    pub fn position(&self) -> u64 {
        self.cursor / self.width()
    }

    fn width(&self) -> u64 {
        self.algorithm.hex_width() as u64
    }

    /// Read the entry at the cursor and advance by one entry.
    ///
    /// Returns `Ok(None)` when the stored bytes are not a valid digest, so the
    /// caller can treat the block as unknown and let the entry be overwritten.
    pub async fn next_entry(&mut self) -> Result<Option<Digest>> {
        let width = self.algorithm.hex_width();
        let mut buf = vec![0u8; width];

        self.file
            .seek(SeekFrom::Start(self.cursor))
            .await
            .map_err(|e| SyncError::device("seek cache", &self.path, e))?;
        self.file
            .read_exact(&mut buf)
            .await
            .map_err(|e| SyncError::device("read cache", &self.path, e))?;
        self.cursor += width as u64;

        Ok(std::str::from_utf8(&buf)
            .ok()
            .and_then(|text| self.algorithm.parse_hex(text)))
    }

    /// Rewind one entry and rewrite it, leaving the cursor after it.
    pub async fn overwrite_last_entry(&mut self, digest: &Digest) -> Result<()> {
        if self.cursor < self.width() {
            return Err(SyncError::Protocol(
                "checksum cache overwrite before any entry was read".to_string(),
            ));
        }
        self.cursor -= self.width();
        self.write_at_cursor(digest).await
    }

    /// Write an entry at the cursor and advance.
    pub async fn append_entry(&mut self, digest: &Digest) -> Result<()> {
        self.write_at_cursor(digest).await
    }

    async fn write_at_cursor(&mut self, digest: &Digest) -> Result<()> {
        let hex = digest.to_hex();
        debug_assert_eq!(hex.len(), self.algorithm.hex_width());

        self.file
            .seek(SeekFrom::Start(self.cursor))
            .await
            .map_err(|e| SyncError::device("seek cache", &self.path, e))?;
        self.file
            .write_all(hex.as_bytes())
            .await
            .map_err(|e| SyncError::device("write cache", &self.path, e))?;
        self.cursor += hex.len() as u64;
        Ok(())
    }

    /// Truncate the file at the cursor, dropping entries left over from a
    /// longer previous session, and flush it to disk.
    pub async fn finalize(mut self) -> Result<u64> {
        self.file
            .flush()
            .await
            .map_err(|e| SyncError::device("flush cache", &self.path, e))?;
        self.file
            .set_len(self.cursor)
            .await
            .map_err(|e| SyncError::device("truncate cache", &self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| SyncError::device("sync cache", &self.path, e))?;
        Ok(self.position())
    }
}
