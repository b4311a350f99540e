//! Device accessor: random-access reads and writes on a block device or file.
//!
//! Both roles use it. Every failure is wrapped as [`SyncError::Device`] with
//! the path and the operation that failed.

use crate::block::Block;
use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// How a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only. The path must exist.
    Read,
    /// Read-write. The path is created empty if absent.
    ReadWrite,
}

/// An open device with a known current size.
pub struct BlockDevice {
    path: PathBuf,
    file: File,
    size: u64,
}

impl BlockDevice {
    pub async fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if mode == OpenMode::ReadWrite {
            options.write(true).create(true);
        }

        let mut file = options
            .open(path)
            .await
            .map_err(|e| SyncError::device("open", path, e))?;

        // Block devices report a metadata length of 0, seeking finds the real end.
        let size = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| SyncError::device("seek", path, e))?;
        file.seek(SeekFrom::Start(0))
            .await
            .map_err(|e| SyncError::device("seek", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read up to `len` bytes at `offset`. Returns fewer bytes at end of device.
    pub async fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| SyncError::device("seek", &self.path, e))?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|e| SyncError::device("read", &self.path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    pub async fn read_block(&mut self, block: Block) -> Result<Vec<u8>> {
        self.read_at(block.offset, block.len).await
    }

    pub async fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| SyncError::device("seek", &self.path, e))?;
        self.file
            .write_all(data)
            .await
            .map_err(|e| SyncError::device("write", &self.path, e))?;
        self.size = self.size.max(offset + data.len() as u64);
        Ok(())
    }

    /// Shrink or extend the device to exactly `new_size` bytes.
    pub async fn truncate(&mut self, new_size: u64) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| SyncError::device("flush", &self.path, e))?;
        self.file
            .set_len(new_size)
            .await
            .map_err(|e| SyncError::device("truncate", &self.path, e))?;
        self.size = new_size;
        Ok(())
    }

    /// Flush pending writes to stable storage.
    pub async fn sync(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| SyncError::device("flush", &self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| SyncError::device("sync", &self.path, e))
    }
}
