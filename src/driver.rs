//! Driving role.
//!
//! Walks the source block by block, compares each block's digest with the one
//! the serving role reports for the same index and ships the block when they
//! differ.

use crate::block::{Block, BlockLayout};
use crate::device::{BlockDevice, OpenMode};
use crate::digest::{HashAlgorithm, RemoteDigest};
use crate::error::{Result, SyncError};
use crate::progress::ProgressReporter;
use crate::session::{BlockCounts, BlockExchange};
use crate::wire::{self, Announce, Verdict};
use async_trait::async_trait;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncWrite};

/// Refuse destinations that look like raw device paths.
pub fn check_destination(dest: &str) -> Result<()> {
    if dest.trim().starts_with("/dev") {
        return Err(SyncError::DeviceDestination(PathBuf::from(dest)));
    }
    Ok(())
}

/// What the driving role asks for.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub source: PathBuf,
    /// Destination path as the serving role must announce it.
    pub dest: String,
    pub block_size: u64,
    pub algorithm: HashAlgorithm,
    pub show_progress: bool,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub same_blocks: u64,
    pub diff_blocks: u64,
    pub block_count: u64,
    pub source_size: u64,
    /// Destination size announced before the session; informational only.
    pub remote_size: u64,
    /// Block payload bytes sent to the serving role.
    pub bytes_sent: u64,
    pub elapsed_secs: f64,
}

/// Driving side of a session, past its handshake.
pub struct ProtocolDriver<R, W> {
    reader: R,
    writer: W,
    algorithm: HashAlgorithm,
    source: BlockDevice,
    layout: BlockLayout,
    remote_size: u64,
    counts: BlockCounts,
    bytes_processed: u64,
    bytes_sent: u64,
    progress: ProgressReporter,
}

impl<R, W> ProtocolDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Check the serving role's announcement, open the source and send its size.
    ///
    /// The announced destination size is recorded but never checked; the
    /// destination is resized to the source at the end of the session.
    pub async fn handshake(config: DriverConfig, mut reader: R, mut writer: W) -> Result<Self> {
        let line = wire::read_line(&mut reader, "handshake").await?;
        let announce = Announce::decode(&line)?;
        if announce.path != config.dest {
            return Err(SyncError::HandshakeMismatch {
                field: "destination path",
                requested: config.dest,
                remote: announce.path,
            });
        }
        if announce.block_size != config.block_size {
            return Err(SyncError::HandshakeMismatch {
                field: "block size",
                requested: config.block_size.to_string(),
                remote: announce.block_size.to_string(),
            });
        }

        let source = BlockDevice::open(&config.source, OpenMode::Read).await?;

        let line = wire::read_line(&mut reader, "destination size").await?;
        let remote_size = wire::parse_size(&line, "destination size")?;

        wire::write_line(&mut writer, &source.size().to_string()).await?;

        let layout = BlockLayout::new(source.size(), config.block_size);
        tracing::info!(
            "Starting sync: {} ({} bytes, {} blocks) -> {} ({} bytes)",
            config.source.display(),
            source.size(),
            layout.block_count(),
            config.dest,
            remote_size
        );

        Ok(Self {
            reader,
            writer,
            algorithm: config.algorithm,
            source,
            layout,
            remote_size,
            counts: BlockCounts::default(),
            bytes_processed: 0,
            bytes_sent: 0,
            progress: ProgressReporter::new(layout.block_count(), config.show_progress),
        })
    }
}

#[async_trait]
impl<R, W> BlockExchange for ProtocolDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type Outcome = SyncReport;

    fn layout(&self) -> BlockLayout {
        self.layout
    }

    async fn exchange_block(&mut self, block: Block) -> Result<Verdict> {
        let data = self.source.read_block(block).await?;
        if data.len() != block.len {
            // Only a source that shrank mid-session reads short here.
            return Err(SyncError::device(
                "read",
                self.source.path(),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "block {} is {} bytes, expected {}",
                        block.index,
                        data.len(),
                        block.len
                    ),
                ),
            ));
        }
        let local = self.algorithm.digest(&data);

        let line = wire::read_line(&mut self.reader, "block digest").await?;
        let remote = RemoteDigest::decode(&line, self.algorithm).ok_or_else(|| {
            SyncError::Protocol(format!(
                "invalid {} digest for block {}: {:?}",
                self.algorithm, block.index, line
            ))
        })?;

        let verdict = if remote.matches(&local) {
            Verdict::Same
        } else {
            Verdict::Diff
        };
        tracing::debug!("block {}: {:?}", block.index, verdict);

        wire::write_line(&mut self.writer, verdict.as_str()).await?;
        if verdict == Verdict::Diff {
            wire::write_payload(&mut self.writer, &data).await?;
            self.bytes_sent += data.len() as u64;
        }

        self.counts.record(verdict);
        self.bytes_processed += data.len() as u64;
        self.progress.update(self.counts, self.bytes_processed);
        Ok(verdict)
    }

    async fn finish(self) -> Result<SyncReport> {
        self.progress.finish();
        let elapsed = self.progress.elapsed();
        tracing::info!("Completed in {} seconds", elapsed.as_secs());

        Ok(SyncReport {
            same_blocks: self.counts.same,
            diff_blocks: self.counts.diff,
            block_count: self.layout.block_count(),
            source_size: self.layout.size(),
            remote_size: self.remote_size,
            bytes_sent: self.bytes_sent,
            elapsed_secs: elapsed.as_secs_f64(),
        })
    }
}
