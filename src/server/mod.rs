//! Server mode - runs when invoked as `blocksync --server <dest>`
//!
//! The serving role owns the destination device and its checksum cache for
//! the whole session. It reports a digest for every block the driver asks
//! about and applies the blocks the driver sends back.
//!
//! stdout carries the wire protocol, so nothing else may be printed there.

use crate::block::{Block, BlockLayout};
use crate::cache::{cache_path, ChecksumCache};
use crate::device::{BlockDevice, OpenMode};
use crate::digest::{HashAlgorithm, RemoteDigest};
use crate::error::{Result, SyncError};
use crate::session::{run_session, BlockCounts, BlockExchange};
use crate::wire::{self, Announce, Verdict};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};

/// Expand tilde (~) in paths to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            home.join(rest)
        } else {
            path.to_path_buf()
        }
    } else {
        path.to_path_buf()
    }
}

/// Invocation parameters of the serving role.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Destination path exactly as given; echoed back in the handshake.
    pub dest: String,
    pub block_size: u64,
    pub algorithm: HashAlgorithm,
}

/// What the serving role did during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSummary {
    pub counts: BlockCounts,
    /// Digests taken from the cache instead of the device.
    pub cache_hits: u64,
    /// Cache entries left after finalization.
    pub cache_entries: u64,
    pub dest_size: u64,
}

/// Serving side of a session, past its handshake.
pub struct BlockServer<R, W> {
    reader: R,
    writer: W,
    algorithm: HashAlgorithm,
    device: BlockDevice,
    cache: ChecksumCache,
    /// Cache entries that existed when the session started.
    cached_blocks: u64,
    layout: BlockLayout,
    counts: BlockCounts,
    cache_hits: u64,
}

impl<R, W> BlockServer<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Announce path and block size, open the destination, report its size and
    /// learn the source size from the driver.
    pub async fn handshake(config: ServerConfig, mut reader: R, mut writer: W) -> Result<Self> {
        if config.block_size == 0 {
            return Err(SyncError::Config("block size must be greater than 0".to_string()));
        }

        let announce = Announce {
            path: config.dest.clone(),
            block_size: config.block_size,
        };
        wire::write_line(&mut writer, &announce.encode()).await?;

        let dest_path = expand_tilde(Path::new(&config.dest));
        let device = BlockDevice::open(&dest_path, OpenMode::ReadWrite).await?;
        wire::write_line(&mut writer, &device.size().to_string()).await?;

        let line = wire::read_line(&mut reader, "source size").await?;
        let source_size = wire::parse_size(&line, "source size")?;
        let layout = BlockLayout::new(source_size, config.block_size);

        let cache_file = cache_path(&dest_path, config.block_size, config.algorithm);
        let cache = ChecksumCache::open_or_create(&cache_file, config.algorithm).await?;
        let cached_blocks = cache.entry_count();

        tracing::info!(
            "Serving {} ({} bytes) for a {} byte source: {} blocks, {} cached",
            dest_path.display(),
            device.size(),
            source_size,
            layout.block_count(),
            cached_blocks
        );

        Ok(Self {
            reader,
            writer,
            algorithm: config.algorithm,
            device,
            cache,
            cached_blocks,
            layout,
            counts: BlockCounts::default(),
            cache_hits: 0,
        })
    }

    /// Digest for `block`: trusted from the cache when it covers the index,
    /// otherwise hashed from the device, or the sentinel past the device end.
    async fn block_digest(&mut self, block: Block, using_cache: bool) -> Result<RemoteDigest> {
        if using_cache {
            return match self.cache.next_entry().await? {
                Some(digest) => {
                    self.cache_hits += 1;
                    Ok(RemoteDigest::Present(digest))
                }
                None => {
                    tracing::warn!(
                        "Corrupt entry {} in {}, treating block as missing",
                        block.index,
                        self.cache.path().display()
                    );
                    Ok(RemoteDigest::Missing)
                }
            };
        }

        if block.offset >= self.device.size() {
            return Ok(RemoteDigest::Missing);
        }
        let data = self.device.read_block(block).await?;
        Ok(RemoteDigest::Present(self.algorithm.digest(&data)))
    }
}

#[async_trait]
impl<R, W> BlockExchange for BlockServer<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type Outcome = ServerSummary;

    fn layout(&self) -> BlockLayout {
        self.layout
    }

    async fn exchange_block(&mut self, block: Block) -> Result<Verdict> {
        let using_cache = block.index < self.cached_blocks;
        let remote = self.block_digest(block, using_cache).await?;
        wire::write_line(&mut self.writer, &remote.encode()).await?;

        let line = wire::read_line(&mut self.reader, "verdict").await?;
        let verdict = Verdict::parse(&line)?;

        match (verdict, remote) {
            (Verdict::Diff, _) => {
                let data = wire::read_payload(&mut self.reader, block.len).await?;
                self.device.write_at(block.offset, &data).await?;

                let digest = self.algorithm.digest(&data);
                if using_cache {
                    self.cache.overwrite_last_entry(&digest).await?;
                } else {
                    self.cache.append_entry(&digest).await?;
                }
            }
            (Verdict::Same, RemoteDigest::Present(digest)) => {
                if !using_cache {
                    self.cache.append_entry(&digest).await?;
                }
            }
            (Verdict::Same, RemoteDigest::Missing) => {
                return Err(SyncError::Protocol(format!(
                    "driver answered \"same\" for missing block {}",
                    block.index
                )));
            }
        }

        self.counts.record(verdict);
        Ok(verdict)
    }

    async fn finish(mut self) -> Result<ServerSummary> {
        let source_size = self.layout.size();
        if self.device.size() != source_size {
            tracing::debug!(
                "Resizing {} from {} to {} bytes",
                self.device.path().display(),
                self.device.size(),
                source_size
            );
            self.device.truncate(source_size).await?;
        }
        self.device.sync().await?;

        let cache_entries = self.cache.finalize().await?;

        let summary = ServerSummary {
            counts: self.counts,
            cache_hits: self.cache_hits,
            cache_entries,
            dest_size: self.device.size(),
        };
        tracing::info!(
            "Server done: same {}, diff {}, cache hits {}, cache entries {}",
            summary.counts.same,
            summary.counts.diff,
            summary.cache_hits,
            summary.cache_entries
        );
        Ok(summary)
    }
}

/// Main server entry point: serve one session over stdin/stdout.
pub async fn run_server(config: ServerConfig) -> Result<ServerSummary> {
    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();

    let server = BlockServer::handshake(config, stdin, stdout).await?;
    run_session(server).await
}
