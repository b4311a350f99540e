#![allow(dead_code)]

use blocksync::{
    run_session, BlockServer, DriverConfig, HashAlgorithm, ProtocolDriver, ServerConfig,
    ServerSummary, SyncReport,
};
use std::path::Path;
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};

/// Deterministic pseudo-random bytes.
pub fn pattern(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect()
}

async fn drive(
    config: DriverConfig,
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
) -> blocksync::Result<SyncReport> {
    let driver = ProtocolDriver::handshake(config, BufReader::new(reader), writer).await?;
    run_session(driver).await
}

async fn serve(
    config: ServerConfig,
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
) -> blocksync::Result<ServerSummary> {
    let server = BlockServer::handshake(config, BufReader::new(reader), writer).await?;
    run_session(server).await
}

/// Run both roles in-process over an in-memory duplex stream.
pub async fn try_sync_with(
    source: &Path,
    dest: &Path,
    driver_block_size: u64,
    server_block_size: u64,
    algorithm: HashAlgorithm,
) -> (
    blocksync::Result<SyncReport>,
    blocksync::Result<ServerSummary>,
) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (server_read, server_write) = tokio::io::split(server_io);

    let dest_str = dest.to_string_lossy().into_owned();
    let driver_config = DriverConfig {
        source: source.to_path_buf(),
        dest: dest_str.clone(),
        block_size: driver_block_size,
        algorithm,
        show_progress: false,
    };
    let server_config = ServerConfig {
        dest: dest_str,
        block_size: server_block_size,
        algorithm,
    };

    tokio::join!(
        drive(driver_config, client_read, client_write),
        serve(server_config, server_read, server_write)
    )
}

pub async fn sync(source: &Path, dest: &Path, block_size: u64) -> (SyncReport, ServerSummary) {
    let (report, summary) =
        try_sync_with(source, dest, block_size, block_size, HashAlgorithm::Sha1).await;
    (report.unwrap(), summary.unwrap())
}
