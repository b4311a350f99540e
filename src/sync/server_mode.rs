//! Server mode sync - drives a spawned serving role over its stdin/stdout.
//!
//! Supports both SSH (remote) and local subprocess for testing.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::config::SyncConfig;
use crate::driver::{check_destination, DriverConfig, ProtocolDriver, SyncReport};
use crate::error::{Result, SyncError};
use crate::session::run_session;
use crate::transport::{Endpoint, RemoteCommand, ServerSession};

/// How long to wait for the serving role's exit status once the session has
/// already failed.
const FAILED_EXIT_WAIT: Duration = Duration::from_secs(10);

/// One push from a local source to a serving role.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub source: PathBuf,
    pub endpoint: Endpoint,
    pub dest: String,
    pub show_progress: bool,
}

/// Sync from local source to remote destination (push)
pub async fn sync_push(request: &PushRequest, config: &SyncConfig) -> Result<SyncReport> {
    check_destination(&request.dest)?;

    let remote = RemoteCommand {
        program: config.remote_program.clone(),
        dest: request.dest.clone(),
        block_size: config.block_size,
        algorithm: config.hash,
    };

    let session = match &request.endpoint {
        Endpoint::Ssh { host, user, port } => {
            ServerSession::connect_ssh(
                &config.ssh_program,
                &config.ssh_args,
                host,
                user.as_deref(),
                *port,
                &remote,
            )
            .await
        }
        Endpoint::Local => ServerSession::connect_local(&remote).await,
    }
    .map_err(|e| SyncError::Transport(format!("{:#}", e)))?;

    tracing::info!("Running: {}", session.command_line());

    let (stdin, stdout, mut child) = session.split();

    let driver_config = DriverConfig {
        source: request.source.clone(),
        dest: request.dest.clone(),
        block_size: config.block_size,
        algorithm: config.hash,
        show_progress: request.show_progress,
    };

    // The driver owns the child's stdin and drops it before we wait, so the
    // serving role sees end of input.
    let result = drive(driver_config, stdin, stdout).await;

    match result {
        // The serving role resizes, syncs and finalizes its cache after the
        // last block; it must not be cut short.
        Ok(report) => match child.wait().await {
            Ok(status) if status.success() => Ok(report),
            Ok(status) => Err(SyncError::Transport(format!(
                "remote side failed after the last block ({})",
                status
            ))),
            Err(e) => Err(SyncError::Transport(format!(
                "failed to wait for remote process: {}",
                e
            ))),
        },
        Err(e) if e.is_stream_closed() => {
            let status = wait_for_failed_exit(&mut child)
                .await
                .map(|s| s.to_string())
                .unwrap_or_else(|| "still running".to_string());
            Err(SyncError::Transport(format!(
                "remote side terminated ({}): {}",
                status, e
            )))
        }
        Err(e) => {
            let _ = child.start_kill();
            Err(e)
        }
    }
}

async fn drive(config: DriverConfig, stdin: ChildStdin, stdout: ChildStdout) -> Result<SyncReport> {
    let driver = ProtocolDriver::handshake(config, BufReader::new(stdout), stdin).await?;
    run_session(driver).await
}

async fn wait_for_failed_exit(child: &mut Child) -> Option<ExitStatus> {
    match tokio::time::timeout(FAILED_EXIT_WAIT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!("Failed to wait for remote process: {}", e);
            None
        }
        Err(_) => {
            let _ = child.start_kill();
            None
        }
    }
}
