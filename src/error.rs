//! Error types for block synchronization.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a sync session.
///
/// None of these are retried: a failed session has to be restarted from
/// block 0 by the caller.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Peer process unreachable or exited before the session completed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Path or block size announced by the serving role disagrees with the request.
    #[error("{field} mismatch: requested {requested}, remote host reports {remote}")]
    HandshakeMismatch {
        field: &'static str,
        requested: String,
        remote: String,
    },

    /// Open, read, write or truncate failed on a device or cache file.
    #[error("failed to {op} {}: {source}", .path.display())]
    Device {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed, truncated or out-of-sequence wire data.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// I/O error on the transport stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid invocation parameters or config file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Destination path looks like a raw device.
    #[error("device destination is not allowed: {}", .0.display())]
    DeviceDestination(PathBuf),
}

impl SyncError {
    pub(crate) fn device(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Device {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the transport stream ending early.
    ///
    /// Used to replace a bare EOF with the peer's exit status.
    pub fn is_stream_closed(&self) -> bool {
        match self {
            SyncError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe
            ),
            SyncError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_mismatch_display() {
        let err = SyncError::HandshakeMismatch {
            field: "block size",
            requested: "4096".to_string(),
            remote: "8192".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("block size mismatch"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("8192"));
    }

    #[test]
    fn test_device_error_display() {
        let err = SyncError::device(
            "open",
            "/backup/disk.img",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("failed to open /backup/disk.img"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_stream_closed_detection() {
        let eof = SyncError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(eof.is_stream_closed());

        let pipe = SyncError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(pipe.is_stream_closed());

        assert!(!SyncError::Protocol("bad line".to_string()).is_stream_closed());
    }

    #[test]
    fn test_device_destination_display() {
        let err = SyncError::DeviceDestination(PathBuf::from("/dev/sdb"));
        assert!(err.to_string().contains("/dev/sdb"));
    }
}
