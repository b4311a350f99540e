//! Line-oriented wire protocol between the driving and serving roles.
//!
//! Wire format: newline-terminated ASCII lines; block payloads are raw bytes
//! with no delimiter, their length implied by the block index.
//!
//! ```text
//! server -> driver   "<dest-path> <block-size>\n"     handshake 1
//! server -> driver   "<dest-size>\n"                  handshake 2
//! driver -> server   "<source-size>\n"
//! per block:
//! server -> driver   "<digest-hex>\n" | "-1\n"
//! driver -> server   "same\n" | "diff\n"
//! driver -> server   <raw block bytes>                only after "diff"
//! ```

use crate::error::{Result, SyncError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest line accepted from the peer. Only the handshake path line gets
/// anywhere near it.
pub const MAX_LINE_LEN: u64 = 64 * 1024;

const SAME: &str = "same";
const DIFF: &str = "diff";

/// Driver's decision for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Digests match, nothing follows.
    Same,
    /// Digests differ, the raw block follows.
    Diff,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Same => SAME,
            Verdict::Diff => DIFF,
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        match line {
            SAME => Ok(Verdict::Same),
            DIFF => Ok(Verdict::Diff),
            other => Err(SyncError::Protocol(format!(
                "expected \"same\" or \"diff\", got {:?}",
                other
            ))),
        }
    }
}

/// First handshake line: the serving role's destination path and block size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announce {
    pub path: String,
    pub block_size: u64,
}

impl Announce {
    pub fn encode(&self) -> String {
        format!("{} {}", self.path, self.block_size)
    }

    /// The block size is the last space-separated field, so paths containing
    /// spaces survive.
    pub fn decode(line: &str) -> Result<Self> {
        let (path, block_size) = line.rsplit_once(' ').ok_or_else(|| {
            SyncError::Protocol(format!("malformed handshake line: {:?}", line))
        })?;
        let block_size = block_size.parse().map_err(|_| {
            SyncError::Protocol(format!("invalid block size in handshake: {:?}", block_size))
        })?;
        Ok(Self {
            path: path.to_string(),
            block_size,
        })
    }
}

/// Parse a size line (destination or source size).
pub fn parse_size(line: &str, what: &str) -> Result<u64> {
    line.trim()
        .parse()
        .map_err(|_| SyncError::Protocol(format!("invalid {}: {:?}", what, line)))
}

/// Read one line, without its terminating newline.
///
/// End of stream before any byte means the peer went away and is reported as
/// a transport failure; a partial or oversized line is a protocol violation.
pub async fn read_line<R>(reader: &mut R, what: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 {
        return Err(SyncError::Transport(format!(
            "connection closed while waiting for {}",
            what
        )));
    }
    if buf.last() != Some(&b'\n') {
        return Err(SyncError::Protocol(if n as u64 >= MAX_LINE_LEN {
            format!("{} line exceeds {} bytes", what, MAX_LINE_LEN)
        } else {
            format!("truncated {} line", what)
        }));
    }
    buf.pop();

    String::from_utf8(buf).map_err(|_| SyncError::Protocol(format!("{} line is not UTF-8", what)))
}

/// Write one line and flush it so the peer sees it immediately.
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly `len` payload bytes.
pub async fn read_payload<R>(reader: &mut R, len: usize) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SyncError::Transport(format!(
                "connection closed during a {} byte block payload",
                len
            ))
        } else {
            SyncError::Io(e)
        }
    })?;
    Ok(buf)
}

/// Write a raw block payload and flush it.
pub async fn write_payload<W>(writer: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}
