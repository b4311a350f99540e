//! # blocksync
//!
//! Mirror a block device or image file to a remote counterpart over a slow or
//! untrusted link, sending only the blocks whose content changed.
//!
//! Both sides hash fixed-size blocks independently and compare digests in
//! lockstep, one block at a time. The destination keeps a checksum cache next
//! to the mirror so unchanged blocks need not be re-read on later runs.
//!
//! ```text
//! driver (source side)                      server (destination side)
//!                       <- "<path> <block size>"
//!                       <- "<dest size>"
//!   "<source size>"     ->
//!                       <- "<digest>" | "-1"          per block
//!   "same" | "diff"     ->
//!   <raw block>         ->                            after "diff" only
//! ```
//!
//! Only one session may use a destination at a time; nothing here locks it.

pub mod block;
pub mod cache;
pub mod cli;
pub mod config;
pub mod device;
pub mod digest;
pub mod driver;
pub mod error;
pub mod logging;
pub mod progress;
pub mod server;
pub mod session;
pub mod sync;
pub mod transport;
pub mod wire;

pub use block::{Block, BlockLayout};
pub use cache::{cache_path, ChecksumCache};
pub use config::SyncConfig;
pub use device::{BlockDevice, OpenMode};
pub use digest::{Digest, HashAlgorithm, RemoteDigest};
pub use driver::{check_destination, DriverConfig, ProtocolDriver, SyncReport};
pub use error::{Result, SyncError};
pub use server::{BlockServer, ServerConfig, ServerSummary};
pub use session::{run_session, BlockCounts, BlockExchange};
pub use sync::{sync_push, PushRequest};
pub use transport::Endpoint;
