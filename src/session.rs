//! Per-block exchange shared by both roles.
//!
//! After the handshake, each role walks the same block indices in order and
//! resolves one block at a time:
//!
//! ```text
//! AWAIT_DIGEST -> AWAIT_VERDICT -> (AWAIT_PAYLOAD if diff) -> next block
//! ```
//!
//! Exactly one exchange is outstanding at any time, so the two sides are never
//! more than one block apart. [`run_session`] is the loop; [`BlockExchange`] is
//! implemented by the serving role ([`crate::server::BlockServer`]) and the
//! driving role ([`crate::driver::ProtocolDriver`]).

use crate::block::{Block, BlockLayout};
use crate::error::Result;
use crate::wire::Verdict;
use async_trait::async_trait;
use serde::Serialize;

/// One side of a sync session, past its handshake.
#[async_trait]
pub trait BlockExchange: Send {
    /// What the role reports once every block is resolved.
    type Outcome: Send;

    /// Geometry agreed in the handshake (source size and block size).
    fn layout(&self) -> BlockLayout;

    /// Resolve one block: exchange its digest, verdict and, on a diff, payload.
    async fn exchange_block(&mut self, block: Block) -> Result<Verdict>;

    /// Apply end-of-session reconciliation and report.
    async fn finish(self) -> Result<Self::Outcome>;
}

/// Running verdict counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockCounts {
    pub same: u64,
    pub diff: u64,
}

impl BlockCounts {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Same => self.same += 1,
            Verdict::Diff => self.diff += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.same + self.diff
    }
}

/// Drive `exchange` through every block of its layout, then finish it.
pub async fn run_session<E: BlockExchange>(mut exchange: E) -> Result<E::Outcome> {
    let layout = exchange.layout();
    for block in layout.blocks() {
        let verdict = exchange.exchange_block(block).await?;
        tracing::trace!(
            "block {}/{} at offset {}: {:?}",
            block.index + 1,
            layout.block_count(),
            block.offset,
            verdict
        );
    }
    exchange.finish().await
}
