//! Mempool sizing/TTL parameters (§4.5).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MempoolParams {
    /// Default time a pool entry may live before TTL eviction.
    pub tx_livetime: Duration,
    /// Longer TTL granted to transactions returned to the pool by a
    /// reorg rollback (§4.4 "returning formerly-confirmed txs to the
    /// pool when still valid").
    pub tx_from_alt_block_livetime: Duration,
    /// Total serialized-byte budget for the pool.
    pub max_pool_size: usize,
    /// Per-transaction byte cap (mirrors `maxTransactionSize` used by
    /// block-template assembly, §4.9).
    pub max_transaction_size: usize,
}

impl Default for MempoolParams {
    fn default() -> Self {
        Self {
            tx_livetime: Duration::from_secs(60 * 60 * 24),
            tx_from_alt_block_livetime: Duration::from_secs(60 * 60 * 24 * 7),
            max_pool_size: 100_000_000,
            max_transaction_size: 1_000_000,
        }
    }
}
