//! A service that caches the rolling chain state contextual validation
//! needs (§4.4 step 4/5/9): recent timestamps/cumulative-difficulties for
//! the retarget, the cumulative-size window for the reward penalty, and
//! the upgrade-vote window. It does not hold outputs or transactions —
//! for those the chain manager (`cn-blockchain`) goes to its own storage.
//!
//! Served as a [`tower::Service`] (see [`task`]) so the chain manager's
//! validation pipeline never shares this state by reference across
//! `.await` points (§5 "no user-visible locks").

pub mod task;
pub mod weight;

use cn_constants::Currency;
use cn_consensus_rules::checkpoints::Checkpoints;
use cn_consensus_rules::difficulty;
use cn_consensus_rules::hard_forks::{UpgradeDetector, Vote};
use cn_consensus_rules::reward;
use cn_helper::num::RollingMedian;
use weight::BlockWeightsCache;

pub use task::{ContextRequest, ContextResponse, ContextService};

/// The cached context for validating the *next* block to be appended
/// (§4.4 step 4/5/9, §4.2, §4.3, §4.7).
#[derive(Debug, Clone)]
pub struct BlockchainContext {
    pub currency: Currency,
    pub top_height: u64,
    pub already_generated_coins: u64,
    pub cumulative_difficulty: u128,

    timestamps: RollingMedian<u64>,
    difficulties: Vec<u128>,
    weights: BlockWeightsCache,
    upgrade: UpgradeDetector,
    checkpoints: Checkpoints,
}

impl BlockchainContext {
    pub fn new(currency: Currency) -> Self {
        let window = currency.difficulty.window_v2.max(currency.difficulty.window_v1);
        Self {
            upgrade: UpgradeDetector::new(currency.upgrade),
            timestamps: RollingMedian::new(window),
            difficulties: Vec::new(),
            weights: BlockWeightsCache::new(currency.block.reward_blocks_window),
            checkpoints: Checkpoints::new(),
            currency,
            top_height: 0,
            already_generated_coins: 0,
            cumulative_difficulty: 0,
        }
    }

    pub fn add_checkpoint(&mut self, height: u64, hash: cn_types::Hash) {
        self.checkpoints.add_checkpoint(height, hash);
    }

    pub fn checkpoints(&self) -> &Checkpoints {
        &self.checkpoints
    }

    /// Called once a block is accepted onto the main chain (§4.4
    /// "Main-chain append").
    pub fn push_block(
        &mut self,
        height: u64,
        timestamp: u64,
        cumulative_difficulty: u128,
        block_size: usize,
        generated_coins: u64,
        major_version: u8,
        minor_version: u8,
    ) {
        self.top_height = height;
        self.cumulative_difficulty = cumulative_difficulty;
        self.already_generated_coins = self.already_generated_coins.saturating_add(generated_coins);
        self.timestamps.push(timestamp);
        self.difficulties.push(cumulative_difficulty);
        self.weights.push(block_size);
        self.upgrade.record_vote(
            height,
            Vote {
                major_version,
                minor_version,
            },
        );
    }

    /// Reverses [`Self::push_block`] during a reorg rollback (§4.4
    /// "Alternative chain" switch). Callers rebuild the window from
    /// scratch rather than try to pop a rolling median in place; this is
    /// only called along the (rare) rollback path.
    pub fn rebuild_from(&mut self, entries: &[RollbackEntry]) {
        self.timestamps = RollingMedian::new(
            self.currency
                .difficulty
                .window_v2
                .max(self.currency.difficulty.window_v1),
        );
        self.difficulties.clear();
        self.weights = BlockWeightsCache::new(self.currency.block.reward_blocks_window);
        self.upgrade = UpgradeDetector::new(self.currency.upgrade);
        self.already_generated_coins = 0;
        self.cumulative_difficulty = 0;
        self.top_height = 0;
        for entry in entries {
            self.push_block(
                entry.height,
                entry.timestamp,
                entry.cumulative_difficulty,
                entry.block_size,
                entry.generated_coins,
                entry.major_version,
                entry.minor_version,
            );
        }
    }

    pub fn major_version_for_next_height(&self) -> u8 {
        self.upgrade.major_version_for_height(self.top_height + 1)
    }

    /// Validates a candidate block's major version against the upgrade
    /// schedule (§4.4 step 3).
    pub fn check_version(
        &self,
        height: u64,
        major_version: u8,
    ) -> Result<(), cn_consensus_rules::hard_forks::HardForkError> {
        self.upgrade.check_version(height, major_version)
    }

    /// The median timestamp a candidate's timestamp must exceed (§4.4
    /// step 4), or `None` before the window has enough history to judge.
    pub fn timestamp_check_median(&self) -> Option<u64> {
        let window = self.currency.block.timestamp_check_window;
        let all = self.timestamps.clone_into_vec();
        if all.is_empty() {
            return None;
        }
        let tail_len = all.len().min(window);
        let tail = &all[all.len() - tail_len..];
        let mut sorted = tail.to_vec();
        sorted.sort_unstable();
        Some(cn_helper::num::median(&sorted))
    }

    pub fn next_difficulty(&self) -> u128 {
        let major_version = self.major_version_for_next_height();
        let (window, cut, target) = self
            .currency
            .difficulty_params_for_major_version(major_version);
        let timestamps: Vec<u64> = self.timestamps.clone_into_vec();
        let tail_len = timestamps.len().min(window).min(self.difficulties.len());
        let difficulties = &self.difficulties[self.difficulties.len() - tail_len..];
        let timestamps = &timestamps[timestamps.len() - tail_len..];
        difficulty::next_difficulty(timestamps, difficulties, window, cut, target)
    }

    pub fn median_block_size(&self) -> usize {
        self.weights
            .median()
            .unwrap_or(self.currency.block.granted_full_reward_zone)
            .max(self.currency.block.granted_full_reward_zone)
    }

    /// §4.3: computes and validates the coinbase sum for a candidate
    /// block, returning the effective reward on success.
    pub fn validate_coinbase_sum(
        &self,
        coinbase_output_sum: u64,
        block_size: usize,
        fees: u64,
    ) -> Result<u64, reward::BlockRewardError> {
        reward::validate_coinbase_sum(
            coinbase_output_sum,
            self.already_generated_coins,
            block_size,
            self.median_block_size(),
            fees,
            &self.currency.money,
        )
    }

    pub fn base_reward(&self) -> u64 {
        reward::base_reward(self.already_generated_coins, &self.currency.money)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RollbackEntry {
    pub height: u64,
    pub timestamp: u64,
    pub cumulative_difficulty: u128,
    pub block_size: usize,
    pub generated_coins: u64,
    pub major_version: u8,
    pub minor_version: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushing_blocks_advances_height_and_coins() {
        let mut ctx = BlockchainContext::new(Currency::mainnet());
        ctx.push_block(1, 1000, 10, 500, 1000, 1, 0);
        assert_eq!(ctx.top_height, 1);
        assert_eq!(ctx.already_generated_coins, 1000);
        assert_eq!(ctx.cumulative_difficulty, 10);
    }

    #[test]
    fn rebuild_reproduces_same_state_as_incremental_pushes() {
        let mut incremental = BlockchainContext::new(Currency::mainnet());
        let mut entries = Vec::new();
        for h in 1..20u64 {
            incremental.push_block(h, h * 120, u128::from(h), 1000, 500, 1, 0);
            entries.push(RollbackEntry {
                height: h,
                timestamp: h * 120,
                cumulative_difficulty: u128::from(h),
                block_size: 1000,
                generated_coins: 500,
                major_version: 1,
                minor_version: 0,
            });
        }

        let mut rebuilt = BlockchainContext::new(Currency::mainnet());
        rebuilt.rebuild_from(&entries);

        assert_eq!(rebuilt.top_height, incremental.top_height);
        assert_eq!(rebuilt.already_generated_coins, incremental.already_generated_coins);
        assert_eq!(rebuilt.median_block_size(), incremental.median_block_size());
    }
}
