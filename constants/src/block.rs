//! Block-size/reward-window parameters (§4.3, §4.4).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockParams {
    /// Window (in blocks) over which the median cumulative size is taken
    /// for the reward penalty.
    pub reward_blocks_window: usize,
    /// Floor for the median used in the penalty formula.
    pub granted_full_reward_zone: usize,
    /// Window used for the timestamp-sanity check.
    pub timestamp_check_window: usize,
    /// Max seconds a block's timestamp may be ahead of wall-clock.
    pub future_time_limit: u64,
    /// Initial cap on `maxBlockCumulativeSize`; it grows with the median.
    pub initial_max_cumulative_size: usize,
    /// Max entries buffered in the orphan-block map.
    pub orphan_buffer_capacity: usize,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            reward_blocks_window: 100,
            granted_full_reward_zone: 20_000,
            timestamp_check_window: 60,
            future_time_limit: 60 * 60 * 2,
            initial_max_cumulative_size: 100_000,
            orphan_buffer_capacity: 2048,
        }
    }
}

/// Below this, an `unlockTime`/`term` deadline is a block height; at or
/// above it, a unix timestamp (the long-standing CryptoNote convention).
pub const UNLOCK_TIME_HEIGHT_THRESHOLD: u64 = 500_000_000;

/// Whether `unlock_time` has matured given the chain's current `height`
/// and wall-clock `now` (§4.4 step 6).
pub fn is_unlocked(unlock_time: u64, height: u64, now: u64) -> bool {
    if unlock_time < UNLOCK_TIME_HEIGHT_THRESHOLD {
        height >= unlock_time
    } else {
        now >= unlock_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_compares_against_height() {
        assert!(!is_unlocked(100, 99, 0));
        assert!(is_unlocked(100, 100, 0));
    }

    #[test]
    fn at_or_above_threshold_compares_against_wall_clock() {
        let deadline = UNLOCK_TIME_HEIGHT_THRESHOLD + 10;
        assert!(!is_unlocked(deadline, 1_000_000, deadline - 1));
        assert!(is_unlocked(deadline, 1_000_000, deadline));
    }
}
