//! Hard-fork / upgrade-voting parameters (§4.7).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeParams {
    /// Sliding window (in blocks) over which minor-version votes are
    /// counted.
    pub voting_window: usize,
    /// Percentage of the window that must vote yes for "voting complete".
    pub voting_threshold_percent: u8,
    /// Blocks between voting-complete and mandatory activation.
    pub window: usize,
    /// Minimum blocks of the current major version that must exist before
    /// votes are even considered (avoids flipping on a near-empty chain).
    pub min_number_voting_blocks: usize,
    /// `0` means "derive from voting"; non-zero hard-codes the activation
    /// height, bypassing voting entirely.
    pub height_v2_override: u64,
    pub height_v3_override: u64,
}

impl Default for UpgradeParams {
    fn default() -> Self {
        Self {
            voting_window: 10_080,
            voting_threshold_percent: 90,
            window: 10_080,
            min_number_voting_blocks: 10_080 * 90 / 100,
            height_v2_override: 0,
            height_v3_override: 0,
        }
    }
}
