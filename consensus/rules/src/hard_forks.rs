//! Scheduled upgrade (hard-fork) detector (§4.7, §8 invariant 7).

use cn_constants::upgrade::UpgradeParams;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HardForkError {
    #[error("block major version {found} is not permitted at height {height} (expected {expected})")]
    WrongVersion { height: u64, expected: u8, found: u8 },
}

/// One vote: `(majorVersion, minorVersion)` of a block already accepted
/// onto the chain (§4.7: "minorVersion == 1 under majorVersion == 1
/// counts as a yes vote for version 2").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub major_version: u8,
    pub minor_version: u8,
}

impl Vote {
    pub fn is_yes_for_v2(&self) -> bool {
        self.major_version == 1 && self.minor_version == 1
    }
}

/// Accumulates votes in height order and decides the V1→V2 activation
/// height (§4.7).
#[derive(Debug, Clone)]
pub struct UpgradeDetector {
    params: UpgradeParams,
    /// `(height, vote)` in increasing height order.
    votes: Vec<(u64, Vote)>,
}

impl UpgradeDetector {
    pub fn new(params: UpgradeParams) -> Self {
        Self {
            params,
            votes: Vec::new(),
        }
    }

    pub fn record_vote(&mut self, height: u64, vote: Vote) {
        self.votes.push((height, vote));
    }

    /// The height at which voting becomes "complete" (§4.7), or `None` if
    /// the window hasn't yet accumulated enough yes-votes. A non-zero
    /// `height_v2_override` short-circuits this entirely.
    pub fn voting_complete_height(&self) -> Option<u64> {
        if self.params.height_v2_override != 0 {
            return Some(
                self.params
                    .height_v2_override
                    .saturating_sub(self.params.window as u64),
            );
        }

        if self.votes.len() < self.params.min_number_voting_blocks {
            return None;
        }

        let window = &self.votes[self.votes.len().saturating_sub(self.params.voting_window)..];
        if window.len() < self.params.voting_window {
            return None;
        }

        let yes_votes = window.iter().filter(|(_, v)| v.is_yes_for_v2()).count();
        let threshold = window.len() * usize::from(self.params.voting_threshold_percent) / 100;
        if yes_votes >= threshold {
            window.last().map(|(h, _)| *h)
        } else {
            None
        }
    }

    /// The height at which V2 becomes mandatory: `Hv + upgradeWindow`
    /// (§4.7), or `None` if voting hasn't completed.
    pub fn activation_height(&self) -> Option<u64> {
        if self.params.height_v2_override != 0 {
            return Some(self.params.height_v2_override);
        }
        self.voting_complete_height()
            .map(|hv| hv + self.params.window as u64)
    }

    /// The major version mandatory at `height` (§4.7
    /// `blockMajorVersionForHeight`).
    pub fn major_version_for_height(&self, height: u64) -> u8 {
        match self.activation_height() {
            Some(activation) if height >= activation => 2,
            _ => 1,
        }
    }

    /// Validates that `major_version` is the one permitted at `height`
    /// (§4.4 step 3).
    pub fn check_version(&self, height: u64, major_version: u8) -> Result<(), HardForkError> {
        let expected = self.major_version_for_height(height);
        if major_version != expected {
            return Err(HardForkError::WrongVersion {
                height,
                expected,
                found: major_version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> UpgradeParams {
        UpgradeParams {
            voting_window: 10,
            voting_threshold_percent: 80,
            window: 5,
            min_number_voting_blocks: 10,
            height_v2_override: 0,
            height_v3_override: 0,
        }
    }

    #[test]
    fn no_votes_stays_v1() {
        let detector = UpgradeDetector::new(small_params());
        assert_eq!(detector.major_version_for_height(1_000_000), 1);
    }

    #[test]
    fn voting_completes_once_threshold_reached() {
        let mut detector = UpgradeDetector::new(small_params());
        for h in 0..10u64 {
            let vote = Vote {
                major_version: 1,
                minor_version: if h < 8 { 1 } else { 0 },
            };
            detector.record_vote(h, vote);
        }
        assert_eq!(detector.voting_complete_height(), Some(9));
        assert_eq!(detector.activation_height(), Some(9 + 5));
        assert_eq!(detector.major_version_for_height(9), 1);
        assert_eq!(detector.major_version_for_height(14), 2);
    }

    #[test]
    fn override_bypasses_voting() {
        let mut params = small_params();
        params.height_v2_override = 42;
        let detector = UpgradeDetector::new(params);
        assert_eq!(detector.activation_height(), Some(42));
        assert_eq!(detector.major_version_for_height(41), 1);
        assert_eq!(detector.major_version_for_height(42), 2);
    }

    #[test]
    fn rejects_old_version_after_activation() {
        let mut params = small_params();
        params.height_v2_override = 10;
        let detector = UpgradeDetector::new(params);
        assert!(detector.check_version(10, 2).is_ok());
        assert!(detector.check_version(10, 1).is_err());
        assert!(detector.check_version(5, 1).is_ok());
    }
}
