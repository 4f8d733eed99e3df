//! Hard-coded checkpoints (§4.10).

use cn_types::Hash;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("block at height {height} does not match the checkpointed hash")]
    Mismatch { height: u64 },
    #[error("refusing to reorg away a checkpointed block at height {height}")]
    ProtectedByCheckpoint { height: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Checkpoints {
    by_height: BTreeMap<u64, Hash>,
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_checkpoint(&mut self, height: u64, hash: Hash) {
        self.by_height.insert(height, hash);
    }

    pub fn max_height(&self) -> Option<u64> {
        self.by_height.keys().next_back().copied()
    }

    /// Whether PoW may be skipped for a block at `height` (§4.4 step 5,
    /// §4.10: "PoW may be skipped for h < maxCheckpointHeight").
    pub fn allows_pow_skip(&self, height: u64) -> bool {
        matches!(self.max_height(), Some(max) if height < max)
    }

    /// Validates `hash` against any checkpoint at `height` (§4.4 step 5,
    /// §4.10).
    pub fn check(&self, height: u64, hash: &Hash) -> Result<(), CheckpointError> {
        match self.by_height.get(&height) {
            Some(expected) if expected == hash => Ok(()),
            Some(_) => Err(CheckpointError::Mismatch { height }),
            None => Ok(()),
        }
    }

    /// A reorg must not roll back past any checkpointed height (§4.10).
    /// `common_ancestor_height` is the deepest height the reorg keeps;
    /// any checkpoint above it would be detached.
    pub fn check_reorg_allowed(&self, common_ancestor_height: u64) -> Result<(), CheckpointError> {
        if let Some((&height, _)) = self.by_height.range(common_ancestor_height + 1..).next() {
            return Err(CheckpointError::ProtectedByCheckpoint { height });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_hash_passes() {
        let mut cp = Checkpoints::new();
        cp.add_checkpoint(100, Hash([1; 32]));
        assert!(cp.check(100, &Hash([1; 32])).is_ok());
        assert!(cp.check(100, &Hash([2; 32])).is_err());
        assert!(cp.check(101, &Hash([9; 32])).is_ok());
    }

    #[test]
    fn pow_skip_below_max_checkpoint() {
        let mut cp = Checkpoints::new();
        cp.add_checkpoint(100, Hash([1; 32]));
        assert!(cp.allows_pow_skip(50));
        assert!(!cp.allows_pow_skip(100));
        assert!(!cp.allows_pow_skip(101));
    }

    #[test]
    fn reorg_past_checkpoint_rejected() {
        let mut cp = Checkpoints::new();
        cp.add_checkpoint(100, Hash([1; 32]));
        assert!(cp.check_reorg_allowed(150).is_ok());
        assert!(cp.check_reorg_allowed(50).is_err());
    }
}
