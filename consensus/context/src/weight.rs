//! The cumulative-block-size rolling window feeding the reward penalty
//! (§4.3).

use cn_helper::num::RollingMedian;

#[derive(Debug, Clone)]
pub struct BlockWeightsCache {
    sizes: RollingMedian<u64>,
}

impl BlockWeightsCache {
    pub fn new(window: usize) -> Self {
        Self {
            sizes: RollingMedian::new(window),
        }
    }

    pub fn push(&mut self, size: usize) {
        self.sizes.push(size as u64);
    }

    pub fn median(&self) -> Option<usize> {
        self.sizes.median().map(|m| m as usize)
    }
}
