//! Pure, stateless consensus rule functions (§4.2, §4.3, §4.7, §4.10): no
//! I/O, no chain state beyond what's passed in, so the chain manager
//! (`cn-blockchain`) can unit-test each rule in isolation and call them
//! from inside its own validation pipeline (§4.4).

pub mod checkpoints;
pub mod difficulty;
pub mod hard_forks;
pub mod reward;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    #[error("block error: {0}")]
    Block(#[from] reward::BlockRewardError),
    #[error("hard-fork error: {0}")]
    HardFork(#[from] hard_forks::HardForkError),
}
