//! The block/transaction rejection taxonomy (§4.4 validation pipeline,
//! §7 "ConsensusViolation"). Each variant is fatal only for the offending
//! block; the chain manager never lets these escape past `add_block`.

use cn_consensus_rules::checkpoints::CheckpointError;
use cn_consensus_rules::hard_forks::HardForkError;
use cn_consensus_rules::reward::BlockRewardError;
use cn_types::{CodecError, Hash};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("malformed block bytes: {0}")]
    Codec(#[from] CodecError),
    #[error("coinbase input claims block index {found}, expected {expected}")]
    WrongBlockIndex { expected: u64, found: u32 },
    #[error("base transaction is missing its coinbase input")]
    MissingCoinbase,
    #[error(transparent)]
    HardFork(#[from] HardForkError),
    #[error("timestamp does not exceed the median of the recent window")]
    TimestampNotIncreasing,
    #[error("timestamp is too far ahead of wall-clock")]
    TimestampTooFarInFuture,
    #[error("hash does not meet the required difficulty")]
    InsufficientProofOfWork,
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("transaction {0} referenced by the block was not supplied")]
    MissingTransaction(Hash),
    #[error("transaction has no inputs or no outputs")]
    EmptyInputsOrOutputs,
    #[error("an output amount is zero")]
    ZeroOutputAmount,
    #[error("a key image repeats within one transaction")]
    DuplicateKeyImageWithinTransaction,
    #[error("a key input references an output offset that does not exist")]
    UnresolvedOutputReference,
    #[error("ring signature does not validate")]
    InvalidRingSignature,
    #[error("multisig signature set does not satisfy the required count")]
    InvalidMultisigSignature,
    #[error("referenced output has not reached its unlock time")]
    ImmatureOutput,
    #[error("multisig input term does not match the referenced output's term")]
    MultisigTermMismatch,
    #[error("deposit has not reached its unlock height")]
    ImmatureDeposit,
    #[error("transaction version is not permitted at this block's major version")]
    WrongTransactionVersion,
    #[error("a key image repeats across transactions within the block")]
    DuplicateKeyImageWithinBlock,
    #[error("key image already spent on the chain")]
    KeyImageAlreadySpent,
    #[error("multisig output already referenced on the chain")]
    MultisigReferenceAlreadySpent,
    #[error("negative transaction fee (inputs less than outputs)")]
    NegativeFee,
    #[error(transparent)]
    Reward(#[from] BlockRewardError),
    #[error("block size exceeds the configured cumulative limit")]
    BlockTooLarge,
    #[error("alternative chain failed re-validation while switching to it")]
    InvalidAltChain,
}

/// The outcome of `add_block` (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub enum AddResult {
    AddedToMain,
    AddedToAlternative,
    AddedToAlternativeAndSwitched,
    AlreadyExists,
    Orphaned,
    Rejected(BlockError),
}

impl AddResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::AddedToMain | Self::AddedToAlternative | Self::AddedToAlternativeAndSwitched | Self::AlreadyExists
        )
    }
}
