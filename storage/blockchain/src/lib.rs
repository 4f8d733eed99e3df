//! The chain manager (§4.4): main-chain storage, alternative chains,
//! orphan buffering, the validation pipeline, reorg/switch, and the
//! output/spent-set indexes transactions validate against.

pub mod error;
pub mod hasher;
pub mod manager;
pub mod outputs;
pub mod service;

pub use error::{AddResult, BlockError};
pub use hasher::{hash_meets_difficulty, Hasher, SignatureVerifier};
pub use manager::{AltChainNode, BlockchainManager, ChainCacheNode, PoolSubmitError};
pub use outputs::{KeyOutputRecord, MultisigOutputRecord, OutputIndex};
pub use service::{ChainInfo, ChainRequest, ChainResponse, ChainService};
