//! Request/response field types for the daemon's JSON-RPC surface (§6).
//!
//! Base58 address decoding is out of scope (§1 Non-goals), so
//! [`GetBlockTemplateRequest::wallet_address`] is a hex-encoded spend
//! public key rather than a real Monero address string.

use cn_types::Hash;
use serde::{Deserialize, Serialize};

fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash.as_bytes())
}

/// `status` field every Monero-style RPC response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Failed,
}

// ---------------------------------------------------------------- get_info

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInfoRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetInfoResponse {
    pub status: Status,
    pub height: u64,
    pub target_height: u64,
    pub difficulty: String,
    pub tx_count: u64,
    pub tx_pool_size: u64,
    pub top_block_hash: String,
    pub major_version: u8,
}

// -------------------------------------------------------------- get_height

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeightRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetHeightResponse {
    pub status: Status,
    pub height: u64,
    pub hash: String,
}

impl GetHeightResponse {
    pub fn new(height: u64, top_hash: Hash) -> Self {
        Self {
            status: Status::Ok,
            height,
            hash: hash_hex(&top_hash),
        }
    }
}

// --------------------------------------------------------- get_block_template

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockTemplateRequest {
    /// Hex-encoded public spend key the coinbase output pays to.
    pub wallet_address: String,
    #[serde(default)]
    pub reserve_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetBlockTemplateResponse {
    pub status: Status,
    pub height: u64,
    pub difficulty: String,
    pub prev_hash: String,
    /// Hex-encoded, wire-format block template bytes; the miner fills in
    /// the nonce and re-submits via `submit_block`.
    pub blocktemplate_blob: String,
}

// -------------------------------------------------------------- submit_block

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBlockRequest {
    /// Hex-encoded wire-format block bytes, as produced by
    /// `get_block_template` and then mined.
    pub block_blob: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitBlockResponse {
    pub status: Status,
}

// ---------------------------------------------------------- get_transactions

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTransactionsRequest {
    pub txs_hashes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTransactionsResponse {
    pub status: Status,
    /// Hex-encoded transaction bytes, in the same order as the request;
    /// missing transactions are simply absent (no padding entry).
    pub txs_as_hex: Vec<String>,
    pub missed_tx: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_height_response_formats_hash_as_hex() {
        let resp = GetHeightResponse::new(5, Hash([0xab; 32]));
        assert_eq!(resp.hash, "ab".repeat(32));
        assert_eq!(resp.status, Status::Ok);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Status::Ok).unwrap(), "\"OK\"");
        assert_eq!(serde_json::to_string(&Status::Failed).unwrap(), "\"FAILED\"");
    }
}
