//! Turns a [`Method`] into a [`ChainRequest`], awaits the
//! [`ChainService`] task, and shapes the reply into the matching
//! `cn-rpc-types` response — the same request/response round trip
//! `cn-p2p`'s dispatcher uses, just with an HTTP caller instead of a
//! peer connection.

use cn_blockchain::{ChainInfo, ChainRequest, ChainResponse, ChainService};
use cn_json_rpc::error::ErrorObject;
use cn_rpc_types::{
    GetBlockTemplateResponse, GetHeightResponse, GetInfoResponse, GetTransactionsResponse,
    Status, SubmitBlockResponse,
};
use cn_types::{Encode, Hash, PublicKey};
use tower::{Service, ServiceExt};

use crate::method::Method;

fn decode_hash(hex_str: &str) -> Result<Hash, ErrorObject> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ErrorObject::server_error(-1, format!("invalid hex: {e}")))?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ErrorObject::server_error(-1, "expected a 32-byte hash"))?;
    Ok(Hash(array))
}

fn decode_public_key(hex_str: &str) -> Result<PublicKey, ErrorObject> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ErrorObject::server_error(-1, format!("invalid hex: {e}")))?;
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ErrorObject::server_error(-1, "expected a 32-byte public key"))?;
    Ok(PublicKey(array))
}

async fn call(chain: &mut ChainService, request: ChainRequest) -> Result<ChainResponse, ErrorObject> {
    chain
        .ready()
        .await
        .map_err(|e| ErrorObject::server_error(-1, e.to_string()))?
        .call(request)
        .await
        .map_err(|e| ErrorObject::server_error(-1, e.to_string()))
}

fn info_to_response(info: ChainInfo) -> GetInfoResponse {
    GetInfoResponse {
        status: Status::Ok,
        height: info.height,
        target_height: info.height,
        difficulty: info.next_difficulty.to_string(),
        tx_count: info.tx_count,
        tx_pool_size: info.tx_pool_size,
        top_block_hash: hex::encode(info.top_hash.as_bytes()),
        major_version: info.major_version,
    }
}

pub async fn dispatch(chain: &mut ChainService, method: Method) -> Result<serde_json::Value, ErrorObject> {
    let value = match method {
        Method::GetInfo(_) => {
            let ChainResponse::Info(info) = call(chain, ChainRequest::Info).await? else {
                return Err(ErrorObject::internal_error());
            };
            serde_json::to_value(info_to_response(info))
        }
        Method::GetHeight(_) => {
            let ChainResponse::Info(info) = call(chain, ChainRequest::Info).await? else {
                return Err(ErrorObject::internal_error());
            };
            serde_json::to_value(GetHeightResponse::new(info.height, info.top_hash))
        }
        Method::GetBlockTemplate(request) => {
            let miner_spend_key = decode_public_key(&request.wallet_address)?;
            let now = request_now();
            let ChainResponse::BlockTemplate { template, difficulty } = call(
                chain,
                ChainRequest::GetBlockTemplate {
                    miner_spend_key,
                    extra_nonce: vec![0; request.reserve_size as usize],
                    now,
                },
            )
            .await?
            else {
                return Err(ErrorObject::internal_error());
            };

            let ChainResponse::TopHeight(top_height) = call(chain, ChainRequest::TopHeight).await?
            else {
                return Err(ErrorObject::internal_error());
            };

            let prev_hash = template.previous_block_hash;
            serde_json::to_value(GetBlockTemplateResponse {
                status: Status::Ok,
                height: top_height + 1,
                difficulty: difficulty.to_string(),
                prev_hash: hex::encode(prev_hash.as_bytes()),
                blocktemplate_blob: hex::encode(template.to_bytes()),
            })
        }
        Method::SubmitBlock(request) => {
            let block_bytes = hex::decode(&request.block_blob)
                .map_err(|e| ErrorObject::server_error(-1, format!("invalid hex: {e}")))?;
            let now = request_now();
            let ChainResponse::Added(result) = call(
                chain,
                ChainRequest::SubmitMinedBlock { block_bytes, now },
            )
            .await?
            else {
                return Err(ErrorObject::internal_error());
            };

            if result.is_success() {
                serde_json::to_value(SubmitBlockResponse { status: Status::Ok })
            } else {
                return Err(ErrorObject::server_error(-2, format!("block rejected: {result:?}")));
            }
        }
        Method::GetTransactions(request) => {
            let mut txs_as_hex = Vec::new();
            let mut missed_tx = Vec::new();
            for hex_hash in &request.txs_hashes {
                let hash = decode_hash(hex_hash)?;
                let ChainResponse::Transaction(found) =
                    call(chain, ChainRequest::FindTransaction(hash)).await?
                else {
                    return Err(ErrorObject::internal_error());
                };
                match found {
                    Some(bytes) => txs_as_hex.push(hex::encode(bytes)),
                    None => missed_tx.push(hex_hash.clone()),
                }
            }
            serde_json::to_value(GetTransactionsResponse {
                status: Status::Ok,
                txs_as_hex,
                missed_tx,
            })
        }
    };

    value.map_err(|e| ErrorObject::server_error(-1, format!("failed to encode response: {e}")))
}

/// `BlockTemplate`/`RawBlock` timestamps are wall-clock seconds; this
/// is the one place the RPC layer touches the clock instead of trusting
/// a caller-supplied value (unlike the P2P layer, which always takes
/// `now` from its own driving loop).
fn request_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

