//! The `method`/`params` body of a `/json_rpc` request (§6).

use serde::{Deserialize, Serialize};

use cn_rpc_types::{
    GetBlockTemplateRequest, GetHeightRequest, GetInfoRequest, GetTransactionsRequest,
    SubmitBlockRequest,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Method {
    GetInfo(GetInfoRequest),
    GetHeight(GetHeightRequest),
    GetBlockTemplate(GetBlockTemplateRequest),
    SubmitBlock(SubmitBlockRequest),
    GetTransactions(GetTransactionsRequest),
}
