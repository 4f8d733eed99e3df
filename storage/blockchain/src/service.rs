//! Wraps [`BlockchainManager`] behind a `tower::Service`, run from a
//! single dedicated task the same way `cn-consensus-context::task` and
//! `cn-txpool::service` turn a `&mut` struct into something callable from
//! many concurrent callers (RPC handlers, the P2P dispatcher) without a
//! lock (§5 "no user-visible locks").
//!
//! The synchronous [`cn_p2p::CoreSync`]-style seam the node server needs
//! is the one caller that can't simply `.await` this service: its trait
//! methods aren't `async`. The daemon binary bridges that gap with
//! `tokio::task::block_in_place` plus `Handle::block_on` over a cloned
//! `ChainService` handle, rather than giving `CoreSync` a second, directly
//! locked path onto the manager (§9 design note, recorded in `DESIGN.md`)
//! — there is still exactly one task that ever touches `BlockchainManager`
//! by value.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use cn_types::{Hash, RawBlock};
use tokio::sync::{mpsc, oneshot};
use tower::Service;

use crate::error::AddResult;
use crate::manager::{BlockchainManager, PoolSubmitError};

pub enum ChainRequest {
    AddBlock { raw: RawBlock, now: u64 },
    SubmitMinedBlock { block_bytes: Vec<u8>, now: u64 },
    GetBlockTemplate { miner_spend_key: cn_types::PublicKey, extra_nonce: Vec<u8>, now: u64 },
    AddTransaction(Vec<u8>),
    ExpirePool { now: u64 },
    TopHeight,
    GetBlocks(Vec<Hash>),
    ChainLocator,
    FindCommonAncestor(Vec<Hash>),
    FindTransaction(Hash),
    PoolHashes,
    PoolTransactions(Vec<Hash>),
    BlockAtHeight(u64),
    Info,
}

pub enum ChainResponse {
    Added(AddResult),
    BlockTemplate { template: cn_types::BlockTemplate, difficulty: u128 },
    TransactionAdded(Result<Hash, PoolSubmitError>),
    Expired(Vec<Hash>),
    TopHeight(u64),
    Blocks { found: Vec<RawBlock>, missed: Vec<Hash> },
    ChainLocator(Vec<Hash>),
    CommonAncestor { height: u64, top: u64, hashes: Vec<Hash> },
    Transaction(Option<Vec<u8>>),
    PoolHashes(Vec<Hash>),
    PoolTransactions(Vec<Vec<u8>>),
    Block(Option<RawBlock>),
    Info(ChainInfo),
}

/// Snapshot of chain state for `get_info`/`get_height` (§6). Plain data,
/// not tied to any particular RPC wire format.
pub struct ChainInfo {
    pub height: u64,
    pub top_hash: Hash,
    pub cumulative_difficulty: u128,
    pub next_difficulty: u128,
    pub major_version: u8,
    pub tx_count: u64,
    pub tx_pool_size: u64,
}

/// Cloneable handle; every clone shares the one task owning the chain.
#[derive(Clone)]
pub struct ChainService {
    sender: mpsc::Sender<(ChainRequest, oneshot::Sender<ChainResponse>)>,
}

impl ChainService {
    pub fn spawn(mut manager: BlockchainManager) -> Self {
        let (sender, mut receiver) =
            mpsc::channel::<(ChainRequest, oneshot::Sender<ChainResponse>)>(256);

        tokio::spawn(async move {
            while let Some((request, respond_to)) = receiver.recv().await {
                let response = match request {
                    ChainRequest::AddBlock { raw, now } => ChainResponse::Added(manager.add_block(raw, now)),
                    ChainRequest::SubmitMinedBlock { block_bytes, now } => {
                        ChainResponse::Added(manager.submit_block(block_bytes, now))
                    }
                    ChainRequest::GetBlockTemplate { miner_spend_key, extra_nonce, now } => {
                        let (template, difficulty) = manager.get_block_template(miner_spend_key, &extra_nonce, now);
                        ChainResponse::BlockTemplate { template, difficulty }
                    }
                    ChainRequest::AddTransaction(bytes) => {
                        ChainResponse::TransactionAdded(manager.add_transaction_to_pool(&bytes))
                    }
                    ChainRequest::ExpirePool { now } => ChainResponse::Expired(manager.expire_pool(now)),
                    ChainRequest::TopHeight => ChainResponse::TopHeight(manager.top_height()),
                    ChainRequest::GetBlocks(wanted) => {
                        let (found, missed) = manager.get_blocks(&wanted);
                        ChainResponse::Blocks { found, missed }
                    }
                    ChainRequest::ChainLocator => ChainResponse::ChainLocator(manager.chain_locator()),
                    ChainRequest::FindCommonAncestor(locator) => {
                        let (height, top, hashes) = manager.find_common_ancestor(&locator);
                        ChainResponse::CommonAncestor { height, top, hashes }
                    }
                    ChainRequest::FindTransaction(hash) => {
                        ChainResponse::Transaction(manager.find_transaction(&hash))
                    }
                    ChainRequest::PoolHashes => ChainResponse::PoolHashes(manager.pool_hashes()),
                    ChainRequest::PoolTransactions(missing) => {
                        ChainResponse::PoolTransactions(manager.pool_transactions(&missing))
                    }
                    ChainRequest::BlockAtHeight(height) => {
                        ChainResponse::Block(manager.block_at_height(height))
                    }
                    ChainRequest::Info => {
                        let context = manager.context();
                        ChainResponse::Info(ChainInfo {
                            height: manager.top_height() + 1,
                            top_hash: manager.top_hash(),
                            cumulative_difficulty: manager.cumulative_difficulty(),
                            next_difficulty: context.next_difficulty(),
                            major_version: context.major_version_for_next_height(),
                            tx_count: manager.tx_count(),
                            tx_pool_size: manager.pool_size() as u64,
                        })
                    }
                };
                let _ = respond_to.send(response);
            }
        });

        Self { sender }
    }
}

impl Service<ChainRequest> for ChainService {
    type Response = ChainResponse;
    type Error = tower::BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ChainRequest) -> Self::Future {
        let sender = self.sender.clone();
        Box::pin(async move {
            let (respond_to, receiver) = oneshot::channel();
            sender
                .send((request, respond_to))
                .await
                .map_err(|_| "chain task gone")?;
            receiver.await.map_err(|_| "chain task dropped response".into())
        })
    }
}
