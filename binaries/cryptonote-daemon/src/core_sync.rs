//! Implements `cn_p2p::CoreSync`, the synchronous seam the node server
//! calls into from its connection tasks (§4.6), on top of the async
//! `cn_blockchain::ChainService` actor.
//!
//! `ChainService` exists precisely so the chain manager is never touched
//! by two call sites without going through its single owning task (see
//! that crate's `service` module doc) — but `CoreSync`'s methods can't be
//! `async` without an invasive change to `cn-p2p`'s connection-handling
//! loop. Bridging with `tokio::task::block_in_place` + `Handle::block_on`
//! keeps both crates untouched: the call blocks the calling worker
//! thread, not the whole runtime, which is sound because the daemon
//! always runs tokio's multi-threaded runtime (`tokio::main` default) and
//! `ChainService`'s task runs independently on another worker.

use std::sync::Arc;

use cn_blockchain::{ChainRequest, ChainResponse, ChainService, Hasher};
use cn_types::{CachedBlock, CachedTransaction, Decode, Hash, RawBlock};
use cn_wire::CoreSyncData;
use tokio::runtime::Handle;
use tower::{Service, ServiceExt};
use uuid::Uuid;

pub struct DaemonCoreSync {
    chain: ChainService,
    hasher: Arc<dyn Hasher>,
}

impl DaemonCoreSync {
    pub fn new(chain: ChainService, hasher: Arc<dyn Hasher>) -> Self {
        Self { chain, hasher }
    }

    fn call(&self, request: ChainRequest) -> ChainResponse {
        let mut chain = self.chain.clone();
        tokio::task::block_in_place(move || {
            Handle::current().block_on(async move {
                chain
                    .ready()
                    .await
                    .expect("chain service never returns poll_ready error")
                    .call(request)
                    .await
                    .expect("chain service task is alive for the process lifetime")
            })
        })
    }
}

impl cn_p2p::CoreSync for DaemonCoreSync {
    fn sync_data(&self) -> CoreSyncData {
        let ChainResponse::Info(info) = self.call(ChainRequest::Info) else {
            unreachable!("ChainRequest::Info always answers with ChainResponse::Info");
        };
        CoreSyncData {
            current_height: info.height,
            top_block_hash: info.top_hash,
            cumulative_difficulty: info.cumulative_difficulty as u64,
        }
    }

    fn chain_locator(&self) -> Vec<Hash> {
        let ChainResponse::ChainLocator(locator) = self.call(ChainRequest::ChainLocator) else {
            unreachable!("ChainRequest::ChainLocator always answers with ChainResponse::ChainLocator");
        };
        locator
    }

    fn find_common_ancestor(&self, locator: &[Hash]) -> (u64, u64, Vec<Hash>) {
        let ChainResponse::CommonAncestor { height, top, hashes } =
            self.call(ChainRequest::FindCommonAncestor(locator.to_vec()))
        else {
            unreachable!("ChainRequest::FindCommonAncestor always answers with ChainResponse::CommonAncestor");
        };
        (height, top, hashes)
    }

    fn get_blocks(&self, wanted: &[Hash]) -> (Vec<RawBlock>, Vec<Hash>) {
        let ChainResponse::Blocks { found, missed } = self.call(ChainRequest::GetBlocks(wanted.to_vec())) else {
            unreachable!("ChainRequest::GetBlocks always answers with ChainResponse::Blocks");
        };
        (found, missed)
    }

    /// Pure function of the bytes and our hasher; no need to go through
    /// the chain manager (mirrors `BlockchainManager::block_hash_of`).
    fn block_hash(&self, raw: &RawBlock) -> Option<Hash> {
        let template = cn_types::BlockTemplate::from_bytes(&raw.block_bytes).ok()?;
        let hash_fn = |bytes: &[u8]| self.hasher.fast_hash(bytes);
        let base_tx_hash = CachedTransaction::new(template.base_transaction.clone(), hash_fn).hash();
        Some(CachedBlock::new(template, base_tx_hash, hash_fn).block_hash())
    }

    fn submit_block(&self, from: Uuid, raw: RawBlock) {
        let mut chain = self.chain.clone();
        let now = current_unix_timestamp();
        tokio::spawn(async move {
            let result = chain
                .ready()
                .await
                .expect("chain service never returns poll_ready error")
                .call(ChainRequest::AddBlock { raw, now })
                .await;
            match result {
                Ok(ChainResponse::Added(added)) => {
                    tracing::debug!(?from, ?added, "processed block from peer");
                }
                _ => tracing::warn!(?from, "chain service did not answer AddBlock"),
            }
        });
    }

    fn submit_transactions(&self, from: Uuid, raw: Vec<Vec<u8>>) {
        let mut chain = self.chain.clone();
        tokio::spawn(async move {
            for bytes in raw {
                let result = chain
                    .ready()
                    .await
                    .expect("chain service never returns poll_ready error")
                    .call(ChainRequest::AddTransaction(bytes))
                    .await;
                match result {
                    Ok(ChainResponse::TransactionAdded(Err(reject))) => {
                        tracing::debug!(?from, %reject, "rejected transaction from peer");
                    }
                    Ok(_) => {}
                    Err(_) => tracing::warn!(?from, "chain service did not answer AddTransaction"),
                }
            }
        });
    }

    fn pool_hashes(&self) -> Vec<Hash> {
        let ChainResponse::PoolHashes(hashes) = self.call(ChainRequest::PoolHashes) else {
            unreachable!("ChainRequest::PoolHashes always answers with ChainResponse::PoolHashes");
        };
        hashes
    }

    fn pool_transactions(&self, missing: &[Hash]) -> Vec<Vec<u8>> {
        let ChainResponse::PoolTransactions(bytes) = self.call(ChainRequest::PoolTransactions(missing.to_vec()))
        else {
            unreachable!("ChainRequest::PoolTransactions always answers with ChainResponse::PoolTransactions");
        };
        bytes
    }
}

fn current_unix_timestamp() -> u64 {
    cn_helper::time::current_unix_timestamp()
}
