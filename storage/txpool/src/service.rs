//! Wraps [`TxPool`] behind a `tower::Service`, run from a single task the
//! same way `cn-consensus-context::task` turns a `&mut` struct into
//! something callable from many concurrent callers without a lock.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cn_types::{Hash, Transaction};
use tokio::sync::{mpsc, oneshot};
use tower::Service;

use crate::{ChainSpentView, RejectReason, TxPool};

pub enum PoolRequest {
    Add {
        tx: Transaction,
        kept_by_block: bool,
    },
    Remove(Hash),
    Take { max_bytes: usize },
    Contains(Hash),
    Expire { now: u64 },
    Hashes,
}

pub enum PoolResponse {
    Added(Result<Hash, RejectReason>),
    Removed(Option<Transaction>),
    Taken(Vec<Transaction>),
    Contains(bool),
    Expired(Vec<Hash>),
    Hashes(Vec<Hash>),
}

/// Cloneable handle; every clone shares the one task owning the pool.
#[derive(Clone)]
pub struct PoolService {
    sender: mpsc::Sender<(PoolRequest, oneshot::Sender<PoolResponse>)>,
}

impl PoolService {
    pub fn spawn(
        mut pool: TxPool,
        hash_fn: impl Fn(&[u8]) -> Hash + Send + Sync + 'static,
        spent: Arc<dyn ChainSpentView + Send + Sync>,
    ) -> Self {
        let (sender, mut receiver) =
            mpsc::channel::<(PoolRequest, oneshot::Sender<PoolResponse>)>(256);

        tokio::spawn(async move {
            while let Some((request, respond_to)) = receiver.recv().await {
                let response = match request {
                    PoolRequest::Add { tx, kept_by_block } => {
                        let result = pool.add(tx, &hash_fn, spent.as_ref(), kept_by_block);
                        PoolResponse::Added(result)
                    }
                    PoolRequest::Remove(hash) => PoolResponse::Removed(pool.remove(&hash)),
                    PoolRequest::Take { max_bytes } => PoolResponse::Taken(pool.take(max_bytes)),
                    PoolRequest::Contains(hash) => PoolResponse::Contains(pool.contains(&hash)),
                    PoolRequest::Expire { now } => PoolResponse::Expired(pool.expire(now)),
                    PoolRequest::Hashes => PoolResponse::Hashes(pool.hashes()),
                };
                let _ = respond_to.send(response);
            }
        });

        Self { sender }
    }
}

impl Service<PoolRequest> for PoolService {
    type Response = PoolResponse;
    type Error = tower::BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PoolRequest) -> Self::Future {
        let sender = self.sender.clone();
        Box::pin(async move {
            let (respond_to, receiver) = oneshot::channel();
            sender
                .send((request, respond_to))
                .await
                .map_err(|_| "pool task gone")?;
            receiver.await.map_err(|_| "pool task dropped response".into())
        })
    }
}
