//! Wraps [`BlockchainContext`] behind a `tower::Service`, run from a
//! single dedicated task, the same way the teacher's context crate turns
//! a `&mut` struct into something callable from many concurrent
//! validation tasks without a lock (§5: "no user-visible locks").

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tower::Service;

use crate::{BlockchainContext, RollbackEntry};

pub enum ContextRequest {
    /// Read-only snapshot of the current context (clones are cheap: a few
    /// small windows, no transaction data).
    Get,
    PushBlock {
        height: u64,
        timestamp: u64,
        cumulative_difficulty: u128,
        block_size: usize,
        generated_coins: u64,
        major_version: u8,
        minor_version: u8,
    },
    Rebuild(Vec<RollbackEntry>),
    AddCheckpoint { height: u64, hash: cn_types::Hash },
}

pub enum ContextResponse {
    Context(Box<BlockchainContext>),
    Ok,
}

/// The service handle; cloneable, each clone shares the one context task.
#[derive(Clone)]
pub struct ContextService {
    sender: mpsc::Sender<(ContextRequest, oneshot::Sender<ContextResponse>)>,
}

impl ContextService {
    pub fn spawn(mut context: BlockchainContext) -> Self {
        let (sender, mut receiver) =
            mpsc::channel::<(ContextRequest, oneshot::Sender<ContextResponse>)>(128);

        tokio::spawn(async move {
            while let Some((request, respond_to)) = receiver.recv().await {
                let response = match request {
                    ContextRequest::Get => ContextResponse::Context(Box::new(context.clone())),
                    ContextRequest::PushBlock {
                        height,
                        timestamp,
                        cumulative_difficulty,
                        block_size,
                        generated_coins,
                        major_version,
                        minor_version,
                    } => {
                        context.push_block(
                            height,
                            timestamp,
                            cumulative_difficulty,
                            block_size,
                            generated_coins,
                            major_version,
                            minor_version,
                        );
                        ContextResponse::Ok
                    }
                    ContextRequest::Rebuild(entries) => {
                        context.rebuild_from(&entries);
                        ContextResponse::Ok
                    }
                    ContextRequest::AddCheckpoint { height, hash } => {
                        context.add_checkpoint(height, hash);
                        ContextResponse::Ok
                    }
                };
                let _ = respond_to.send(response);
            }
        });

        Self { sender }
    }
}

impl Service<ContextRequest> for ContextService {
    type Response = ContextResponse;
    type Error = tower::BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ContextRequest) -> Self::Future {
        let sender = self.sender.clone();
        Box::pin(async move {
            let (respond_to, receiver) = oneshot::channel();
            sender
                .send((request, respond_to))
                .await
                .map_err(|_| "context task gone")?;
            receiver.await.map_err(|_| "context task dropped response".into())
        })
    }
}
