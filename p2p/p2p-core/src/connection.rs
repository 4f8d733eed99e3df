//! One task pair per connection: a reader task decodes incoming buckets
//! and either resolves a pending `invoke` or forwards the message
//! upstream, a writer task drains a bounded queue onto the socket. This
//! mirrors the context service's single-task-owns-state shape (§5 "no
//! user-visible locks") applied to a socket instead of a `BTreeMap`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use cn_constants::p2p::P2P_CONNECTION_MAX_WRITE_BUFFER_SIZE;
use cn_levin::{Bucket, LevinCodec, LevinError};
use cn_types::connection::{ConnectionContext, ConnectionDirection};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::message::{Message, MessageError};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("levin framing error: {0}")]
    Levin(#[from] LevinError),
    #[error("message decode error: {0}")]
    Message(#[from] MessageError),
    #[error("connection closed")]
    Closed,
    #[error("write queue is full")]
    QueueFull,
}

type PendingReplies = Arc<Mutex<HashMap<u32, oneshot::Sender<Bucket>>>>;

/// A handle to a live connection; cheap to clone, shared by every task
/// that wants to talk to this peer.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub direction: ConnectionDirection,
    write_tx: mpsc::Sender<Bucket>,
    pending: PendingReplies,
}

impl ConnectionHandle {
    /// Sends a one-way `Notify` message (§4.6), or a `Command` without
    /// waiting for its reply.
    pub async fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        self.write_tx
            .send(message.to_bucket(false))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Sends a `Command` request and awaits the matching `Reply` bucket,
    /// decoding it into a [`Message`] (§4.6 request/response RPCs:
    /// handshake, timed-sync, ping).
    pub async fn invoke(&self, message: &Message) -> Result<Message, ConnectionError> {
        let command = message.command_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(command, tx);

        if self.write_tx.send(message.to_bucket(false)).await.is_err() {
            self.pending.lock().await.remove(&command);
            return Err(ConnectionError::Closed);
        }

        let bucket = rx.await.map_err(|_| ConnectionError::Closed)?;
        Ok(Message::from_bucket(&bucket)?)
    }
}

/// Everything spawning a connection hands back: the handle for sending,
/// and a stream of inbound `Command`/`Notify` messages for the
/// protocol-handler layer (`cn-p2p`) to process.
pub struct SpawnedConnection {
    pub handle: ConnectionHandle,
    pub inbound: mpsc::Receiver<Message>,
}

/// Frames `stream` over Levin and spawns its reader/writer tasks.
pub fn spawn<S>(stream: S, id: Uuid, remote_ip: IpAddr, remote_port: u16, direction: ConnectionDirection) -> SpawnedConnection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let framed = Framed::new(stream, LevinCodec::default());
    let (mut sink, mut source) = framed.split();

    let (write_tx, mut write_rx) = mpsc::channel::<Bucket>(256);
    let (inbound_tx, inbound_rx) = mpsc::channel::<Message>(256);
    let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        let mut outstanding_bytes = 0usize;
        while let Some(bucket) = write_rx.recv().await {
            outstanding_bytes = outstanding_bytes.saturating_add(bucket.payload.len());
            if outstanding_bytes > P2P_CONNECTION_MAX_WRITE_BUFFER_SIZE {
                tracing::warn!("write queue exceeded budget, dropping connection");
                break;
            }
            if sink.send(bucket).await.is_err() {
                break;
            }
            outstanding_bytes = 0;
        }
    });

    let reader_pending = pending.clone();
    tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            let bucket = match frame {
                Ok(bucket) => bucket,
                Err(_) => break,
            };
            if bucket.header.flags.is_response() {
                let mut guard = reader_pending.lock().await;
                if let Some(tx) = guard.remove(&bucket.header.command) {
                    drop(guard);
                    let _ = tx.send(bucket);
                    continue;
                }
                drop(guard);
            }
            match Message::from_bucket(&bucket) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(err) => tracing::debug!(?err, "dropping undecodable bucket"),
            }
        }
    });

    SpawnedConnection {
        handle: ConnectionHandle {
            id,
            remote_ip,
            remote_port,
            direction,
            write_tx,
            pending,
        },
        inbound: inbound_rx,
    }
}

/// Builds the initial [`ConnectionContext`] tracked by the sync state
/// machine in `cn-p2p` (§4.6).
pub fn new_context(id: Uuid, remote_ip: IpAddr, remote_port: u16, direction: ConnectionDirection) -> ConnectionContext {
    ConnectionContext::new(id, remote_ip, remote_port, direction)
}
