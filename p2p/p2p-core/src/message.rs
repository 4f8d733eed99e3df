//! Dispatches a decoded Levin [`Bucket`] to the concrete command/notify
//! payload it carries, and the reverse encode path (§4.6, §6).

use cn_levin::{Bucket, Header, MessageKind};
use cn_wire::ids;
use cn_wire::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unknown levin command id {0}")]
    UnknownCommand(u32),
    #[error("epee codec error: {0}")]
    Epee(#[from] cn_epee_encoding::Error),
    #[error("wire field error: {0}")]
    Wire(#[from] WireError),
}

/// Every P2P payload this node understands, already decoded from its
/// epee field tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    HandshakeRequest(HandshakeRequest),
    HandshakeResponse(HandshakeResponse),
    TimedSyncRequest(TimedSyncRequest),
    TimedSyncResponse(TimedSyncResponse),
    PingRequest,
    PingResponse(PingResponse),
    NewBlock(NotifyNewBlock),
    NewTransactions(NotifyNewTransactions),
    RequestGetObjects(RequestGetObjects),
    ResponseGetObjects(ResponseGetObjects),
    RequestChain(RequestChain),
    ResponseChainEntry(ResponseChainEntry),
    RequestTxPool(RequestTxPool),
}

impl Message {
    pub fn command_id(&self) -> u32 {
        match self {
            Self::HandshakeRequest(_) | Self::HandshakeResponse(_) => ids::HANDSHAKE,
            Self::TimedSyncRequest(_) | Self::TimedSyncResponse(_) => ids::TIMED_SYNC,
            Self::PingRequest | Self::PingResponse(_) => ids::PING,
            Self::NewBlock(_) => ids::NOTIFY_NEW_BLOCK,
            Self::NewTransactions(_) => ids::NOTIFY_NEW_TRANSACTIONS,
            Self::RequestGetObjects(_) => ids::NOTIFY_REQUEST_GET_OBJECTS,
            Self::ResponseGetObjects(_) => ids::NOTIFY_RESPONSE_GET_OBJECTS,
            Self::RequestChain(_) => ids::NOTIFY_REQUEST_CHAIN,
            Self::ResponseChainEntry(_) => ids::NOTIFY_RESPONSE_CHAIN_ENTRY,
            Self::RequestTxPool(_) => ids::NOTIFY_REQUEST_TX_POOL,
        }
    }

    fn fields(&self) -> indexmap::IndexMap<String, cn_epee_encoding::Value> {
        match self {
            Self::HandshakeRequest(m) => m.to_fields(),
            Self::HandshakeResponse(m) => m.to_fields(),
            Self::TimedSyncRequest(m) => m.to_fields(),
            Self::TimedSyncResponse(m) => m.to_fields(),
            Self::PingRequest => indexmap::IndexMap::new(),
            Self::PingResponse(m) => m.to_fields(),
            Self::NewBlock(m) => m.to_fields(),
            Self::NewTransactions(m) => m.to_fields(),
            Self::RequestGetObjects(m) => m.to_fields(),
            Self::ResponseGetObjects(m) => m.to_fields(),
            Self::RequestChain(m) => m.to_fields(),
            Self::ResponseChainEntry(m) => m.to_fields(),
            Self::RequestTxPool(m) => m.to_fields(),
        }
    }

    /// Whether this payload is carried as a Levin `Command` (request
    /// expecting a reply) rather than a one-way `Notify` (§4.6).
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HandshakeRequest(_)
            | Self::HandshakeResponse(_)
            | Self::TimedSyncRequest(_)
            | Self::TimedSyncResponse(_)
            | Self::PingRequest
            | Self::PingResponse(_) => MessageKind::Command,
            _ => MessageKind::Notify,
        }
    }

    /// Encodes this message into a framed [`Bucket`]. `is_response` picks
    /// the request/response Levin header for `Command`-kind messages;
    /// ignored for `Notify`.
    pub fn to_bucket(&self, is_response: bool) -> Bucket {
        let command = self.command_id();
        let header = match self.kind() {
            MessageKind::Command if is_response => Header::response(command, 1),
            MessageKind::Command => Header::request(command, true),
            _ => Header::request(command, false),
        };
        let payload = cn_epee_encoding::to_bytes(&self.fields()).to_vec();
        Bucket { header, payload }
    }

    /// Decodes a received [`Bucket`] into the matching [`Message`]
    /// variant, picking the request/response shape from the Levin header
    /// (§4.6).
    pub fn from_bucket(bucket: &Bucket) -> Result<Self, MessageError> {
        let mut bytes = bytes::Bytes::from(bucket.payload.clone());
        let fields = cn_epee_encoding::from_bytes(&mut bytes)?;
        let is_response = bucket.header.flags.is_response();

        Ok(match bucket.header.command {
            ids::HANDSHAKE if is_response => Message::HandshakeResponse(HandshakeResponse::from_fields(&fields)?),
            ids::HANDSHAKE => Message::HandshakeRequest(HandshakeRequest::from_fields(&fields)?),
            ids::TIMED_SYNC if is_response => {
                Message::TimedSyncResponse(TimedSyncResponse::from_fields(&fields)?)
            }
            ids::TIMED_SYNC => Message::TimedSyncRequest(TimedSyncRequest::from_fields(&fields)?),
            ids::PING if is_response => Message::PingResponse(PingResponse::from_fields(&fields)?),
            ids::PING => Message::PingRequest,
            ids::NOTIFY_NEW_BLOCK => Message::NewBlock(NotifyNewBlock::from_fields(&fields)?),
            ids::NOTIFY_NEW_TRANSACTIONS => Message::NewTransactions(NotifyNewTransactions::from_fields(&fields)?),
            ids::NOTIFY_REQUEST_GET_OBJECTS => Message::RequestGetObjects(RequestGetObjects::from_fields(&fields)?),
            ids::NOTIFY_RESPONSE_GET_OBJECTS => {
                Message::ResponseGetObjects(ResponseGetObjects::from_fields(&fields)?)
            }
            ids::NOTIFY_REQUEST_CHAIN => Message::RequestChain(RequestChain::from_fields(&fields)?),
            ids::NOTIFY_RESPONSE_CHAIN_ENTRY => {
                Message::ResponseChainEntry(ResponseChainEntry::from_fields(&fields)?)
            }
            ids::NOTIFY_REQUEST_TX_POOL => Message::RequestTxPool(RequestTxPool::from_fields(&fields)?),
            other => return Err(MessageError::UnknownCommand(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trips_through_a_bucket() {
        let msg = Message::PingRequest;
        let bucket = msg.to_bucket(false);
        assert_eq!(bucket.header.command, ids::PING);
        let decoded = Message::from_bucket(&bucket).unwrap();
        assert_eq!(decoded, Message::PingRequest);
    }

    #[test]
    fn notify_new_transactions_round_trips() {
        let msg = Message::NewTransactions(NotifyNewTransactions {
            transactions_bytes: vec![vec![1, 2, 3]],
        });
        let bucket = msg.to_bucket(false);
        assert_eq!(bucket.header.command, ids::NOTIFY_NEW_TRANSACTIONS);
        assert_eq!(Message::from_bucket(&bucket).unwrap(), msg);
    }
}
