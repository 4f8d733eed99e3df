//! Per-connection state (§3, §4.6).

use std::collections::HashSet;
use std::net::IpAddr;

use uuid::Uuid;

use crate::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirection {
    Incoming,
    Outgoing,
}

/// The per-peer sync state machine (§4.6 diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    BeforeHandshake,
    Normal,
    SyncRequired,
    Synchronizing,
    PoolSyncRequired,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: Uuid,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub direction: ConnectionDirection,
    pub state: ConnectionState,
    pub peer_id: Option<u64>,
    /// Block hashes this connection still needs to fetch, in request
    /// order.
    pub needed_objects: Vec<Hash>,
    /// Objects currently in flight to this peer; a response not matching
    /// this set is a protocol violation (§4.6).
    pub requested_objects: HashSet<Hash>,
    pub remote_blockchain_height: u64,
    pub last_response_height: u64,
    /// Unix timestamp of the last chain/object request sent while
    /// synchronizing; cleared on response. Used by the timeout loop to
    /// interrupt a peer that stops answering mid-sync (§4.6, §5 timeouts).
    pub request_sent_at: Option<u64>,
}

impl ConnectionContext {
    pub fn new(id: Uuid, remote_ip: IpAddr, remote_port: u16, direction: ConnectionDirection) -> Self {
        Self {
            id,
            remote_ip,
            remote_port,
            direction,
            state: ConnectionState::BeforeHandshake,
            peer_id: None,
            needed_objects: Vec::new(),
            requested_objects: HashSet::new(),
            remote_blockchain_height: 0,
            last_response_height: 0,
            request_sent_at: None,
        }
    }

    /// Records a response to a pending request; returns `false` (protocol
    /// violation) if the hash was not actually pending (§4.6, §7
    /// NetworkProtocolViolation).
    pub fn complete_request(&mut self, hash: &Hash) -> bool {
        self.requested_objects.remove(hash)
    }
}
