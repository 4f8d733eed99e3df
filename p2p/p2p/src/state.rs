//! The connection table: every live peer's handle plus its sync-FSM
//! context (§4.6), held in a concurrent map since handshake replies,
//! timed-sync ticks and inbound messages all touch it from different
//! tasks.

use std::collections::HashSet;

use cn_p2p_core::ConnectionHandle;
use cn_types::connection::ConnectionContext;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct PeerState {
    pub handle: ConnectionHandle,
    pub context: ConnectionContext,
}

#[derive(Default)]
pub struct ConnectionTable {
    peers: DashMap<Uuid, PeerState>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: PeerState) {
        self.peers.insert(state.handle.id, state);
    }

    pub fn remove(&self, id: &Uuid) -> Option<PeerState> {
        self.peers.remove(id).map(|(_, v)| v)
    }

    pub fn get(&self, id: &Uuid) -> Option<PeerState> {
        self.peers.get(id).map(|entry| entry.clone())
    }

    pub fn update_context(&self, id: &Uuid, f: impl FnOnce(&mut ConnectionContext)) {
        if let Some(mut entry) = self.peers.get_mut(id) {
            f(&mut entry.context);
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn outgoing_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|e| e.context.direction == cn_types::connection::ConnectionDirection::Outgoing)
            .count()
    }

    pub fn connected_ips(&self) -> HashSet<std::net::IpAddr> {
        self.peers.iter().map(|e| e.context.remote_ip).collect()
    }

    pub fn broadcast_except(&self, except: &Uuid) -> Vec<ConnectionHandle> {
        self.peers
            .iter()
            .filter(|e| e.key() != except)
            .map(|e| e.handle.clone())
            .collect()
    }

    pub fn all_handles(&self) -> Vec<ConnectionHandle> {
        self.peers.iter().map(|e| e.handle.clone()).collect()
    }

    pub fn all_contexts(&self) -> Vec<ConnectionContext> {
        self.peers.iter().map(|e| e.context.clone()).collect()
    }
}
