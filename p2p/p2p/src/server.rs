//! The node server: accept loop, connection maker, timed-sync loop and
//! the per-connection dispatcher that drives the sync state machine
//! (§4.6). One [`NodeServer`] per process; cheap to clone, every clone
//! shares the same connection table and peer list.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cn_address_book::PeerlistManager;
use cn_constants::p2p::{
    BLOCKS_SYNCHRONIZING_DEFAULT_COUNT, P2P_DEFAULT_CONNECTIONS_COUNT, P2P_DEFAULT_INVOKE_TIMEOUT,
    P2P_DEFAULT_PING_CONNECTION_TIMEOUT, P2P_DEFAULT_WHITELIST_CONNECTIONS_PERCENT,
};
use cn_p2p_core::{connection, ConnectionHandle, Message};
use cn_types::connection::{ConnectionContext, ConnectionDirection, ConnectionState};
use cn_types::Hash;
use cn_wire::{BasicNodeData, CoreSyncData, HandshakeRequest, HandshakeResponse, PingResponse, RequestChain, RequestGetObjects, RequestTxPool, ResponseChainEntry, ResponseGetObjects, TimedSyncRequest};
use rand::Rng;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::P2pConfig;
use crate::core_sync::CoreSync;
use crate::state::{ConnectionTable, PeerState};

pub struct NodeServer {
    config: P2pConfig,
    table: Arc<ConnectionTable>,
    peerlist: Arc<tokio::sync::Mutex<PeerlistManager>>,
    core: Arc<dyn CoreSync>,
    peer_id: u64,
}

impl NodeServer {
    pub fn new(config: P2pConfig, core: Arc<dyn CoreSync>) -> Self {
        let peerlist = config
            .peerlist_state_path
            .as_ref()
            .and_then(|path| cn_address_book::deserialize(path, config.allow_local_ip).ok())
            .unwrap_or_else(|| PeerlistManager::new(config.allow_local_ip));

        Self {
            peer_id: rand::thread_rng().gen(),
            config,
            table: Arc::new(ConnectionTable::new()),
            peerlist: Arc::new(tokio::sync::Mutex::new(peerlist)),
            core,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Spawns the accept loop, connection maker (`onIdle`) and timed-sync
    /// loop, returning immediately (§4.6 background tasks). The caller
    /// keeps the returned `NodeServer` alive for as long as it wants P2P
    /// running.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "p2p listening");

        let accept_server = self.clone();
        tokio::spawn(async move { accept_server.accept_loop(listener).await });

        let maker_server = self.clone();
        tokio::spawn(async move { maker_server.connection_maker_loop().await });

        let sync_server = self.clone();
        tokio::spawn(async move { sync_server.timed_sync_loop().await });

        let timeout_server = self.clone();
        tokio::spawn(async move { timeout_server.timeout_loop().await });

        Ok(())
    }

    /// `timeoutLoop`: every 10s, interrupts connections whose current
    /// sync request has been outstanding longer than
    /// `P2P_DEFAULT_INVOKE_TIMEOUT` (§4.6, §5 cancellation).
    async fn timeout_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            let now = cn_helper_time_now();
            let limit = P2P_DEFAULT_INVOKE_TIMEOUT.as_secs();
            let stale: Vec<Uuid> = self
                .table
                .all_contexts()
                .into_iter()
                .filter(|ctx| is_request_stale(ctx.request_sent_at, now, limit))
                .map(|ctx| ctx.id)
                .collect();
            for id in stale {
                tracing::debug!(%id, "interrupting connection: sync request timed out");
                self.table.remove(&id);
            }
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move { server.handle_inbound(stream, addr).await });
                }
                Err(err) => {
                    tracing::warn!(?err, "accept failed");
                }
            }
        }
    }

    /// `onIdle`: tops up outgoing connections every second (§4.6
    /// connection maker).
    async fn connection_maker_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            self.clone().maintain_outgoing_connections().await;
        }
    }

    async fn maintain_outgoing_connections(self: Arc<Self>) {
        let wanted = self
            .config
            .expected_outgoing_connections
            .max(P2P_DEFAULT_CONNECTIONS_COUNT)
            .saturating_sub(self.table.outgoing_count());
        if wanted == 0 {
            return;
        }

        let connected = self.table.connected_ips();
        let mut candidates: Vec<SocketAddr> = Vec::new();

        if !self.config.exclusive_nodes.is_empty() {
            candidates.extend(self.config.exclusive_nodes.iter().copied());
        } else {
            candidates.extend(
                self.config
                    .priority_nodes
                    .iter()
                    .filter(|addr| !connected.contains(&addr.ip()))
                    .copied(),
            );

            let whitelist_draw = wanted * usize::from(P2P_DEFAULT_WHITELIST_CONNECTIONS_PERCENT) / 100;
            let peerlist = self.peerlist.lock().await;
            let mut from_white: Vec<SocketAddr> = peerlist
                .white_entries()
                .filter(|e| !connected.contains(&e.address.ip))
                .take(whitelist_draw.max(1))
                .map(|e| SocketAddr::new(e.address.ip, e.address.port))
                .collect();
            candidates.append(&mut from_white);

            if candidates.len() < wanted {
                let mut from_gray: Vec<SocketAddr> = peerlist
                    .gray_entries()
                    .filter(|e| !connected.contains(&e.address.ip))
                    .take(wanted - candidates.len())
                    .map(|e| SocketAddr::new(e.address.ip, e.address.port))
                    .collect();
                candidates.append(&mut from_gray);
            }
            drop(peerlist);

            if candidates.is_empty() && self.peerlist_is_empty().await {
                candidates.extend(self.config.seed_nodes.iter().copied());
            }
        }

        candidates.truncate(wanted);
        for addr in candidates {
            let server = self.clone();
            tokio::spawn(async move { server.connect_outgoing(addr).await });
        }
    }

    async fn peerlist_is_empty(&self) -> bool {
        self.peerlist.lock().await.white_len() == 0
    }

    async fn connect_outgoing(self: Arc<Self>, addr: SocketAddr) {
        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            _ => return,
        };
        self.handshake_outgoing(stream, addr).await;
    }

    async fn handshake_outgoing(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let id = Uuid::new_v4();
        let spawned = connection::spawn(stream, id, addr.ip(), addr.port(), ConnectionDirection::Outgoing);
        let handle = spawned.handle.clone();

        let request = Message::HandshakeRequest(HandshakeRequest {
            node_data: self.basic_node_data(),
            payload_data: self.core.sync_data(),
        });

        let reply = match timeout(self.config.connect_timeout * 3, handle.invoke(&request)).await {
            Ok(Ok(Message::HandshakeResponse(resp))) => resp,
            _ => return,
        };

        if reply.node_data.network_id != self.config.network_id {
            return;
        }

        let mut context = ConnectionContext::new(id, addr.ip(), addr.port(), ConnectionDirection::Outgoing);
        context.peer_id = Some(reply.node_data.peer_id);
        self.apply_sync_state(&mut context, &reply.payload_data);
        self.table.insert(PeerState { handle: handle.clone(), context });

        {
            let mut peerlist = self.peerlist.lock().await;
            peerlist.merge_peerlist(reply.local_peerlist_new.clone());
        }

        if reply.node_data.my_port != 0 {
            self.back_ping(addr.ip(), reply.node_data.my_port as u16, reply.node_data.peer_id)
                .await;
        }

        self.spawn_dispatcher(id, spawned.inbound);
    }

    async fn handle_inbound(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let id = Uuid::new_v4();
        let spawned = connection::spawn(stream, id, addr.ip(), addr.port(), ConnectionDirection::Incoming);
        let handle = spawned.handle.clone();
        let mut inbound = spawned.inbound;

        let first = match timeout(self.config.connect_timeout * 3, inbound.recv()).await {
            Ok(Some(msg)) => msg,
            _ => return,
        };

        let Message::HandshakeRequest(req) = first else {
            return;
        };
        if req.node_data.network_id != self.config.network_id {
            return;
        }

        let response = Message::HandshakeResponse(HandshakeResponse {
            node_data: self.basic_node_data(),
            payload_data: self.core.sync_data(),
            local_peerlist_new: self.peerlist.lock().await.peerlist_head(250),
        });
        if handle.send(&response).await.is_err() {
            return;
        }

        let mut context = ConnectionContext::new(id, addr.ip(), addr.port(), ConnectionDirection::Incoming);
        context.peer_id = Some(req.node_data.peer_id);
        self.apply_sync_state(&mut context, &req.payload_data);
        self.table.insert(PeerState { handle: handle.clone(), context });

        if req.node_data.my_port != 0 {
            self.back_ping(addr.ip(), req.node_data.my_port as u16, req.node_data.peer_id)
                .await;
        }

        self.spawn_dispatcher(id, inbound);
    }

    fn basic_node_data(&self) -> BasicNodeData {
        BasicNodeData {
            network_id: self.config.network_id,
            version: 1,
            local_time: cn_helper_time_now(),
            my_port: u32::from(self.config.my_port),
            peer_id: self.peer_id,
        }
    }

    /// Decides `Normal` vs `SyncRequired` from the peer's advertised chain
    /// state (§4.6 handshake outcome).
    fn apply_sync_state(&self, context: &mut ConnectionContext, payload: &CoreSyncData) {
        context.remote_blockchain_height = payload.current_height;
        let our_height = self.core.sync_data().current_height;
        context.state = if payload.current_height > our_height {
            ConnectionState::SyncRequired
        } else {
            ConnectionState::Normal
        };
    }

    /// Opens a short-lived connection to confirm the peer's advertised
    /// port is reachable before admitting it to the white list (§4.6
    /// back-ping).
    async fn back_ping(&self, ip: std::net::IpAddr, port: u16, peer_id: u64) {
        let addr = SocketAddr::new(ip, port);
        let reachable = match timeout(P2P_DEFAULT_PING_CONNECTION_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let id = Uuid::new_v4();
                let spawned = connection::spawn(stream, id, ip, port, ConnectionDirection::Outgoing);
                matches!(
                    timeout(P2P_DEFAULT_PING_CONNECTION_TIMEOUT, spawned.handle.invoke(&Message::PingRequest)).await,
                    Ok(Ok(Message::PingResponse(PingResponse { status: true, .. })))
                )
            }
            _ => false,
        };

        let mut peerlist = self.peerlist.lock().await;
        if reachable {
            peerlist.set_peer_just_seen(peer_id, cn_types::NetworkAddress { ip, port }, cn_helper_time_now());
        } else {
            peerlist.set_peer_unreachable(&cn_types::NetworkAddress { ip, port });
        }
    }

    /// `timedSyncLoop`: re-handshakes core sync data with every Normal
    /// peer every `P2P_DEFAULT_HANDSHAKE_INTERVAL` (§4.6).
    async fn timed_sync_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.handshake_interval);
        loop {
            interval.tick().await;
            for handle in self.table.all_handles() {
                let server = self.clone();
                tokio::spawn(async move { server.timed_sync_one(handle).await });
            }
        }
    }

    async fn timed_sync_one(self: Arc<Self>, handle: ConnectionHandle) {
        let request = Message::TimedSyncRequest(TimedSyncRequest {
            payload_data: self.core.sync_data(),
        });
        let Ok(Message::TimedSyncResponse(resp)) = handle.invoke(&request).await else {
            self.table.remove(&handle.id);
            return;
        };
        self.table.update_context(&handle.id, |ctx| {
            self.apply_sync_state(ctx, &resp.payload_data);
        });
        self.peerlist.lock().await.merge_peerlist(resp.local_peerlist_new);
    }

    /// Drives the per-connection sync FSM for one peer's inbound message
    /// stream (§4.6 diagram) until the connection closes.
    fn spawn_dispatcher(self: &Arc<Self>, id: Uuid, mut inbound: tokio::sync::mpsc::Receiver<Message>) {
        let server = self.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                server.dispatch(id, message).await;
            }
            server.table.remove(&id);
        });
    }

    async fn dispatch(&self, from: Uuid, message: Message) {
        match message {
            Message::NewBlock(notify) => {
                self.core.submit_block(from, cn_types::RawBlock {
                    block_bytes: notify.block_bytes,
                    transactions_bytes: notify.transactions_bytes,
                });
                self.maybe_start_sync(from).await;
            }
            Message::NewTransactions(notify) => {
                self.core.submit_transactions(from, notify.transactions_bytes);
            }
            Message::RequestChain(req) => self.respond_chain(from, req).await,
            Message::ResponseChainEntry(entry) => self.continue_sync(from, entry).await,
            Message::RequestGetObjects(req) => self.respond_get_objects(from, req).await,
            Message::ResponseGetObjects(resp) => self.ingest_blocks(from, resp).await,
            Message::RequestTxPool(req) => self.respond_tx_pool(from, req).await,
            Message::HandshakeRequest(_) | Message::HandshakeResponse(_) => {
                // A second HANDSHAKE after the connection is established is a
                // protocol violation (§7 NetworkProtocolViolation); shut the
                // connection down instead of re-handshaking.
                tracing::debug!(%from, "dropping connection: duplicate handshake");
                self.table.remove(&from);
            }
            Message::PingRequest => {
                if let Some(state) = self.table.get(&from) {
                    let _ = state
                        .handle
                        .send(&Message::PingResponse(PingResponse { status: true, peer_id: self.peer_id }))
                        .await;
                }
            }
            _ => {}
        }
    }

    async fn maybe_start_sync(&self, from: Uuid) {
        let Some(state) = self.table.get(&from) else { return };
        if state.context.state != ConnectionState::SyncRequired {
            return;
        }
        self.table.update_context(&from, |ctx| {
            ctx.state = ConnectionState::Synchronizing;
            ctx.request_sent_at = Some(cn_helper_time_now());
        });
        let locator = self.core.chain_locator();
        let _ = state.handle.send(&Message::RequestChain(RequestChain { block_ids: locator })).await;
    }

    async fn respond_chain(&self, from: Uuid, req: RequestChain) {
        let Some(state) = self.table.get(&from) else { return };
        let (start_height, total_height, block_ids) = self.core.find_common_ancestor(&req.block_ids);
        let _ = state
            .handle
            .send(&Message::ResponseChainEntry(ResponseChainEntry {
                start_height,
                total_height,
                block_ids,
            }))
            .await;
    }

    async fn continue_sync(&self, from: Uuid, entry: ResponseChainEntry) {
        let Some(state) = self.table.get(&from) else { return };
        if entry.block_ids.is_empty() {
            self.finish_sync(from).await;
            return;
        }
        let batch: Vec<Hash> = entry
            .block_ids
            .into_iter()
            .take(BLOCKS_SYNCHRONIZING_DEFAULT_COUNT)
            .collect();
        self.table.update_context(&from, |ctx| {
            ctx.requested_objects = batch.iter().copied().collect();
            ctx.request_sent_at = Some(cn_helper_time_now());
        });
        let _ = state
            .handle
            .send(&Message::RequestGetObjects(RequestGetObjects { blocks: batch }))
            .await;
    }

    async fn respond_get_objects(&self, from: Uuid, req: RequestGetObjects) {
        let Some(state) = self.table.get(&from) else { return };
        let (blocks, missed_ids) = self.core.get_blocks(&req.blocks);
        let current_blockchain_height = self.core.sync_data().current_height;
        let _ = state
            .handle
            .send(&Message::ResponseGetObjects(ResponseGetObjects {
                blocks,
                missed_ids,
                current_blockchain_height,
            }))
            .await;
    }

    async fn ingest_blocks(&self, from: Uuid, resp: ResponseGetObjects) {
        let mut any_unexpected = false;
        if let Some(state) = self.table.get(&from) {
            for block in &resp.blocks {
                let Some(hash) = self.core.block_hash(block) else {
                    continue;
                };
                if !state.context.requested_objects.contains(&hash) {
                    any_unexpected = true;
                }
            }
        }
        if any_unexpected {
            self.table.update_context(&from, |ctx| ctx.state = ConnectionState::Shutdown);
            self.table.remove(&from);
            return;
        }

        self.table.update_context(&from, |ctx| ctx.request_sent_at = None);

        for block in resp.blocks {
            self.core.submit_block(from, block);
        }

        if resp.missed_ids.is_empty() {
            self.request_more_or_finish(from).await;
        } else {
            self.finish_sync(from).await;
        }
    }

    async fn request_more_or_finish(&self, from: Uuid) {
        let Some(state) = self.table.get(&from) else { return };
        let locator = self.core.chain_locator();
        let _ = state.handle.send(&Message::RequestChain(RequestChain { block_ids: locator })).await;
    }

    async fn finish_sync(&self, from: Uuid) {
        self.table.update_context(&from, |ctx| ctx.state = ConnectionState::PoolSyncRequired);
        let Some(state) = self.table.get(&from) else { return };
        let ours = self.core.pool_hashes();
        let _ = state.handle.send(&Message::RequestTxPool(RequestTxPool { tx_hashes: ours })).await;
        self.table.update_context(&from, |ctx| ctx.state = ConnectionState::Normal);
    }

    async fn respond_tx_pool(&self, from: Uuid, req: RequestTxPool) {
        let Some(state) = self.table.get(&from) else { return };
        let ours = self.core.pool_hashes();
        let missing: Vec<Hash> = ours.into_iter().filter(|h| !req.tx_hashes.contains(h)).collect();
        let transactions_bytes = self.core.pool_transactions(&missing);
        let _ = state
            .handle
            .send(&Message::NewTransactions(cn_wire::NotifyNewTransactions { transactions_bytes }))
            .await;
    }

    /// Relays a newly accepted block/tx set to every other connected peer
    /// (§4.4 "notifications", §5 "serialized by a single relay queue").
    pub async fn relay(&self, from: Option<Uuid>, message: Message) {
        let targets = match from {
            Some(id) => self.table.broadcast_except(&id),
            None => self.table.all_handles(),
        };
        for handle in targets {
            let _ = handle.send(&message).await;
        }
    }

    pub async fn persist_peerlist(&self) -> Result<(), cn_address_book::PeerlistPersistError> {
        if let Some(path) = &self.config.peerlist_state_path {
            let peerlist = self.peerlist.lock().await;
            cn_address_book::serialize(&peerlist, path)?;
        }
        Ok(())
    }
}

fn cn_helper_time_now() -> u64 {
    cn_helper::time::current_unix_timestamp()
}

fn is_request_stale(request_sent_at: Option<u64>, now: u64, limit_secs: u64) -> bool {
    matches!(request_sent_at, Some(sent) if now.saturating_sub(sent) > limit_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cn_types::RawBlock;

    struct StubCore {
        height: u64,
    }

    impl CoreSync for StubCore {
        fn sync_data(&self) -> CoreSyncData {
            CoreSyncData {
                current_height: self.height,
                top_block_hash: Hash::ZERO,
                cumulative_difficulty: 0,
            }
        }
        fn chain_locator(&self) -> Vec<Hash> {
            Vec::new()
        }
        fn find_common_ancestor(&self, _locator: &[Hash]) -> (u64, u64, Vec<Hash>) {
            (0, self.height, Vec::new())
        }
        fn get_blocks(&self, _wanted: &[Hash]) -> (Vec<RawBlock>, Vec<Hash>) {
            (Vec::new(), Vec::new())
        }
        fn block_hash(&self, _raw: &RawBlock) -> Option<Hash> {
            None
        }
        fn submit_block(&self, _from: Uuid, _raw: RawBlock) {}
        fn submit_transactions(&self, _from: Uuid, _raw: Vec<Vec<u8>>) {}
        fn pool_hashes(&self) -> Vec<Hash> {
            Vec::new()
        }
        fn pool_transactions(&self, _missing: &[Hash]) -> Vec<Vec<u8>> {
            Vec::new()
        }
    }

    fn server_with_height(height: u64) -> NodeServer {
        NodeServer::new(P2pConfig::default(), Arc::new(StubCore { height }))
    }

    #[test]
    fn ahead_peer_requires_sync() {
        let server = server_with_height(10);
        let mut ctx = ConnectionContext::new(Uuid::new_v4(), [127, 0, 0, 1].into(), 0, ConnectionDirection::Incoming);
        server.apply_sync_state(
            &mut ctx,
            &CoreSyncData {
                current_height: 20,
                top_block_hash: Hash::ZERO,
                cumulative_difficulty: 0,
            },
        );
        assert_eq!(ctx.state, ConnectionState::SyncRequired);
    }

    #[test]
    fn request_past_invoke_timeout_is_stale() {
        let limit = P2P_DEFAULT_INVOKE_TIMEOUT.as_secs();
        assert!(!is_request_stale(None, 1_000, limit));
        assert!(!is_request_stale(Some(1_000), 1_000 + limit, limit));
        assert!(is_request_stale(Some(1_000), 1_000 + limit + 1, limit));
    }

    #[test]
    fn behind_or_even_peer_is_normal() {
        let server = server_with_height(10);
        let mut ctx = ConnectionContext::new(Uuid::new_v4(), [127, 0, 0, 1].into(), 0, ConnectionDirection::Incoming);
        server.apply_sync_state(
            &mut ctx,
            &CoreSyncData {
                current_height: 10,
                top_block_hash: Hash::ZERO,
                cumulative_difficulty: 0,
            },
        );
        assert_eq!(ctx.state, ConnectionState::Normal);
    }
}
