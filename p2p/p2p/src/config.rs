//! Node-server startup parameters (§4.6, §6 CLI flags).

use std::net::SocketAddr;
use std::time::Duration;

use cn_constants::p2p;

#[derive(Debug, Clone)]
pub struct P2pConfig {
    pub bind_addr: SocketAddr,
    /// The port advertised to peers in `basic_node_data.my_port`; `0`
    /// means "not reachable for back-ping" (§4.6).
    pub my_port: u16,
    pub network_id: [u8; 16],
    pub seed_nodes: Vec<SocketAddr>,
    pub priority_nodes: Vec<SocketAddr>,
    /// When non-empty, only these peers are ever connected to.
    pub exclusive_nodes: Vec<SocketAddr>,
    pub allow_local_ip: bool,
    pub expected_outgoing_connections: usize,
    pub handshake_interval: Duration,
    pub connect_timeout: Duration,
    pub peerlist_state_path: Option<std::path::PathBuf>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], p2p::P2P_DEFAULT_PORT).into(),
            my_port: p2p::P2P_DEFAULT_PORT,
            network_id: [0; 16],
            seed_nodes: Vec::new(),
            priority_nodes: Vec::new(),
            exclusive_nodes: Vec::new(),
            allow_local_ip: false,
            expected_outgoing_connections: p2p::P2P_DEFAULT_CONNECTIONS_COUNT,
            handshake_interval: p2p::P2P_DEFAULT_HANDSHAKE_INTERVAL,
            connect_timeout: p2p::P2P_DEFAULT_CONNECT_TIMEOUT,
            peerlist_state_path: None,
        }
    }
}
