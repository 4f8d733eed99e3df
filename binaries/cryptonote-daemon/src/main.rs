//! Entry point: loads config, builds the genesis chain, then runs the
//! P2P node server, the JSON-RPC surface, and (unless `--no-console`) the
//! REPL side by side until a shutdown signal arrives (§3, §6).

mod config;
mod core_sync;
mod crypto;
mod error;
mod genesis;
mod logging;
mod repl;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cn_blockchain::{BlockchainManager, ChainRequest, ChainService};
use cn_p2p::{NodeServer, P2pConfig};
use tower::{Service, ServiceExt};

use config::args::Args;
use config::DaemonConfig;
use core_sync::DaemonCoreSync;
use error::DaemonError;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match run(&args).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("cryptonote-daemon: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(args: &Args) -> Result<(), DaemonError> {
    let config = DaemonConfig::load(args.config_file.as_deref(), args)?;
    args.do_quick_requests(&config);

    std::fs::create_dir_all(&config.data_dir).map_err(|source| DaemonError::DataDir {
        path: config.data_dir.clone(),
        source,
    })?;

    let (_logging_guard, log_handle) = logging::init(config.log_level, config.log_file.as_deref());
    tracing::info!(data_dir = %config.data_dir.display(), testnet = config.testnet, "starting cryptonote-daemon");

    let currency = config.currency()?;
    let genesis_raw = genesis::build_genesis_raw(
        config.genesis_coinbase_tx_hex(),
        cn_helper::time::current_unix_timestamp(),
    )?;

    let hasher: Arc<dyn cn_blockchain::Hasher> = Arc::new(crypto::Keccak256Hasher);
    let verifier: Arc<dyn cn_blockchain::SignatureVerifier> = Arc::new(crypto::ShapeOnlyVerifier);

    let mut manager = BlockchainManager::new(
        currency.clone(),
        hasher.clone(),
        verifier,
        genesis_raw,
        cn_constants::mempool::MempoolParams::default(),
    )?;

    for (height, hash) in config.parsed_checkpoints()? {
        manager.add_checkpoint(height, hash);
    }

    tracing::info!(top_height = manager.top_height(), "genesis chain ready");

    let chain = ChainService::spawn(manager);

    let p2p_config = build_p2p_config(&config, currency.network_id)?;
    let core_sync: Arc<dyn cn_p2p::CoreSync> = Arc::new(DaemonCoreSync::new(chain.clone(), hasher));
    let node = Arc::new(NodeServer::new(p2p_config, core_sync));
    node.clone().run().await?;

    spawn_pool_expiry_loop(chain.clone());
    spawn_peerlist_persist_loop(node.clone());

    let rpc_bind: SocketAddr = (config.rpc_bind_ip, config.rpc_bind_port).into();
    let rpc_router = cn_rpc_interface::router(chain.clone());
    let rpc_listener = tokio::net::TcpListener::bind(rpc_bind).await.map_err(DaemonError::P2p)?;
    tracing::info!(addr = %rpc_bind, "rpc listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(rpc_listener, rpc_router).await {
            tracing::error!(%e, "rpc server exited");
        }
    });

    if config.no_console {
        tokio::signal::ctrl_c().await.ok();
    } else {
        repl::Repl::new(chain.clone(), node.clone(), log_handle).run().await;
    }

    node.persist_peerlist().await.ok();
    tracing::info!("shutting down");
    Ok(())
}

fn build_p2p_config(config: &DaemonConfig, network_id: [u8; 16]) -> Result<P2pConfig, DaemonError> {
    let seed_nodes = parse_addrs(&config.seed_node)?;
    let priority_nodes = parse_addrs(&config.add_priority_node)?;
    let exclusive_nodes = parse_addrs(&config.add_exclusive_node)?;
    let extra_peers = parse_addrs(&config.add_peer)?;

    let my_port = if config.hide_my_port {
        0
    } else if config.p2p_external_port != 0 {
        config.p2p_external_port
    } else {
        config.p2p_bind_port
    };

    Ok(P2pConfig {
        bind_addr: (config.p2p_bind_ip, config.p2p_bind_port).into(),
        my_port,
        network_id,
        seed_nodes: seed_nodes.into_iter().chain(extra_peers).collect(),
        priority_nodes,
        exclusive_nodes,
        allow_local_ip: config.allow_local_ip,
        peerlist_state_path: Some(config.data_dir.join("p2pstate.bin")),
        ..P2pConfig::default()
    })
}

fn parse_addrs(entries: &[String]) -> Result<Vec<SocketAddr>, DaemonError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .parse()
                .map_err(|_| config::ConfigError::BadPeerAddress(entry.clone()).into())
        })
        .collect()
}

/// Periodically evicts timed-out pool entries (§4.5), mirroring the
/// interval the node server's own timed-sync loop runs on.
fn spawn_pool_expiry_loop(mut chain: ChainService) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now = cn_helper::time::current_unix_timestamp();
            if let Ok(ready) = chain.ready().await {
                let _ = ready.call(ChainRequest::ExpirePool { now }).await;
            }
        }
    });
}

fn spawn_peerlist_persist_loop(node: Arc<NodeServer>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            if let Err(e) = node.persist_peerlist().await {
                tracing::warn!(%e, "failed to persist peer list");
            }
        }
    });
}
