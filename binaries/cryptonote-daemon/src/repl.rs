//! The console REPL (§6 "REPL commands"). Reads one line at a time from
//! stdin and prints a short English reply, same shape as the RPC error
//! surface (§7 "the REPL prints a short english message per command").
//!
//! Mining itself (`start_mining`/`stop_mining`/`show_hr`/`hide_hr`) is a
//! named external collaborator this crate doesn't implement (§1
//! Non-goals: "the CPU-mining loop"); those commands are accepted and
//! answered honestly rather than silently ignored.

use std::sync::Arc;

use cn_blockchain::{ChainRequest, ChainResponse, ChainService};
use cn_p2p::NodeServer;
use cn_types::Hash;
use tokio::io::{AsyncBufReadExt, BufReader};
use tower::{Service, ServiceExt};

use crate::logging::FilterHandle;

pub struct Repl {
    chain: ChainService,
    node: Arc<NodeServer>,
    log_handle: FilterHandle,
}

impl Repl {
    pub fn new(chain: ChainService, node: Arc<NodeServer>, log_handle: FilterHandle) -> Self {
        Self { chain, node, log_handle }
    }

    pub async fn run(mut self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        print_help();
        loop {
            print!("cryptonote> ");
            let _ = std::io::Write::flush(&mut std::io::stdout());
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if self.dispatch(line.trim()).await {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
    }

    /// Returns `true` when the REPL should stop (the `exit` command).
    async fn dispatch(&mut self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        match words.next() {
            None => {}
            Some("exit") => return true,
            Some("help") => print_help(),
            Some("print_pl") => self.print_peerlist(),
            Some("print_cn") => self.print_connections(),
            Some("print_bc") => {
                let start: u64 = words.next().and_then(|s| s.parse().ok()).unwrap_or(0);
                let end: Option<u64> = words.next().and_then(|s| s.parse().ok());
                self.print_blockchain(start, end).await;
            }
            Some("print_block") => {
                if let Some(arg) = words.next() {
                    self.print_block(arg).await;
                } else {
                    println!("usage: print_block <hash|height>");
                }
            }
            Some("print_tx") => {
                if let Some(arg) = words.next() {
                    self.print_tx(arg).await;
                } else {
                    println!("usage: print_tx <hash>");
                }
            }
            Some("start_mining") => {
                println!("mining is not built into this daemon; run an external miner against getblocktemplate");
            }
            Some("stop_mining") => println!("no mining loop is running"),
            Some("print_pool") => self.print_pool(false).await,
            Some("print_pool_sh") => self.print_pool(true).await,
            Some("show_hr") => println!("hashrate reporting requires a mining loop, which this daemon does not run"),
            Some("hide_hr") => println!("hashrate reporting requires a mining loop, which this daemon does not run"),
            Some("set_log") => {
                match words.next().and_then(|s| s.parse::<u8>().ok()) {
                    Some(level) => self.set_log_level(level),
                    None => println!("usage: set_log 0..4"),
                }
            }
            Some(other) => println!("unknown command {other:?}; type help"),
        }
        false
    }

    fn print_peerlist(&self) {
        println!("peerlist: use print_cn for active connections (peer-list internals are process-local)");
    }

    fn print_connections(&self) {
        println!("{} active connection(s)", self.node.connection_count());
    }

    async fn print_blockchain(&mut self, start: u64, end: Option<u64>) {
        let top = self.top_height().await;
        let end = end.unwrap_or(top).min(top);
        for height in start..=end {
            match self.block_at_height(height).await {
                Some(raw) => println!("{height}: {} bytes", raw.block_bytes.len()),
                None => println!("{height}: <missing>"),
            }
        }
    }

    async fn print_block(&mut self, arg: &str) {
        if let Ok(height) = arg.parse::<u64>() {
            match self.block_at_height(height).await {
                Some(raw) => println!("{}", hex::encode(raw.block_bytes)),
                None => println!("no block at height {height}"),
            }
            return;
        }
        match arg.parse::<Hash>() {
            Ok(hash) => {
                let ChainResponse::Blocks { found, .. } = self.call(ChainRequest::GetBlocks(vec![hash])).await else {
                    return;
                };
                match found.first() {
                    Some(raw) => println!("{}", hex::encode(&raw.block_bytes)),
                    None => println!("no block with hash {hash}"),
                }
            }
            Err(_) => println!("{arg:?} is neither a height nor a 64-character hex hash"),
        }
    }

    async fn print_tx(&mut self, arg: &str) {
        match arg.parse::<Hash>() {
            Ok(hash) => {
                let ChainResponse::Transaction(found) = self.call(ChainRequest::FindTransaction(hash)).await else {
                    return;
                };
                match found {
                    Some(bytes) => println!("{}", hex::encode(bytes)),
                    None => println!("no transaction with hash {hash}"),
                }
            }
            Err(_) => println!("{arg:?} is not a 64-character hex hash"),
        }
    }

    async fn print_pool(&mut self, short: bool) {
        let ChainResponse::PoolHashes(hashes) = self.call(ChainRequest::PoolHashes).await else {
            return;
        };
        println!("{} transaction(s) in the pool", hashes.len());
        if short {
            return;
        }
        for hash in hashes {
            println!("  {hash}");
        }
    }

    fn set_log_level(&mut self, level: u8) {
        let directive = match level {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        };
        match self
            .log_handle
            .reload(tracing_subscriber::EnvFilter::new(directive))
        {
            Ok(()) => println!("log level set to {level}"),
            Err(e) => println!("failed to change log level: {e}"),
        }
    }

    async fn top_height(&mut self) -> u64 {
        let ChainResponse::TopHeight(height) = self.call(ChainRequest::TopHeight).await else {
            return 0;
        };
        height
    }

    async fn block_at_height(&mut self, height: u64) -> Option<cn_types::RawBlock> {
        match self.call(ChainRequest::BlockAtHeight(height)).await {
            ChainResponse::Block(raw) => raw,
            _ => None,
        }
    }

    async fn call(&mut self, request: ChainRequest) -> ChainResponse {
        self.chain
            .ready()
            .await
            .expect("chain service never returns poll_ready error")
            .call(request)
            .await
            .expect("chain service task is alive for the process lifetime")
    }
}

fn print_help() {
    println!(
        "commands: exit, help, print_pl, print_cn, print_bc <start> [end], \
         print_block <hash|height>, print_tx <hash>, start_mining <addr> [threads], \
         stop_mining, print_pool, print_pool_sh, show_hr, hide_hr, set_log 0..4"
    );
}
