//! CLI surface (§6 "CLI surface (daemon)"). Parsed once at startup and
//! layered over a TOML config file and the built-in defaults (CLI wins,
//! then file, then defaults), mirroring the teacher's `--config-file` /
//! `--generate-config` shape generalized to the full flag list here.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cryptonote-daemon", version, about)]
pub struct Args {
    /// Path to a TOML config file; relative paths resolve against `--data-dir`.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Directory holding `blocks.bin`, `poolstate.bin`, `p2pstate.bin`, logs.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// 0 (ERROR) through 4 (TRACE), per §6.
    #[arg(long)]
    pub log_level: Option<u8>,

    #[arg(long)]
    pub no_console: bool,

    #[arg(long)]
    pub testnet: bool,

    #[arg(long)]
    pub p2p_bind_ip: Option<IpAddr>,
    #[arg(long)]
    pub p2p_bind_port: Option<u16>,
    #[arg(long)]
    pub p2p_external_port: Option<u16>,
    #[arg(long = "add-peer")]
    pub add_peer: Vec<String>,
    #[arg(long = "add-priority-node")]
    pub add_priority_node: Vec<String>,
    #[arg(long = "add-exclusive-node")]
    pub add_exclusive_node: Vec<String>,
    #[arg(long = "seed-node")]
    pub seed_node: Vec<String>,
    #[arg(long)]
    pub allow_local_ip: bool,
    #[arg(long)]
    pub hide_my_port: bool,

    #[arg(long)]
    pub rpc_bind_ip: Option<IpAddr>,
    #[arg(long)]
    pub rpc_bind_port: Option<u16>,
    #[arg(long)]
    pub enable_cors: bool,
    #[arg(long)]
    pub fee_address: Option<String>,
    #[arg(long)]
    pub enable_blockexplorer: bool,

    #[arg(long)]
    pub db_threads: Option<usize>,
    #[arg(long)]
    pub db_max_open_files: Option<usize>,
    #[arg(long)]
    pub db_write_buffer_size: Option<usize>,
    #[arg(long)]
    pub db_read_cache_size: Option<usize>,

    /// Coin-parameter overrides, for Forknote-style fork deployments (§6).
    #[arg(long)]
    pub money_supply: Option<u64>,
    #[arg(long)]
    pub emission_speed_factor: Option<u8>,
    #[arg(long)]
    pub difficulty_target: Option<u64>,
    #[arg(long)]
    pub upgrade_height_v2: Option<u64>,
    #[arg(long)]
    pub upgrade_height_v3: Option<u64>,
    #[arg(long)]
    pub genesis_coinbase_tx_hex: Option<String>,
    /// `height:hash`, may be repeated.
    #[arg(long = "checkpoint")]
    pub checkpoint: Vec<String>,

    /// Print the effective config (after layering) as TOML and exit.
    #[arg(long)]
    pub generate_config: bool,
}

impl Args {
    /// Requests that exit the process before the node ever starts (§6,
    /// mirroring the teacher's `do_quick_requests`).
    pub fn do_quick_requests(&self, config: &super::DaemonConfig) {
        if self.generate_config {
            match toml::to_string_pretty(config) {
                Ok(toml) => println!("{toml}"),
                Err(e) => eprintln!("failed to render config: {e}"),
            }
            std::process::exit(0);
        }
    }
}
