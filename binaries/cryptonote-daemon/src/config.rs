//! Config loading: defaults, then an optional TOML file, then CLI flags
//! (§6, §7 "Config: invalid CLI or config file -> exit with code 1 at
//! startup"). `DaemonConfig` is the single value every subsystem's own
//! config type (`P2pConfig`, `Currency`, ...) gets built from.

pub mod args;

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use cn_constants::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use args::Args;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid checkpoint override {0:?}: expected `height:hash`")]
    BadCheckpoint(String),
    #[error("invalid peer address {0:?}")]
    BadPeerAddress(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: u8,
    pub no_console: bool,
    pub testnet: bool,

    pub p2p_bind_ip: IpAddr,
    pub p2p_bind_port: u16,
    pub p2p_external_port: u16,
    pub add_peer: Vec<String>,
    pub add_priority_node: Vec<String>,
    pub add_exclusive_node: Vec<String>,
    pub seed_node: Vec<String>,
    pub allow_local_ip: bool,
    pub hide_my_port: bool,

    pub rpc_bind_ip: IpAddr,
    pub rpc_bind_port: u16,
    pub enable_cors: bool,
    pub fee_address: Option<String>,
    pub enable_blockexplorer: bool,

    pub db_threads: usize,
    pub db_max_open_files: usize,
    pub db_write_buffer_size: usize,
    pub db_read_cache_size: usize,

    pub money_supply: Option<u64>,
    pub emission_speed_factor: Option<u8>,
    pub difficulty_target: Option<u64>,
    pub upgrade_height_v2: Option<u64>,
    pub upgrade_height_v3: Option<u64>,
    pub genesis_coinbase_tx_hex: Option<String>,
    pub checkpoints: Vec<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: None,
            log_level: 1,
            no_console: false,
            testnet: false,

            p2p_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            p2p_bind_port: cn_constants::p2p::P2P_DEFAULT_PORT,
            p2p_external_port: 0,
            add_peer: Vec::new(),
            add_priority_node: Vec::new(),
            add_exclusive_node: Vec::new(),
            seed_node: Vec::new(),
            allow_local_ip: false,
            hide_my_port: false,

            rpc_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rpc_bind_port: cn_constants::p2p::RPC_DEFAULT_PORT,
            enable_cors: false,
            fee_address: None,
            enable_blockexplorer: false,

            db_threads: 2,
            db_max_open_files: 100,
            db_write_buffer_size: 64,
            db_read_cache_size: 128,

            money_supply: None,
            emission_speed_factor: None,
            difficulty_target: None,
            upgrade_height_v2: None,
            upgrade_height_v3: None,
            genesis_coinbase_tx_hex: None,
            checkpoints: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cryptonote")
}

impl DaemonConfig {
    /// Defaults, then `path` (if given), then `args` on top (§6).
    pub fn load(path: Option<&Path>, args: &Args) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(v) = &args.data_dir {
            self.data_dir = v.clone();
        }
        if let Some(v) = &args.log_file {
            self.log_file = Some(v.clone());
        }
        if let Some(v) = args.log_level {
            self.log_level = v;
        }
        self.no_console |= args.no_console;
        self.testnet |= args.testnet;

        if let Some(v) = args.p2p_bind_ip {
            self.p2p_bind_ip = v;
        }
        if let Some(v) = args.p2p_bind_port {
            self.p2p_bind_port = v;
        }
        if let Some(v) = args.p2p_external_port {
            self.p2p_external_port = v;
        }
        self.add_peer.extend(args.add_peer.iter().cloned());
        self.add_priority_node.extend(args.add_priority_node.iter().cloned());
        self.add_exclusive_node.extend(args.add_exclusive_node.iter().cloned());
        self.seed_node.extend(args.seed_node.iter().cloned());
        self.allow_local_ip |= args.allow_local_ip;
        self.hide_my_port |= args.hide_my_port;

        if let Some(v) = args.rpc_bind_ip {
            self.rpc_bind_ip = v;
        }
        if let Some(v) = args.rpc_bind_port {
            self.rpc_bind_port = v;
        }
        self.enable_cors |= args.enable_cors;
        if let Some(v) = &args.fee_address {
            self.fee_address = Some(v.clone());
        }
        self.enable_blockexplorer |= args.enable_blockexplorer;

        if let Some(v) = args.db_threads {
            self.db_threads = v;
        }
        if let Some(v) = args.db_max_open_files {
            self.db_max_open_files = v;
        }
        if let Some(v) = args.db_write_buffer_size {
            self.db_write_buffer_size = v;
        }
        if let Some(v) = args.db_read_cache_size {
            self.db_read_cache_size = v;
        }

        if args.money_supply.is_some() {
            self.money_supply = args.money_supply;
        }
        if args.emission_speed_factor.is_some() {
            self.emission_speed_factor = args.emission_speed_factor;
        }
        if args.difficulty_target.is_some() {
            self.difficulty_target = args.difficulty_target;
        }
        if args.upgrade_height_v2.is_some() {
            self.upgrade_height_v2 = args.upgrade_height_v2;
        }
        if args.upgrade_height_v3.is_some() {
            self.upgrade_height_v3 = args.upgrade_height_v3;
        }
        if args.genesis_coinbase_tx_hex.is_some() {
            self.genesis_coinbase_tx_hex = args.genesis_coinbase_tx_hex.clone();
        }
        self.checkpoints.extend(args.checkpoint.iter().cloned());
    }

    /// Builds the effective consensus parameter set, applying any
    /// coin-parameter overrides on top of mainnet/testnet defaults (§6).
    pub fn currency(&self) -> Result<Currency, ConfigError> {
        let mut currency = if self.testnet {
            Currency::testnet()
        } else {
            Currency::mainnet()
        };

        if let Some(v) = self.money_supply {
            currency.money.money_supply = v;
        }
        if let Some(v) = self.emission_speed_factor {
            currency.money.emission_speed_factor = v;
        }
        if let Some(v) = self.difficulty_target {
            currency.difficulty.target_seconds_v1 = v;
            currency.difficulty.target_seconds_v2 = v;
        }
        if let Some(v) = self.upgrade_height_v2 {
            currency.upgrade.height_v2_override = v;
        }
        if let Some(v) = self.upgrade_height_v3 {
            currency.upgrade.height_v3_override = v;
        }

        Ok(currency)
    }

    /// Parses `--checkpoint height:hash` overrides (§6, §4.10).
    pub fn parsed_checkpoints(&self) -> Result<Vec<(u64, cn_types::Hash)>, ConfigError> {
        self.checkpoints
            .iter()
            .map(|entry| {
                let (height, hash) = entry
                    .split_once(':')
                    .ok_or_else(|| ConfigError::BadCheckpoint(entry.clone()))?;
                let height: u64 = height
                    .parse()
                    .map_err(|_| ConfigError::BadCheckpoint(entry.clone()))?;
                let hash: cn_types::Hash = hash
                    .parse()
                    .map_err(|_| ConfigError::BadCheckpoint(entry.clone()))?;
                Ok((height, hash))
            })
            .collect()
    }

    pub fn genesis_coinbase_tx_hex(&self) -> &str {
        self.genesis_coinbase_tx_hex
            .as_deref()
            .unwrap_or(cn_constants::genesis::GENESIS_COINBASE_TX_HEX)
    }
}
