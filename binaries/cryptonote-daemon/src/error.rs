//! Top-level error type for `main`, mapped to the process exit codes §7
//! defines ("0 clean, 1 runtime failure, 2 CLI misuse"). `clap` already
//! exits with code 2 on its own for malformed arguments; everything that
//! reaches this type is either a config problem or a startup I/O
//! failure, both of which are "exit with code 1 at startup" per §7.

use thiserror::Error;

use crate::config::ConfigError;
use crate::genesis::GenesisError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Genesis(#[from] GenesisError),
    #[error("failed to construct the genesis chain: {0}")]
    ChainInit(#[from] cn_blockchain::BlockError),
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("p2p listener failed: {0}")]
    P2p(#[from] std::io::Error),
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}
