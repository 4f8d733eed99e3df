//! The node server (§4.6): accept loop, connection maker, timed-sync
//! loop and the per-peer sync state machine, built on the connection
//! primitives in `cn-p2p-core` and the peer list in `cn-address-book`.

pub mod config;
pub mod core_sync;
pub mod server;
pub mod state;

pub use config::P2pConfig;
pub use core_sync::CoreSync;
pub use server::NodeServer;
