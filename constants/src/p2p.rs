//! P2P protocol constants (§4.6, §6).

use std::time::Duration;

pub const P2P_DEFAULT_PORT: u16 = 8080;
pub const RPC_DEFAULT_PORT: u16 = 8081;

pub const LEVIN_SIGNATURE: u64 = 0x0101_0101_0101_2101;
pub const LEVIN_PROTOCOL_VERSION: u32 = 1;

/// Base command id for Command-type (handshake/ping/timed-sync) messages.
pub const LEVIN_COMMAND_BASE: u32 = 1000;
/// Base command id for Notify-type (block/tx/chain-sync) messages.
pub const LEVIN_NOTIFY_BASE: u32 = 2000;

pub const P2P_DEFAULT_HANDSHAKE_INTERVAL: Duration = Duration::from_secs(60);
pub const P2P_DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(60);
pub const P2P_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const P2P_DEFAULT_PING_CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

pub const P2P_CONNECTION_MAX_WRITE_BUFFER_SIZE: usize = 32 * 1024 * 1024;

pub const P2P_LOCAL_WHITE_PEERLIST_LIMIT: usize = 1_000;
pub const P2P_LOCAL_GRAY_PEERLIST_LIMIT: usize = 5_000;

pub const P2P_DEFAULT_WHITELIST_CONNECTIONS_PERCENT: u8 = 70;
pub const P2P_DEFAULT_CONNECTIONS_COUNT: usize = 8;

pub const BLOCKS_SYNCHRONIZING_DEFAULT_COUNT: usize = 100;

pub const NETWORK_ID_SIZE: usize = 16;
