//! Command ids (§6 tables). Command-type ids are `base + offset`,
//! notify-type ids share a different base so the dispatcher can tell them
//! apart without consulting the Levin header's `have_to_return_data` bit.

use cn_constants::p2p::{LEVIN_COMMAND_BASE, LEVIN_NOTIFY_BASE};

pub const HANDSHAKE: u32 = LEVIN_COMMAND_BASE + 1;
pub const TIMED_SYNC: u32 = LEVIN_COMMAND_BASE + 2;
pub const PING: u32 = LEVIN_COMMAND_BASE + 3;
pub const STAT_INFO: u32 = LEVIN_COMMAND_BASE + 4;
pub const NETWORK_STATE: u32 = LEVIN_COMMAND_BASE + 5;
pub const PEER_ID: u32 = LEVIN_COMMAND_BASE + 6;

pub const NOTIFY_NEW_BLOCK: u32 = LEVIN_NOTIFY_BASE + 1;
pub const NOTIFY_NEW_TRANSACTIONS: u32 = LEVIN_NOTIFY_BASE + 2;
pub const NOTIFY_REQUEST_GET_OBJECTS: u32 = LEVIN_NOTIFY_BASE + 3;
pub const NOTIFY_RESPONSE_GET_OBJECTS: u32 = LEVIN_NOTIFY_BASE + 4;
pub const NOTIFY_REQUEST_CHAIN: u32 = LEVIN_NOTIFY_BASE + 6;
pub const NOTIFY_RESPONSE_CHAIN_ENTRY: u32 = LEVIN_NOTIFY_BASE + 7;
pub const NOTIFY_REQUEST_TX_POOL: u32 = LEVIN_NOTIFY_BASE + 8;
