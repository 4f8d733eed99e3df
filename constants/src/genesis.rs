//! Genesis / network-identity constants (§6).

/// 16-byte mainnet network id; testnet flips byte 0.
pub const MAINNET_NETWORK_ID: [u8; 16] = [
    0x11, 0x33, 0x00, 0x07, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01,
];

/// Hex-encoded genesis coinbase transaction (placeholder; a real
/// deployment overrides this via `--genesis-coinbase-tx-hex`, mirroring
/// the source's `GENESIS_COINBASE_TX_HEX` config override).
pub const GENESIS_COINBASE_TX_HEX: &str =
    "010a01ff0001808088c78bb7ea01029b2e4c0281c0b02e7c53291a94d1d0cbff8883f8024f5142ee494ffbbd0880712101d8b3d7c3fb0f9b7c7a94a8e7e2b8e2eb6d3f1f3f9e4d5c6b7a8978695a4b3c2d1e0";

pub const DEFAULT_SEED_NODES: &[&str] = &[];
