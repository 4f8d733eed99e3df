//! The daemon's minimal JSON-RPC 2.0 surface (§6): `get_info`,
//! `get_height`, `get_block_template`, `submit_block`, `get_transactions`,
//! served over [`axum`] with a [`cn_json_rpc`] envelope.

mod handler;
mod method;
mod router;

pub use method::Method;
pub use router::router;
