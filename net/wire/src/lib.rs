//! P2P command/notify payload definitions (§6), layered on top of the
//! Levin framing (`cn-levin`) and the portable-storage codec
//! (`cn-epee-encoding`).

pub mod commands;
pub mod ids;

pub use commands::*;
