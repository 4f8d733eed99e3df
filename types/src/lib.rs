//! The core consensus data model (§3).
//!
//! Everything in this crate is a plain value type plus a bit-exact binary
//! codec (`Encode`/`Decode`, §4.1) — the chain manager, mempool and P2P
//! layers all build on top of these without redefining the wire layout.

pub mod block;
pub mod codec;
pub mod connection;
pub mod error;
pub mod hash;
pub mod keys;
pub mod peer;
pub mod transaction;

pub use block::{BlockTemplate, CachedBlock, ParentBlock, RawBlock};
pub use codec::{Decode, Encode};
pub use connection::{ConnectionContext, ConnectionDirection, ConnectionState};
pub use error::CodecError;
pub use hash::Hash;
pub use keys::{KeyImage, PublicKey, SecretKey, Signature};
pub use peer::{NetworkAddress, PeerlistEntry};
pub use transaction::{
    CachedTransaction, Transaction, TransactionInput, TransactionOutput, TransactionTarget,
};

/// Atomic units of the currency (§3).
pub type Amount = u64;

/// A spend/view public-key pair (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub spend_public_key: PublicKey,
    pub view_public_key: PublicKey,
}
