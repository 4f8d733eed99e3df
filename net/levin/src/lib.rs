//! The Levin framing protocol (§4.6, §6): a fixed 29-byte header (33 in
//! the teacher's implementation, which folds the version field into the
//! same count — we list the field layout exactly per §6) followed by a
//! length-prefixed payload.

mod codec;
mod header;

pub use codec::LevinCodec;
pub use header::{Flags, Header};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevinError {
    #[error("bad levin signature")]
    BadSignature,
    #[error("payload exceeds the maximum bucket size")]
    TooLarge,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully-framed Levin message: header plus raw payload bytes. Payload
/// interpretation (epee object, command dispatch) happens one layer up,
/// in `cn-wire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Logical message kinds riding over one Levin connection (§4.6 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Request/response RPC: handshake, timed-sync, ping.
    Command,
    /// One-way gossip: block/tx relays, chain requests.
    Notify,
    /// Carries a return code for a prior `Command`.
    Reply,
}

impl Bucket {
    pub fn kind(&self) -> MessageKind {
        if self.header.flags.is_response() {
            MessageKind::Reply
        } else if self.header.have_to_return_data {
            MessageKind::Command
        } else {
            MessageKind::Notify
        }
    }
}
