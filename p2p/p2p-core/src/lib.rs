//! Connection-level P2P machinery: the transport seam, Levin/epee
//! message dispatch, and the reader/writer task pair each socket gets
//! (§4.6). The sync-state machine, handshake choreography and peer
//! selection live one layer up in `cn-p2p`; this crate only gets bytes
//! on and off the wire as typed messages.

pub mod connection;
pub mod message;
pub mod zone;

pub use connection::{spawn, ConnectionError, ConnectionHandle, SpawnedConnection};
pub use message::{Message, MessageError};
pub use zone::{ClearNet, NetworkZone};
