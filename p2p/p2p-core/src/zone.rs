//! A thin seam between the connection machinery and the transport it
//! rides on, so a single-socket public TCP listener is the only
//! implementation today but a future zone (e.g. an onion service) only
//! has to supply a stream type and a dialer (§9 Non-goals: "dark"
//! transports are out of scope, but the abstraction point is kept so
//! adding one later doesn't touch `cn-p2p`).

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A network transport capable of producing byte streams for the Levin
/// framing layer.
pub trait NetworkZone: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    type Addr: Clone + Send + Sync + std::fmt::Debug + 'static;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClearNet;

impl NetworkZone for ClearNet {
    type Stream = TcpStream;
    type Addr = SocketAddr;
}
