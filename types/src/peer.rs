//! Peer-list entries (§3, §4.8).

use std::net::IpAddr;

use crate::codec::{Decode, Encode, Reader};
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerlistEntry {
    pub address: NetworkAddress,
    pub peer_id: u64,
    /// UNIX seconds.
    pub last_seen: u64,
}

impl Encode for NetworkAddress {
    fn encode(&self, out: &mut Vec<u8>) {
        match self.ip {
            IpAddr::V4(v4) => {
                0u8.encode(out);
                v4.octets().encode(out);
            }
            IpAddr::V6(v6) => {
                1u8.encode(out);
                v6.octets().encode(out);
            }
        }
        self.port.encode(out);
    }
}

impl Decode for NetworkAddress {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let ip = match u8::decode(reader)? {
            0 => IpAddr::V4(<[u8; 4]>::decode(reader)?.into()),
            1 => IpAddr::V6(<[u8; 16]>::decode(reader)?.into()),
            _ => return Err(CodecError::OutOfRange("network address family")),
        };
        let port = u16::decode(reader)?;
        Ok(Self { ip, port })
    }
}

impl Encode for PeerlistEntry {
    fn encode(&self, out: &mut Vec<u8>) {
        self.address.encode(out);
        self.peer_id.encode(out);
        self.last_seen.encode(out);
    }
}

impl Decode for PeerlistEntry {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: NetworkAddress::decode(reader)?,
            peer_id: u64::decode(reader)?,
            last_seen: u64::decode(reader)?,
        })
    }
}
