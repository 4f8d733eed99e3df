//! On-disk persistence for the peer list (`p2pstate.bin`, §4.8).
//!
//! Uses the same hand-written binary codec as consensus data (`cn_types`)
//! rather than `serde`, since this state never crosses a wire boundary
//! that needs a self-describing format, and it keeps the dependency list
//! free of a second serialization stack for one small file.

use std::io;
use std::path::Path;

use cn_types::codec::{decode_vec, encode_vec, Decode, Encode, Reader};
use cn_types::error::CodecError;
use thiserror::Error;

use crate::PeerlistManager;

#[derive(Debug, Error)]
pub enum PeerlistPersistError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt peer list file: {0}")]
    Codec(#[from] CodecError),
}

const MAGIC: u32 = 0x434e_5032; // "CNP2"
const VERSION: u8 = 1;

pub fn serialize(manager: &PeerlistManager, path: impl AsRef<Path>) -> Result<(), PeerlistPersistError> {
    let mut out = Vec::new();
    MAGIC.encode(&mut out);
    VERSION.encode(&mut out);

    let (white, gray) = manager.peerlist_full();
    encode_vec(&white, &mut out);
    encode_vec(&gray, &mut out);

    std::fs::write(path, out)?;
    Ok(())
}

pub fn deserialize(path: impl AsRef<Path>, allow_local_ip: bool) -> Result<PeerlistManager, PeerlistPersistError> {
    let bytes = std::fs::read(path)?;
    let mut reader = Reader::new(&bytes);

    let magic = u32::decode(&mut reader)?;
    if magic != MAGIC {
        return Err(CodecError::OutOfRange("peer list magic").into());
    }
    let _version = u8::decode(&mut reader)?;

    let white = decode_vec(&mut reader)?;
    let gray = decode_vec(&mut reader)?;

    let mut manager = PeerlistManager::new(allow_local_ip);
    for entry in white {
        let entry: cn_types::PeerlistEntry = entry;
        manager.set_peer_just_seen(entry.peer_id, entry.address, entry.last_seen);
    }
    manager.merge_peerlist(gray);
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("cn-address-book-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("p2pstate.bin");

        let mut manager = PeerlistManager::new(true);
        manager.set_peer_just_seen(
            1,
            cn_types::NetworkAddress {
                ip: "1.2.3.4".parse().unwrap(),
                port: 18080,
            },
            1000,
        );
        manager.merge_peerlist([PeerlistEntry {
            address: cn_types::NetworkAddress {
                ip: "5.6.7.8".parse().unwrap(),
                port: 18080,
            },
            peer_id: 2,
            last_seen: 2000,
        }]);

        serialize(&manager, &path).unwrap();
        let loaded = deserialize(&path, true).unwrap();
        assert_eq!(loaded.white_len(), 1);
        assert_eq!(loaded.gray_len(), 1);

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(&dir).ok();
    }
}
