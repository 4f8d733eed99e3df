//! The white/gray peer-list manager (§4.8).
//!
//! White entries are peers we've successfully handshaked (and
//! back-pinged, §4.6) with recently; gray entries are peers we merely
//! heard about. Both are capacity-bounded index maps keyed by address so
//! `setPeerJustSeen`/`setPeerUnreachable` are O(1) amortized, matching the
//! source's `boost::multi_index` usage without pulling in that crate.

mod serde_file;

pub use serde_file::{deserialize, serialize, PeerlistPersistError};

use std::net::IpAddr;

use cn_constants::p2p::{P2P_LOCAL_GRAY_PEERLIST_LIMIT, P2P_LOCAL_WHITE_PEERLIST_LIMIT};
use cn_types::{NetworkAddress, PeerlistEntry};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct PeerlistManager {
    white: IndexMap<NetworkAddress, PeerlistEntry>,
    gray: IndexMap<NetworkAddress, PeerlistEntry>,
    allow_local_ip: bool,
    white_limit: usize,
    gray_limit: usize,
}

impl PeerlistManager {
    pub fn new(allow_local_ip: bool) -> Self {
        Self {
            white: IndexMap::new(),
            gray: IndexMap::new(),
            allow_local_ip,
            white_limit: P2P_LOCAL_WHITE_PEERLIST_LIMIT,
            gray_limit: P2P_LOCAL_GRAY_PEERLIST_LIMIT,
        }
    }

    fn is_routable(&self, ip: IpAddr) -> bool {
        self.allow_local_ip || is_globally_routable(ip)
    }

    /// `mergePeerlist`: inserts each entry into gray unless it's already
    /// in white (§4.8).
    pub fn merge_peerlist(&mut self, entries: impl IntoIterator<Item = PeerlistEntry>) {
        for entry in entries {
            if !self.is_routable(entry.address.ip) {
                continue;
            }
            if self.white.contains_key(&entry.address) {
                continue;
            }
            self.insert_capped(&entry.address.clone(), entry, false);
        }
    }

    /// `setPeerJustSeen`: upsert into white with `lastSeen = now` (§4.8).
    pub fn set_peer_just_seen(&mut self, peer_id: u64, address: NetworkAddress, now: u64) {
        self.gray.shift_remove(&address);
        let entry = PeerlistEntry {
            address,
            peer_id,
            last_seen: now,
        };
        self.insert_capped(&address, entry, true);
    }

    /// `setPeerUnreachable`: demote to gray, or drop if already gray
    /// (§4.8).
    pub fn set_peer_unreachable(&mut self, address: &NetworkAddress) {
        if let Some(entry) = self.white.shift_remove(address) {
            self.insert_capped(address, entry, false);
        } else {
            self.gray.shift_remove(address);
        }
    }

    fn insert_capped(&mut self, address: &NetworkAddress, entry: PeerlistEntry, white: bool) {
        let (map, limit) = if white {
            (&mut self.white, self.white_limit)
        } else {
            (&mut self.gray, self.gray_limit)
        };
        map.insert(*address, entry);
        if map.len() > limit {
            evict_oldest(map);
        }
    }

    pub fn white_len(&self) -> usize {
        self.white.len()
    }

    pub fn gray_len(&self) -> usize {
        self.gray.len()
    }

    pub fn contains_white(&self, address: &NetworkAddress) -> bool {
        self.white.contains_key(address)
    }

    /// `getPeerlistHead(depth)`: the most-recently-seen `depth` white
    /// entries, for handshake payloads (§4.8).
    pub fn peerlist_head(&self, depth: usize) -> Vec<PeerlistEntry> {
        let mut entries: Vec<PeerlistEntry> = self.white.values().copied().collect();
        entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        entries.truncate(depth);
        entries
    }

    pub fn peerlist_full(&self) -> (Vec<PeerlistEntry>, Vec<PeerlistEntry>) {
        (
            self.white.values().copied().collect(),
            self.gray.values().copied().collect(),
        )
    }

    pub fn white_entries(&self) -> impl Iterator<Item = &PeerlistEntry> {
        self.white.values()
    }

    pub fn gray_entries(&self) -> impl Iterator<Item = &PeerlistEntry> {
        self.gray.values()
    }
}

fn evict_oldest(map: &mut IndexMap<NetworkAddress, PeerlistEntry>) {
    if let Some((&addr, _)) = map.iter().min_by_key(|(_, entry)| entry.last_seen) {
        map.shift_remove(&addr);
    }
}

/// A conservative routability check: rejects loopback, link-local,
/// unspecified, and documentation ranges. Real deployments can still
/// allow all of these via `--allow-local-ip`.
fn is_globally_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_loopback() || v4.is_link_local() || v4.is_private() || v4.is_unspecified()),
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> NetworkAddress {
        NetworkAddress {
            ip: ip.parse().unwrap(),
            port,
        }
    }

    #[test]
    fn local_ip_rejected_unless_allowed() {
        let mut manager = PeerlistManager::new(false);
        manager.merge_peerlist([PeerlistEntry {
            address: addr("10.0.0.1", 8080),
            peer_id: 1,
            last_seen: 1,
        }]);
        assert_eq!(manager.gray_len(), 0);

        let mut manager = PeerlistManager::new(true);
        manager.merge_peerlist([PeerlistEntry {
            address: addr("10.0.0.1", 8080),
            peer_id: 1,
            last_seen: 1,
        }]);
        assert_eq!(manager.gray_len(), 1);
    }

    #[test]
    fn seen_peer_moves_from_gray_to_white() {
        let mut manager = PeerlistManager::new(true);
        let a = addr("1.2.3.4", 8080);
        manager.merge_peerlist([PeerlistEntry {
            address: a,
            peer_id: 1,
            last_seen: 1,
        }]);
        assert_eq!(manager.gray_len(), 1);

        manager.set_peer_just_seen(1, a, 100);
        assert_eq!(manager.gray_len(), 0);
        assert_eq!(manager.white_len(), 1);
        assert!(manager.contains_white(&a));
    }

    #[test]
    fn unreachable_demotes_to_gray_then_drops() {
        let mut manager = PeerlistManager::new(true);
        let a = addr("1.2.3.4", 8080);
        manager.set_peer_just_seen(1, a, 100);
        assert_eq!(manager.white_len(), 1);

        manager.set_peer_unreachable(&a);
        assert_eq!(manager.white_len(), 0);
        assert_eq!(manager.gray_len(), 1);

        manager.set_peer_unreachable(&a);
        assert_eq!(manager.gray_len(), 0);
    }

    #[test]
    fn white_list_evicts_oldest_when_over_capacity() {
        let mut manager = PeerlistManager::new(true);
        manager.white_limit = 2;
        manager.set_peer_just_seen(1, addr("1.1.1.1", 1), 1);
        manager.set_peer_just_seen(2, addr("2.2.2.2", 2), 2);
        manager.set_peer_just_seen(3, addr("3.3.3.3", 3), 3);
        assert_eq!(manager.white_len(), 2);
        assert!(!manager.contains_white(&addr("1.1.1.1", 1)));
    }
}
