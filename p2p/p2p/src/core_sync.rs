//! The seam between the node server and the rest of the node (chain
//! manager, mempool). Kept as a trait rather than a direct dependency on
//! `cn-blockchain`/`cn-txpool` so the P2P crate compiles and tests
//! independently of storage; the daemon binary wires a concrete
//! implementation in at startup.

use cn_types::{Hash, RawBlock};
use cn_wire::CoreSyncData;
use uuid::Uuid;

/// Callbacks the node server makes into the rest of the node while
/// running the sync state machine (§4.4, §4.6).
pub trait CoreSync: Send + Sync + 'static {
    /// The data advertised in our own handshake/timed-sync payloads.
    fn sync_data(&self) -> CoreSyncData;

    /// A sparse locator of our main-chain hashes, for `NOTIFY_REQUEST_CHAIN`
    /// (§4.6).
    fn chain_locator(&self) -> Vec<Hash>;

    /// Finds the deepest hash from `locator` we recognize and returns its
    /// height plus a forward run of hashes (§4.6
    /// `NOTIFY_RESPONSE_CHAIN_ENTRY`).
    fn find_common_ancestor(&self, locator: &[Hash]) -> (u64, u64, Vec<Hash>);

    /// Looks up raw blocks by hash for `NOTIFY_RESPONSE_GET_OBJECTS`;
    /// missing hashes are reported back to the caller (§4.4 `getBlocks`).
    fn get_blocks(&self, wanted: &[Hash]) -> (Vec<RawBlock>, Vec<Hash>);

    /// The block hash `raw` would be assigned, used to check a
    /// `NOTIFY_RESPONSE_GET_OBJECTS` reply against what was requested
    /// (§4.6 "a response not matching a pending request"). `None` if
    /// `raw` doesn't even parse.
    fn block_hash(&self, raw: &RawBlock) -> Option<Hash>;

    /// Hands a block received from a peer to the validation pipeline
    /// (§4.4). Errors are logged by the caller; the connection is not
    /// penalized for a rejected block unless it's a protocol violation.
    fn submit_block(&self, from: Uuid, raw: RawBlock);

    /// Hands transactions received from a peer to the mempool (§4.5).
    fn submit_transactions(&self, from: Uuid, raw: Vec<Vec<u8>>);

    /// The mempool's current hash set, for `PoolSyncRequired` (§4.6).
    fn pool_hashes(&self) -> Vec<Hash>;

    /// Raw bytes for the pool hashes the peer is missing.
    fn pool_transactions(&self, missing: &[Hash]) -> Vec<Vec<u8>>;
}
