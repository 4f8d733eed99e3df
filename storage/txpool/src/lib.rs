//! The fee-ordered transaction pool (§4.5): admits a transaction once its
//! key-images and multisig references don't conflict with anything else
//! live (pool or chain), evicts by TTL and by size budget, and hands the
//! chain manager a fee-density-ordered slice for block templates.

pub mod service;

use std::time::Duration;

use cn_constants::mempool::MempoolParams;
use cn_helper::time::current_unix_timestamp;
use cn_types::{Amount, CachedTransaction, Hash, KeyImage, Transaction};
use indexmap::IndexMap;
use thiserror::Error;

pub use service::{PoolRequest, PoolResponse, PoolService};

/// The pool's view onto state it doesn't own: the chain's confirmed
/// spent-key-image and multisig-reference sets (§4.5 "the pool holds a
/// view of the chain's spent set"). Kept as a trait so this crate never
/// depends on `cn-blockchain`.
pub trait ChainSpentView {
    fn key_image_spent(&self, key_image: &KeyImage) -> bool;
    fn multisig_reference_spent(&self, reference: &(Amount, u32, u32)) -> bool;
}

/// An always-empty view, useful for tests and for a pool used before any
/// chain state exists.
pub struct NoSpentState;

impl ChainSpentView for NoSpentState {
    fn key_image_spent(&self, _key_image: &KeyImage) -> bool {
        false
    }

    fn multisig_reference_spent(&self, _reference: &(Amount, u32, u32)) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("already in the pool")]
    AlreadyInPool,
    #[error("transaction has no inputs or no outputs")]
    EmptyInputsOrOutputs,
    #[error("an output amount is zero")]
    ZeroOutputAmount,
    #[error("inputs do not cover outputs (negative fee)")]
    NegativeFee,
    #[error("transaction exceeds the per-transaction size cap")]
    TooLarge,
    #[error("key image already spent in the pool")]
    KeyImageConflictsWithPool,
    #[error("key image already spent on the chain")]
    KeyImageConflictsWithChain,
    #[error("multisig output already referenced in the pool")]
    MultisigReferenceConflictsWithPool,
    #[error("multisig output already referenced on the chain")]
    MultisigReferenceConflictsWithChain,
}

#[derive(Debug, Clone)]
struct PoolEntry {
    cached: CachedTransaction,
    received_time: u64,
    livetime: Duration,
    key_images: Vec<KeyImage>,
    multisig_references: Vec<(Amount, u32, u32)>,
}

impl PoolEntry {
    fn size(&self) -> usize {
        self.cached.binary_array().len()
    }

    fn fee_density(&self) -> f64 {
        let size = self.size().max(1) as f64;
        self.cached.fee() as f64 / size
    }

    fn expires_at(&self) -> u64 {
        self.received_time.saturating_add(self.livetime.as_secs())
    }
}

pub struct TxPool {
    params: MempoolParams,
    entries: IndexMap<Hash, PoolEntry>,
    key_images: std::collections::HashSet<KeyImage>,
    multisig_references: std::collections::HashSet<(Amount, u32, u32)>,
    total_size: usize,
}

impl TxPool {
    pub fn new(params: MempoolParams) -> Self {
        Self {
            params,
            entries: IndexMap::new(),
            key_images: std::collections::HashSet::new(),
            multisig_references: std::collections::HashSet::new(),
            total_size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Validates shape and conflict-freedom and, if accepted, inserts the
    /// transaction (§4.5). `kept_by_block` marks a transaction returned to
    /// the pool by a reorg rollback, which gets the longer TTL.
    pub fn add(
        &mut self,
        tx: Transaction,
        hash_fn: impl Fn(&[u8]) -> Hash,
        spent: &dyn ChainSpentView,
        kept_by_block: bool,
    ) -> Result<Hash, RejectReason> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(RejectReason::EmptyInputsOrOutputs);
        }
        if tx.outputs.iter().any(|o| o.amount == 0) {
            return Err(RejectReason::ZeroOutputAmount);
        }
        if tx.fee().is_none() {
            return Err(RejectReason::NegativeFee);
        }

        let cached = CachedTransaction::new(tx, hash_fn);
        if cached.binary_array().len() > self.params.max_transaction_size {
            return Err(RejectReason::TooLarge);
        }
        if self.entries.contains_key(&cached.hash()) {
            return Err(RejectReason::AlreadyInPool);
        }

        let key_images: Vec<KeyImage> = cached
            .transaction
            .inputs
            .iter()
            .filter_map(|i| i.key_image())
            .collect();
        let multisig_references: Vec<(Amount, u32, u32)> = cached
            .transaction
            .inputs
            .iter()
            .filter_map(|i| i.multisig_reference())
            .collect();

        for key_image in &key_images {
            if self.key_images.contains(key_image) {
                return Err(RejectReason::KeyImageConflictsWithPool);
            }
            if spent.key_image_spent(key_image) {
                return Err(RejectReason::KeyImageConflictsWithChain);
            }
        }
        for reference in &multisig_references {
            if self.multisig_references.contains(reference) {
                return Err(RejectReason::MultisigReferenceConflictsWithPool);
            }
            if spent.multisig_reference_spent(reference) {
                return Err(RejectReason::MultisigReferenceConflictsWithChain);
            }
        }

        let hash = cached.hash();
        let size = cached.binary_array().len();
        let livetime = if kept_by_block {
            self.params.tx_from_alt_block_livetime
        } else {
            self.params.tx_livetime
        };
        let entry = PoolEntry {
            cached,
            received_time: current_unix_timestamp(),
            livetime,
            key_images,
            multisig_references,
        };

        for key_image in &entry.key_images {
            self.key_images.insert(*key_image);
        }
        for reference in &entry.multisig_references {
            self.multisig_references.insert(*reference);
        }
        self.total_size += size;
        self.entries.insert(hash, entry);
        self.enforce_size_budget();
        Ok(hash)
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Transaction> {
        let entry = self.entries.shift_remove(hash)?;
        self.forget(&entry);
        Some(entry.cached.transaction)
    }

    fn forget(&mut self, entry: &PoolEntry) {
        for key_image in &entry.key_images {
            self.key_images.remove(key_image);
        }
        for reference in &entry.multisig_references {
            self.multisig_references.remove(reference);
        }
        self.total_size = self.total_size.saturating_sub(entry.size());
    }

    /// Up to `max_bytes` worth of transactions, highest fee-density first
    /// (§4.9 `getBlockTemplate` step 3).
    pub fn take(&self, max_bytes: usize) -> Vec<Transaction> {
        let mut by_density: Vec<&PoolEntry> = self.entries.values().collect();
        by_density.sort_by(|a, b| b.fee_density().partial_cmp(&a.fee_density()).unwrap());

        let mut out = Vec::new();
        let mut used = 0usize;
        for entry in by_density {
            let size = entry.size();
            if used + size > max_bytes {
                continue;
            }
            used += size;
            out.push(entry.cached.transaction.clone());
        }
        out
    }

    /// Evicts every entry past its TTL, returning their hashes.
    pub fn expire(&mut self, now: u64) -> Vec<Hash> {
        let expired: Vec<Hash> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at() <= now)
            .map(|(h, _)| *h)
            .collect();
        for hash in &expired {
            self.remove(hash);
        }
        expired
    }

    /// Evicts lowest fee-density entries until `total_size` is back under
    /// budget (§4.5 "evict lowest-fee-density first when exceeded").
    pub fn enforce_size_budget(&mut self) -> Vec<Hash> {
        let mut evicted = Vec::new();
        while self.total_size > self.params.max_pool_size {
            let worst = self
                .entries
                .iter()
                .min_by(|a, b| a.1.fee_density().partial_cmp(&b.1.fee_density()).unwrap())
                .map(|(h, _)| *h);
            match worst {
                Some(hash) => {
                    self.remove(&hash);
                    evicted.push(hash);
                }
                None => break,
            }
        }
        evicted
    }

    pub fn hashes(&self) -> Vec<Hash> {
        self.entries.keys().copied().collect()
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.entries.get(hash).map(|e| &e.cached.transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cn_types::{KeyImage as Ki, PublicKey, Signature, TransactionInput, TransactionOutput, TransactionTarget};

    fn dummy_hash(bytes: &[u8]) -> Hash {
        let mut out = [0u8; 32];
        for (i, b) in bytes.iter().enumerate() {
            out[i % 32] ^= b;
        }
        Hash(out)
    }

    fn tx_spending(key_image: [u8; 32], fee: u64) -> Transaction {
        Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 100 + fee,
                key_image: Ki(key_image),
                output_offsets: vec![1],
            }],
            outputs: vec![TransactionOutput {
                amount: 100,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([9; 32]),
                },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([0; 64])]],
        }
    }

    #[test]
    fn accepts_and_removes_a_transaction() {
        let mut pool = TxPool::new(MempoolParams::default());
        let tx = tx_spending([1; 32], 5);
        let hash = pool.add(tx, dummy_hash, &NoSpentState, false).unwrap();
        assert!(pool.contains(&hash));
        assert_eq!(pool.len(), 1);
        pool.remove(&hash);
        assert!(!pool.contains(&hash));
        assert_eq!(pool.total_size(), 0);
    }

    #[test]
    fn rejects_duplicate_key_image_within_pool() {
        let mut pool = TxPool::new(MempoolParams::default());
        pool.add(tx_spending([2; 32], 1), dummy_hash, &NoSpentState, false)
            .unwrap();
        let mut other = tx_spending([2; 32], 2);
        other.extra = vec![9];
        let err = pool.add(other, dummy_hash, &NoSpentState, false).unwrap_err();
        assert_eq!(err, RejectReason::KeyImageConflictsWithPool);
    }

    struct AlwaysSpent;
    impl ChainSpentView for AlwaysSpent {
        fn key_image_spent(&self, _: &KeyImage) -> bool {
            true
        }
        fn multisig_reference_spent(&self, _: &(Amount, u32, u32)) -> bool {
            false
        }
    }

    #[test]
    fn rejects_key_image_already_spent_on_chain() {
        let mut pool = TxPool::new(MempoolParams::default());
        let err = pool
            .add(tx_spending([3; 32], 1), dummy_hash, &AlwaysSpent, false)
            .unwrap_err();
        assert_eq!(err, RejectReason::KeyImageConflictsWithChain);
    }

    #[test]
    fn take_orders_by_fee_density_and_respects_budget() {
        let mut pool = TxPool::new(MempoolParams::default());
        pool.add(tx_spending([4; 32], 1), dummy_hash, &NoSpentState, false)
            .unwrap();
        pool.add(tx_spending([5; 32], 50), dummy_hash, &NoSpentState, false)
            .unwrap();
        let taken = pool.take(usize::MAX);
        assert_eq!(taken.len(), 2);
        assert!(taken[0].fee().unwrap() > taken[1].fee().unwrap());
    }

    #[test]
    fn expire_evicts_past_ttl() {
        let mut params = MempoolParams::default();
        params.tx_livetime = Duration::from_secs(0);
        let mut pool = TxPool::new(params);
        let hash = pool
            .add(tx_spending([6; 32], 1), dummy_hash, &NoSpentState, false)
            .unwrap();
        let expired = pool.expire(current_unix_timestamp() + 1);
        assert_eq!(expired, vec![hash]);
        assert!(pool.is_empty());
    }

    #[test]
    fn size_budget_evicts_lowest_fee_density_first() {
        let mut params = MempoolParams::default();
        let mut pool = TxPool::new(params.clone());
        let low = pool
            .add(tx_spending([7; 32], 1), dummy_hash, &NoSpentState, false)
            .unwrap();
        let high = pool
            .add(tx_spending([8; 32], 1000), dummy_hash, &NoSpentState, false)
            .unwrap();
        params.max_pool_size = pool.total_size() - 1;
        pool.params = params;
        let evicted = pool.enforce_size_budget();
        assert_eq!(evicted, vec![low]);
        assert!(pool.contains(&high));
    }
}
