//! Global output indexes the validation pipeline resolves key-input and
//! multisig-input references against (§4.4 step 6: "all referenced global
//! -output offsets resolve").

use std::collections::HashMap;

use cn_constants::block::is_unlocked;
use cn_types::{Amount, PublicKey};

#[derive(Debug, Clone, Copy)]
pub struct KeyOutputRecord {
    pub one_time_public_key: PublicKey,
    pub unlock_time: u64,
}

#[derive(Debug, Clone)]
pub struct MultisigOutputRecord {
    pub keys: Vec<PublicKey>,
    pub required_signature_count: u8,
    /// Height at which the deposit (if `term > 0`) matures; equals the
    /// creation height when `term == 0`.
    pub unlock_height: u64,
}

/// Append-only (with rollback) indexes over every `Key`/`Multisignature`
/// output ever created, keyed the way key/multisig inputs reference them:
/// a per-amount global index for key outputs, `(amount, outputIndex, term)`
/// for multisig outputs (§3, §4.4).
#[derive(Debug, Clone, Default)]
pub struct OutputIndex {
    key_outputs: HashMap<Amount, Vec<KeyOutputRecord>>,
    multisig_outputs: HashMap<(Amount, u32, u32), MultisigOutputRecord>,
    /// Next free `outputIndex` per `(amount, term)` bucket, so the chain
    /// manager doesn't have to scan `multisig_outputs` to assign one.
    multisig_next_index: HashMap<(Amount, u32), u32>,
}

impl OutputIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key output, returning its new global index within its
    /// amount bucket.
    pub fn push_key_output(&mut self, amount: Amount, record: KeyOutputRecord) -> u64 {
        let bucket = self.key_outputs.entry(amount).or_default();
        bucket.push(record);
        (bucket.len() - 1) as u64
    }

    pub fn pop_key_output(&mut self, amount: Amount) {
        if let Some(bucket) = self.key_outputs.get_mut(&amount) {
            bucket.pop();
        }
    }

    pub fn key_output(&self, amount: Amount, global_index: u64) -> Option<&KeyOutputRecord> {
        self.key_outputs.get(&amount)?.get(global_index as usize)
    }

    pub fn key_output_count(&self, amount: Amount) -> u64 {
        self.key_outputs.get(&amount).map(|b| b.len() as u64).unwrap_or(0)
    }

    pub fn insert_multisig_output(&mut self, reference: (Amount, u32, u32), record: MultisigOutputRecord) {
        self.multisig_outputs.insert(reference, record);
    }

    pub fn remove_multisig_output(&mut self, reference: &(Amount, u32, u32)) {
        self.multisig_outputs.remove(reference);
    }

    pub fn multisig_output(&self, reference: &(Amount, u32, u32)) -> Option<&MultisigOutputRecord> {
        self.multisig_outputs.get(reference)
    }

    /// Appends a multisig output to the `(amount, term)` bucket, assigning
    /// and returning its `outputIndex`.
    pub fn push_multisig_output(
        &mut self,
        amount: Amount,
        term: u32,
        record: MultisigOutputRecord,
    ) -> u32 {
        let counter = self.multisig_next_index.entry((amount, term)).or_insert(0);
        let index = *counter;
        *counter += 1;
        self.multisig_outputs.insert((amount, index, term), record);
        index
    }

    /// Reverses [`Self::push_multisig_output`] for the most recently
    /// assigned index in the bucket (rollback only calls this in strict
    /// creation-reverse order).
    pub fn pop_multisig_output(&mut self, amount: Amount, term: u32) {
        if let Some(counter) = self.multisig_next_index.get_mut(&(amount, term)) {
            if *counter > 0 {
                *counter -= 1;
                self.multisig_outputs.remove(&(amount, *counter, term));
            }
        }
    }
}

/// Whether a referenced output may be spent at `height`/`now` (§4.4 step 6
/// "`unlockTime` ... has matured relative to current height or wall
/// clock"). CryptoNote's convention: values below the threshold are block
/// heights, at or above it are unix timestamps.
pub fn output_matured(unlock_time: u64, height: u64, now: u64) -> bool {
    is_unlocked(unlock_time, height, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_output_index_grows_and_pops() {
        let mut index = OutputIndex::new();
        let record = KeyOutputRecord {
            one_time_public_key: PublicKey([1; 32]),
            unlock_time: 0,
        };
        assert_eq!(index.push_key_output(100, record), 0);
        assert_eq!(index.push_key_output(100, record), 1);
        assert_eq!(index.key_output_count(100), 2);
        index.pop_key_output(100);
        assert_eq!(index.key_output_count(100), 1);
    }

    #[test]
    fn multisig_output_round_trips() {
        let mut index = OutputIndex::new();
        let reference = (500u64, 0u32, 1000u32);
        index.insert_multisig_output(
            reference,
            MultisigOutputRecord {
                keys: vec![PublicKey([2; 32])],
                required_signature_count: 1,
                unlock_height: 2000,
            },
        );
        assert!(index.multisig_output(&reference).is_some());
        index.remove_multisig_output(&reference);
        assert!(index.multisig_output(&reference).is_none());
    }
}
