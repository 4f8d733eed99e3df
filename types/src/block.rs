//! Blocks: the wire template, the merge-mining parent block, the raw wire
//! form, and the lazily-derived [`CachedBlock`] (§3, §4.1).

use cn_helper::varint::write_varint;

use crate::codec::{decode_blob, decode_vec, encode_blob, encode_vec, Decode, Encode, Reader};
use crate::error::CodecError;
use crate::hash::Hash;
use crate::transaction::{Transaction, TransactionInput};

/// The merge-mined parent block embedded from major version 2 onward.
/// Only used for PoW hashing; the source calls this a "stripped-down"
/// block because it omits everything but what's needed to prove work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentBlock {
    pub major_version: u8,
    pub minor_version: u8,
    pub previous_block_hash: Hash,
    pub timestamp: u64,
    pub nonce: u32,
    pub base_transaction: Transaction,
    pub transaction_hashes: Vec<Hash>,
}

impl Encode for ParentBlock {
    fn encode(&self, out: &mut Vec<u8>) {
        self.major_version.encode(out);
        self.minor_version.encode(out);
        self.previous_block_hash.encode(out);
        self.timestamp.encode(out);
        self.nonce.encode(out);
        self.base_transaction.encode(out);
        encode_vec(&self.transaction_hashes, out);
    }
}

impl Decode for ParentBlock {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            major_version: u8::decode(reader)?,
            minor_version: u8::decode(reader)?,
            previous_block_hash: Hash::decode(reader)?,
            timestamp: u64::decode(reader)?,
            nonce: u32::decode(reader)?,
            base_transaction: Transaction::decode(reader)?,
            transaction_hashes: decode_vec(reader)?,
        })
    }
}

/// A block, as constructed for mining or validated on receipt (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub major_version: u8,
    pub minor_version: u8,
    pub previous_block_hash: Hash,
    pub timestamp: u64,
    pub nonce: u32,
    /// Present only for `major_version >= 2` (merge mining).
    pub parent_block: Option<ParentBlock>,
    pub base_transaction: Transaction,
    pub transaction_hashes: Vec<Hash>,
}

impl Encode for BlockTemplate {
    fn encode(&self, out: &mut Vec<u8>) {
        self.major_version.encode(out);
        self.minor_version.encode(out);
        self.previous_block_hash.encode(out);
        self.timestamp.encode(out);
        self.nonce.encode(out);
        if self.major_version >= 2 {
            self.parent_block
                .as_ref()
                .expect("major_version >= 2 requires a parent block")
                .encode(out);
        }
        self.base_transaction.encode(out);
        encode_vec(&self.transaction_hashes, out);
    }
}

impl Decode for BlockTemplate {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let major_version = u8::decode(reader)?;
        let minor_version = u8::decode(reader)?;
        let previous_block_hash = Hash::decode(reader)?;
        let timestamp = u64::decode(reader)?;
        let nonce = u32::decode(reader)?;
        let parent_block = if major_version >= 2 {
            Some(ParentBlock::decode(reader)?)
        } else {
            None
        };
        let base_transaction = Transaction::decode(reader)?;
        let transaction_hashes = decode_vec(reader)?;
        Ok(Self {
            major_version,
            minor_version,
            previous_block_hash,
            timestamp,
            nonce,
            parent_block,
            base_transaction,
            transaction_hashes,
        })
    }
}

impl BlockTemplate {
    /// Decodes the block-index this block claims via its coinbase input
    /// (§3, "deterministic block-index recovery from the coinbase
    /// input").
    pub fn claimed_block_index(&self) -> Option<u32> {
        match self.base_transaction.inputs.first() {
            Some(TransactionInput::Coinbase { block_index }) => Some(*block_index),
            _ => None,
        }
    }
}

/// The wire form carried by `NOTIFY_RESPONSE_GET_OBJECTS` (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub block_bytes: Vec<u8>,
    pub transactions_bytes: Vec<Vec<u8>>,
}

impl Encode for RawBlock {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_blob(&self.block_bytes, out);
        write_varint(self.transactions_bytes.len() as u64, out);
        for tx in &self.transactions_bytes {
            encode_blob(tx, out);
        }
    }
}

impl Decode for RawBlock {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let block_bytes = decode_blob(reader)?;
        let len = reader.read_varint()? as usize;
        let mut transactions_bytes = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            transactions_bytes.push(decode_blob(reader)?);
        }
        Ok(Self {
            block_bytes,
            transactions_bytes,
        })
    }
}

/// The domain-specific Merkle-like combine used for the transaction tree
/// hash (§4.1, §8 invariant 6). Mirrors CryptoNote's `tree_hash`: with one
/// leaf, that leaf is the root; otherwise the leading `2*pow2 - count`
/// leaves (where `pow2` is the largest power of two `<= count`) carry
/// through the first level unchanged and the trailing leaves are paired,
/// so every later level folds evenly by simple adjacent pairing.
pub fn tree_hash(leaves: &[Hash], hash_fn: impl Fn(&[u8]) -> Hash) -> Hash {
    assert!(!leaves.is_empty(), "tree_hash requires at least one leaf");
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    let count = level.len();
    let mut pow2 = 1usize;
    while pow2 * 2 <= count {
        pow2 *= 2;
    }
    if pow2 != count {
        let lead = 2 * pow2 - count;
        let mut folded = Vec::with_capacity(pow2);
        folded.extend_from_slice(&level[..lead]);
        let mut i = lead;
        while i < count {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(level[i].as_bytes());
            buf[32..].copy_from_slice(level[i + 1].as_bytes());
            folded.push(hash_fn(&buf));
            i += 2;
        }
        level = folded;
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks_exact(2) {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(pair[0].as_bytes());
            buf[32..].copy_from_slice(pair[1].as_bytes());
            next.push(hash_fn(&buf));
        }
        level = next;
    }
    level[0]
}

/// The exact bytes that get hashed to produce a block's id/PoW input
/// (§4.1): `header || treeHash(baseTx, txHashes) || varint(tx_count+1)`,
/// with the merge-mined parent-block bytes appended for V2+.
pub fn block_hashing_binary_array(
    template: &BlockTemplate,
    base_tx_hash: Hash,
    hash_fn: impl Fn(&[u8]) -> Hash,
) -> Vec<u8> {
    let mut out = Vec::new();
    template.major_version.encode(&mut out);
    template.minor_version.encode(&mut out);
    template.timestamp.encode(&mut out);
    template.previous_block_hash.encode(&mut out);
    template.nonce.encode(&mut out);

    let mut leaves = Vec::with_capacity(template.transaction_hashes.len() + 1);
    leaves.push(base_tx_hash);
    leaves.extend_from_slice(&template.transaction_hashes);
    let root = tree_hash(&leaves, &hash_fn);
    root.encode(&mut out);

    write_varint((template.transaction_hashes.len() + 1) as u64, &mut out);

    if template.major_version >= 2 {
        if let Some(parent) = &template.parent_block {
            out.extend_from_slice(&parent.to_bytes());
        }
    }

    out
}

/// Lazy derivations of a [`BlockTemplate`], computed eagerly at
/// construction (§9 design notes — see [`crate::transaction::CachedTransaction`]
/// for the same rationale).
#[derive(Debug, Clone)]
pub struct CachedBlock {
    pub template: BlockTemplate,
    transaction_tree_hash: Hash,
    block_hashing_binary_array: Vec<u8>,
    block_hash: Hash,
    block_index: Option<u32>,
}

impl CachedBlock {
    pub fn new(template: BlockTemplate, base_tx_hash: Hash, hash_fn: impl Fn(&[u8]) -> Hash) -> Self {
        let mut leaves = Vec::with_capacity(template.transaction_hashes.len() + 1);
        leaves.push(base_tx_hash);
        leaves.extend_from_slice(&template.transaction_hashes);
        let transaction_tree_hash = tree_hash(&leaves, &hash_fn);

        let block_hashing_binary_array = block_hashing_binary_array(&template, base_tx_hash, &hash_fn);
        let block_hash = hash_fn(&block_hashing_binary_array);
        let block_index = template.claimed_block_index();

        Self {
            template,
            transaction_tree_hash,
            block_hashing_binary_array,
            block_hash,
            block_index,
        }
    }

    pub fn transaction_tree_hash(&self) -> Hash {
        self.transaction_tree_hash
    }

    pub fn block_hashing_binary_array(&self) -> &[u8] {
        &self.block_hashing_binary_array
    }

    pub fn block_hash(&self) -> Hash {
        self.block_hash
    }

    /// `None` if the coinbase input is malformed (caller should reject the
    /// block rather than trust this).
    pub fn block_index(&self) -> Option<u32> {
        self.block_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::PublicKey;
    use crate::transaction::{TransactionOutput, TransactionTarget};

    fn dummy_hash(bytes: &[u8]) -> Hash {
        let mut out = [0u8; 32];
        for (i, chunk) in bytes.chunks(32).enumerate() {
            for (j, b) in chunk.iter().enumerate() {
                out[j] ^= b.wrapping_add(i as u8);
            }
        }
        Hash(out)
    }

    fn coinbase(block_index: u32) -> Transaction {
        Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Coinbase { block_index }],
            outputs: vec![TransactionOutput {
                amount: 1000,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([1; 32]),
                },
            }],
            extra: vec![],
            signatures: vec![],
        }
    }

    #[test]
    fn single_leaf_tree_hash_is_identity() {
        let h = Hash([9; 32]);
        assert_eq!(tree_hash(&[h], dummy_hash), h);
    }

    #[test]
    fn tree_hash_is_order_sensitive() {
        let a = Hash([1; 32]);
        let b = Hash([2; 32]);
        assert_ne!(tree_hash(&[a, b], dummy_hash), tree_hash(&[b, a], dummy_hash));
    }

    #[test]
    fn odd_leaf_count_does_not_panic() {
        let leaves = vec![Hash([1; 32]), Hash([2; 32]), Hash([3; 32])];
        let _ = tree_hash(&leaves, dummy_hash);
    }

    #[test]
    fn three_leaves_pair_the_trailing_two_not_the_leading_two() {
        // CryptoNote's tree_hash_cnt(3) == 2, so the leading 2*2-3 = 1 leaf
        // is carried unchanged and the trailing pair is hashed first:
        // root == H(h0, H(h1, h2)), not H(H(h0, h1), h2).
        let h0 = Hash([1; 32]);
        let h1 = Hash([2; 32]);
        let h2 = Hash([3; 32]);

        let mut inner = [0u8; 64];
        inner[..32].copy_from_slice(h1.as_bytes());
        inner[32..].copy_from_slice(h2.as_bytes());
        let h12 = dummy_hash(&inner);

        let mut outer = [0u8; 64];
        outer[..32].copy_from_slice(h0.as_bytes());
        outer[32..].copy_from_slice(h12.as_bytes());
        let expected = dummy_hash(&outer);

        assert_eq!(tree_hash(&[h0, h1, h2], dummy_hash), expected);
    }

    #[test]
    fn cached_block_recovers_index() {
        let template = BlockTemplate {
            major_version: 1,
            minor_version: 0,
            previous_block_hash: Hash::ZERO,
            timestamp: 100,
            nonce: 0,
            parent_block: None,
            base_transaction: coinbase(7),
            transaction_hashes: vec![],
        };
        let base_tx_hash = dummy_hash(&template.base_transaction.to_bytes());
        let cached = CachedBlock::new(template, base_tx_hash, dummy_hash);
        assert_eq!(cached.block_index(), Some(7));
    }

    #[test]
    fn block_hash_matches_hashing_array() {
        let template = BlockTemplate {
            major_version: 1,
            minor_version: 0,
            previous_block_hash: Hash::ZERO,
            timestamp: 100,
            nonce: 0,
            parent_block: None,
            base_transaction: coinbase(0),
            transaction_hashes: vec![Hash([5; 32])],
        };
        let base_tx_hash = dummy_hash(&template.base_transaction.to_bytes());
        let cached = CachedBlock::new(template, base_tx_hash, dummy_hash);
        assert_eq!(
            cached.block_hash(),
            dummy_hash(cached.block_hashing_binary_array())
        );
    }
}
