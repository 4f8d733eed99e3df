//! Seams onto the cryptographic primitives this crate deliberately does
//! not implement (§1 Non-goals: "the CryptoNight PoW hash, Ed25519/
//! ring-signature primitives"). Production wires a real implementation;
//! tests use the trivial ones in this module.

use cn_types::{Hash, KeyImage, PublicKey, Signature};

/// The two hash functions blocks/transactions need: a fast hash for
/// `CachedBlock`/`CachedTransaction`'s tree/prefix hashing, and the slow
/// PoW hash checked against difficulty (§4.1, §4.4 step 5).
pub trait Hasher: Send + Sync {
    fn fast_hash(&self, bytes: &[u8]) -> Hash;
    fn pow_hash(&self, bytes: &[u8]) -> Hash;
}

/// Ring-signature and multisig-signature verification (§4.4 step 6).
pub trait SignatureVerifier: Send + Sync {
    fn verify_ring_signature(
        &self,
        prefix_hash: &Hash,
        key_image: &KeyImage,
        ring_members: &[PublicKey],
        signatures: &[Signature],
    ) -> bool;

    fn verify_multisig_signatures(
        &self,
        prefix_hash: &Hash,
        keys: &[PublicKey],
        required_signature_count: u8,
        signatures: &[Signature],
    ) -> bool;
}

/// Whether `hash`, read as a 256-bit little-endian integer, satisfies
/// `hash * difficulty <= 2**256` (§4.4 step 5).
pub fn hash_meets_difficulty(hash: &Hash, difficulty: u128) -> bool {
    if difficulty <= 1 {
        return true;
    }
    let bytes = hash.as_bytes();
    let mut h = [0u64; 4];
    for (i, limb) in h.iter_mut().enumerate() {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
        *limb = u64::from_le_bytes(buf);
    }
    let d = [difficulty as u64, (difficulty >> 64) as u64];

    // Schoolbook 256-bit x 128-bit multiply into 7 u64 limbs (6 would
    // suffice; the extra slot is carry headroom), adding each cross term
    // with immediate carry propagation so no intermediate step overflows
    // a u128.
    let mut limbs = [0u64; 7];
    for (i, &hi) in h.iter().enumerate() {
        for (j, &dj) in d.iter().enumerate() {
            if dj != 0 {
                add_with_carry(&mut limbs, i + j, u128::from(hi) * u128::from(dj));
            }
        }
    }
    // hash * difficulty <= 2**256 iff nothing landed at or beyond limb 4
    // (the first limb entirely above the 256-bit range).
    limbs[4] == 0 && limbs[5] == 0 && limbs[6] == 0
}

fn add_with_carry(limbs: &mut [u64; 7], start: usize, value: u128) {
    let mut idx = start;
    let mut carry = value;
    while carry != 0 {
        let sum = u128::from(limbs[idx]) + (carry & u128::from(u64::MAX));
        limbs[idx] = sum as u64;
        carry = (carry >> 64) + (sum >> 64);
        idx += 1;
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// XOR-folding stand-in for a real fast hash; deterministic, cheap,
    /// and good enough to exercise tree-hash/cache-construction logic.
    pub fn fold_hash(bytes: &[u8]) -> Hash {
        let mut out = [0u8; 32];
        for (i, b) in bytes.iter().enumerate() {
            out[i % 32] ^= b;
        }
        Hash(out)
    }

    pub struct TestHasher;

    impl Hasher for TestHasher {
        fn fast_hash(&self, bytes: &[u8]) -> Hash {
            fold_hash(bytes)
        }

        fn pow_hash(&self, bytes: &[u8]) -> Hash {
            fold_hash(bytes)
        }
    }

    /// Accepts any signature set whose length matches what's required;
    /// stands in for the real ring/multisig math in tests.
    pub struct PermissiveVerifier;

    impl SignatureVerifier for PermissiveVerifier {
        fn verify_ring_signature(
            &self,
            _prefix_hash: &Hash,
            _key_image: &KeyImage,
            ring_members: &[PublicKey],
            signatures: &[Signature],
        ) -> bool {
            ring_members.len() == signatures.len() && !signatures.is_empty()
        }

        fn verify_multisig_signatures(
            &self,
            _prefix_hash: &Hash,
            _keys: &[PublicKey],
            required_signature_count: u8,
            signatures: &[Signature],
        ) -> bool {
            signatures.len() >= usize::from(required_signature_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_one_always_meets() {
        assert!(hash_meets_difficulty(&Hash([0xff; 32]), 1));
        assert!(hash_meets_difficulty(&Hash([0xff; 32]), 0));
    }

    #[test]
    fn zero_hash_meets_any_difficulty() {
        assert!(hash_meets_difficulty(&Hash::ZERO, u128::MAX));
    }

    #[test]
    fn max_hash_fails_high_difficulty() {
        assert!(!hash_meets_difficulty(&Hash([0xff; 32]), 1 << 100));
    }

    #[test]
    fn half_max_hash_meets_difficulty_two_not_three() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0x80; // value == 2**255
        let hash = Hash(bytes);
        assert!(hash_meets_difficulty(&hash, 2));
        assert!(!hash_meets_difficulty(&hash, 3));
    }
}
