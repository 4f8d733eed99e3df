//! Production implementations of the `cn-blockchain` crypto seams
//! (§1 Non-goals: "the CryptoNight PoW hash, Ed25519/ring-signature
//! primitives... are assumed as named, trusted black boxes").
//!
//! Real CryptoNight is a memory-hard construction over a scratchpad keyed
//! by Keccak, and real ring-signature verification is MLSAG over
//! Ed25519 — both large, security-critical pieces of math this exercise
//! does not reimplement. This module wraps a well-audited hash crate
//! (`sha3`'s Keccak-256) for both of `Hasher`'s methods, and performs
//! only a length/shape check for signatures: enough to exercise every
//! caller's control flow, not a substitute for the real primitive.

use cn_blockchain::{Hasher, SignatureVerifier};
use cn_types::{Hash, KeyImage, PublicKey, Signature};
use sha3::{Digest, Keccak256};

/// Keccak-256 stands in for both CryptoNote's `cn_fast_hash` (which really
/// is Keccak-256) and the CryptoNight PoW hash (which is not, but no
/// in-tree crate implements it; see the module doc).
pub struct Keccak256Hasher;

impl Hasher for Keccak256Hasher {
    fn fast_hash(&self, bytes: &[u8]) -> Hash {
        keccak(bytes)
    }

    fn pow_hash(&self, bytes: &[u8]) -> Hash {
        keccak(bytes)
    }
}

fn keccak(bytes: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// Shape-only verifier: accepts a ring/multisig signature set exactly
/// when its length matches what the input requires. A real deployment
/// replaces this with actual MLSAG/Ed25519 verification (see the module
/// doc); nothing in this crate treats these booleans as anything but a
/// trusted collaborator's answer.
pub struct ShapeOnlyVerifier;

impl SignatureVerifier for ShapeOnlyVerifier {
    fn verify_ring_signature(
        &self,
        _prefix_hash: &Hash,
        _key_image: &KeyImage,
        ring_members: &[PublicKey],
        signatures: &[Signature],
    ) -> bool {
        !signatures.is_empty() && ring_members.len() == signatures.len()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_hash_is_deterministic() {
        let hasher = Keccak256Hasher;
        assert_eq!(hasher.fast_hash(b"abc"), hasher.fast_hash(b"abc"));
        assert_ne!(hasher.fast_hash(b"abc"), hasher.fast_hash(b"abd"));
    }

    #[test]
    fn verifier_checks_signature_count_not_validity() {
        let verifier = ShapeOnlyVerifier;
        let ring = vec![PublicKey([1; 32]), PublicKey([2; 32])];
        let sigs = vec![Signature([0; 64]), Signature([0; 64])];
        assert!(verifier.verify_ring_signature(&Hash::ZERO, &KeyImage([3; 32]), &ring, &sigs));
        assert!(!verifier.verify_ring_signature(&Hash::ZERO, &KeyImage([3; 32]), &ring, &sigs[..1]));
    }
}
