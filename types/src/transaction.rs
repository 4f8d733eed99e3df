//! Transactions, their inputs/outputs, and the lazily-derived
//! [`CachedTransaction`] (§3).

use crate::codec::{decode_blob, decode_vec, encode_blob, encode_vec, Decode, Encode, Reader};
use crate::error::CodecError;
use crate::hash::Hash;
use crate::keys::{KeyImage, PublicKey, Signature};
use crate::Amount;

/// A transaction input (§3). Boost::variant in the source becomes a
/// closed Rust enum (§9 design notes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionInput {
    /// Exactly one per coinbase transaction.
    Coinbase { block_index: u32 },
    Key {
        amount: Amount,
        key_image: KeyImage,
        /// Delta-encoded (relative) global-output offsets, as they appear
        /// on the wire; see [`TransactionInput::absolute_output_offsets`].
        output_offsets: Vec<u32>,
    },
    Multisignature {
        amount: Amount,
        required_signature_count: u8,
        output_index: u32,
        /// `0` means not a deposit; `>0` is a time-locked term in blocks.
        term: u32,
    },
}

impl TransactionInput {
    /// Converts the wire's relative (delta-encoded) offsets into absolute
    /// global output indexes (§3).
    pub fn absolute_output_offsets(&self) -> Option<Vec<u64>> {
        match self {
            Self::Key { output_offsets, .. } => {
                let mut out = Vec::with_capacity(output_offsets.len());
                let mut running: u64 = 0;
                for (i, delta) in output_offsets.iter().enumerate() {
                    if i == 0 {
                        running = u64::from(*delta);
                    } else {
                        running += u64::from(*delta);
                    }
                    out.push(running);
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Builds the wire's relative offsets from a sorted list of absolute
    /// global indexes (used by block-template / test construction).
    pub fn relative_output_offsets(absolute: &[u64]) -> Vec<u32> {
        let mut out = Vec::with_capacity(absolute.len());
        let mut prev: u64 = 0;
        for (i, abs) in absolute.iter().enumerate() {
            let delta = if i == 0 { *abs } else { abs - prev };
            out.push(u32::try_from(delta).unwrap_or(u32::MAX));
            prev = *abs;
        }
        out
    }

    pub fn amount(&self) -> Amount {
        match self {
            Self::Coinbase { .. } => 0,
            Self::Key { amount, .. } => *amount,
            Self::Multisignature { amount, .. } => *amount,
        }
    }

    pub fn key_image(&self) -> Option<KeyImage> {
        match self {
            Self::Key { key_image, .. } => Some(*key_image),
            _ => None,
        }
    }

    /// `(amount, output_index, term)` — the fingerprint used for
    /// multisig-output double-reference prevention (§4.4, §4.5).
    pub fn multisig_reference(&self) -> Option<(Amount, u32, u32)> {
        match self {
            Self::Multisignature {
                amount,
                output_index,
                term,
                ..
            } => Some((*amount, *output_index, *term)),
            _ => None,
        }
    }
}

const TAG_COINBASE: u8 = 0xff;
const TAG_KEY: u8 = 0x02;
const TAG_MULTISIG: u8 = 0x03;

impl Encode for TransactionInput {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Coinbase { block_index } => {
                TAG_COINBASE.encode(out);
                block_index.encode(out);
            }
            Self::Key {
                amount,
                key_image,
                output_offsets,
            } => {
                TAG_KEY.encode(out);
                amount.encode(out);
                encode_vec(output_offsets, out);
                key_image.encode(out);
            }
            Self::Multisignature {
                amount,
                required_signature_count,
                output_index,
                term,
            } => {
                TAG_MULTISIG.encode(out);
                amount.encode(out);
                output_index.encode(out);
                required_signature_count.encode(out);
                term.encode(out);
            }
        }
    }
}

impl Decode for TransactionInput {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        match u8::decode(reader)? {
            TAG_COINBASE => Ok(Self::Coinbase {
                block_index: u32::decode(reader)?,
            }),
            TAG_KEY => {
                let amount = u64::decode(reader)?;
                let output_offsets: Vec<u32> = decode_vec(reader)?;
                let key_image = KeyImage::decode(reader)?;
                Ok(Self::Key {
                    amount,
                    key_image,
                    output_offsets,
                })
            }
            TAG_MULTISIG => {
                let amount = u64::decode(reader)?;
                let output_index = u32::decode(reader)?;
                let required_signature_count = u8::decode(reader)?;
                let term = u32::decode(reader)?;
                Ok(Self::Multisignature {
                    amount,
                    required_signature_count,
                    output_index,
                    term,
                })
            }
            _ => Err(CodecError::OutOfRange("transaction input tag")),
        }
    }
}

/// An output target (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionTarget {
    Key {
        one_time_public_key: PublicKey,
    },
    Multisignature {
        keys: Vec<PublicKey>,
        required_signature_count: u8,
        term: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub amount: Amount,
    pub target: TransactionTarget,
}

impl Encode for TransactionOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        self.amount.encode(out);
        match &self.target {
            TransactionTarget::Key { one_time_public_key } => {
                TAG_KEY.encode(out);
                one_time_public_key.encode(out);
            }
            TransactionTarget::Multisignature {
                keys,
                required_signature_count,
                term,
            } => {
                TAG_MULTISIG.encode(out);
                encode_vec(keys, out);
                required_signature_count.encode(out);
                term.encode(out);
            }
        }
    }
}

impl Decode for TransactionOutput {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let amount = u64::decode(reader)?;
        let target = match u8::decode(reader)? {
            TAG_KEY => TransactionTarget::Key {
                one_time_public_key: PublicKey::decode(reader)?,
            },
            TAG_MULTISIG => {
                let keys: Vec<PublicKey> = decode_vec(reader)?;
                let required_signature_count = u8::decode(reader)?;
                let term = u32::decode(reader)?;
                TransactionTarget::Multisignature {
                    keys,
                    required_signature_count,
                    term,
                }
            }
            _ => return Err(CodecError::OutOfRange("transaction output target tag")),
        };
        Ok(Self { amount, target })
    }
}

/// A signature group for one input: one `Signature` per ring member for a
/// `Key` input, or one per provided co-signer for a `Multisignature` input
/// (§3 invariants).
pub type SignatureGroup = Vec<Signature>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub unlock_time: u64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Opaque bytes carrying the tx public key and optional payment id.
    pub extra: Vec<u8>,
    /// One group per input (empty for the coinbase transaction).
    pub signatures: Vec<SignatureGroup>,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        matches!(self.inputs.as_slice(), [TransactionInput::Coinbase { .. }])
    }

    pub fn sum_inputs(&self) -> Amount {
        self.inputs.iter().map(TransactionInput::amount).sum()
    }

    pub fn sum_outputs(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// `transactionFee(tx)` (§4.1): 0 for coinbase, else
    /// `sum(inputs) - sum(outputs)`. Underflow is `None` (protocol
    /// violation, surfaced by the caller as `InvalidAmount`).
    pub fn fee(&self) -> Option<Amount> {
        if self.is_coinbase() {
            return Some(0);
        }
        self.sum_inputs().checked_sub(self.sum_outputs())
    }

    /// The transaction prefix (everything but signatures) — hashed
    /// separately so ring signatures can be verified against it.
    pub fn prefix_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.version.encode(&mut out);
        self.unlock_time.encode(&mut out);
        encode_vec(&self.inputs, &mut out);
        encode_vec(&self.outputs, &mut out);
        encode_blob(&self.extra, &mut out);
        out
    }
}

impl Encode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prefix_bytes());
        for group in &self.signatures {
            encode_vec(group, out);
        }
    }
}

impl Decode for Transaction {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let version = u8::decode(reader)?;
        let unlock_time = u64::decode(reader)?;
        let inputs: Vec<TransactionInput> = decode_vec(reader)?;
        let outputs: Vec<TransactionOutput> = decode_vec(reader)?;
        let extra = decode_blob(reader)?;

        let is_coinbase = matches!(inputs.as_slice(), [TransactionInput::Coinbase { .. }]);
        let mut signatures = Vec::with_capacity(inputs.len());
        if !is_coinbase {
            for input in &inputs {
                let group_len = match input {
                    TransactionInput::Key { output_offsets, .. } => output_offsets.len(),
                    TransactionInput::Multisignature {
                        required_signature_count,
                        ..
                    } => usize::from(*required_signature_count),
                    TransactionInput::Coinbase { .. } => 0,
                };
                let mut group = Vec::with_capacity(group_len);
                for _ in 0..group_len {
                    group.push(Signature::decode(reader)?);
                }
                signatures.push(group);
            }
        }

        Ok(Self {
            version,
            unlock_time,
            inputs,
            outputs,
            extra,
            signatures,
        })
    }
}

/// Lazily-derived, eagerly-computed-at-construction values for a
/// [`Transaction`] (§3, §9: "expose only the derived values through
/// accessor methods ... never share across threads without a barrier" —
/// we compute eagerly instead of using interior mutability, which makes
/// `CachedTransaction` trivially `Send + Sync`).
#[derive(Debug, Clone)]
pub struct CachedTransaction {
    pub transaction: Transaction,
    hash: Hash,
    prefix_hash: Hash,
    binary_array: Vec<u8>,
    fee: Amount,
}

impl CachedTransaction {
    pub fn new(transaction: Transaction, hash_fn: impl Fn(&[u8]) -> Hash) -> Self {
        let binary_array = transaction.to_bytes();
        let prefix_bytes = transaction.prefix_bytes();
        let prefix_hash = hash_fn(&prefix_bytes);
        let hash = hash_fn(&binary_array);
        let fee = transaction.fee().unwrap_or(0);
        Self {
            transaction,
            hash,
            prefix_hash,
            binary_array,
            fee,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn prefix_hash(&self) -> Hash {
        self.prefix_hash
    }

    pub fn binary_array(&self) -> &[u8] {
        &self.binary_array
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_hash(bytes: &[u8]) -> Hash {
        let mut out = [0u8; 32];
        for (i, b) in bytes.iter().enumerate() {
            out[i % 32] ^= b;
        }
        Hash(out)
    }

    #[test]
    fn relative_offsets_round_trip() {
        let absolute = vec![5u64, 9, 9, 20];
        let relative = TransactionInput::relative_output_offsets(&absolute);
        let input = TransactionInput::Key {
            amount: 10,
            key_image: KeyImage([1; 32]),
            output_offsets: relative,
        };
        assert_eq!(input.absolute_output_offsets().unwrap(), absolute);
    }

    #[test]
    fn fee_is_inputs_minus_outputs() {
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 100,
                key_image: KeyImage([2; 32]),
                output_offsets: vec![1],
            }],
            outputs: vec![TransactionOutput {
                amount: 90,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([3; 32]),
                },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([0; 64])]],
        };
        assert_eq!(tx.fee(), Some(10));
    }

    #[test]
    fn overspend_fee_is_none() {
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 5,
                key_image: KeyImage([2; 32]),
                output_offsets: vec![1],
            }],
            outputs: vec![TransactionOutput {
                amount: 90,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([3; 32]),
                },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([0; 64])]],
        };
        assert_eq!(tx.fee(), None);
    }

    #[test]
    fn coinbase_codec_round_trip() {
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Coinbase { block_index: 42 }],
            outputs: vec![TransactionOutput {
                amount: 1000,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([9; 32]),
                },
            }],
            extra: vec![1, 2, 3],
            signatures: vec![],
        };
        let bytes = tx.to_bytes();
        let decoded = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn cached_transaction_computes_derived_values() {
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 100,
                key_image: KeyImage([4; 32]),
                output_offsets: vec![1],
            }],
            outputs: vec![TransactionOutput {
                amount: 90,
                target: TransactionTarget::Key {
                    one_time_public_key: PublicKey([3; 32]),
                },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([7; 64])]],
        };
        let cached = CachedTransaction::new(tx, dummy_hash);
        assert_eq!(cached.fee(), 10);
        // The prefix hash excludes signatures, the full hash includes them.
        assert_ne!(cached.hash(), cached.prefix_hash());
    }
}
