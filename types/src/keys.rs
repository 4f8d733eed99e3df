//! Opaque cryptographic value types (§3). The actual Ed25519/ring-signature
//! math is a named external collaborator (§1 Non-goals); these types only
//! carry bytes through the codec and hold them equality/hash/display-able.

use std::fmt;

use crate::codec::{Decode, Encode, Reader};
use crate::error::CodecError;

macro_rules! byte_wrapper {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl Encode for $name {
            fn encode(&self, out: &mut Vec<u8>) {
                self.0.encode(out);
            }
        }

        impl Decode for $name {
            fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
                Ok(Self(<[u8; $len]>::decode(reader)?))
            }
        }
    };
}

byte_wrapper!(PublicKey, 32);
byte_wrapper!(SecretKey, 32);
byte_wrapper!(Signature, 64);
/// A deterministic curve point derived from a one-time spend key; equal
/// iff two transactions spend the same output (§GLOSSARY).
byte_wrapper!(KeyImage, 32);
