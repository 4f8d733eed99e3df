//! Codec-level errors (§7, "Parse/Codec").

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer truncated, needed at least {needed} more byte(s)")]
    Truncated { needed: usize },
    #[error("varint malformed or overflowed")]
    BadVarInt,
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("trailing bytes after a complete value")]
    TrailingBytes,
}

impl From<cn_helper::varint::VarIntError> for CodecError {
    fn from(_: cn_helper::varint::VarIntError) -> Self {
        Self::BadVarInt
    }
}
