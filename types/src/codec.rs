//! The canonical binary serialization (§4.1). Bit-exact, because it
//! determines hashes: no serde derive here, everything is hand-written so
//! the byte layout never drifts from what the hash functions consume.

use cn_helper::varint::{read_varint, write_varint};

use crate::error::CodecError;

/// A cursor over an in-memory buffer, used only during decode.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::Truncated {
                needed: self.pos + n - self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        let (value, consumed) = read_varint(self.remaining())?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

/// Anything that can be written to / read from the canonical wire layout.
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

pub trait Decode: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError>;

    fn from_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(buf);
        let value = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        Ok(value)
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint(*self, out);
    }
}

impl Decode for u64 {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        reader.read_varint()
    }
}

impl Encode for u32 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint(u64::from(*self), out);
    }
}

impl Decode for u32 {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let v = reader.read_varint()?;
        u32::try_from(v).map_err(|_| CodecError::OutOfRange("u32"))
    }
}

impl Encode for u16 {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint(u64::from(*self), out);
    }
}

impl Decode for u16 {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let v = reader.read_varint()?;
        u16::try_from(v).map_err(|_| CodecError::OutOfRange("u16"))
    }
}

impl Encode for u8 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl Decode for u8 {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        reader.read_u8()
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        reader.read_array::<N>()
    }
}

/// A length-prefixed (varint count) byte blob, e.g. `extra`.
pub fn encode_blob(bytes: &[u8], out: &mut Vec<u8>) {
    write_varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

pub fn decode_blob(reader: &mut Reader<'_>) -> Result<Vec<u8>, CodecError> {
    let len = reader.read_varint()? as usize;
    Ok(reader.read_bytes(len)?.to_vec())
}

/// A varint-prefixed vector of `Encode`/`Decode` items.
pub fn encode_vec<T: Encode>(items: &[T], out: &mut Vec<u8>) {
    write_varint(items.len() as u64, out);
    for item in items {
        item.encode(out);
    }
}

pub fn decode_vec<T: Decode>(reader: &mut Reader<'_>) -> Result<Vec<T>, CodecError> {
    let len = reader.read_varint()? as usize;
    let mut out = Vec::with_capacity(len.min(1 << 20));
    for _ in 0..len {
        out.push(T::decode(reader)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips() {
        let data = b"payment-id-or-tx-pubkey".to_vec();
        let mut out = Vec::new();
        encode_blob(&data, &mut out);
        let mut reader = Reader::new(&out);
        assert_eq!(decode_blob(&mut reader).unwrap(), data);
    }

    #[test]
    fn array_round_trips() {
        let arr = [7u8; 32];
        let mut out = Vec::new();
        arr.encode(&mut out);
        assert_eq!(<[u8; 32]>::from_bytes(&out).unwrap(), arr);
    }
}
