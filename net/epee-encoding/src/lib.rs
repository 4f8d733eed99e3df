//! A minimal "portable storage" codec: the self-describing tagged
//! key-value tree format that carries every Levin command's fields
//! (§6 "Payloads are a self-describing key-value section format").
//!
//! This is intentionally a small `Value` tree rather than the teacher's
//! full derive-macro object mapper — command structs in [`cn_wire`]
//! convert to/from [`Value`] by hand, which keeps this crate tiny while
//! still giving every P2P payload the real epee wire format.

mod error;
mod value;
mod varint;

pub use error::Error;
pub use value::Value;

pub type Result<T> = std::result::Result<T, Error>;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Epee section signature: `0x0111_0101_0101_0101`.
pub const PORTABLE_STORAGE_SIGNATURE_A: u32 = 0x0111_0101;
pub const PORTABLE_STORAGE_SIGNATURE_B: u32 = 0x0101_0101;
pub const PORTABLE_STORAGE_FORMAT_VER: u8 = 1;

/// Encodes a top-level object (a map of fields) into the full epee
/// payload, including the header.
pub fn to_bytes(fields: &indexmap::IndexMap<String, Value>) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u32_le(PORTABLE_STORAGE_SIGNATURE_A);
    out.put_u32_le(PORTABLE_STORAGE_SIGNATURE_B);
    out.put_u8(PORTABLE_STORAGE_FORMAT_VER);
    value::write_object(&mut out, fields);
    out.freeze()
}

/// Decodes a full epee payload (header + object) into its top-level
/// fields.
pub fn from_bytes(bytes: &mut Bytes) -> Result<indexmap::IndexMap<String, Value>> {
    if bytes.remaining() < 9 {
        return Err(Error::Truncated);
    }
    let sig_a = bytes.get_u32_le();
    let sig_b = bytes.get_u32_le();
    if sig_a != PORTABLE_STORAGE_SIGNATURE_A || sig_b != PORTABLE_STORAGE_SIGNATURE_B {
        return Err(Error::Format("bad portable-storage signature"));
    }
    let version = bytes.get_u8();
    if version != PORTABLE_STORAGE_FORMAT_VER {
        return Err(Error::Format("unsupported portable-storage version"));
    }
    value::read_object(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalar_fields() {
        let mut fields = indexmap::IndexMap::new();
        fields.insert("node_id".to_string(), Value::U64(42));
        fields.insert("local_time".to_string(), Value::U64(1_700_000_000));
        fields.insert("my_port".to_string(), Value::U32(8080));
        fields.insert("network_id".to_string(), Value::Bytes(vec![1, 2, 3, 4].into()));

        let mut bytes = to_bytes(&fields);
        let decoded = from_bytes(&mut bytes).unwrap();
        assert_eq!(decoded.get("node_id"), Some(&Value::U64(42)));
        assert_eq!(decoded.get("my_port"), Some(&Value::U32(8080)));
    }

    #[test]
    fn round_trips_nested_object_and_seq() {
        let mut inner = indexmap::IndexMap::new();
        inner.insert("peer_id".to_string(), Value::U64(7));

        let mut fields = indexmap::IndexMap::new();
        fields.insert("payload_data".to_string(), Value::Object(inner));
        fields.insert(
            "local_peerlist_new".to_string(),
            Value::Seq(vec![Value::U64(1), Value::U64(2)]),
        );

        let mut bytes = to_bytes(&fields);
        let decoded = from_bytes(&mut bytes).unwrap();
        match decoded.get("payload_data") {
            Some(Value::Object(map)) => assert_eq!(map.get("peer_id"), Some(&Value::U64(7))),
            other => panic!("unexpected {other:?}"),
        }
        match decoded.get("local_peerlist_new") {
            Some(Value::Seq(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
