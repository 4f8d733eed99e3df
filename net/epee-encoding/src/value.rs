use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;

use crate::varint;
use crate::{Error, Result};

const MARKER_I64: u8 = 1;
const MARKER_I32: u8 = 2;
const MARKER_I16: u8 = 3;
const MARKER_I8: u8 = 4;
const MARKER_U64: u8 = 5;
const MARKER_U32: u8 = 6;
const MARKER_U16: u8 = 7;
const MARKER_U8: u8 = 8;
const MARKER_F64: u8 = 9;
const MARKER_STRING: u8 = 10;
const MARKER_BOOL: u8 = 11;
const MARKER_OBJECT: u8 = 12;
const SEQ_FLAG: u8 = 0x80;

/// One field value in the portable-storage tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I64(i64),
    I32(i32),
    U64(u64),
    U32(u32),
    U8(u8),
    Bool(bool),
    /// Epee has no distinct "bytes" marker; raw byte strings and text
    /// share the `String` marker (§6 payload fields like `network_id`,
    /// `payment_id`).
    Bytes(Bytes),
    Object(IndexMap<String, Value>),
    Seq(Vec<Value>),
}

fn marker_of(value: &Value) -> u8 {
    match value {
        Value::I64(_) => MARKER_I64,
        Value::I32(_) => MARKER_I32,
        Value::U64(_) => MARKER_U64,
        Value::U32(_) => MARKER_U32,
        Value::U8(_) => MARKER_U8,
        Value::Bool(_) => MARKER_BOOL,
        Value::Bytes(_) => MARKER_STRING,
        Value::Object(_) => MARKER_OBJECT,
        Value::Seq(items) => items.first().map_or(MARKER_U8, marker_of),
    }
}

fn write_field_name(out: &mut BytesMut, name: &str) {
    out.put_u8(name.len() as u8);
    out.put_slice(name.as_bytes());
}

fn read_field_name(buf: &mut Bytes) -> Result<String> {
    if !buf.has_remaining() {
        return Err(Error::Truncated);
    }
    let len = buf.get_u8() as usize;
    if buf.remaining() < len {
        return Err(Error::Truncated);
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Format("field name is not utf8"))
}

fn write_scalar(out: &mut BytesMut, value: &Value) {
    match value {
        Value::I64(v) => out.put_i64_le(*v),
        Value::I32(v) => out.put_i32_le(*v),
        Value::U64(v) => out.put_u64_le(*v),
        Value::U32(v) => out.put_u32_le(*v),
        Value::U8(v) => out.put_u8(*v),
        Value::Bool(v) => out.put_u8(u8::from(*v)),
        Value::Bytes(bytes) => {
            varint::write_varint(out, bytes.len() as u64);
            out.put_slice(bytes);
        }
        Value::Object(fields) => write_object(out, fields),
        Value::Seq(_) => unreachable!("sequences are written by write_value"),
    }
}

fn read_scalar(buf: &mut Bytes, marker: u8) -> Result<Value> {
    Ok(match marker {
        MARKER_I64 => {
            if buf.remaining() < 8 {
                return Err(Error::Truncated);
            }
            Value::I64(buf.get_i64_le())
        }
        MARKER_I32 => {
            if buf.remaining() < 4 {
                return Err(Error::Truncated);
            }
            Value::I32(buf.get_i32_le())
        }
        MARKER_I16 => {
            if buf.remaining() < 2 {
                return Err(Error::Truncated);
            }
            Value::I32(i32::from(buf.get_i16_le()))
        }
        MARKER_I8 => {
            if !buf.has_remaining() {
                return Err(Error::Truncated);
            }
            Value::I32(i32::from(buf.get_i8()))
        }
        MARKER_U64 => {
            if buf.remaining() < 8 {
                return Err(Error::Truncated);
            }
            Value::U64(buf.get_u64_le())
        }
        MARKER_U32 => {
            if buf.remaining() < 4 {
                return Err(Error::Truncated);
            }
            Value::U32(buf.get_u32_le())
        }
        MARKER_U16 => {
            if buf.remaining() < 2 {
                return Err(Error::Truncated);
            }
            Value::U32(u32::from(buf.get_u16_le()))
        }
        MARKER_U8 => {
            if !buf.has_remaining() {
                return Err(Error::Truncated);
            }
            Value::U32(u32::from(buf.get_u8()))
        }
        MARKER_F64 => {
            if buf.remaining() < 8 {
                return Err(Error::Truncated);
            }
            buf.advance(8);
            Value::U64(0)
        }
        MARKER_STRING => {
            let len = varint::read_varint(buf)? as usize;
            if buf.remaining() < len {
                return Err(Error::Truncated);
            }
            Value::Bytes(buf.copy_to_bytes(len))
        }
        MARKER_BOOL => {
            if !buf.has_remaining() {
                return Err(Error::Truncated);
            }
            Value::Bool(buf.get_u8() != 0)
        }
        MARKER_OBJECT => Value::Object(read_object(buf)?),
        _ => return Err(Error::Format("unknown epee marker")),
    })
}

fn write_value(out: &mut BytesMut, value: &Value) {
    match value {
        Value::Seq(items) => {
            out.put_u8(marker_of(value) | SEQ_FLAG);
            varint::write_varint(out, items.len() as u64);
            for item in items {
                write_scalar(out, item);
            }
        }
        other => {
            out.put_u8(marker_of(other));
            write_scalar(out, other);
        }
    }
}

fn read_value(buf: &mut Bytes) -> Result<Value> {
    if !buf.has_remaining() {
        return Err(Error::Truncated);
    }
    let marker = buf.get_u8();
    let is_seq = marker & SEQ_FLAG != 0;
    let base_marker = marker & !SEQ_FLAG;
    if is_seq {
        let len = varint::read_varint(buf)? as usize;
        let mut items = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            items.push(read_scalar(buf, base_marker)?);
        }
        Ok(Value::Seq(items))
    } else {
        read_scalar(buf, base_marker)
    }
}

pub fn write_object(out: &mut BytesMut, fields: &IndexMap<String, Value>) {
    varint::write_varint(out, fields.len() as u64);
    for (name, value) in fields {
        write_field_name(out, name);
        write_value(out, value);
    }
}

pub fn read_object(buf: &mut Bytes) -> Result<IndexMap<String, Value>> {
    let count = varint::read_varint(buf)? as usize;
    let mut fields = IndexMap::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let name = read_field_name(buf)?;
        let value = read_value(buf)?;
        fields.insert(name, value);
    }
    Ok(fields)
}
