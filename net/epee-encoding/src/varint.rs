//! Epee's own varint, distinct from CryptoNote's tx/block varint: the low
//! 2 bits of the first byte pick a width (1/2/4/8 bytes), the rest of that
//! first byte plus any further bytes hold the value.

use bytes::{Buf, BufMut};

use crate::{Error, Result};

const SIZE_BYTE: u8 = 0b00;
const SIZE_WORD: u8 = 0b01;
const SIZE_DWORD: u8 = 0b10;
const SIZE_QWORD: u8 = 0b11;

pub fn write_varint(out: &mut impl BufMut, value: u64) {
    if value <= 63 {
        out.put_u8(((value as u8) << 2) | SIZE_BYTE);
    } else if value <= 16_383 {
        out.put_u16_le(((value as u16) << 2) | u16::from(SIZE_WORD));
    } else if value <= 1_073_741_823 {
        out.put_u32_le(((value as u32) << 2) | u32::from(SIZE_DWORD));
    } else {
        out.put_u64_le((value << 2) | u64::from(SIZE_QWORD));
    }
}

pub fn read_varint(buf: &mut impl Buf) -> Result<u64> {
    if !buf.has_remaining() {
        return Err(Error::Truncated);
    }
    let first = buf.chunk()[0];
    let size_tag = first & 0b11;
    Ok(match size_tag {
        _ if size_tag == SIZE_BYTE => u64::from(buf.get_u8() >> 2),
        _ if size_tag == SIZE_WORD => {
            if buf.remaining() < 2 {
                return Err(Error::Truncated);
            }
            u64::from(buf.get_u16_le() >> 2)
        }
        _ if size_tag == SIZE_DWORD => {
            if buf.remaining() < 4 {
                return Err(Error::Truncated);
            }
            u64::from(buf.get_u32_le() >> 2)
        }
        _ => {
            if buf.remaining() < 8 {
                return Err(Error::Truncated);
            }
            buf.get_u64_le() >> 2
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_all_widths() {
        for v in [0u64, 63, 64, 16_383, 16_384, 1_073_741_823, 1_073_741_824, u64::MAX >> 2] {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, v);
            let mut frozen = buf.freeze();
            assert_eq!(read_varint(&mut frozen).unwrap(), v);
        }
    }
}
