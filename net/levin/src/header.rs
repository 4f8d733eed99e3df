//! The 33-byte Levin header (§6 table).

use bytes::{Buf, BufMut, BytesMut};

const REQUEST: u32 = 1 << 0;
const RESPONSE: u32 = 1 << 1;
const START_FRAGMENT: u32 = 1 << 31;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags(pub u32);

impl Flags {
    pub const REQUEST: Self = Self(REQUEST);
    pub const RESPONSE: Self = Self(RESPONSE);

    pub fn is_request(self) -> bool {
        self.0 & REQUEST != 0
    }

    pub fn is_response(self) -> bool {
        self.0 & RESPONSE != 0
    }

    pub fn is_start_fragment(self) -> bool {
        self.0 & START_FRAGMENT != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub signature: u64,
    pub size: u64,
    /// Offset 16: response-expected flag.
    pub have_to_return_data: bool,
    /// Offset 17: command id.
    pub command: u32,
    /// Offset 21: return code, 0 for requests, >0 for ok responses, <0 for
    /// an error.
    pub return_code: i32,
    /// Offset 25.
    pub flags: Flags,
    /// Offset 29: fixed at `1`.
    pub protocol_version: u32,
}

impl Header {
    pub const SIZE: usize = 33;

    pub fn request(command: u32, have_to_return_data: bool) -> Self {
        Self {
            signature: cn_constants::p2p::LEVIN_SIGNATURE,
            size: 0,
            have_to_return_data,
            command,
            return_code: 0,
            flags: Flags::REQUEST,
            protocol_version: cn_constants::p2p::LEVIN_PROTOCOL_VERSION,
        }
    }

    pub fn response(command: u32, return_code: i32) -> Self {
        Self {
            signature: cn_constants::p2p::LEVIN_SIGNATURE,
            size: 0,
            have_to_return_data: false,
            command,
            return_code,
            flags: Flags::RESPONSE,
            protocol_version: cn_constants::p2p::LEVIN_PROTOCOL_VERSION,
        }
    }

    pub fn write_bytes(&self, dst: &mut BytesMut) {
        dst.reserve(Self::SIZE);
        dst.put_u64_le(self.signature);
        dst.put_u64_le(self.size);
        dst.put_u8(u8::from(self.have_to_return_data));
        dst.put_u32_le(self.command);
        dst.put_i32_le(self.return_code);
        dst.put_u32_le(self.flags.0);
        dst.put_u32_le(self.protocol_version);
    }

    pub fn from_bytes(buf: &mut BytesMut) -> Self {
        Self {
            signature: buf.get_u64_le(),
            size: buf.get_u64_le(),
            have_to_return_data: buf.get_u8() != 0,
            command: buf.get_u32_le(),
            return_code: buf.get_i32_le(),
            flags: Flags(buf.get_u32_le()),
            protocol_version: buf.get_u32_le(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = Header::request(1001, true);
        let mut buf = BytesMut::new();
        header.write_bytes(&mut buf);
        assert_eq!(buf.len(), Header::SIZE);
        let decoded = Header::from_bytes(&mut buf);
        assert_eq!(decoded, header);
    }

    #[test]
    fn flags_roundtrip_bits() {
        let f = Flags::REQUEST;
        assert!(f.is_request());
        assert!(!f.is_response());
    }
}
