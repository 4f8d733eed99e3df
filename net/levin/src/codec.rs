//! A `tokio_util::codec` `Encoder`/`Decoder` pair for framing Levin
//! buckets over a `TcpStream` (§4.6: "each connection has one reader task
//! and one writer task").

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::header::Header;
use crate::{Bucket, LevinError};

/// Bounds a single bucket's payload so a malformed/hostile peer can't make
/// us allocate unboundedly (§5 resource policy).
const MAX_BUCKET_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct LevinCodec {
    header: Option<Header>,
}

impl Decoder for LevinCodec {
    type Item = Bucket;
    type Error = LevinError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bucket>, LevinError> {
        let header = match self.header {
            Some(header) => header,
            None => {
                if src.len() < Header::SIZE {
                    return Ok(None);
                }
                let header = Header::from_bytes(src);
                if header.signature != cn_constants::p2p::LEVIN_SIGNATURE {
                    return Err(LevinError::BadSignature);
                }
                if header.size > MAX_BUCKET_SIZE {
                    return Err(LevinError::TooLarge);
                }
                self.header = Some(header);
                header
            }
        };

        if (src.len() as u64) < header.size {
            src.reserve((header.size as usize).saturating_sub(src.len()));
            return Ok(None);
        }

        let payload = src.split_to(header.size as usize).to_vec();
        self.header = None;
        Ok(Some(Bucket { header, payload }))
    }
}

impl Encoder<Bucket> for LevinCodec {
    type Error = LevinError;

    fn encode(&mut self, mut item: Bucket, dst: &mut BytesMut) -> Result<(), LevinError> {
        item.header.size = item.payload.len() as u64;
        item.header.write_bytes(dst);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Flags;

    #[test]
    fn encodes_then_decodes_a_bucket() {
        let bucket = Bucket {
            header: Header {
                signature: cn_constants::p2p::LEVIN_SIGNATURE,
                size: 0,
                have_to_return_data: true,
                command: 1001,
                return_code: 0,
                flags: Flags::REQUEST,
                protocol_version: 1,
            },
            payload: b"hello".to_vec(),
        };

        let mut codec = LevinCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(bucket.clone(), &mut buf).unwrap();

        let mut decode_codec = LevinCodec::default();
        let decoded = decode_codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, bucket.payload);
        assert_eq!(decoded.header.command, bucket.header.command);
    }

    #[test]
    fn partial_header_waits_for_more_bytes() {
        let mut codec = LevinCodec::default();
        let mut buf = BytesMut::from(&b"short"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut codec = LevinCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0u8; Header::SIZE]);
        assert!(matches!(codec.decode(&mut buf), Err(LevinError::BadSignature)));
    }
}
