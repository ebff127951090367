//! L2CAP basic frames
//!
//! Basic header is `length u16 LE | channel id u16 LE` followed by the
//! information payload. Only the fixed LE channels used by the harness are
//! decoded.

use bytes::{BufMut, BytesMut};

use crate::att::AttPdu;
use crate::sm::SmPdu;

/// Fixed channel identifiers
pub mod cids {
    pub const ATT: u16 = 0x0004;
    pub const LE_SIGNALING: u16 = 0x0005;
    pub const SM: u16 = 0x0006;
}

/// L2CAP information payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L2capPayload {
    Att(AttPdu),
    Sm(SmPdu),
    /// Any other channel, or a fragment too short to decode
    Raw(Vec<u8>),
}

/// L2CAP basic frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2capFrame {
    pub cid: u16,
    pub payload: L2capPayload,
}

impl L2capFrame {
    /// Header size in bytes
    pub const HEADER_SIZE: usize = 4;

    pub fn att(pdu: AttPdu) -> Self {
        Self {
            cid: cids::ATT,
            payload: L2capPayload::Att(pdu),
        }
    }

    pub fn sm(pdu: SmPdu) -> Self {
        Self {
            cid: cids::SM,
            payload: L2capPayload::Sm(pdu),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = match &self.payload {
            L2capPayload::Att(pdu) => pdu.to_bytes(),
            L2capPayload::Sm(pdu) => pdu.to_bytes(),
            L2capPayload::Raw(raw) => raw.clone(),
        };

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());
        buffer.put_u16_le(payload.len() as u16);
        buffer.put_u16_le(self.cid);
        buffer.put_slice(&payload);
        buffer.to_vec()
    }

    /// Parse a basic frame
    ///
    /// A payload shorter than the declared length is a fragmented start
    /// and is kept raw.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let length = u16::from_le_bytes([data[0], data[1]]) as usize;
        let cid = u16::from_le_bytes([data[2], data[3]]);
        let rest = &data[Self::HEADER_SIZE..];

        let payload = match rest.get(..length) {
            Some(body) => match cid {
                cids::ATT => AttPdu::from_bytes(body).map(L2capPayload::Att),
                cids::SM => SmPdu::from_bytes(body).map(L2capPayload::Sm),
                _ => None,
            }
            .unwrap_or_else(|| L2capPayload::Raw(body.to_vec())),
            None => L2capPayload::Raw(rest.to_vec()),
        };

        Some(Self { cid, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_att_header() {
        let bytes = L2capFrame::att(AttPdu::ExchangeMtuReq { mtu: 247 }).to_bytes();
        assert_eq!(bytes, vec![0x03, 0x00, 0x04, 0x00, 0x02, 0xF7, 0x00]);
    }

    #[test]
    fn test_parse_sm() {
        let frame = L2capFrame::from_bytes(&[0x02, 0x00, 0x06, 0x00, 0x05, 0x03]).unwrap();
        assert_eq!(frame.cid, cids::SM);
        assert_eq!(frame.payload, L2capPayload::Sm(SmPdu::PairingFailed { reason: 0x03 }));
    }

    #[test]
    fn test_fragment_kept_raw() {
        let frame = L2capFrame::from_bytes(&[0x10, 0x00, 0x04, 0x00, 0x02]).unwrap();
        assert_eq!(frame.payload, L2capPayload::Raw(vec![0x02]));
    }
}
