//! Link-layer control PDUs (LLID 3)
//!
//! A control PDU is a one-byte opcode followed by opcode-specific
//! `CtrData`. Only the procedures the harness drives or reacts to are
//! decoded; every other opcode is preserved as raw bytes.

use bytes::{BufMut, BytesMut};
use std::fmt;

/// LL control opcodes
pub mod opcodes {
    pub const LL_CONNECTION_UPDATE_IND: u8 = 0x00;
    pub const LL_CHANNEL_MAP_IND: u8 = 0x01;
    pub const LL_TERMINATE_IND: u8 = 0x02;
    pub const LL_ENC_REQ: u8 = 0x03;
    pub const LL_ENC_RSP: u8 = 0x04;
    pub const LL_START_ENC_REQ: u8 = 0x05;
    pub const LL_START_ENC_RSP: u8 = 0x06;
    pub const LL_UNKNOWN_RSP: u8 = 0x07;
    pub const LL_FEATURE_REQ: u8 = 0x08;
    pub const LL_FEATURE_RSP: u8 = 0x09;
    pub const LL_PAUSE_ENC_REQ: u8 = 0x0A;
    pub const LL_PAUSE_ENC_RSP: u8 = 0x0B;
    pub const LL_VERSION_IND: u8 = 0x0C;
    pub const LL_REJECT_IND: u8 = 0x0D;
    pub const LL_PERIPHERAL_FEATURE_REQ: u8 = 0x0E;
    pub const LL_CONNECTION_PARAM_REQ: u8 = 0x0F;
    pub const LL_CONNECTION_PARAM_RSP: u8 = 0x10;
    pub const LL_REJECT_EXT_IND: u8 = 0x11;
    pub const LL_PING_REQ: u8 = 0x12;
    pub const LL_PING_RSP: u8 = 0x13;
    pub const LL_LENGTH_REQ: u8 = 0x14;
    pub const LL_LENGTH_RSP: u8 = 0x15;
}

/// Link Layer version numbers (`VersNr`)
pub mod versions {
    pub const V4_0: u8 = 0x06;
    pub const V4_1: u8 = 0x07;
    pub const V4_2: u8 = 0x08;
    pub const V5_0: u8 = 0x09;
}

/// Nordic Semiconductor company identifier
pub const COMPANY_ID_NORDIC: u16 = 0x0059;

/// `LL_VERSION_IND` contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInd {
    pub version: u8,
    pub company_id: u16,
    pub subversion: u16,
}

impl VersionInd {
    /// Version indication advertising Bluetooth 4.2
    pub fn v4_2() -> Self {
        Self {
            version: versions::V4_2,
            company_id: COMPANY_ID_NORDIC,
            subversion: 0x0000,
        }
    }
}

/// `LL_LENGTH_REQ` / `LL_LENGTH_RSP` contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthParams {
    pub max_rx_octets: u16,
    pub max_rx_time: u16,
    pub max_tx_octets: u16,
    pub max_tx_time: u16,
}

impl LengthParams {
    /// Default max time (microseconds) for 251-octet payloads on 1M PHY
    pub const DEFAULT_TIME: u16 = 2120;

    /// Symmetric request for `octets` in both directions
    pub fn symmetric(octets: u16) -> Self {
        Self {
            max_rx_octets: octets,
            max_rx_time: Self::DEFAULT_TIME,
            max_tx_octets: octets,
            max_tx_time: Self::DEFAULT_TIME,
        }
    }
}

/// `LL_ENC_REQ` contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncRequest {
    pub rand: u64,
    pub ediv: u16,
    pub skd_m: u64,
    pub iv_m: u32,
}

/// Decoded LL control PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPdu {
    TerminateInd { error_code: u8 },
    EncReq(EncRequest),
    EncRsp { skd_s: u64, iv_s: u32 },
    StartEncReq,
    StartEncRsp,
    UnknownRsp { unknown_type: u8 },
    FeatureReq { features: u64 },
    FeatureRsp { features: u64 },
    VersionInd(VersionInd),
    RejectInd { error_code: u8 },
    LengthReq(LengthParams),
    LengthRsp(LengthParams),
    /// Any other opcode, or a known opcode with a malformed body
    Other { opcode: u8, data: Vec<u8> },
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

fn read_length(data: &[u8]) -> Option<LengthParams> {
    Some(LengthParams {
        max_rx_octets: read_u16(data, 0)?,
        max_rx_time: read_u16(data, 2)?,
        max_tx_octets: read_u16(data, 4)?,
        max_tx_time: read_u16(data, 6)?,
    })
}

impl ControlPdu {
    /// Opcode of this PDU
    pub fn opcode(&self) -> u8 {
        match self {
            ControlPdu::TerminateInd { .. } => opcodes::LL_TERMINATE_IND,
            ControlPdu::EncReq(_) => opcodes::LL_ENC_REQ,
            ControlPdu::EncRsp { .. } => opcodes::LL_ENC_RSP,
            ControlPdu::StartEncReq => opcodes::LL_START_ENC_REQ,
            ControlPdu::StartEncRsp => opcodes::LL_START_ENC_RSP,
            ControlPdu::UnknownRsp { .. } => opcodes::LL_UNKNOWN_RSP,
            ControlPdu::FeatureReq { .. } => opcodes::LL_FEATURE_REQ,
            ControlPdu::FeatureRsp { .. } => opcodes::LL_FEATURE_RSP,
            ControlPdu::VersionInd(_) => opcodes::LL_VERSION_IND,
            ControlPdu::RejectInd { .. } => opcodes::LL_REJECT_IND,
            ControlPdu::LengthReq(_) => opcodes::LL_LENGTH_REQ,
            ControlPdu::LengthRsp(_) => opcodes::LL_LENGTH_RSP,
            ControlPdu::Other { opcode, .. } => *opcode,
        }
    }

    /// Serialize opcode and `CtrData`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(27);
        buffer.put_u8(self.opcode());

        match self {
            ControlPdu::TerminateInd { error_code } | ControlPdu::RejectInd { error_code } => {
                buffer.put_u8(*error_code)
            }
            ControlPdu::EncReq(req) => {
                buffer.put_u64_le(req.rand);
                buffer.put_u16_le(req.ediv);
                buffer.put_u64_le(req.skd_m);
                buffer.put_u32_le(req.iv_m);
            }
            ControlPdu::EncRsp { skd_s, iv_s } => {
                buffer.put_u64_le(*skd_s);
                buffer.put_u32_le(*iv_s);
            }
            ControlPdu::StartEncReq | ControlPdu::StartEncRsp => {}
            ControlPdu::UnknownRsp { unknown_type } => buffer.put_u8(*unknown_type),
            ControlPdu::FeatureReq { features } | ControlPdu::FeatureRsp { features } => {
                buffer.put_u64_le(*features)
            }
            ControlPdu::VersionInd(v) => {
                buffer.put_u8(v.version);
                buffer.put_u16_le(v.company_id);
                buffer.put_u16_le(v.subversion);
            }
            ControlPdu::LengthReq(p) | ControlPdu::LengthRsp(p) => {
                buffer.put_u16_le(p.max_rx_octets);
                buffer.put_u16_le(p.max_rx_time);
                buffer.put_u16_le(p.max_tx_octets);
                buffer.put_u16_le(p.max_tx_time);
            }
            ControlPdu::Other { data, .. } => buffer.put_slice(data),
        }

        buffer.to_vec()
    }

    /// Parse opcode and `CtrData`
    ///
    /// Returns `None` only for an empty buffer. A known opcode whose body
    /// is too short decodes as [`ControlPdu::Other`].
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let (&opcode, body) = data.split_first()?;

        let decoded = match opcode {
            opcodes::LL_TERMINATE_IND => body
                .first()
                .map(|&error_code| ControlPdu::TerminateInd { error_code }),
            opcodes::LL_ENC_REQ => (|| {
                Some(ControlPdu::EncReq(EncRequest {
                    rand: read_u64(body, 0)?,
                    ediv: read_u16(body, 8)?,
                    skd_m: read_u64(body, 10)?,
                    iv_m: read_u32(body, 18)?,
                }))
            })(),
            opcodes::LL_ENC_RSP => (|| {
                Some(ControlPdu::EncRsp {
                    skd_s: read_u64(body, 0)?,
                    iv_s: read_u32(body, 8)?,
                })
            })(),
            opcodes::LL_START_ENC_REQ => Some(ControlPdu::StartEncReq),
            opcodes::LL_START_ENC_RSP => Some(ControlPdu::StartEncRsp),
            opcodes::LL_UNKNOWN_RSP => body
                .first()
                .map(|&unknown_type| ControlPdu::UnknownRsp { unknown_type }),
            opcodes::LL_FEATURE_REQ => {
                read_u64(body, 0).map(|features| ControlPdu::FeatureReq { features })
            }
            opcodes::LL_FEATURE_RSP => {
                read_u64(body, 0).map(|features| ControlPdu::FeatureRsp { features })
            }
            opcodes::LL_VERSION_IND => (|| {
                Some(ControlPdu::VersionInd(VersionInd {
                    version: *body.first()?,
                    company_id: read_u16(body, 1)?,
                    subversion: read_u16(body, 3)?,
                }))
            })(),
            opcodes::LL_REJECT_IND => body
                .first()
                .map(|&error_code| ControlPdu::RejectInd { error_code }),
            opcodes::LL_LENGTH_REQ => read_length(body).map(ControlPdu::LengthReq),
            opcodes::LL_LENGTH_RSP => read_length(body).map(ControlPdu::LengthRsp),
            _ => None,
        };

        Some(decoded.unwrap_or_else(|| ControlPdu::Other {
            opcode,
            data: body.to_vec(),
        }))
    }

    /// Human-readable opcode name
    pub fn name(&self) -> &'static str {
        match self.opcode() {
            opcodes::LL_CONNECTION_UPDATE_IND => "LL_CONNECTION_UPDATE_IND",
            opcodes::LL_CHANNEL_MAP_IND => "LL_CHANNEL_MAP_IND",
            opcodes::LL_TERMINATE_IND => "LL_TERMINATE_IND",
            opcodes::LL_ENC_REQ => "LL_ENC_REQ",
            opcodes::LL_ENC_RSP => "LL_ENC_RSP",
            opcodes::LL_START_ENC_REQ => "LL_START_ENC_REQ",
            opcodes::LL_START_ENC_RSP => "LL_START_ENC_RSP",
            opcodes::LL_UNKNOWN_RSP => "LL_UNKNOWN_RSP",
            opcodes::LL_FEATURE_REQ => "LL_FEATURE_REQ",
            opcodes::LL_FEATURE_RSP => "LL_FEATURE_RSP",
            opcodes::LL_PAUSE_ENC_REQ => "LL_PAUSE_ENC_REQ",
            opcodes::LL_PAUSE_ENC_RSP => "LL_PAUSE_ENC_RSP",
            opcodes::LL_VERSION_IND => "LL_VERSION_IND",
            opcodes::LL_REJECT_IND => "LL_REJECT_IND",
            opcodes::LL_PERIPHERAL_FEATURE_REQ => "LL_PERIPHERAL_FEATURE_REQ",
            opcodes::LL_CONNECTION_PARAM_REQ => "LL_CONNECTION_PARAM_REQ",
            opcodes::LL_CONNECTION_PARAM_RSP => "LL_CONNECTION_PARAM_RSP",
            opcodes::LL_REJECT_EXT_IND => "LL_REJECT_EXT_IND",
            opcodes::LL_PING_REQ => "LL_PING_REQ",
            opcodes::LL_PING_RSP => "LL_PING_RSP",
            opcodes::LL_LENGTH_REQ => "LL_LENGTH_REQ",
            opcodes::LL_LENGTH_RSP => "LL_LENGTH_RSP",
            _ => "LL_UNKNOWN_OPCODE",
        }
    }
}

impl fmt::Display for ControlPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ind_layout() {
        let bytes = ControlPdu::VersionInd(VersionInd::v4_2()).to_bytes();
        assert_eq!(bytes, vec![0x0C, 0x08, 0x59, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_length_req_layout() {
        let bytes = ControlPdu::LengthReq(LengthParams::symmetric(251)).to_bytes();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], opcodes::LL_LENGTH_REQ);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 251);
        assert_eq!(u16::from_le_bytes([bytes[3], bytes[4]]), 2120);
        assert_eq!(u16::from_le_bytes([bytes[5], bytes[6]]), 251);
    }

    #[test]
    fn test_zeroed_enc_req() {
        let bytes = ControlPdu::EncReq(EncRequest::default()).to_bytes();
        assert_eq!(bytes.len(), 23);
        assert_eq!(bytes[0], opcodes::LL_ENC_REQ);
        assert!(bytes[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_length_rsp() {
        let data = [0x15, 0x1B, 0x00, 0x48, 0x01, 0x1B, 0x00, 0x48, 0x01];
        let pdu = ControlPdu::from_bytes(&data).unwrap();
        assert_eq!(
            pdu,
            ControlPdu::LengthRsp(LengthParams {
                max_rx_octets: 27,
                max_rx_time: 328,
                max_tx_octets: 27,
                max_tx_time: 328,
            })
        );
        assert_eq!(pdu.name(), "LL_LENGTH_RSP");
    }

    #[test]
    fn test_parse_unknown_rsp() {
        let pdu = ControlPdu::from_bytes(&[0x07, 0x14]).unwrap();
        assert_eq!(pdu, ControlPdu::UnknownRsp { unknown_type: 0x14 });
    }

    #[test]
    fn test_truncated_known_opcode_is_other() {
        let pdu = ControlPdu::from_bytes(&[0x0C, 0x08]).unwrap();
        assert_eq!(
            pdu,
            ControlPdu::Other {
                opcode: 0x0C,
                data: vec![0x08]
            }
        );
        assert!(ControlPdu::from_bytes(&[]).is_none());
    }
}
