//! Attribute Protocol PDUs

use bytes::{BufMut, BytesMut};

/// ATT opcodes
pub mod opcodes {
    pub const ERROR_RSP: u8 = 0x01;
    pub const EXCHANGE_MTU_REQ: u8 = 0x02;
    pub const EXCHANGE_MTU_RSP: u8 = 0x03;
    pub const FIND_INFORMATION_REQ: u8 = 0x04;
    pub const READ_BY_TYPE_REQ: u8 = 0x08;
    pub const READ_REQ: u8 = 0x0A;
    pub const READ_BY_GROUP_TYPE_REQ: u8 = 0x10;
    pub const WRITE_REQ: u8 = 0x12;
    pub const HANDLE_VALUE_NTF: u8 = 0x1B;
}

/// Default LE ATT MTU
pub const DEFAULT_MTU: u16 = 23;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttPdu {
    ErrorRsp {
        request_opcode: u8,
        handle: u16,
        error_code: u8,
    },
    ExchangeMtuReq {
        mtu: u16,
    },
    ExchangeMtuRsp {
        mtu: u16,
    },
    Other {
        opcode: u8,
        data: Vec<u8>,
    },
}

impl AttPdu {
    pub fn opcode(&self) -> u8 {
        match self {
            AttPdu::ErrorRsp { .. } => opcodes::ERROR_RSP,
            AttPdu::ExchangeMtuReq { .. } => opcodes::EXCHANGE_MTU_REQ,
            AttPdu::ExchangeMtuRsp { .. } => opcodes::EXCHANGE_MTU_RSP,
            AttPdu::Other { opcode, .. } => *opcode,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(5);
        buffer.put_u8(self.opcode());
        match self {
            AttPdu::ErrorRsp {
                request_opcode,
                handle,
                error_code,
            } => {
                buffer.put_u8(*request_opcode);
                buffer.put_u16_le(*handle);
                buffer.put_u8(*error_code);
            }
            AttPdu::ExchangeMtuReq { mtu } | AttPdu::ExchangeMtuRsp { mtu } => {
                buffer.put_u16_le(*mtu)
            }
            AttPdu::Other { data, .. } => buffer.put_slice(data),
        }
        buffer.to_vec()
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let (&opcode, body) = data.split_first()?;
        let mtu = || body.get(..2).map(|b| u16::from_le_bytes([b[0], b[1]]));

        let decoded = match opcode {
            opcodes::ERROR_RSP if body.len() >= 4 => Some(AttPdu::ErrorRsp {
                request_opcode: body[0],
                handle: u16::from_le_bytes([body[1], body[2]]),
                error_code: body[3],
            }),
            opcodes::EXCHANGE_MTU_REQ => mtu().map(|mtu| AttPdu::ExchangeMtuReq { mtu }),
            opcodes::EXCHANGE_MTU_RSP => mtu().map(|mtu| AttPdu::ExchangeMtuRsp { mtu }),
            _ => None,
        };

        Some(decoded.unwrap_or_else(|| AttPdu::Other {
            opcode,
            data: body.to_vec(),
        }))
    }

    pub fn name(&self) -> &'static str {
        match self.opcode() {
            opcodes::ERROR_RSP => "ATT_ERROR_RSP",
            opcodes::EXCHANGE_MTU_REQ => "ATT_EXCHANGE_MTU_REQ",
            opcodes::EXCHANGE_MTU_RSP => "ATT_EXCHANGE_MTU_RSP",
            opcodes::FIND_INFORMATION_REQ => "ATT_FIND_INFORMATION_REQ",
            opcodes::READ_BY_TYPE_REQ => "ATT_READ_BY_TYPE_REQ",
            opcodes::READ_REQ => "ATT_READ_REQ",
            opcodes::READ_BY_GROUP_TYPE_REQ => "ATT_READ_BY_GROUP_TYPE_REQ",
            opcodes::WRITE_REQ => "ATT_WRITE_REQ",
            opcodes::HANDLE_VALUE_NTF => "ATT_HANDLE_VALUE_NTF",
            _ => "ATT_UNKNOWN",
        }
    }
}
