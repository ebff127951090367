//! Security Manager Protocol PDUs
//!
//! The pairing request/response fields are carried as raw bytes so that
//! out-of-range values (for instance a maximum key size above 16) are
//! encoded exactly as given.

use bytes::{BufMut, BytesMut};

/// SMP command codes
pub mod codes {
    pub const PAIRING_REQUEST: u8 = 0x01;
    pub const PAIRING_RESPONSE: u8 = 0x02;
    pub const PAIRING_CONFIRM: u8 = 0x03;
    pub const PAIRING_RANDOM: u8 = 0x04;
    pub const PAIRING_FAILED: u8 = 0x05;
    pub const ENCRYPTION_INFORMATION: u8 = 0x06;
    pub const CENTRAL_IDENTIFICATION: u8 = 0x07;
    pub const SECURITY_REQUEST: u8 = 0x0B;
    pub const PAIRING_PUBLIC_KEY: u8 = 0x0C;
}

/// Largest encryption key size the protocol allows
pub const MAX_LEGAL_KEY_SIZE: u8 = 16;

/// IO capability values
pub mod io_capability {
    pub const DISPLAY_ONLY: u8 = 0x00;
    pub const DISPLAY_YES_NO: u8 = 0x01;
    pub const KEYBOARD_ONLY: u8 = 0x02;
    pub const NO_INPUT_NO_OUTPUT: u8 = 0x03;
    pub const KEYBOARD_DISPLAY: u8 = 0x04;
}

/// Pairing request / response fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingParams {
    pub io_capability: u8,
    pub oob_data_flag: u8,
    pub auth_req: u8,
    pub max_key_size: u8,
    pub initiator_key_distribution: u8,
    pub responder_key_distribution: u8,
}

impl PairingParams {
    const SIZE: usize = 6;

    fn write(&self, buffer: &mut BytesMut) {
        buffer.put_u8(self.io_capability);
        buffer.put_u8(self.oob_data_flag);
        buffer.put_u8(self.auth_req);
        buffer.put_u8(self.max_key_size);
        buffer.put_u8(self.initiator_key_distribution);
        buffer.put_u8(self.responder_key_distribution);
    }

    fn parse(data: &[u8]) -> Option<Self> {
        let b = data.get(..Self::SIZE)?;
        Some(Self {
            io_capability: b[0],
            oob_data_flag: b[1],
            auth_req: b[2],
            max_key_size: b[3],
            initiator_key_distribution: b[4],
            responder_key_distribution: b[5],
        })
    }

    /// Returns true if the maximum key size is within 7..=16
    pub fn key_size_is_legal(&self) -> bool {
        (7..=MAX_LEGAL_KEY_SIZE).contains(&self.max_key_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmPdu {
    PairingRequest(PairingParams),
    PairingResponse(PairingParams),
    PairingConfirm { value: [u8; 16] },
    PairingRandom { value: [u8; 16] },
    PairingFailed { reason: u8 },
    SecurityRequest { auth_req: u8 },
    Other { code: u8, data: Vec<u8> },
}

fn read_block(data: &[u8]) -> Option<[u8; 16]> {
    let mut value = [0u8; 16];
    value.copy_from_slice(data.get(..16)?);
    Some(value)
}

impl SmPdu {
    pub fn code(&self) -> u8 {
        match self {
            SmPdu::PairingRequest(_) => codes::PAIRING_REQUEST,
            SmPdu::PairingResponse(_) => codes::PAIRING_RESPONSE,
            SmPdu::PairingConfirm { .. } => codes::PAIRING_CONFIRM,
            SmPdu::PairingRandom { .. } => codes::PAIRING_RANDOM,
            SmPdu::PairingFailed { .. } => codes::PAIRING_FAILED,
            SmPdu::SecurityRequest { .. } => codes::SECURITY_REQUEST,
            SmPdu::Other { code, .. } => *code,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(17);
        buffer.put_u8(self.code());
        match self {
            SmPdu::PairingRequest(p) | SmPdu::PairingResponse(p) => p.write(&mut buffer),
            SmPdu::PairingConfirm { value } | SmPdu::PairingRandom { value } => {
                buffer.put_slice(value)
            }
            SmPdu::PairingFailed { reason } => buffer.put_u8(*reason),
            SmPdu::SecurityRequest { auth_req } => buffer.put_u8(*auth_req),
            SmPdu::Other { data, .. } => buffer.put_slice(data),
        }
        buffer.to_vec()
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let (&code, body) = data.split_first()?;

        let decoded = match code {
            codes::PAIRING_REQUEST => PairingParams::parse(body).map(SmPdu::PairingRequest),
            codes::PAIRING_RESPONSE => PairingParams::parse(body).map(SmPdu::PairingResponse),
            codes::PAIRING_CONFIRM => read_block(body).map(|value| SmPdu::PairingConfirm { value }),
            codes::PAIRING_RANDOM => read_block(body).map(|value| SmPdu::PairingRandom { value }),
            codes::PAIRING_FAILED => body.first().map(|&reason| SmPdu::PairingFailed { reason }),
            codes::SECURITY_REQUEST => body
                .first()
                .map(|&auth_req| SmPdu::SecurityRequest { auth_req }),
            _ => None,
        };

        Some(decoded.unwrap_or_else(|| SmPdu::Other {
            code,
            data: body.to_vec(),
        }))
    }

    pub fn name(&self) -> &'static str {
        match self.code() {
            codes::PAIRING_REQUEST => "SM_PAIRING_REQUEST",
            codes::PAIRING_RESPONSE => "SM_PAIRING_RESPONSE",
            codes::PAIRING_CONFIRM => "SM_PAIRING_CONFIRM",
            codes::PAIRING_RANDOM => "SM_PAIRING_RANDOM",
            codes::PAIRING_FAILED => "SM_PAIRING_FAILED",
            codes::ENCRYPTION_INFORMATION => "SM_ENCRYPTION_INFORMATION",
            codes::CENTRAL_IDENTIFICATION => "SM_CENTRAL_IDENTIFICATION",
            codes::SECURITY_REQUEST => "SM_SECURITY_REQUEST",
            codes::PAIRING_PUBLIC_KEY => "SM_PAIRING_PUBLIC_KEY",
            _ => "SM_UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oversized() -> PairingParams {
        PairingParams {
            io_capability: io_capability::KEYBOARD_DISPLAY,
            oob_data_flag: 0,
            auth_req: 0x05,
            max_key_size: 253,
            initiator_key_distribution: 0x07,
            responder_key_distribution: 0x07,
        }
    }

    #[test]
    fn test_pairing_request_keeps_illegal_key_size() {
        let bytes = SmPdu::PairingRequest(oversized()).to_bytes();
        assert_eq!(bytes, vec![0x01, 0x04, 0x00, 0x05, 0xFD, 0x07, 0x07]);
        assert!(!oversized().key_size_is_legal());
    }

    #[test]
    fn test_parse_pairing_response() {
        let pdu = SmPdu::from_bytes(&[0x02, 0x03, 0x00, 0x01, 0x10, 0x00, 0x01]).unwrap();
        match pdu {
            SmPdu::PairingResponse(p) => {
                assert_eq!(p.max_key_size, 16);
                assert!(p.key_size_is_legal());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncated_response_is_other() {
        let pdu = SmPdu::from_bytes(&[0x02, 0x03]).unwrap();
        assert_eq!(
            pdu,
            SmPdu::Other {
                code: 0x02,
                data: vec![0x03]
            }
        );
    }
}
