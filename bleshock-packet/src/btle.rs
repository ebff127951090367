//! Link-layer packets: access address, PDU and CRC
//!
//! The advertising and data channels share the same outer layout; which
//! PDU format follows is decided by the access address.

use bytes::{BufMut, BytesMut};
use std::fmt;

use crate::address::{AddressType, BdAddress};
use crate::advertising::{AdvertisingPdu, ConnectRequest};
use crate::att::AttPdu;
use crate::control::ControlPdu;
use crate::crc::{crc24, ADV_CRC_INIT, CRC_SIZE};
use crate::data::{DataPayload, DataPdu};
use crate::l2cap::{L2capFrame, L2capPayload};
use crate::sm::SmPdu;

/// Access address of the advertising channels
pub const ADV_ACCESS_ADDRESS: u32 = 0x8E89_BED6;

/// Size of the access address in bytes
pub const ACCESS_ADDRESS_SIZE: usize = 4;

/// Link-layer PDU, selected by access address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPdu {
    Advertising(AdvertisingPdu),
    Data(DataPdu),
}

/// A link-layer packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtlePacket {
    pub access_address: u32,
    pub pdu: LinkPdu,
}

impl BtlePacket {
    /// Advertising-channel packet
    pub fn advertising(pdu: AdvertisingPdu) -> Self {
        Self {
            access_address: ADV_ACCESS_ADDRESS,
            pdu: LinkPdu::Advertising(pdu),
        }
    }

    /// Data-channel packet on the connection identified by `access_address`
    pub fn data(access_address: u32, pdu: DataPdu) -> Self {
        Self {
            access_address,
            pdu: LinkPdu::Data(pdu),
        }
    }

    /// `SCAN_REQ` from `scan_a` towards `adv_a`
    pub fn scan_request(scan_a: BdAddress, adv_a: BdAddress, adv_type: AddressType) -> Self {
        Self::advertising(AdvertisingPdu::scan_request(scan_a, adv_a, adv_type))
    }

    /// `CONNECT_REQ`
    pub fn connect_request(request: ConnectRequest, adv_type: AddressType) -> Self {
        Self::advertising(AdvertisingPdu::connect_request(request, adv_type))
    }

    /// LL control PDU on a connection
    pub fn control(access_address: u32, pdu: ControlPdu) -> Self {
        Self::data(access_address, DataPdu::control(pdu))
    }

    /// ATT PDU on a connection
    pub fn att(access_address: u32, pdu: AttPdu) -> Self {
        Self::data(access_address, DataPdu::l2cap(L2capFrame::att(pdu)))
    }

    /// SM PDU on a connection
    pub fn sm(access_address: u32, pdu: SmPdu) -> Self {
        Self::data(access_address, DataPdu::l2cap(L2capFrame::sm(pdu)))
    }

    pub fn is_advertising(&self) -> bool {
        matches!(self.pdu, LinkPdu::Advertising(_))
    }

    pub fn as_advertising(&self) -> Option<&AdvertisingPdu> {
        match &self.pdu {
            LinkPdu::Advertising(pdu) => Some(pdu),
            LinkPdu::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataPdu> {
        match &self.pdu {
            LinkPdu::Data(pdu) => Some(pdu),
            LinkPdu::Advertising(_) => None,
        }
    }

    /// PDU bytes (header and payload), without access address or CRC
    pub fn pdu_bytes(&self) -> Vec<u8> {
        match &self.pdu {
            LinkPdu::Advertising(pdu) => pdu.to_bytes(),
            LinkPdu::Data(pdu) => pdu.to_bytes(),
        }
    }

    /// Serialize access address, PDU and CRC
    ///
    /// `crc_init` applies to data-channel packets; advertising packets
    /// always use the advertising CRC init.
    pub fn to_bytes(&self, crc_init: u32) -> Vec<u8> {
        let pdu = self.pdu_bytes();
        let init = if self.is_advertising() {
            ADV_CRC_INIT
        } else {
            crc_init
        };

        let mut buffer = BytesMut::with_capacity(ACCESS_ADDRESS_SIZE + pdu.len() + CRC_SIZE);
        buffer.put_u32_le(self.access_address);
        buffer.put_slice(&pdu);
        buffer.put_slice(&crc24(&pdu, init));
        buffer.to_vec()
    }

    /// Decode a packet; a trailing CRC is tolerated and not verified
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let aa = data.get(..ACCESS_ADDRESS_SIZE)?;
        let access_address = u32::from_le_bytes([aa[0], aa[1], aa[2], aa[3]]);
        let rest = &data[ACCESS_ADDRESS_SIZE..];

        let pdu = if access_address == ADV_ACCESS_ADDRESS {
            LinkPdu::Advertising(AdvertisingPdu::from_bytes(rest)?)
        } else {
            LinkPdu::Data(DataPdu::from_bytes(rest)?)
        };

        Some(Self {
            access_address,
            pdu,
        })
    }

    /// Short one-line description for logs
    pub fn summary(&self) -> String {
        match &self.pdu {
            LinkPdu::Advertising(pdu) => match pdu.adv_address() {
                Some(addr) => format!("{} {}", adv_type_name(pdu.pdu_type()), addr),
                None => adv_type_name(pdu.pdu_type()).to_string(),
            },
            LinkPdu::Data(pdu) => match &pdu.payload {
                DataPayload::Empty => "LL_EMPTY_PDU".to_string(),
                DataPayload::Control(ctrl) => ctrl.name().to_string(),
                DataPayload::L2cap(frame) => match &frame.payload {
                    L2capPayload::Att(att) => att.name().to_string(),
                    L2capPayload::Sm(sm) => sm.name().to_string(),
                    L2capPayload::Raw(raw) => {
                        format!("L2CAP cid=0x{:04x} len={}", frame.cid, raw.len())
                    }
                },
                DataPayload::Continuation(raw) => format!("L2CAP_CONTINUATION len={}", raw.len()),
            },
        }
    }
}

fn adv_type_name(pdu_type: u8) -> &'static str {
    use crate::advertising::pdu_types::*;
    match pdu_type {
        ADV_IND => "ADV_IND",
        ADV_DIRECT_IND => "ADV_DIRECT_IND",
        ADV_NONCONN_IND => "ADV_NONCONN_IND",
        SCAN_REQ => "SCAN_REQ",
        SCAN_RSP => "SCAN_RSP",
        CONNECT_REQ => "CONNECT_REQ",
        ADV_SCAN_IND => "ADV_SCAN_IND",
        _ => "ADV_UNKNOWN",
    }
}

impl fmt::Display for BtlePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertising::AdvPayload;
    use crate::control::VersionInd;
    use crate::crc::verify_crc24;

    #[test]
    fn test_scan_request_bytes() {
        let scan_a: BdAddress = "5d:36:ac:90:0b:22".parse().unwrap();
        let adv_a: BdAddress = "a4:c1:38:d8:ad:a9".parse().unwrap();
        let bytes = BtlePacket::scan_request(scan_a, adv_a, AddressType::Random).to_bytes(0);

        assert_eq!(&bytes[..4], &[0xD6, 0xBE, 0x89, 0x8E]);
        assert_eq!(bytes[4], 0x83);
        assert_eq!(bytes[5], 12);
        assert_eq!(bytes.len(), 4 + 2 + 12 + 3);
        assert!(verify_crc24(&bytes[4..18], &bytes[18..], ADV_CRC_INIT));
    }

    #[test]
    fn test_data_crc_uses_connection_init() {
        let packet = BtlePacket::control(0x9A32_8370, ControlPdu::VersionInd(VersionInd::v4_2()));
        let bytes = packet.to_bytes(0x17_9A9C);
        let end = bytes.len() - CRC_SIZE;
        assert!(verify_crc24(&bytes[4..end], &bytes[end..], 0x17_9A9C));
    }

    #[test]
    fn test_decode_with_trailing_crc() {
        let packet = BtlePacket::att(0x9A32_8370, AttPdu::ExchangeMtuReq { mtu: 247 });
        let decoded = BtlePacket::from_bytes(&packet.to_bytes(0x17_9A9C)).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.summary(), "ATT_EXCHANGE_MTU_REQ");
    }

    #[test]
    fn test_decode_advertisement() {
        let raw = [
            0xD6, 0xBE, 0x89, 0x8E, 0x40, 0x06, 0xA9, 0xAD, 0xD8, 0x38, 0xC1, 0xA4,
        ];
        let packet = BtlePacket::from_bytes(&raw).unwrap();
        let adv = packet.as_advertising().unwrap();
        assert_eq!(adv.tx_add, AddressType::Random);
        assert!(matches!(adv.payload, AdvPayload::AdvInd { .. }));
        assert_eq!(packet.summary(), "ADV_IND a4:c1:38:d8:ad:a9");
    }

    #[test]
    fn test_decode_garbage() {
        assert!(BtlePacket::from_bytes(&[0x01, 0x02]).is_none());
        assert!(BtlePacket::from_bytes(&[0x70, 0x83, 0x32, 0x9A, 0x00, 0x00]).is_none());
    }
}
