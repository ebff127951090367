//! Advertising channel PDUs
//!
//! ```text
//! Header (2 bytes)
//!   bits 0-3  PDU type
//!   bit  5    ChSel
//!   bit  6    TxAdd (advertiser / scanner / initiator address is random)
//!   bit  7    RxAdd (target address is random)
//!   byte 1    payload length
//! Payload (0..=255 bytes)
//! ```

use bytes::{BufMut, BytesMut};

use crate::address::{AddressType, BdAddress};

/// Advertising PDU type values
pub mod pdu_types {
    pub const ADV_IND: u8 = 0x00;
    pub const ADV_DIRECT_IND: u8 = 0x01;
    pub const ADV_NONCONN_IND: u8 = 0x02;
    pub const SCAN_REQ: u8 = 0x03;
    pub const SCAN_RSP: u8 = 0x04;
    pub const CONNECT_REQ: u8 = 0x05;
    pub const ADV_SCAN_IND: u8 = 0x06;
}

const CH_SEL_BIT: u8 = 0x20;
const TX_ADD_BIT: u8 = 0x40;
const RX_ADD_BIT: u8 = 0x80;

/// Link-layer parameters carried in `CONNECT_REQ` (LLData)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Initiator (our) address
    pub init_a: BdAddress,
    /// Advertiser address
    pub adv_a: BdAddress,
    /// Access address of the new connection
    pub access_address: u32,
    /// CRC init (24 bits)
    pub crc_init: u32,
    /// Transmit window size, in 1.25 ms units
    pub win_size: u8,
    /// Transmit window offset, in 1.25 ms units
    pub win_offset: u16,
    /// Connection interval, in 1.25 ms units
    pub interval: u16,
    /// Peripheral latency, in connection events
    pub latency: u16,
    /// Supervision timeout, in 10 ms units
    pub timeout: u16,
    /// Data channel map (37 bits)
    pub channel_map: u64,
    /// Hop increment (5 bits)
    pub hop: u8,
    /// Sleep clock accuracy (3 bits)
    pub sca: u8,
}

impl ConnectRequest {
    /// Payload size in bytes
    pub const SIZE: usize = 34;

    fn write(&self, buffer: &mut BytesMut) {
        buffer.put_slice(&self.init_a.to_wire());
        buffer.put_slice(&self.adv_a.to_wire());
        buffer.put_u32_le(self.access_address);
        buffer.put_slice(&self.crc_init.to_le_bytes()[..3]);
        buffer.put_u8(self.win_size);
        buffer.put_u16_le(self.win_offset);
        buffer.put_u16_le(self.interval);
        buffer.put_u16_le(self.latency);
        buffer.put_u16_le(self.timeout);
        buffer.put_slice(&self.channel_map.to_le_bytes()[..5]);
        buffer.put_u8((self.hop & 0x1F) | ((self.sca & 0x07) << 5));
    }

    fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        let mut channel_map = [0u8; 8];
        channel_map[..5].copy_from_slice(&data[28..33]);

        Some(Self {
            init_a: BdAddress::from_wire(&data[0..6])?,
            adv_a: BdAddress::from_wire(&data[6..12])?,
            access_address: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            crc_init: u32::from_le_bytes([data[16], data[17], data[18], 0]),
            win_size: data[19],
            win_offset: u16::from_le_bytes([data[20], data[21]]),
            interval: u16::from_le_bytes([data[22], data[23]]),
            latency: u16::from_le_bytes([data[24], data[25]]),
            timeout: u16::from_le_bytes([data[26], data[27]]),
            channel_map: u64::from_le_bytes(channel_map),
            hop: data[33] & 0x1F,
            sca: data[33] >> 5,
        })
    }
}

/// Advertising PDU payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvPayload {
    /// Connectable undirected advertising
    AdvInd { adv_a: BdAddress, data: Vec<u8> },
    /// Connectable directed advertising
    AdvDirectInd {
        adv_a: BdAddress,
        target_a: BdAddress,
    },
    /// Non-connectable undirected advertising
    AdvNonconnInd { adv_a: BdAddress, data: Vec<u8> },
    /// Scan request
    ScanReq {
        scan_a: BdAddress,
        adv_a: BdAddress,
    },
    /// Scan response
    ScanRsp { adv_a: BdAddress, data: Vec<u8> },
    /// Connection request
    ConnectReq(ConnectRequest),
    /// Scannable undirected advertising
    AdvScanInd { adv_a: BdAddress, data: Vec<u8> },
    /// Reserved or malformed PDU, kept verbatim
    Unknown { pdu_type: u8, payload: Vec<u8> },
}

/// Advertising channel PDU (header + payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingPdu {
    /// TxAdd header bit
    pub tx_add: AddressType,
    /// RxAdd header bit
    pub rx_add: AddressType,
    /// ChSel header bit
    pub ch_sel: bool,
    /// Payload
    pub payload: AdvPayload,
}

impl AdvertisingPdu {
    /// Header size in bytes
    pub const HEADER_SIZE: usize = 2;

    /// Create a PDU with public addresses
    pub fn new(payload: AdvPayload) -> Self {
        Self {
            tx_add: AddressType::Public,
            rx_add: AddressType::Public,
            ch_sel: false,
            payload,
        }
    }

    /// Build a `SCAN_REQ` from `scan_a` towards `adv_a`
    pub fn scan_request(scan_a: BdAddress, adv_a: BdAddress, adv_type: AddressType) -> Self {
        Self::new(AdvPayload::ScanReq { scan_a, adv_a }).with_rx_add(adv_type)
    }

    /// Build a `CONNECT_REQ`
    pub fn connect_request(request: ConnectRequest, adv_type: AddressType) -> Self {
        Self::new(AdvPayload::ConnectReq(request)).with_rx_add(adv_type)
    }

    /// Set the TxAdd bit
    pub fn with_tx_add(mut self, tx_add: AddressType) -> Self {
        self.tx_add = tx_add;
        self
    }

    /// Set the RxAdd bit
    pub fn with_rx_add(mut self, rx_add: AddressType) -> Self {
        self.rx_add = rx_add;
        self
    }

    /// PDU type value for this payload
    pub fn pdu_type(&self) -> u8 {
        match &self.payload {
            AdvPayload::AdvInd { .. } => pdu_types::ADV_IND,
            AdvPayload::AdvDirectInd { .. } => pdu_types::ADV_DIRECT_IND,
            AdvPayload::AdvNonconnInd { .. } => pdu_types::ADV_NONCONN_IND,
            AdvPayload::ScanReq { .. } => pdu_types::SCAN_REQ,
            AdvPayload::ScanRsp { .. } => pdu_types::SCAN_RSP,
            AdvPayload::ConnectReq(_) => pdu_types::CONNECT_REQ,
            AdvPayload::AdvScanInd { .. } => pdu_types::ADV_SCAN_IND,
            AdvPayload::Unknown { pdu_type, .. } => *pdu_type & 0x0F,
        }
    }

    /// Address of the advertiser, if this PDU carries one
    pub fn adv_address(&self) -> Option<BdAddress> {
        match &self.payload {
            AdvPayload::AdvInd { adv_a, .. }
            | AdvPayload::AdvDirectInd { adv_a, .. }
            | AdvPayload::AdvNonconnInd { adv_a, .. }
            | AdvPayload::ScanReq { adv_a, .. }
            | AdvPayload::ScanRsp { adv_a, .. }
            | AdvPayload::AdvScanInd { adv_a, .. } => Some(*adv_a),
            AdvPayload::ConnectReq(req) => Some(req.adv_a),
            AdvPayload::Unknown { .. } => None,
        }
    }

    /// Returns true for PDUs sent by an advertiser (not scanner/initiator)
    pub fn is_advertisement(&self) -> bool {
        matches!(
            self.payload,
            AdvPayload::AdvInd { .. }
                | AdvPayload::AdvDirectInd { .. }
                | AdvPayload::AdvNonconnInd { .. }
                | AdvPayload::AdvScanInd { .. }
        )
    }

    fn header_byte(&self) -> u8 {
        let mut byte = self.pdu_type();
        if self.ch_sel {
            byte |= CH_SEL_BIT;
        }
        if self.tx_add.is_random() {
            byte |= TX_ADD_BIT;
        }
        if self.rx_add.is_random() {
            byte |= RX_ADD_BIT;
        }
        byte
    }

    /// Serialize header and payload
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = BytesMut::with_capacity(ConnectRequest::SIZE);

        match &self.payload {
            AdvPayload::AdvInd { adv_a, data }
            | AdvPayload::AdvNonconnInd { adv_a, data }
            | AdvPayload::ScanRsp { adv_a, data }
            | AdvPayload::AdvScanInd { adv_a, data } => {
                payload.put_slice(&adv_a.to_wire());
                payload.put_slice(data);
            }
            AdvPayload::AdvDirectInd { adv_a, target_a } => {
                payload.put_slice(&adv_a.to_wire());
                payload.put_slice(&target_a.to_wire());
            }
            AdvPayload::ScanReq { scan_a, adv_a } => {
                payload.put_slice(&scan_a.to_wire());
                payload.put_slice(&adv_a.to_wire());
            }
            AdvPayload::ConnectReq(req) => req.write(&mut payload),
            AdvPayload::Unknown { payload: raw, .. } => payload.put_slice(raw),
        }

        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());
        buffer.put_u8(self.header_byte());
        buffer.put_u8(payload.len() as u8);
        buffer.put_slice(&payload);
        buffer.to_vec()
    }

    /// Parse header and payload
    ///
    /// Returns `None` if the header length exceeds the available data or a
    /// known PDU type is too short for its fixed fields.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::HEADER_SIZE {
            return None;
        }

        let header = data[0];
        let length = data[1] as usize;
        let body = data.get(Self::HEADER_SIZE..Self::HEADER_SIZE + length)?;

        let pdu_type = header & 0x0F;
        let tail = |offset: usize| body.get(offset..).map(<[u8]>::to_vec);

        let payload = match pdu_type {
            pdu_types::ADV_IND => AdvPayload::AdvInd {
                adv_a: BdAddress::from_wire(body)?,
                data: tail(6)?,
            },
            pdu_types::ADV_DIRECT_IND => AdvPayload::AdvDirectInd {
                adv_a: BdAddress::from_wire(body)?,
                target_a: BdAddress::from_wire(body.get(6..)?)?,
            },
            pdu_types::ADV_NONCONN_IND => AdvPayload::AdvNonconnInd {
                adv_a: BdAddress::from_wire(body)?,
                data: tail(6)?,
            },
            pdu_types::SCAN_REQ => AdvPayload::ScanReq {
                scan_a: BdAddress::from_wire(body)?,
                adv_a: BdAddress::from_wire(body.get(6..)?)?,
            },
            pdu_types::SCAN_RSP => AdvPayload::ScanRsp {
                adv_a: BdAddress::from_wire(body)?,
                data: tail(6)?,
            },
            pdu_types::CONNECT_REQ => AdvPayload::ConnectReq(ConnectRequest::parse(body)?),
            pdu_types::ADV_SCAN_IND => AdvPayload::AdvScanInd {
                adv_a: BdAddress::from_wire(body)?,
                data: tail(6)?,
            },
            _ => AdvPayload::Unknown {
                pdu_type,
                payload: body.to_vec(),
            },
        };

        Some(Self {
            tx_add: AddressType::from_bit(header & TX_ADD_BIT != 0),
            rx_add: AddressType::from_bit(header & RX_ADD_BIT != 0),
            ch_sel: header & CH_SEL_BIT != 0,
            payload,
        })
    }
}
