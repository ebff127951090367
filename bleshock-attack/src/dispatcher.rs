//! Frame dispatcher
//!
//! Decodes raw link-layer bytes from the transport and classifies each
//! packet into exactly one [`Event`]. Classification is structural: it
//! depends on which layers are present, never on field values. The
//! dispatcher also owns the undecodable-read counter that decides when the
//! dongle is considered absent.

use bleshock_core::{Error, Result};
use bleshock_packet::{
    AddressType, AdvPayload, AttPdu, BdAddress, BtlePacket, ControlPdu, DataPayload, L2capPayload,
    LinkPdu, SmPdu,
};
use std::fmt;
use tracing::{trace, warn};

/// Protocol-layer event derived from one decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Advertising PDU sent by an advertiser
    Advertisement {
        address: BdAddress,
        address_type: AddressType,
    },
    /// `SCAN_RSP`
    ScanResponse {
        address: BdAddress,
        address_type: AddressType,
    },
    /// Data PDU without a decoded upper layer (empty PDU, fragment, other CID)
    DataPdu { is_empty: bool },
    /// LL control PDU
    Control(ControlPdu),
    /// ATT PDU over L2CAP
    Att(AttPdu),
    /// SM PDU over L2CAP
    Sm(SmPdu),
    /// Anything else (e.g. other scanners' requests)
    Unrecognized,
}

impl Event {
    /// Received on a data channel
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            Event::DataPdu { .. } | Event::Control(_) | Event::Att(_) | Event::Sm(_)
        )
    }

    /// Data channel PDU carrying a payload
    pub fn is_non_empty_data(&self) -> bool {
        self.is_data() && !self.is_empty_data()
    }

    /// Data channel empty PDU
    pub fn is_empty_data(&self) -> bool {
        matches!(self, Event::DataPdu { is_empty: true })
    }

    /// Advertiser address, for advertisements and scan responses
    pub fn advertiser(&self) -> Option<(BdAddress, AddressType)> {
        match self {
            Event::Advertisement {
                address,
                address_type,
            }
            | Event::ScanResponse {
                address,
                address_type,
            } => Some((*address, *address_type)),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Advertisement { address, .. } => write!(f, "advertisement from {}", address),
            Event::ScanResponse { address, .. } => write!(f, "scan response from {}", address),
            Event::DataPdu { is_empty: true } => write!(f, "empty PDU"),
            Event::DataPdu { is_empty: false } => write!(f, "data PDU"),
            Event::Control(pdu) => write!(f, "{}", pdu.name()),
            Event::Att(pdu) => write!(f, "{}", pdu.name()),
            Event::Sm(pdu) => write!(f, "{}", pdu.name()),
            Event::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Classify a decoded packet
pub fn classify(packet: &BtlePacket) -> Event {
    match &packet.pdu {
        LinkPdu::Advertising(adv) => match &adv.payload {
            AdvPayload::AdvInd { adv_a, .. }
            | AdvPayload::AdvDirectInd { adv_a, .. }
            | AdvPayload::AdvNonconnInd { adv_a, .. }
            | AdvPayload::AdvScanInd { adv_a, .. } => Event::Advertisement {
                address: *adv_a,
                address_type: adv.tx_add,
            },
            AdvPayload::ScanRsp { adv_a, .. } => Event::ScanResponse {
                address: *adv_a,
                address_type: adv.tx_add,
            },
            AdvPayload::ScanReq { .. }
            | AdvPayload::ConnectReq(_)
            | AdvPayload::Unknown { .. } => Event::Unrecognized,
        },
        LinkPdu::Data(data) => match &data.payload {
            DataPayload::Empty => Event::DataPdu { is_empty: true },
            DataPayload::Control(pdu) => Event::Control(pdu.clone()),
            DataPayload::L2cap(frame) => match &frame.payload {
                L2capPayload::Att(pdu) => Event::Att(pdu.clone()),
                L2capPayload::Sm(pdu) => Event::Sm(pdu.clone()),
                L2capPayload::Raw(_) => Event::DataPdu { is_empty: false },
            },
            DataPayload::Continuation(_) => Event::DataPdu { is_empty: false },
        },
    }
}

/// A decoded packet and its classification
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub packet: BtlePacket,
    pub event: Event,
}

/// Decodes and classifies inbound frames, tracking undecodable reads
#[derive(Debug)]
pub struct FrameDispatcher {
    threshold: u32,
    consecutive_failures: u32,
    decoded: u64,
    undecodable: u64,
}

impl FrameDispatcher {
    /// Dispatcher declaring the transport absent after `threshold`
    /// consecutive undecodable reads
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            decoded: 0,
            undecodable: 0,
        }
    }

    /// Decode and classify one frame
    ///
    /// Returns `Ok(None)` for an undecodable frame below the threshold and
    /// [`Error::TransportAbsent`] once the threshold is reached. A decoded
    /// frame resets the consecutive count.
    pub fn dispatch(&mut self, raw: &[u8]) -> Result<Option<Dispatched>> {
        match BtlePacket::from_bytes(raw) {
            Some(packet) => {
                self.consecutive_failures = 0;
                self.decoded += 1;
                let event = classify(&packet);
                trace!(%event, bytes = raw.len(), "Frame dispatched");
                Ok(Some(Dispatched { packet, event }))
            }
            None => {
                warn!(bytes = raw.len(), "Undecodable frame from transport");
                self.record_failure().map(|_| None)
            }
        }
    }

    /// Count a failed transport read toward the absence threshold
    pub fn record_read_error(&mut self, error: &Error) -> Result<()> {
        warn!(error = %error, code = error.error_code(), "Transport read failed");
        self.record_failure()
    }

    fn record_failure(&mut self) -> Result<()> {
        self.consecutive_failures += 1;
        self.undecodable += 1;
        if self.consecutive_failures >= self.threshold {
            return Err(Error::TransportAbsent {
                failures: self.consecutive_failures,
            });
        }
        Ok(())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Frames decoded since creation
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Undecodable frames and read errors since creation
    pub fn undecodable(&self) -> u64 {
        self.undecodable
    }
}
