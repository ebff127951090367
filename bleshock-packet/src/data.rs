//! Data channel PDUs
//!
//! ```text
//! Header (2 bytes)
//!   bits 0-1  LLID
//!   bit  2    NESN
//!   bit  3    SN
//!   bit  4    MD
//!   byte 1    payload length
//! ```

use bytes::{BufMut, BytesMut};

use crate::control::ControlPdu;
use crate::l2cap::L2capFrame;

/// Logical link identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Llid {
    /// Reserved value 0
    Reserved = 0,
    /// Continuation fragment of an L2CAP message, or an empty PDU
    Continuation = 1,
    /// Start of an L2CAP message
    Start = 2,
    /// LL control PDU
    Control = 3,
}

impl Llid {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Llid::Continuation,
            2 => Llid::Start,
            3 => Llid::Control,
            _ => Llid::Reserved,
        }
    }
}

/// Data channel PDU header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub llid: Llid,
    pub nesn: bool,
    pub sn: bool,
    pub md: bool,
    pub length: u8,
}

impl DataHeader {
    /// Header size in bytes
    pub const SIZE: usize = 2;

    /// Header with sequence bits cleared; the dongle firmware fills them in
    pub fn new(llid: Llid, length: u8) -> Self {
        Self {
            llid,
            nesn: false,
            sn: false,
            md: false,
            length,
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        let mut first = self.llid as u8;
        if self.nesn {
            first |= 0x04;
        }
        if self.sn {
            first |= 0x08;
        }
        if self.md {
            first |= 0x10;
        }
        [first, self.length]
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let first = *data.first()?;
        let length = *data.get(1)?;
        Some(Self {
            llid: Llid::from_bits(first),
            nesn: first & 0x04 != 0,
            sn: first & 0x08 != 0,
            md: first & 0x10 != 0,
            length,
        })
    }
}

/// Data channel payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPayload {
    /// LLID 1 with zero length
    Empty,
    /// LL control PDU
    Control(ControlPdu),
    /// Start of an L2CAP frame
    L2cap(L2capFrame),
    /// L2CAP continuation fragment (or a start fragment too short to decode)
    Continuation(Vec<u8>),
}

fn payload_bytes(payload: &DataPayload) -> Vec<u8> {
    match payload {
        DataPayload::Empty => Vec::new(),
        DataPayload::Control(pdu) => pdu.to_bytes(),
        DataPayload::L2cap(frame) => frame.to_bytes(),
        DataPayload::Continuation(raw) => raw.clone(),
    }
}

/// Data channel PDU (header + payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPdu {
    pub header: DataHeader,
    pub payload: DataPayload,
}

impl DataPdu {
    /// Build a PDU whose header matches `payload`
    pub fn new(payload: DataPayload) -> Self {
        let llid = match payload {
            DataPayload::Empty | DataPayload::Continuation(_) => Llid::Continuation,
            DataPayload::Control(_) => Llid::Control,
            DataPayload::L2cap(_) => Llid::Start,
        };
        let length = payload_bytes(&payload).len() as u8;
        Self {
            header: DataHeader::new(llid, length),
            payload,
        }
    }

    pub fn empty() -> Self {
        Self::new(DataPayload::Empty)
    }

    pub fn control(pdu: ControlPdu) -> Self {
        Self::new(DataPayload::Control(pdu))
    }

    pub fn l2cap(frame: L2capFrame) -> Self {
        Self::new(DataPayload::L2cap(frame))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.payload, DataPayload::Empty)
    }

    /// Serialize the PDU, recomputing the header length
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = payload_bytes(&self.payload);

        let mut header = self.header;
        header.length = payload.len() as u8;

        let mut buffer = BytesMut::with_capacity(DataHeader::SIZE + payload.len());
        buffer.put_slice(&header.to_bytes());
        buffer.put_slice(&payload);
        buffer.to_vec()
    }

    /// Parse a PDU; `data` may carry trailing bytes (e.g. the CRC)
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let header = DataHeader::from_bytes(data)?;
        let body = data.get(DataHeader::SIZE..DataHeader::SIZE + header.length as usize)?;

        let payload = match header.llid {
            Llid::Continuation if body.is_empty() => DataPayload::Empty,
            Llid::Control => DataPayload::Control(ControlPdu::from_bytes(body)?),
            Llid::Start => match L2capFrame::from_bytes(body) {
                Some(frame) => DataPayload::L2cap(frame),
                None => DataPayload::Continuation(body.to_vec()),
            },
            Llid::Continuation => DataPayload::Continuation(body.to_vec()),
            Llid::Reserved => return None,
        };

        Some(Self { header, payload })
    }
}
