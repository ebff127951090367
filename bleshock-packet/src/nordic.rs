//! Nordic BLE sniffer pseudo-header (LINKTYPE_NORDIC_BLE, 272)
//!
//! ```text
//! board          u8
//! payload_len    u16 LE   (packet header + BLE packet)
//! protocol       u8
//! packet_counter u16 LE
//! packet_id      u8
//! packet_len     u8       (10)
//! flags          u8
//! channel        u8
//! rssi           u8
//! event_counter  u16 LE
//! delta_time     u32 LE
//! ```

use bytes::{BufMut, BytesMut};

/// pcap link type for Nordic BLE captures
pub const LINKTYPE_NORDIC_BLE: i32 = 272;

/// Packet id of a received/sent radio event
pub const EVENT_PACKET: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NordicBleHeader {
    pub board: u8,
    pub protocol: u8,
    pub packet_counter: u16,
    pub packet_id: u8,
    pub flags: u8,
    pub channel: u8,
    pub rssi: u8,
    pub event_counter: u16,
    pub delta_time: u32,
}

impl Default for NordicBleHeader {
    fn default() -> Self {
        Self {
            board: 0,
            protocol: 2,
            packet_counter: 0,
            packet_id: EVENT_PACKET,
            flags: 0,
            channel: 0,
            rssi: 0,
            event_counter: 0,
            delta_time: 0,
        }
    }
}

impl NordicBleHeader {
    /// Total header size in bytes
    pub const SIZE: usize = 17;

    /// Length of the packet header part (flags through delta time)
    const PACKET_HEADER_LEN: u8 = 10;

    /// Serialize the header followed by `ble` (access address through CRC)
    pub fn encapsulate(&self, ble: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::SIZE + ble.len());
        buffer.put_u8(self.board);
        buffer.put_u16_le(ble.len() as u16 + Self::PACKET_HEADER_LEN as u16);
        buffer.put_u8(self.protocol);
        buffer.put_u16_le(self.packet_counter);
        buffer.put_u8(self.packet_id);
        buffer.put_u8(Self::PACKET_HEADER_LEN);
        buffer.put_u8(self.flags);
        buffer.put_u8(self.channel);
        buffer.put_u8(self.rssi);
        buffer.put_u16_le(self.event_counter);
        buffer.put_u32_le(self.delta_time);
        buffer.put_slice(ble);
        buffer.to_vec()
    }

    /// Split a capture record into header and BLE bytes
    pub fn decapsulate(data: &[u8]) -> Option<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return None;
        }
        let header = Self {
            board: data[0],
            protocol: data[3],
            packet_counter: u16::from_le_bytes([data[4], data[5]]),
            packet_id: data[6],
            flags: data[8],
            channel: data[9],
            rssi: data[10],
            event_counter: u16::from_le_bytes([data[11], data[12]]),
            delta_time: u32::from_le_bytes([data[13], data[14], data[15], data[16]]),
        };
        Some((header, &data[Self::SIZE..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encapsulate() {
        let header = NordicBleHeader {
            board: 75,
            flags: 0x03,
            ..Default::default()
        };
        let record = header.encapsulate(&[0xAA, 0xBB]);

        assert_eq!(record.len(), NordicBleHeader::SIZE + 2);
        assert_eq!(record[0], 75);
        assert_eq!(u16::from_le_bytes([record[1], record[2]]), 12);
        assert_eq!(record[3], 2);
        assert_eq!(record[7], 10);
        assert_eq!(record[8], 0x03);

        let (parsed, ble) = NordicBleHeader::decapsulate(&record).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(ble, &[0xAA, 0xBB]);
    }
}
