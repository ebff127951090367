//! Radio transport: the trait the harness drives and the nRF52 dongle driver

use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serialport::SerialPort;
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Byte-frame channel to a BLE radio
///
/// `send` takes a complete link-layer packet (access address through CRC).
/// `poll_recv` never blocks: it returns `Ok(None)` when nothing is pending.
pub trait Transport {
    /// Send one link-layer packet
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Poll for one received link-layer packet
    fn poll_recv(&mut self) -> Result<Option<Bytes>>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn poll_recv(&mut self) -> Result<Option<Bytes>> {
        (**self).poll_recv()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Default serial device for the current platform
pub fn default_serial_port() -> &'static str {
    if cfg!(target_os = "windows") {
        "COM1"
    } else {
        "/dev/ttyACM0"
    }
}

/// Default baud rate of the dongle firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Dongle firmware command bytes
pub mod commands {
    /// Host to dongle: transmit; dongle to host: received packet
    pub const DATA: u8 = 0xA7;
    /// Dongle to host: echo of a transmitted packet
    pub const DATA_TX: u8 = 0xBB;
    /// Dongle to host: last host frame had a bad checksum
    pub const CHECKSUM_ERROR: u8 = 0xA8;
    /// Dongle to host: firmware log line
    pub const LOG: u8 = 0xF7;
}

/// Link-layer CRC trailer, recomputed by the radio
const LL_CRC_SIZE: usize = 3;

/// Largest link-layer packet: access address, header, 255 payload octets and CRC
pub const MAX_LL_PACKET_SIZE: usize = 4 + 2 + 255 + LL_CRC_SIZE;

/// Largest firmware log line accepted before the stream is treated as garbage
const MAX_LOG_SIZE: usize = 512;

/// Wrapping byte sum used by the dongle framing
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Wrap a link-layer packet for transmission
///
/// The trailing CRC is dropped; the radio computes its own.
pub fn encode_frame(packet: &[u8]) -> Vec<u8> {
    let raw = &packet[..packet.len().saturating_sub(LL_CRC_SIZE)];
    let mut buffer = BytesMut::with_capacity(raw.len() + 4);
    buffer.put_u8(commands::DATA);
    buffer.put_u16_le(raw.len() as u16);
    buffer.put_slice(raw);
    buffer.put_u8(checksum(raw));
    buffer.to_vec()
}

/// Message decoded from the dongle byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DongleMessage {
    /// Packet received over the air
    Packet { event_counter: u16, data: Bytes },
    /// Echo of a packet we transmitted
    TxEcho { event_counter: u16, data: Bytes },
    /// Firmware log text
    Log(String),
    /// Dongle rejected our last frame
    ChecksumError,
    /// Data frame whose checksum did not match
    Corrupted { command: u8 },
    /// Unknown command byte, skipped
    Unknown(u8),
    /// Frame start with an impossible length; one byte dropped to resync
    Oversized { command: u8, size: usize },
}

/// Incremental decoder for the dongle byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the serial port
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete message, if any
    pub fn next_message(&mut self) -> Option<DongleMessage> {
        let command = *self.buffer.first()?;

        match command {
            commands::DATA | commands::DATA_TX => {
                if self.buffer.len() < 5 {
                    return None;
                }
                let size = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
                if size > MAX_LL_PACKET_SIZE {
                    return Some(self.resync(command, size));
                }
                if self.buffer.len() < 5 + size + 1 {
                    return None;
                }

                let mut frame = self.buffer.split_to(5 + size + 1);
                frame.advance(3);
                let event_counter = frame.get_u16_le();
                let data = frame.split_to(size).freeze();
                let received_checksum = frame.get_u8();

                if checksum(&data) != received_checksum {
                    return Some(DongleMessage::Corrupted { command });
                }
                if command == commands::DATA {
                    Some(DongleMessage::Packet { event_counter, data })
                } else {
                    Some(DongleMessage::TxEcho { event_counter, data })
                }
            }
            commands::LOG => {
                if self.buffer.len() < 3 {
                    return None;
                }
                let size = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
                if size > MAX_LOG_SIZE {
                    return Some(self.resync(command, size));
                }
                if self.buffer.len() < 3 + size {
                    return None;
                }
                let mut frame = self.buffer.split_to(3 + size);
                frame.advance(3);
                Some(DongleMessage::Log(
                    String::from_utf8_lossy(&frame).trim_end().to_string(),
                ))
            }
            commands::CHECKSUM_ERROR => {
                self.buffer.advance(1);
                Some(DongleMessage::ChecksumError)
            }
            other => {
                self.buffer.advance(1);
                Some(DongleMessage::Unknown(other))
            }
        }
    }

    fn resync(&mut self, command: u8, size: usize) -> DongleMessage {
        self.buffer.advance(1);
        DongleMessage::Oversized { command, size }
    }
}

/// nRF52840 dongle running the raw link-layer firmware
pub struct Nrf52Dongle {
    name: String,
    port: Box<dyn SerialPort>,
    decoder: FrameDecoder,
}

impl Nrf52Dongle {
    /// Open the dongle on `path`
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| Error::PortOpen {
                port: path.to_string(),
                reason: e.to_string(),
            })?;

        debug!(port = %path, baud = baud_rate, "Opened nRF52 dongle");

        Ok(Self {
            name: path.to_string(),
            port,
            decoder: FrameDecoder::new(),
        })
    }

    fn fill(&mut self) -> Result<()> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; available];
        self.port.read_exact(&mut chunk)?;
        self.decoder.extend(&chunk);
        Ok(())
    }
}

impl Transport for Nrf52Dongle {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let wire = encode_frame(frame);
        self.port
            .write_all(&wire)
            .and_then(|_| self.port.flush())
            .map_err(|e| Error::send(e.to_string()))?;
        trace!(bytes = wire.len(), "Frame written to dongle");
        Ok(())
    }

    fn poll_recv(&mut self) -> Result<Option<Bytes>> {
        self.fill()?;

        while let Some(message) = self.decoder.next_message() {
            match message {
                DongleMessage::Packet { data, .. } => return Ok(Some(data)),
                DongleMessage::TxEcho { data, event_counter } => {
                    trace!(event_counter, bytes = data.len(), "TX echo")
                }
                DongleMessage::Log(text) => debug!(target: "dongle", "{}", text),
                DongleMessage::ChecksumError => warn!("Dongle reported a checksum error"),
                DongleMessage::Corrupted { command } => {
                    warn!(command = format_args!("0x{:02x}", command), "Discarding frame with bad checksum")
                }
                DongleMessage::Oversized { command, size } => {
                    debug!(
                        command = format_args!("0x{:02x}", command),
                        size, "Frame length out of range, resyncing"
                    )
                }
                DongleMessage::Unknown(byte) => {
                    trace!(byte = format_args!("0x{:02x}", byte), "Skipping unknown byte")
                }
            }
        }

        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Nrf52Dongle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nrf52Dongle")
            .field("name", &self.name)
            .field("pending", &self.decoder.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_frame(command: u8, counter: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![command];
        frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        frame.extend_from_slice(&counter.to_le_bytes());
        frame.extend_from_slice(payload);
        frame.push(checksum(payload));
        frame
    }

    #[test]
    fn test_encode_strips_crc() {
        let packet = [0xD6, 0xBE, 0x89, 0x8E, 0x03, 0x00, 0x11, 0x22, 0x33];
        let wire = encode_frame(&packet);
        assert_eq!(wire[0], commands::DATA);
        assert_eq!(u16::from_le_bytes([wire[1], wire[2]]), 6);
        assert_eq!(&wire[3..9], &packet[..6]);
        assert_eq!(wire[9], checksum(&packet[..6]));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_decoder_waits_for_full_frame() {
        let frame = data_frame(commands::DATA, 7, &[1, 2, 3, 4]);
        let mut decoder = FrameDecoder::new();

        decoder.extend(&frame[..6]);
        assert_eq!(decoder.next_message(), None);

        decoder.extend(&frame[6..]);
        assert_eq!(
            decoder.next_message(),
            Some(DongleMessage::Packet {
                event_counter: 7,
                data: Bytes::from_static(&[1, 2, 3, 4])
            })
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_mixed_stream() {
        let mut stream = data_frame(commands::DATA_TX, 1, &[9, 9]);
        stream.extend_from_slice(&[commands::LOG, 0x03, 0x00, b'o', b'k', b'\n']);
        stream.push(commands::CHECKSUM_ERROR);
        stream.push(0x42);
        let mut bad = data_frame(commands::DATA, 2, &[5]);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        stream.extend_from_slice(&bad);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&stream);

        assert!(matches!(
            decoder.next_message(),
            Some(DongleMessage::TxEcho { event_counter: 1, .. })
        ));
        assert_eq!(decoder.next_message(), Some(DongleMessage::Log("ok".into())));
        assert_eq!(decoder.next_message(), Some(DongleMessage::ChecksumError));
        assert_eq!(decoder.next_message(), Some(DongleMessage::Unknown(0x42)));
        assert_eq!(
            decoder.next_message(),
            Some(DongleMessage::Corrupted {
                command: commands::DATA
            })
        );
        assert_eq!(decoder.next_message(), None);
    }

    #[test]
    fn test_decoder_resyncs_after_corrupt_length() {
        let mut stream = vec![commands::DATA, 0xFF, 0xFF, 0x00, 0x00];
        for counter in 0..200u16 {
            stream.extend_from_slice(&data_frame(commands::DATA, counter, &[0x01, 0x00]));
        }

        let mut decoder = FrameDecoder::new();
        decoder.extend(&stream);

        assert_eq!(
            decoder.next_message(),
            Some(DongleMessage::Oversized {
                command: commands::DATA,
                size: 0xFFFF
            })
        );

        let mut packets = 0;
        while let Some(message) = decoder.next_message() {
            if let DongleMessage::Packet { event_counter, .. } = message {
                assert_eq!(event_counter, packets);
                packets += 1;
            }
        }
        assert_eq!(packets, 200);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_rejects_oversized_log() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(&[commands::LOG, 0x00, 0x40]);
        assert!(matches!(
            decoder.next_message(),
            Some(DongleMessage::Oversized { command: commands::LOG, .. })
        ));
        assert_eq!(decoder.pending(), 2);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = Nrf52Dongle::open("/dev/bleshock-does-not-exist", DEFAULT_BAUD_RATE).unwrap_err();
        assert!(matches!(err, Error::PortOpen { .. }));
    }
}
