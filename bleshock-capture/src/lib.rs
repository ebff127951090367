//! Capture artifacts for bleshock
//!
//! [`PcapWriter`] is a [`bleshock_core::PacketSink`] that stores link-layer
//! packets in a pcap file with the Nordic BLE link type (272), the format
//! Wireshark's nRF Sniffer dissector reads.
//!
//! ## Example
//!
//! ```no_run
//! use bleshock_capture::PcapWriter;
//! use bleshock_core::{Direction, Packet, PacketSink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = PcapWriter::create("key-size-overflow.pcap")?;
//! writer.record(&Packet::new("/dev/ttyACM0".into(), Direction::Tx, vec![0u8; 9]))?;
//! # Ok(())
//! # }
//! ```

pub mod capture;

// Re-export main types
pub use capture::PcapWriter;
