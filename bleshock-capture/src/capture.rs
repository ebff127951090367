//! pcap writer for link-layer packets

use bleshock_core::{Error, Packet, PacketSink, Result};
use bleshock_packet::{NordicBleHeader, LINKTYPE_NORDIC_BLE};
use pcap::{Capture, Linktype, PacketHeader, Savefile};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Board id stamped in the Nordic header
pub const DEFAULT_BOARD: u8 = 75;

/// Nordic protocol version stamped in the Nordic header
pub const DEFAULT_PROTOCOL: u8 = 2;

/// Flags stamped in the Nordic header (CRC ok, direction bit set)
pub const DEFAULT_FLAGS: u8 = 0x03;

/// Writes packets to a LINKTYPE_NORDIC_BLE pcap file
pub struct PcapWriter {
    path: PathBuf,
    savefile: Savefile,
    template: NordicBleHeader,
    packets_written: u64,
    bytes_written: u64,
}

impl PcapWriter {
    /// Create (or truncate) a capture file at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let dead = Capture::dead(Linktype(LINKTYPE_NORDIC_BLE))
            .map_err(|e| Error::capture(format!("Failed to create pcap handle: {}", e)))?;
        let savefile = dead
            .savefile(&path)
            .map_err(|e| Error::capture(format!("Failed to open {}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Writing capture file");

        Ok(Self {
            path,
            savefile,
            template: NordicBleHeader {
                board: DEFAULT_BOARD,
                protocol: DEFAULT_PROTOCOL,
                flags: DEFAULT_FLAGS,
                ..Default::default()
            },
            packets_written: 0,
            bytes_written: 0,
        })
    }

    /// Path of the capture file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

fn timeval(ts: SystemTime) -> libc::timeval {
    let since_epoch = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    libc::timeval {
        tv_sec: since_epoch.as_secs() as libc::time_t,
        tv_usec: since_epoch.subsec_micros() as libc::suseconds_t,
    }
}

impl PacketSink for PcapWriter {
    fn record(&mut self, packet: &Packet) -> Result<()> {
        let header = NordicBleHeader {
            packet_counter: self.packets_written as u16,
            ..self.template
        };
        let record = header.encapsulate(packet.data());

        let pcap_header = PacketHeader {
            ts: timeval(packet.timestamp),
            caplen: record.len() as u32,
            len: record.len() as u32,
        };
        self.savefile
            .write(&pcap::Packet::new(&pcap_header, &record));
        self.savefile
            .flush()
            .map_err(|e| Error::capture(format!("Failed to flush {}: {}", self.path.display(), e)))?;

        self.packets_written += 1;
        self.bytes_written += record.len() as u64;
        debug!(
            path = %self.path.display(),
            bytes = record.len(),
            "Packet written to capture"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleshock_core::Direction;
    use std::fs;

    #[test]
    fn test_writes_nordic_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key-size-overflow.pcap");

        let mut writer = PcapWriter::create(&path).unwrap();
        let data = vec![0x70, 0x83, 0x32, 0x9A, 0x02, 0x00, 0xAA, 0xBB, 0xCC];
        writer
            .record(&Packet::new("test".into(), Direction::Tx, data.clone()))
            .unwrap();

        assert_eq!(writer.packets_written(), 1);
        assert_eq!(
            writer.bytes_written() as usize,
            NordicBleHeader::SIZE + data.len()
        );

        drop(writer);
        let bytes = fs::read(&path).unwrap();
        // Global header (24) + record header (16) + record
        assert_eq!(bytes.len(), 24 + 16 + NordicBleHeader::SIZE + data.len());
        assert_eq!(u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]), 272);

        let record = &bytes[40..];
        assert_eq!(record[0], DEFAULT_BOARD);
        assert_eq!(record[3], DEFAULT_PROTOCOL);
        assert_eq!(record[8], DEFAULT_FLAGS);
        assert_eq!(&record[NordicBleHeader::SIZE..], &data[..]);
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pcap");
        assert!(matches!(PcapWriter::create(&path), Err(Error::Capture(_))));
    }
}
