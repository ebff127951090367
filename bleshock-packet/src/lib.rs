//! BLE link-layer packet codec for bleshock
//!
//! This crate encodes and decodes the slice of the Bluetooth Low Energy
//! stack that a central-role test harness needs to speak over a raw radio:
//!
//! - **Advertising channel**: `ADV_*`, `SCAN_REQ`, `SCAN_RSP`, `CONNECT_REQ`
//! - **Data channel**: header (LLID/NESN/SN/MD), empty PDUs
//! - **LL control**: version, length, feature, encryption and terminate procedures
//! - **L2CAP** basic frames carrying **ATT** and **SM** PDUs
//! - **CRC-24** and the Nordic BLE pcap pseudo-header
//!
//! Decoders return `Option`: anything that cannot be decoded is `None`.
//! Fields are never range-checked on encode, so deliberately malformed
//! values survive serialization.
//!
//! # Modules
//!
//! - [`btle`] - Access address + PDU + CRC, the unit the radio sends
//! - [`advertising`] - Advertising channel PDUs
//! - [`data`] - Data channel PDUs
//! - [`control`] - LL control PDUs
//! - [`l2cap`] - L2CAP basic frames
//! - [`att`] - Attribute Protocol PDUs
//! - [`sm`] - Security Manager PDUs
//! - [`crc`] - CRC-24
//! - [`nordic`] - Nordic BLE capture header
//!
//! # Quick Start
//!
//! ```rust
//! use bleshock_packet::{AddressType, BdAddress, BtlePacket};
//!
//! let scanner: BdAddress = "5d:36:ac:90:0b:22".parse().unwrap();
//! let peer: BdAddress = "a4:c1:38:d8:ad:a9".parse().unwrap();
//!
//! let scan_req = BtlePacket::scan_request(scanner, peer, AddressType::Public);
//! let bytes = scan_req.to_bytes(0);
//!
//! let decoded = BtlePacket::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, scan_req);
//! ```

pub mod address;
pub mod advertising;
pub mod att;
pub mod btle;
pub mod control;
pub mod crc;
pub mod data;
pub mod l2cap;
pub mod nordic;
pub mod sm;

// Re-export commonly used types for convenience
pub use address::{AddressParseError, AddressType, BdAddress};
pub use advertising::{AdvPayload, AdvertisingPdu, ConnectRequest};
pub use att::AttPdu;
pub use btle::{BtlePacket, LinkPdu, ADV_ACCESS_ADDRESS};
pub use control::{ControlPdu, EncRequest, LengthParams, VersionInd};
pub use crc::{crc24, verify_crc24, ADV_CRC_INIT};
pub use data::{DataHeader, DataPayload, DataPdu, Llid};
pub use l2cap::{L2capFrame, L2capPayload};
pub use nordic::{NordicBleHeader, LINKTYPE_NORDIC_BLE};
pub use sm::{PairingParams, SmPdu};
