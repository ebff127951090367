//! Attack strategies for bleshock
//!
//! ## Available Protocols
//!
//! ### BLE (Bluetooth Low Energy)
//! Link-layer and pairing attacks run from the central role.
//! See [`ble`] module for details.

pub mod ble;

pub use ble::BleProtocol;
