//! Bluetooth Low Energy link-layer attacks
//!
//! Both attacks run inside the central-role harness: the peer is scanned
//! for, connected to and taken through the version and length exchanges
//! before the strategy injects its payload.
//!
//! ## Attacks
//!
//! ### Key Size Overflow (Attack ID 0)
//! Sends an SM pairing request whose maximum encryption key size is above
//! the legal bound of 16, with every key distribution flag set. When the
//! peer answers with a pairing response, an `LL_ENC_REQ` with all-zero
//! fields follows. The pairing request is written to the capture file.
//!
//! **Parameters:**
//! - `max_key_size`: key size field (default: 253)
//! - `io_capability`: IO capability (default: 4, KeyboardDisplay)
//! - `auth_req`: AuthReq flags (default: 0x05)
//! - `key_distribution`: initiator and responder key distribution (default: 0x07)
//!
//! ### Sequential ATT (Attack ID 1)
//! Sends ATT Exchange MTU requests back to back, without waiting for the
//! first response, then drops the connection by scanning again.
//!
//! **Parameters:**
//! - `mtu`: client RX MTU (default: 247)
//! - `requests`: requests per burst (default: 2)
//!
//! ## Example Usage
//!
//! ```rust
//! use bleshock_attack::AttackStrategy;
//! use bleshock_core::AttackParams;
//! use bleshock_protocols::ble::BleProtocol;
//!
//! let ble = BleProtocol::new();
//! let params = AttackParams::new().set("max_key_size", 32u8);
//! let strategy = ble.build("key-size-overflow", &params).unwrap();
//! assert_eq!(strategy.name(), "key-size-overflow");
//! ```

pub mod attack;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use attack::{KeySizeOverflowAttack, SequentialAttAttack};
pub use protocol::{BleProtocol, KEY_SIZE_OVERFLOW, SEQUENTIAL_ATT};
