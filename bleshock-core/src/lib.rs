//! bleshock Core Library
//!
//! This crate provides the fundamental traits, types, and error handling
//! shared by the bleshock crates: the radio [`Transport`], the
//! [`PacketSink`] used for capture artifacts, and attack metadata.

pub mod attack;
pub mod error;
pub mod interface;
pub mod packet;
pub mod parameter;

// Re-export commonly used types
pub use attack::{AttackDescriptor, AttackId, ParamDescriptor};
pub use error::{Error, Result};
pub use interface::{Nrf52Dongle, Transport};
pub use packet::{Direction, Packet, PacketSink};
pub use parameter::{AttackParams, ParamValue, ParameterType};
