//! Packet records and sinks

use crate::Result;
use std::time::SystemTime;

/// Which way a packet travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the harness
    Tx,
    /// Received from the peer
    Rx,
}

/// A sent or received link-layer packet
#[derive(Debug, Clone)]
pub struct Packet {
    /// When the packet was sent/received
    pub timestamp: SystemTime,
    /// Transport the packet went through
    pub interface: String,
    /// Direction
    pub direction: Direction,
    /// Link-layer bytes (access address through CRC)
    pub data: Vec<u8>,
}

impl Packet {
    /// Create a new packet
    pub fn new(interface: String, direction: Direction, data: Vec<u8>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            interface,
            direction,
            data,
        }
    }

    /// Get packet data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Destination for packets the harness wants kept for offline analysis
pub trait PacketSink {
    /// Persist one packet
    fn record(&mut self, packet: &Packet) -> Result<()>;
}

impl<S: PacketSink + ?Sized> PacketSink for Box<S> {
    fn record(&mut self, packet: &Packet) -> Result<()> {
        (**self).record(packet)
    }
}
