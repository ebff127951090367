//! Central-role connection context

use bleshock_packet::{AddressType, BdAddress};
use std::fmt;

/// Connection progress, from scanning to injection and back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Sending scan requests, waiting for the peer to advertise
    Scanning,
    /// `CONNECT_REQ` sent, waiting for the first data PDU
    Connecting,
    /// `LL_VERSION_IND` sent
    VersionExchange,
    /// `LL_LENGTH_REQ` sent
    LengthExchange,
    /// Attack strategy in control
    Injecting,
    /// Strategy reached its trigger; the next step returns to scanning
    ResetPending,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::VersionExchange => "version-exchange",
            ConnectionState::LengthExchange => "length-exchange",
            ConnectionState::Injecting => "injecting",
            ConnectionState::ResetPending => "reset-pending",
        };
        write!(f, "{}", name)
    }
}

/// The single connection context of a harness run
///
/// Only the connection state machine mutates a session. Attack strategies
/// receive it mutably so they can track their progress in
/// [`Session::attack_step`], which is cleared on every reset.
#[derive(Debug, Clone)]
pub struct Session {
    pub local_address: BdAddress,
    pub peer_address: BdAddress,
    /// Learned from the TxAdd bit of the peer's advertisement
    pub peer_address_type: AddressType,
    /// Access address of the current (or next) connection attempt
    pub access_address: u32,
    pub crc_init: u32,
    /// `CONNECT_REQ` sent and no data PDU seen yet
    pub connecting: bool,
    pub state: ConnectionState,
    /// Strategy-defined progress within the current attempt
    pub attack_step: u8,
}

impl Session {
    pub fn new(
        local_address: BdAddress,
        peer_address: BdAddress,
        access_address: u32,
        crc_init: u32,
    ) -> Self {
        Self {
            local_address,
            peer_address,
            peer_address_type: AddressType::Public,
            access_address,
            crc_init,
            connecting: false,
            state: ConnectionState::Scanning,
            attack_step: 0,
        }
    }

    /// Back to scanning; the access address is left to the caller
    pub fn reset(&mut self) {
        self.connecting = false;
        self.state = ConnectionState::Scanning;
        self.attack_step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset() {
        let mut session = Session::new(BdAddress::ZERO, BdAddress([1; 6]), 0x9A32_8370, 0x17_9A9C);
        session.state = ConnectionState::Injecting;
        session.connecting = true;
        session.attack_step = 2;
        session.peer_address_type = AddressType::Random;

        session.reset();
        assert_eq!(session.state, ConnectionState::Scanning);
        assert!(!session.connecting);
        assert_eq!(session.attack_step, 0);
        assert_eq!(session.peer_address_type, AddressType::Random);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Scanning.to_string(), "scanning");
        assert_eq!(ConnectionState::ResetPending.to_string(), "reset-pending");
    }
}
