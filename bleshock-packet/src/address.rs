//! Bluetooth device addresses

use std::fmt;
use std::str::FromStr;

/// Bluetooth device address (6 bytes, most significant byte first)
///
/// The radio transmits addresses least significant byte first; use
/// [`BdAddress::to_wire`] and [`BdAddress::from_wire`] at the codec boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddress(pub [u8; 6]);

impl BdAddress {
    /// Address size in bytes
    pub const SIZE: usize = 6;

    /// All-zero address
    pub const ZERO: BdAddress = BdAddress([0; 6]);

    /// Create a new address from display-order bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Decode an address from on-air (little-endian) byte order
    pub fn from_wire(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut bytes = [0u8; 6];
        for (i, b) in data[..Self::SIZE].iter().rev().enumerate() {
            bytes[i] = *b;
        }
        Some(Self(bytes))
    }

    /// Encode the address in on-air (little-endian) byte order
    pub fn to_wire(&self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Get bytes as slice (display order)
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BdAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Error returned when a textual address cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid Bluetooth address '{}'", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for BdAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(AddressParseError(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(AddressParseError(s.to_string()));
            }
            bytes[i] =
                u8::from_str_radix(part, 16).map_err(|_| AddressParseError(s.to_string()))?;
        }

        Ok(BdAddress(bytes))
    }
}

/// Address type carried in the TxAdd/RxAdd header bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    /// Public device address (bit clear)
    #[default]
    Public,
    /// Random device address (bit set)
    Random,
}

impl AddressType {
    /// Build from the header bit
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            AddressType::Random
        } else {
            AddressType::Public
        }
    }

    /// Header bit value
    pub fn is_random(self) -> bool {
        self == AddressType::Random
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public"),
            AddressType::Random => write!(f, "random"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper: BdAddress = "A4:C1:38:D8:AD:A9".parse().unwrap();
        let lower: BdAddress = "a4:c1:38:d8:ad:a9".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "a4:c1:38:d8:ad:a9");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("a4:c1:38:d8:ad".parse::<BdAddress>().is_err());
        assert!("a4:c1:38:d8:ad:zz".parse::<BdAddress>().is_err());
        assert!("a4c1:38:d8:ad:a9:00".parse::<BdAddress>().is_err());
    }

    #[test]
    fn test_wire_order() {
        let addr = BdAddress([0xA4, 0xC1, 0x38, 0xD8, 0xAD, 0xA9]);
        assert_eq!(addr.to_wire(), [0xA9, 0xAD, 0xD8, 0x38, 0xC1, 0xA4]);
        assert_eq!(BdAddress::from_wire(&addr.to_wire()), Some(addr));
        assert_eq!(BdAddress::from_wire(&[0x01, 0x02]), None);
    }

    #[test]
    fn test_address_type_bit() {
        assert_eq!(AddressType::from_bit(true), AddressType::Random);
        assert!(!AddressType::from_bit(false).is_random());
    }
}
