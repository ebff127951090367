//! CRC-24 calculation for BLE link-layer packets
//!
//! Every link-layer PDU is protected by a 24-bit CRC with polynomial
//! x^24 + x^10 + x^9 + x^6 + x^4 + x^3 + x + 1. The shift register is
//! seeded with the CRC init value (`0x555555` on the advertising channel,
//! the value from `CONNECT_REQ` on data channels) and bits are processed
//! LSB first, so the CRC is transmitted little-endian.

/// CRC init used on the advertising channels
pub const ADV_CRC_INIT: u32 = 0x55_5555;

/// Size of the CRC trailer in bytes
pub const CRC_SIZE: usize = 3;

/// LFSR feedback mask for the reflected register
const LFSR_MASK: u32 = 0x5A_6000;

/// Reverse the bit order of a byte
fn swap_bits(byte: u8) -> u32 {
    byte.reverse_bits() as u32
}

/// Calculates the BLE CRC-24 of a PDU (header + payload).
///
/// # Arguments
///
/// * `pdu` - PDU bytes, without access address
/// * `init` - CRC init value as it appears in `CONNECT_REQ`
///
/// # Returns
///
/// The three CRC bytes in transmission order
///
/// # Examples
///
/// ```
/// use bleshock_packet::crc::{crc24, ADV_CRC_INIT};
///
/// let crc = crc24(&[0x03, 0x0c], ADV_CRC_INIT);
/// assert_eq!(crc.len(), 3);
/// ```
pub fn crc24(pdu: &[u8], init: u32) -> [u8; CRC_SIZE] {
    let mut state = swap_bits((init & 0xFF) as u8)
        | (swap_bits(((init >> 8) & 0xFF) as u8) << 8)
        | (swap_bits(((init >> 16) & 0xFF) as u8) << 16);

    for &byte in pdu {
        let mut byte = byte as u32;
        for _ in 0..8 {
            let next_bit = (state ^ byte) & 1;
            byte >>= 1;
            state >>= 1;
            if next_bit != 0 {
                state |= 1 << 23;
                state ^= LFSR_MASK;
            }
        }
    }

    let bytes = state.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

/// Validates the CRC trailer of a PDU.
///
/// Returns `true` if `crc` matches the CRC computed over `pdu`.
pub fn verify_crc24(pdu: &[u8], crc: &[u8], init: u32) -> bool {
    crc.len() == CRC_SIZE && crc24(pdu, init) == [crc[0], crc[1], crc[2]]
}
