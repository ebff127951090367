//! Harness configuration

use bleshock_core::{Error, Result};
use bleshock_packet::{BdAddress, ConnectRequest, ADV_ACCESS_ADDRESS};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default initiator address
pub const DEFAULT_LOCAL_ADDRESS: BdAddress = BdAddress([0x5D, 0x36, 0xAC, 0x90, 0x0B, 0x22]);

/// Default target peripheral
pub const DEFAULT_PEER_ADDRESS: BdAddress = BdAddress([0xA4, 0xC1, 0x38, 0xD8, 0xAD, 0xA9]);

/// Default connection access address
pub const DEFAULT_ACCESS_ADDRESS: u32 = 0x9A32_8370;

/// Default connection CRC init
pub const DEFAULT_CRC_INIT: u32 = 0x17_9A9C;

/// How the connection access address is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAddressPolicy {
    /// Same access address for every connection attempt
    Fixed(u32),
    /// Fresh valid access address after every reset
    Random,
}

impl Default for AccessAddressPolicy {
    fn default() -> Self {
        AccessAddressPolicy::Fixed(DEFAULT_ACCESS_ADDRESS)
    }
}

impl AccessAddressPolicy {
    /// Access address for the next connection attempt
    pub fn next_address<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            AccessAddressPolicy::Fixed(aa) => *aa,
            AccessAddressPolicy::Random => loop {
                let candidate: u32 = rng.gen();
                if is_valid_access_address(candidate) {
                    break candidate;
                }
            },
        }
    }
}

impl FromStr for AccessAddressPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("random") {
            return Ok(AccessAddressPolicy::Random);
        }
        let digits = s.trim_start_matches("0x").trim_start_matches("0X");
        u32::from_str_radix(digits, 16)
            .map(AccessAddressPolicy::Fixed)
            .map_err(|_| Error::invalid_parameter("access_address", format!("'{}' is not hex or 'random'", s)))
    }
}

impl fmt::Display for AccessAddressPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessAddressPolicy::Fixed(aa) => write!(f, "0x{:08x}", aa),
            AccessAddressPolicy::Random => write!(f, "random"),
        }
    }
}

/// Data channel access address rules from the Link Layer specification
pub fn is_valid_access_address(aa: u32) -> bool {
    if aa == ADV_ACCESS_ADDRESS || (aa ^ ADV_ACCESS_ADDRESS).count_ones() <= 1 {
        return false;
    }

    // No more than six consecutive equal bits
    let mut run = 1;
    for i in 1..32 {
        if (aa >> i) & 1 == (aa >> (i - 1)) & 1 {
            run += 1;
            if run > 6 {
                return false;
            }
        } else {
            run = 1;
        }
    }

    // No more than 24 transitions
    let transitions = (aa ^ (aa >> 1)) & 0x7FFF_FFFF;
    if transitions.count_ones() > 24 {
        return false;
    }

    // At least two transitions in the six most significant bits
    let msb = aa >> 26;
    ((msb ^ (msb >> 1)) & 0x1F).count_ones() >= 2
}

/// Fixed link-layer parameters sent in `CONNECT_REQ`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Transmit window size, 1.25 ms units
    pub win_size: u8,
    /// Transmit window offset, 1.25 ms units
    pub win_offset: u16,
    /// Connection interval, 1.25 ms units
    pub interval: u16,
    pub latency: u16,
    /// Supervision timeout, 10 ms units
    pub timeout: u16,
    pub channel_map: u64,
    pub hop: u8,
    pub sca: u8,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            win_size: 2,
            win_offset: 1,
            interval: 16,
            latency: 0,
            timeout: 50,
            channel_map: 0x1F_FFFF_FFFF,
            hop: 5,
            sca: 0,
        }
    }
}

impl ConnectionParams {
    /// Build the `CONNECT_REQ` payload
    pub fn connect_request(
        &self,
        init_a: BdAddress,
        adv_a: BdAddress,
        access_address: u32,
        crc_init: u32,
    ) -> ConnectRequest {
        ConnectRequest {
            init_a,
            adv_a,
            access_address,
            crc_init,
            win_size: self.win_size,
            win_offset: self.win_offset,
            interval: self.interval,
            latency: self.latency,
            timeout: self.timeout,
            channel_map: self.channel_map,
            hop: self.hop,
            sca: self.sca,
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Our (initiator) address
    pub local_address: BdAddress,
    /// Target peripheral
    pub peer_address: BdAddress,
    pub access_address: AccessAddressPolicy,
    /// CRC init for data channel packets (24 bits)
    pub crc_init: u32,
    pub connection: ConnectionParams,
    /// Re-scan heartbeat; also the connection liveness timeout
    pub scan_timeout: Duration,
    /// Grace period for the peer to advertise again after a reset
    pub crash_timeout: Duration,
    /// Sleep between loop iterations
    pub poll_interval: Duration,
    /// Consecutive undecodable reads before the dongle is declared absent
    pub max_decode_failures: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            local_address: DEFAULT_LOCAL_ADDRESS,
            peer_address: DEFAULT_PEER_ADDRESS,
            access_address: AccessAddressPolicy::default(),
            crc_init: DEFAULT_CRC_INIT,
            connection: ConnectionParams::default(),
            scan_timeout: Duration::from_secs(2),
            crash_timeout: Duration::from_secs(7),
            poll_interval: Duration::from_millis(10),
            max_decode_failures: 4,
        }
    }
}

impl HarnessConfig {
    pub fn new(peer_address: BdAddress) -> Self {
        Self {
            peer_address,
            ..Default::default()
        }
    }

    pub fn with_local_address(mut self, address: BdAddress) -> Self {
        self.local_address = address;
        self
    }

    pub fn with_access_address(mut self, policy: AccessAddressPolicy) -> Self {
        self.access_address = policy;
        self
    }

    pub fn with_crc_init(mut self, crc_init: u32) -> Self {
        self.crc_init = crc_init;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionParams) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_crash_timeout(mut self, timeout: Duration) -> Self {
        self.crash_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_decode_failures(mut self, failures: u32) -> Self {
        self.max_decode_failures = failures;
        self
    }

    /// Check values the radio or the loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.scan_timeout.is_zero() {
            return Err(Error::invalid_parameter("scan_timeout", "must be positive"));
        }
        if self.crash_timeout.is_zero() {
            return Err(Error::invalid_parameter("crash_timeout", "must be positive"));
        }
        if self.max_decode_failures == 0 {
            return Err(Error::invalid_parameter(
                "max_decode_failures",
                "must be at least 1",
            ));
        }
        if self.crc_init > 0xFF_FFFF {
            return Err(Error::invalid_parameter("crc_init", "must fit in 24 bits"));
        }
        if self.local_address == self.peer_address {
            return Err(Error::invalid_parameter(
                "local_address",
                "must differ from the peer address",
            ));
        }
        if let AccessAddressPolicy::Fixed(aa) = self.access_address {
            if aa == ADV_ACCESS_ADDRESS {
                return Err(Error::invalid_parameter(
                    "access_address",
                    "must not be the advertising access address",
                ));
            }
        }
        Ok(())
    }
}
