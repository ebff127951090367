//! CLI argument parsing

use bleshock_attack::{AccessAddressPolicy, HarnessConfig};
use bleshock_core::{interface, AttackParams, Result};
use bleshock_packet::BdAddress;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bleshock")]
#[command(version, about = "BLE central-role link-layer test harness", long_about = None)]
pub struct Cli {
    /// Serial device of the nRF52 dongle (platform default when omitted)
    #[arg(value_name = "SERIAL_PORT")]
    pub serial_port: Option<String>,

    /// Bluetooth address of the target peripheral
    #[arg(value_name = "PEER_ADDRESS")]
    pub peer_address: Option<BdAddress>,

    /// Attack ID or name
    #[arg(short, long, default_value = "key-size-overflow")]
    pub attack: String,

    /// Attack parameters (key=value pairs)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Serial baud rate
    #[arg(short, long, default_value_t = interface::DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Our (initiator) address
    #[arg(long, value_name = "ADDR")]
    pub local_address: Option<BdAddress>,

    /// Connection access address, hex or "random"
    #[arg(long, value_name = "HEX|random")]
    pub access_address: Option<AccessAddressPolicy>,

    /// Re-scan heartbeat and connection liveness timeout
    #[arg(long, value_name = "SECONDS", default_value_t = 2.0)]
    pub scan_timeout: f64,

    /// Grace period for the peer to advertise again after a reset
    #[arg(long, value_name = "SECONDS", default_value_t = 7.0)]
    pub crash_timeout: f64,

    /// Capture file (default: <attack>.pcap)
    #[arg(long, value_name = "PATH", conflicts_with = "no_pcap")]
    pub pcap: Option<PathBuf>,

    /// Do not write a capture file
    #[arg(long)]
    pub no_pcap: bool,

    /// List available attacks
    #[arg(short = 'l', long)]
    pub list_attacks: bool,

    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable color output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Serial device to open
    pub fn port(&self) -> String {
        self.serial_port
            .clone()
            .unwrap_or_else(|| interface::default_serial_port().to_string())
    }

    /// Parse `-p KEY=VALUE` pairs
    pub fn attack_params(&self) -> Result<AttackParams> {
        AttackParams::parse_pairs(self.params.as_slice())
    }

    /// Harness configuration from the defaults and the given flags
    pub fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = match self.peer_address {
            Some(peer) => HarnessConfig::new(peer),
            None => HarnessConfig::default(),
        };
        if let Some(local) = self.local_address {
            config = config.with_local_address(local);
        }
        if let Some(policy) = self.access_address {
            config = config.with_access_address(policy);
        }
        config = config
            .with_scan_timeout(seconds("scan_timeout", self.scan_timeout)?)
            .with_crash_timeout(seconds("crash_timeout", self.crash_timeout)?);
        config.validate()?;
        Ok(config)
    }

    /// Capture path, or `None` when disabled
    pub fn capture_path(&self, default_file: String) -> Option<PathBuf> {
        if self.no_pcap {
            return None;
        }
        Some(self.pcap.clone().unwrap_or_else(|| PathBuf::from(default_file)))
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| bleshock_core::Error::invalid_parameter(name, e.to_string()))
}
