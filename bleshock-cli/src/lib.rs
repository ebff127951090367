//! CLI interface for bleshock
//!
//! This crate provides the command-line interface: argument parsing,
//! logging setup and the attack listing.

pub mod args;

pub use args::Cli;

use bleshock_protocols::BleProtocol;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the `-v` derived log filter
pub const LOG_ENV: &str = "BLESHOCK_LOG";

/// Map the `-v` count to a tracing directive
pub fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber
pub fn init_logging(verbosity: u8, no_color: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .with_target(verbosity >= 2)
        .try_init();
}

/// Attack catalogue as printed by `--list-attacks`
pub fn attack_listing(ble: &BleProtocol) -> String {
    let mut out = format!("{} ({})\n", ble.name(), ble.shortname());
    for attack in ble.attacks() {
        out.push_str(&format!(
            "  {} {:<20} {}\n",
            attack.id, attack.shortname, attack.description
        ));
        for param in &attack.parameters {
            out.push_str(&format!(
                "      -p {}=<{}>  {} (default: {})\n",
                param.name,
                param.param_type,
                param.description,
                param.default.as_deref().unwrap_or("none")
            ));
        }
    }
    out
}
