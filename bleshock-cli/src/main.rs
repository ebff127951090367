use bleshock_attack::Harness;
use bleshock_capture::PcapWriter;
use bleshock_cli::{attack_listing, init_logging, Cli};
use bleshock_core::{Nrf52Dongle, Result};
use bleshock_protocols::BleProtocol;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.verbose, cli.no_color);

    let ble = BleProtocol::new();
    if cli.list_attacks {
        print!("{}", attack_listing(&ble));
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, ble)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, ble: BleProtocol) -> Result<()> {
    let config = cli.harness_config()?;
    let params = cli.attack_params()?;
    let strategy = ble.build(&cli.attack, &params)?;
    let capture_file = ble
        .find(&cli.attack)
        .map(|attack| attack.capture_file())
        .unwrap_or_else(|| format!("{}.pcap", strategy.name()));

    let port = cli.port();
    let dongle = Nrf52Dongle::open(&port, cli.baud).map_err(|e| {
        error!(port = %port, "nRF52 dongle not detected");
        e
    })?;
    info!(port = %port, baud = cli.baud, "nRF52 dongle opened");

    let mut harness = Harness::new(config, dongle, strategy)?;
    if let Some(path) = cli.capture_path(capture_file) {
        harness = harness.with_sink(Box::new(PcapWriter::create(&path)?));
        info!(path = %path.display(), "Capturing injected packets");
    }

    let running = harness.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            running.store(false, Ordering::SeqCst);
        }
    });

    let stats = harness.run().await?;
    info!(%stats, "Done");
    Ok(())
}
