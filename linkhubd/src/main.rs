//! LinkHub daemon
//!
//! Drives a Corsair iCUE LINK hub: keeps it in software mode, discovers
//! the child devices hanging off it, polls fan and temperature sensors,
//! pushes fan duty targets and streams a lighting frame every tick.
//!
//! The hub protocol is blocking and single threaded. The tokio runtime
//! only provides the tick source and signal handling.

mod config;
mod host;
mod output;
mod probe;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use host::DaemonHost;
use linkhub_core::default_config_path;
use linkhub_hardware::HidDriver;
use output::OutputFormat;
use session::Session;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// LINK hub daemon
#[derive(Parser, Debug)]
#[command(name = "linkhubd")]
#[command(version, about = "Corsair iCUE LINK hub daemon", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Drive the hub until interrupted (default)
    Run,

    /// Discover the hub and its child devices once and print a report
    Probe {
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,

        /// Also list every supported property and endpoint
        #[arg(long)]
        dump: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.unwrap_or_else(|| {
        std::env::var("LINKHUB_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let static_config = config::load_static_config(&config_path).await?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(static_config).await,
        Command::Probe { json, dump } => {
            let mut protocol = linkhub_hardware::LinkProtocol::new(HidDriver::open(
                &static_config.device,
            )?);
            let report = probe::probe(&mut protocol, static_config.device.address, dump);

            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Table
            };
            println!("{}", output::format_probe_report(&report, format)?);
            Ok(())
        }
    }
}

async fn run(static_config: linkhub_core::StaticConfig) -> Result<()> {
    info!("LinkHub daemon starting...");

    let driver = HidDriver::open(&static_config.device)?;
    let host = DaemonHost::new(&static_config.fans, &static_config.lighting)?;
    let tick_period = Duration::from_millis(static_config.polling.tick_interval_ms.max(1));

    let mut session = Session::new(driver, host, static_config)?;
    session.initialize(std::time::Instant::now());

    if !session.controller_detected() {
        warn!("No child device controller found, nothing will be driven");
    }

    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            instant = ticker.tick() => {
                if let Err(e) = session.tick(instant.into_std()) {
                    error!("Session stopped: {}", e);
                    break Err(e);
                }
            }
        }
    };

    info!("Shutting down...");
    if let Err(e) = session.shutdown(false) {
        error!("Shutdown failed: {}", e);
    }

    result.map_err(Into::into)
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let args = Args::parse_from(["linkhubd"]);
        assert!(args.command.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_probe_flags() {
        let args = Args::parse_from(["linkhubd", "-v", "--config", "/tmp/hub.toml", "probe", "--json"]);
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/hub.toml")));
        assert!(matches!(
            args.command,
            Some(Command::Probe {
                json: true,
                dump: false
            })
        ));
    }
}
