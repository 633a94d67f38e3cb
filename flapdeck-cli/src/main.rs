//! Flapdeck CLI - drive a split-flap display from the command line.
//!
//! By default the daemon runs against an in-memory mock display; pass
//! `--mock=false --port <name>` to drive real hardware over serial.

mod error;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use error::CliError;
use flapdeck::geometry::Size;
use flapdeck::logging::{default_log_file, init_logging};
use flapdeck::service::{self, ServiceConfig, Transport};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Size used when creating a fresh display document.
const DEFAULT_DISPLAY_SIZE: Size = Size {
    width: 12,
    height: 1,
};

#[derive(Parser)]
#[command(name = "flapdeck")]
#[command(version = flapdeck::VERSION)]
#[command(about = "Split-flap display daemon", long_about = None)]
struct Cli {
    /// Use the in-memory mock display instead of real hardware
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    mock: bool,

    /// Serial port to connect to when not using the mock
    #[arg(long)]
    port: Option<String>,

    /// Path of the display configuration document
    #[arg(long, default_value = "display.json")]
    config: PathBuf,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let _guard = init_logging(&cli.log_dir, default_log_file())
        .map_err(|e| CliError::Config(format!("cannot initialize logging: {e}")))?;

    let transport = if cli.mock {
        Transport::Mock
    } else {
        match cli.port {
            Some(port) if !port.is_empty() => Transport::Port(port),
            _ => {
                return Err(CliError::Config(
                    "--port is required when --mock=false".to_string(),
                ))
            }
        }
    };

    let config = ServiceConfig {
        config_path: cli.config,
        transport,
        default_size: DEFAULT_DISPLAY_SIZE,
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    info!(version = flapdeck::VERSION, "flapdeck starting");
    service::run(config, cancel).await?;
    Ok(())
}
