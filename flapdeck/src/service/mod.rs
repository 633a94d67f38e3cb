//! Daemon assembly: load the display document, build the transport stack,
//! start providers, and run the composition engine.

use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::alphabet::AlphabetHandle;
use crate::display::{state_channel, Client, Display, Engine, StoreError};
use crate::geometry::Size;
use crate::link::{Driver, MockSerial, SerialConnection, SerialPort};
use crate::provider::{ProviderError, ProviderSet};

/// Which serial transport to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// In-memory mock display.
    Mock,
    /// Real hardware on a named serial port.
    Port(String),
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path of the display JSON document.
    pub config_path: PathBuf,
    pub transport: Transport,
    /// Size used when the document does not exist yet.
    pub default_size: Size,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("display.json"),
            transport: Transport::Mock,
            default_size: Size::new(12, 1),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to load display configuration: {0}")]
    Store(#[from] StoreError),
    #[error("failed to open serial port: {0}")]
    Serial(#[from] std::io::Error),
    #[error("failed to start provider {name}: {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },
}

/// Load the display document and run the daemon until `cancel` fires.
pub async fn run(config: ServiceConfig, cancel: CancellationToken) -> Result<(), ServiceError> {
    let doc = Display::load_or_create(&config.config_path, config.default_size)?;
    info!(
        path = %config.config_path.display(),
        width = doc.size.width,
        height = doc.size.height,
        "display configuration loaded"
    );

    match config.transport {
        Transport::Mock => {
            let modules = doc.size.area();
            info!(modules, "using mock serial connection");
            run_with(doc, MockSerial::new(modules), modules, cancel).await
        }
        Transport::Port(port) => {
            info!(port = %port, "connecting to hardware");
            let serial = SerialPort::open(&port)?;
            run_with(doc, serial, 0, cancel).await
        }
    }
}

async fn run_with<S: SerialConnection>(
    display: Display,
    serial: S,
    modules: usize,
    cancel: CancellationToken,
) -> Result<(), ServiceError> {
    let alphabet = AlphabetHandle::seeded();

    let mut providers = ProviderSet::new();
    for (name, entry) in &display.providers {
        providers.insert(name.clone(), entry);
    }
    providers
        .start_all()
        .map_err(|(name, source)| ServiceError::Provider { name, source })?;

    let (state_tx, state_rx) = state_channel();
    let callback_alphabet = alphabet.clone();
    let driver = Driver::new(
        serial,
        alphabet.clone(),
        Box::new(move |state| {
            let text =
                callback_alphabet.render(state.modules.iter().map(|module| module.flap_index));
            // the engine normalizes and stores it; drop when it lags
            let _ = state_tx.try_send(text);
        }),
        modules,
    );
    let handle = driver.start();
    let client = Client::new(handle);

    let (engine, _display_handle) = Engine::new(display, client, providers, alphabet, state_rx);
    engine.run(cancel).await;
    Ok(())
}
