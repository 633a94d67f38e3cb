//! Background data providers.
//!
//! A provider polls an external source on its own task and publishes the
//! latest values as a key/value snapshot. Routines consume snapshots by
//! provider *name* at update time; they never hold a reference to the
//! provider itself.
//!
//! Poll cadence has two configured rates: *active* while a dashboard with a
//! consuming routine is shown, *background* otherwise. Rates below
//! [`MIN_POLL_RATE_SECS`] are clamped up.

mod owm;
mod weather_current;
mod weather_forecast;

pub use owm::{CurrentReading, ForecastReading, MockWeatherApi, OwmClient, Units, WeatherApi};
pub use weather_current::{WeatherCurrentConfig, WeatherCurrentProvider};
pub use weather_forecast::{WeatherForecastConfig, WeatherForecastProvider};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Key/value snapshot published by one provider.
pub type PValues = BTreeMap<String, serde_json::Value>;

/// Snapshots of every provider, keyed by provider name.
pub type ProviderValues = BTreeMap<String, PValues>;

/// Floor on provider poll rates.
pub const MIN_POLL_RATE_SECS: u64 = 60;

/// Errors from provider configuration and fetching.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("units must be one of F, C, K; got {0:?}")]
    InvalidUnits(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The provider contract.
///
/// `start` spawns the poll task (the first cycle refreshes immediately);
/// `stop` signals it to exit and is safe to call more than once. `values`
/// never blocks the poll task for longer than a snapshot clone.
pub trait Provider: Send {
    fn set_poll_rate_secs(&self, rate_secs: u64);
    fn start(&mut self) -> Result<(), ProviderError>;
    fn stop(&self);
    fn values(&self) -> PValues;
}

/// Poll-cycle bookkeeping shared by provider implementations.
///
/// Kept behind each provider's own lock; all methods take `&mut self`.
pub(crate) struct PollTimer {
    rate: Duration,
    last_refresh: Option<Instant>,
    next_refresh: Option<Instant>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self {
            rate: Duration::from_secs(MIN_POLL_RATE_SECS),
            last_refresh: None,
            next_refresh: None,
        }
    }

    /// Apply a new rate, clamping to the floor, and reschedule the next
    /// refresh relative to the last one.
    pub fn set_rate_secs(&mut self, provider: &str, rate_secs: u64) {
        let clamped = if rate_secs < MIN_POLL_RATE_SECS {
            info!(
                provider,
                rate_secs,
                floor = MIN_POLL_RATE_SECS,
                "poll rate below floor, clamping"
            );
            MIN_POLL_RATE_SECS
        } else {
            rate_secs
        };
        self.rate = Duration::from_secs(clamped);
        self.next_refresh = self.last_refresh.map(|last| last + self.rate);
    }

    pub fn rate_secs(&self) -> u64 {
        self.rate.as_secs()
    }

    /// Whether a refresh is due. Always true before the first refresh.
    pub fn due(&self, now: Instant) -> bool {
        self.next_refresh.map_or(true, |next| now > next)
    }

    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh = Some(now);
        self.next_refresh = Some(now + self.rate);
    }
}

/// Tagged provider configuration, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum ProviderConfig {
    #[serde(rename = "WEATHER_CURRENT")]
    WeatherCurrent(WeatherCurrentConfig),
    #[serde(rename = "WEATHER_FORECAST")]
    WeatherForecast(WeatherForecastConfig),
}

impl ProviderConfig {
    /// Instantiate the configured provider, not yet started.
    pub fn build(&self) -> Box<dyn Provider> {
        match self {
            Self::WeatherCurrent(config) => Box::new(WeatherCurrentProvider::new(config.clone())),
            Self::WeatherForecast(config) => {
                Box::new(WeatherForecastProvider::new(config.clone()))
            }
        }
    }
}

/// One named provider as persisted: its config plus the two poll rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(flatten)]
    pub config: ProviderConfig,
    pub active_poll_rate_secs: u64,
    pub background_poll_rate_secs: u64,
}

struct RunningProvider {
    provider: Box<dyn Provider>,
    active_rate: u64,
    background_rate: u64,
}

/// The started providers of one daemon, keyed by name.
#[derive(Default)]
pub struct ProviderSet {
    entries: BTreeMap<String, RunningProvider>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (not start) a provider from its persisted entry.
    pub fn insert(&mut self, name: impl Into<String>, entry: &ProviderEntry) {
        self.entries.insert(
            name.into(),
            RunningProvider {
                provider: entry.config.build(),
                active_rate: entry.active_poll_rate_secs,
                background_rate: entry.background_poll_rate_secs,
            },
        );
    }

    /// Insert an already-built provider. Test seam.
    pub fn insert_provider(
        &mut self,
        name: impl Into<String>,
        provider: Box<dyn Provider>,
        active_rate: u64,
        background_rate: u64,
    ) {
        self.entries.insert(
            name.into(),
            RunningProvider {
                provider,
                active_rate,
                background_rate,
            },
        );
    }

    /// Start every provider at its background rate. The first failure is
    /// returned with the provider's name.
    pub fn start_all(&mut self) -> Result<(), (String, ProviderError)> {
        for (name, entry) in &mut self.entries {
            entry.provider.set_poll_rate_secs(entry.background_rate);
            entry
                .provider
                .start()
                .map_err(|e| (name.clone(), e))?;
        }
        Ok(())
    }

    pub fn stop_all(&self) {
        for entry in self.entries.values() {
            entry.provider.stop();
        }
    }

    /// Snapshot every provider's values.
    pub fn sample(&self) -> ProviderValues {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.provider.values()))
            .collect()
    }

    /// Switch a provider to its active poll rate.
    pub fn set_active(&self, name: &str) {
        match self.entries.get(name) {
            Some(entry) => entry.provider.set_poll_rate_secs(entry.active_rate),
            None => warn!(provider = name, "cannot activate unknown provider"),
        }
    }

    /// Switch a provider back to its background poll rate.
    pub fn set_background(&self, name: &str) {
        match self.entries.get(name) {
            Some(entry) => entry.provider.set_poll_rate_secs(entry.background_rate),
            None => warn!(provider = name, "cannot deactivate unknown provider"),
        }
    }
}
