//! Forecast low/high provider backed by OpenWeatherMap.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::owm::{OwmClient, Units, WeatherApi};
use super::{PValues, PollTimer, Provider, ProviderError};

/// Published keys: `low` (f64, the forecast minimum), `high` (f64, the
/// forecast maximum) and `units` (string label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecastConfig {
    pub location_id: i64,
    pub units: String,
}

struct Shared {
    snapshot: RwLock<PValues>,
    timer: Mutex<PollTimer>,
}

pub struct WeatherForecastProvider {
    config: WeatherForecastConfig,
    api: Option<Arc<dyn WeatherApi>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl WeatherForecastProvider {
    pub fn new(config: WeatherForecastConfig) -> Self {
        Self {
            config,
            api: None,
            shared: Arc::new(Shared {
                snapshot: RwLock::new(PValues::new()),
                timer: Mutex::new(PollTimer::new()),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Inject a weather source instead of the env-configured OWM client.
    /// Test seam.
    pub fn with_api(mut self, api: Arc<dyn WeatherApi>) -> Self {
        self.api = Some(api);
        self
    }
}

impl Provider for WeatherForecastProvider {
    fn set_poll_rate_secs(&self, rate_secs: u64) {
        self.shared
            .timer
            .lock()
            .expect("poll timer poisoned")
            .set_rate_secs("weather_forecast", rate_secs);
    }

    fn start(&mut self) -> Result<(), ProviderError> {
        let units = Units::parse(&self.config.units)?;
        let api = match self.api.take() {
            Some(api) => api,
            None => Arc::new(OwmClient::from_env()?),
        };

        {
            let mut snapshot = self.shared.snapshot.write().expect("snapshot poisoned");
            snapshot.insert("low".into(), 0.0.into());
            snapshot.insert("high".into(), 0.0.into());
            snapshot.insert("units".into(), units.label().into());
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let location_id = self.config.location_id;
        tokio::spawn(async move {
            loop {
                let due = shared
                    .timer
                    .lock()
                    .expect("poll timer poisoned")
                    .due(Instant::now());

                if due {
                    match api.forecast(location_id, units).await {
                        Ok(reading) => {
                            info!(
                                low = reading.temp_min,
                                high = reading.temp_max,
                                "weather_forecast provider reported temps"
                            );
                            let mut snapshot =
                                shared.snapshot.write().expect("snapshot poisoned");
                            // low is always the forecast minimum, high the maximum
                            snapshot.insert("low".into(), reading.temp_min.into());
                            snapshot.insert("high".into(), reading.temp_max.into());
                        }
                        // keep the previous snapshot, retry next cycle
                        Err(e) => error!(error = %e, "weather_forecast fetch failed"),
                    }
                    shared
                        .timer
                        .lock()
                        .expect("poll timer poisoned")
                        .mark_refreshed(Instant::now());
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("weather_forecast provider received kill signal, exiting");
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        self.cancel.cancel();
    }

    fn values(&self) -> PValues {
        self.shared
            .snapshot
            .read()
            .expect("snapshot poisoned")
            .clone()
    }
}
