//! OpenWeatherMap client abstraction.
//!
//! The weather providers talk to OWM through the [`WeatherApi`] trait so
//! tests can inject canned readings instead of the network.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::debug;

use super::ProviderError;

/// Environment variable holding the OpenWeatherMap API key.
pub const OWM_API_KEY_ENV: &str = "OWM_API_KEY";

const OWM_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Temperature unit system, as configured (`F`, `C` or `K`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Fahrenheit,
    Celsius,
    Kelvin,
}

impl Units {
    pub fn parse(s: &str) -> Result<Self, ProviderError> {
        match s {
            "F" => Ok(Self::Fahrenheit),
            "C" => Ok(Self::Celsius),
            "K" => Ok(Self::Kelvin),
            other => Err(ProviderError::InvalidUnits(other.to_string())),
        }
    }

    /// Single-letter label shown on the display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
            Self::Kelvin => "K",
        }
    }

    /// The `units` query parameter OWM expects.
    fn query_value(&self) -> &'static str {
        match self {
            Self::Fahrenheit => "imperial",
            Self::Celsius => "metric",
            Self::Kelvin => "standard",
        }
    }
}

/// Current conditions for a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentReading {
    pub temp: f64,
}

/// Nearest forecast window for a location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastReading {
    pub temp_min: f64,
    pub temp_max: f64,
}

/// Weather data source. Boxed futures keep the trait object-safe so
/// providers can hold `Arc<dyn WeatherApi>`.
pub trait WeatherApi: Send + Sync {
    fn current(
        &self,
        location_id: i64,
        units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<CurrentReading, ProviderError>> + Send + '_>>;

    fn forecast(
        &self,
        location_id: i64,
        units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<ForecastReading, ProviderError>> + Send + '_>>;
}

#[derive(Deserialize)]
struct OwmMain {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
}

#[derive(Deserialize)]
struct OwmCurrentResponse {
    main: OwmMain,
}

#[derive(Deserialize)]
struct OwmForecastSlot {
    main: OwmMain,
}

#[derive(Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastSlot>,
}

/// Real OpenWeatherMap client over reqwest.
#[derive(Clone)]
pub struct OwmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OwmClient {
    /// Build a client from [`OWM_API_KEY_ENV`]. Fails when the variable is
    /// unset or empty.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var(OWM_API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingEnv(OWM_API_KEY_ENV))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client construction cannot fail with these options"),
            api_key,
            base_url: OWM_BASE_URL.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        location_id: i64,
        units: Units,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, location_id, "fetching weather");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", location_id.to_string()),
                ("units", units.query_value().to_string()),
                ("lang", "en".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                endpoint
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

impl WeatherApi for OwmClient {
    fn current(
        &self,
        location_id: i64,
        units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<CurrentReading, ProviderError>> + Send + '_>> {
        Box::pin(async move {
            let response: OwmCurrentResponse = self.get_json("weather", location_id, units).await?;
            Ok(CurrentReading {
                temp: response.main.temp,
            })
        })
    }

    fn forecast(
        &self,
        location_id: i64,
        units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<ForecastReading, ProviderError>> + Send + '_>> {
        Box::pin(async move {
            let response: OwmForecastResponse =
                self.get_json("forecast", location_id, units).await?;
            let slot = response
                .list
                .first()
                .ok_or_else(|| ProviderError::InvalidResponse("empty forecast list".into()))?;
            Ok(ForecastReading {
                temp_min: slot.main.temp_min,
                temp_max: slot.main.temp_max,
            })
        })
    }
}

/// Canned-response weather source for tests.
#[derive(Clone)]
pub struct MockWeatherApi {
    pub current: CurrentReading,
    pub forecast: ForecastReading,
}

impl WeatherApi for MockWeatherApi {
    fn current(
        &self,
        _location_id: i64,
        _units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<CurrentReading, ProviderError>> + Send + '_>> {
        let reading = self.current;
        Box::pin(async move { Ok(reading) })
    }

    fn forecast(
        &self,
        _location_id: i64,
        _units: Units,
    ) -> Pin<Box<dyn Future<Output = Result<ForecastReading, ProviderError>> + Send + '_>> {
        let reading = self.forecast;
        Box::pin(async move { Ok(reading) })
    }
}
