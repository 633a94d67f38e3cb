//! Temperature readout routine, fed by a named provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{left_pad, Size, SizeRange};
use crate::provider::ProviderValues;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// Provider to read from, by name.
    pub provider_name: String,
    /// Which of the provider's values to show (e.g. `current`, `low`,
    /// `high`).
    pub provider_value: String,
    #[serde(default)]
    pub show_units: bool,
    #[serde(default)]
    pub show_degree: bool,
    #[serde(default)]
    pub round_decimal: bool,
}

pub struct TemperatureRoutine {
    config: TemperatureConfig,
    size: Size,
    last_update: Option<DateTime<Utc>>,
}

impl TemperatureRoutine {
    pub fn new(config: TemperatureConfig) -> Self {
        Self {
            config,
            size: Size::new(0, 0),
            last_update: None,
        }
    }

    fn format_temp(&self, value: f64, units: &str) -> String {
        let mut text = if self.config.round_decimal {
            format!("{}", value.round() as i64)
        } else if self.size.width < 5 {
            format!("{value:.0}")
        } else {
            format!("{value:.1}")
        };

        if self.config.show_degree {
            if text.chars().count() < self.size.width {
                text.push('°');
            } else {
                info!(%text, width = self.size.width, "no room for degree symbol");
            }
        }
        if self.config.show_units {
            if text.chars().count() < self.size.width {
                text.push_str(units);
            } else {
                info!(%text, width = self.size.width, "no room for unit suffix");
            }
        }
        text
    }
}

impl Routine for TemperatureRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(3, 1), Size::new(12, 1))
    }

    fn check(&self) -> Result<(), RoutineError> {
        Ok(())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        self.size = size;
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, values: &ProviderValues) -> Option<Message> {
        if let Some(last) = self.last_update {
            if (now - last) < chrono::Duration::seconds(1) {
                return None;
            }
        }

        let provider = values.get(&self.config.provider_name)?;
        let units = provider.get("units")?.as_str()?;
        let temp = provider.get(&self.config.provider_value)?.as_f64()?;

        self.last_update = Some(now);
        Some(Message::new(left_pad(
            &self.format_temp(temp, units),
            self.size,
        )))
    }

    fn provider_name(&self) -> Option<&str> {
        Some(&self.config.provider_name)
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "Provider Name",
                description: "The name of the provider to subscribe to",
                field: "provider_name",
                kind: "string",
            },
            Parameter {
                name: "Provider Value",
                description: "The name of the value that the provider populates, that this routine should then use",
                field: "provider_value",
                kind: "string",
            },
            Parameter {
                name: "Show Units",
                description: "Whether to show the temperature unit symbol",
                field: "show_units",
                kind: "bool",
            },
            Parameter {
                name: "Show Degree Symbol",
                description: "Whether to show the degree symbol",
                field: "show_degree",
                kind: "bool",
            },
            Parameter {
                name: "Round Decimal",
                description: "Should decimals be rounded to the closest whole number",
                field: "round_decimal",
                kind: "bool",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PValues;

    fn values(name: &str, key: &str, temp: f64) -> ProviderValues {
        let mut snapshot = PValues::new();
        snapshot.insert("units".to_string(), "F".into());
        snapshot.insert(key.to_string(), temp.into());
        ProviderValues::from([(name.to_string(), snapshot)])
    }

    fn routine(width: usize, config: TemperatureConfig) -> TemperatureRoutine {
        let mut routine = TemperatureRoutine::new(config);
        routine
            .init(Size::new(width, 1), &InitContext::seeded())
            .unwrap();
        routine
    }

    fn config() -> TemperatureConfig {
        TemperatureConfig {
            provider_name: "porch".to_string(),
            provider_value: "current".to_string(),
            show_units: false,
            show_degree: false,
            round_decimal: false,
        }
    }

    #[test]
    fn test_rounded_format() {
        let mut r = routine(
            5,
            TemperatureConfig {
                round_decimal: true,
                ..config()
            },
        );
        let msg = r
            .update(Utc::now(), &values("porch", "current", 71.6))
            .unwrap();
        assert_eq!(msg.text, "   72");
    }

    #[test]
    fn test_one_decimal_when_wide() {
        let mut r = routine(5, config());
        let msg = r
            .update(Utc::now(), &values("porch", "current", 71.64))
            .unwrap();
        assert_eq!(msg.text, " 71.6");
    }

    #[test]
    fn test_no_decimal_when_narrow() {
        let mut r = routine(3, config());
        let msg = r
            .update(Utc::now(), &values("porch", "current", 71.64))
            .unwrap();
        assert_eq!(msg.text, " 72");
    }

    #[test]
    fn test_degree_and_units_suffix() {
        let mut r = routine(
            6,
            TemperatureConfig {
                show_units: true,
                show_degree: true,
                round_decimal: true,
                ..config()
            },
        );
        let msg = r
            .update(Utc::now(), &values("porch", "current", 71.6))
            .unwrap();
        assert_eq!(msg.text, "  72°F");
    }

    #[test]
    fn test_suffixes_dropped_when_full() {
        let mut r = routine(
            4,
            TemperatureConfig {
                show_units: true,
                show_degree: true,
                round_decimal: false,
                ..config()
            },
        );
        // "71.6" fills a 4-wide region, so neither suffix fits
        let msg = r
            .update(Utc::now(), &values("porch", "current", 71.6))
            .unwrap();
        assert_eq!(msg.text, "71.6");
    }

    #[test]
    fn test_none_when_provider_missing() {
        let mut r = routine(5, config());
        assert!(r.update(Utc::now(), &ProviderValues::new()).is_none());
    }

    #[test]
    fn test_none_when_value_missing() {
        let mut r = routine(5, config());
        assert!(r
            .update(Utc::now(), &values("porch", "low", 50.0))
            .is_none());
    }

    #[test]
    fn test_reads_configured_value_key() {
        let mut r = routine(
            5,
            TemperatureConfig {
                provider_value: "high".to_string(),
                round_decimal: true,
                ..config()
            },
        );
        let msg = r.update(Utc::now(), &values("porch", "high", 88.2)).unwrap();
        assert_eq!(msg.text, "   88");
    }
}
