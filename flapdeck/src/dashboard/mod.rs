//! Dashboards: named, ordered collections of routines covering the display.

mod rotation;

pub use rotation::{Rotation, RotationEntry};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{Location, Size};
use crate::provider::ProviderValues;
use crate::routine::{InitContext, Message, Routine, RoutineError, RoutineSpec};

/// A dashboard's persisted configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub routines: Vec<RoutineSpec>,
}

impl Dashboard {
    /// Validate and append a routine. Placement against the display size is
    /// the display's concern; this only checks the routine's own config.
    pub fn add_routine(&mut self, spec: RoutineSpec) -> Result<(), RoutineError> {
        spec.config.build().check()?;
        self.routines.push(spec);
        Ok(())
    }

    /// Names of every provider consumed by a routine on this dashboard.
    pub fn provider_names(&self) -> BTreeSet<String> {
        self.routines
            .iter()
            .filter_map(|spec| spec.config.provider_name())
            .map(str::to_string)
            .collect()
    }

    /// Instantiate and initialize every routine, in order. The first
    /// failure wins and discards the partial set.
    pub fn init(&self, ctx: &InitContext) -> Result<ActiveDashboard, RoutineError> {
        let mut live = Vec::with_capacity(self.routines.len());
        for spec in &self.routines {
            let mut routine = spec.config.build();
            routine.init(spec.size, ctx)?;
            live.push(LiveRoutine {
                location: spec.location,
                size: spec.size,
                routine,
            });
        }
        Ok(ActiveDashboard { routines: live })
    }
}

/// One initialized routine bound to its region.
pub struct LiveRoutine {
    pub location: Location,
    pub size: Size,
    routine: Box<dyn Routine>,
}

/// A routine's output tagged with its region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardMessage {
    pub location: Location,
    pub size: Size,
    pub message: Message,
}

/// The running instances of an activated dashboard.
pub struct ActiveDashboard {
    routines: Vec<LiveRoutine>,
}

impl ActiveDashboard {
    /// Collect fresh output from every routine, in dashboard order. Later
    /// entries win on overlap when the engine merges.
    pub fn update(&mut self, now: DateTime<Utc>, values: &ProviderValues) -> Vec<DashboardMessage> {
        self.routines
            .iter_mut()
            .filter_map(|live| {
                live.routine.update(now, values).map(|message| DashboardMessage {
                    location: live.location,
                    size: live.size,
                    message,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::{RoutineConfig, TextConfig};

    fn text_spec(text: &str, x: usize, width: usize) -> RoutineSpec {
        RoutineSpec {
            config: RoutineConfig::Text(TextConfig {
                text: text.to_string(),
            }),
            location: Location::new(x, 0),
            size: Size::new(width, 1),
        }
    }

    #[test]
    fn test_update_collects_in_order() {
        let dashboard = Dashboard {
            routines: vec![text_spec("AA", 0, 2), text_spec("BB", 2, 2)],
        };
        let mut active = dashboard.init(&InitContext::seeded()).unwrap();
        let messages = active.update(Utc::now(), &ProviderValues::new());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message.text, "AA");
        assert_eq!(messages[0].location, Location::new(0, 0));
        assert_eq!(messages[1].message.text, "BB");
    }

    #[test]
    fn test_init_propagates_first_error() {
        let dashboard = Dashboard {
            // second routine's text exceeds its declared size
            routines: vec![text_spec("OK", 0, 2), text_spec("TOO LONG", 2, 2)],
        };
        assert_eq!(
            dashboard.init(&InitContext::seeded()).err(),
            Some(RoutineError::TextTooLong)
        );
    }

    #[test]
    fn test_provider_names_deduplicated() {
        use crate::routine::TemperatureConfig;
        let temp = |value: &str| RoutineSpec {
            config: RoutineConfig::Temperature(TemperatureConfig {
                provider_name: "porch".to_string(),
                provider_value: value.to_string(),
                show_units: false,
                show_degree: false,
                round_decimal: true,
            }),
            location: Location::new(0, 0),
            size: Size::new(3, 1),
        };
        let dashboard = Dashboard {
            routines: vec![temp("low"), temp("high")],
        };
        assert_eq!(
            dashboard.provider_names(),
            BTreeSet::from(["porch".to_string()])
        );
    }
}
