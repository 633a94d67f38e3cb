//! Countdown-in-days routine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{Size, SizeRange};
use crate::provider::ProviderValues;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaysUntilConfig {
    /// Target date in `MM/DD/YYYY`.
    pub end_date: String,
}

pub struct DaysUntilRoutine {
    config: DaysUntilConfig,
    end: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
}

impl DaysUntilRoutine {
    pub fn new(config: DaysUntilConfig) -> Self {
        Self {
            config,
            end: None,
            last_update: None,
        }
    }

    fn parse_end(&self) -> Result<DateTime<Utc>, RoutineError> {
        NaiveDate::parse_from_str(&self.config.end_date, "%m/%d/%Y")
            .map_err(|_| RoutineError::InvalidDate(self.config.end_date.clone()))
            .map(|date| {
                date.and_hms_opt(0, 0, 0)
                    .expect("midnight is always a valid time")
                    .and_utc()
            })
    }
}

impl Routine for DaysUntilRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(1, 1), Size::new(100, 1))
    }

    fn check(&self) -> Result<(), RoutineError> {
        self.parse_end().map(|_| ())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        self.end = Some(self.parse_end()?);
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        if let Some(last) = self.last_update {
            if (now - last) < chrono::Duration::minutes(1) {
                return None;
            }
        }
        let end = self.end?;
        self.last_update = Some(now);

        let days = (end - now).num_hours() / 24;
        Some(Message::new(days.to_string()))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter {
            name: "End Date",
            description: "The end date the routine is counting down to, in MM/DD/YYYY format",
            field: "end_date",
            kind: "string",
        }]
    }
}
