//! Wall-clock routine.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{left_pad, Size, SizeRange};
use crate::provider::ProviderValues;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Show `4:30` instead of `04:30`.
    #[serde(default)]
    pub remove_leading_zero: bool,
    /// 24-hour time.
    #[serde(default)]
    pub military: bool,
    /// Append AM/PM when the width allows.
    #[serde(default, rename = "AMPM_text")]
    pub ampm_text: bool,
    /// IANA timezone name, e.g. `America/Denver`.
    pub timezone: String,
}

pub struct ClockRoutine {
    config: ClockConfig,
    size: Size,
    tz: Option<Tz>,
    format: String,
    last_update: Option<DateTime<Utc>>,
}

impl ClockRoutine {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            size: Size::new(0, 0),
            tz: None,
            format: String::new(),
            last_update: None,
        }
    }

    fn format_string(&self) -> String {
        if self.config.military {
            "%H:%M".to_string()
        } else {
            let mut format = "%I:%M".to_string();
            // the suffix needs a space plus two letters beyond hh:mm
            if self.config.ampm_text && self.size.width as i64 - 5 > 2 {
                format.push_str(" %p");
            }
            format
        }
    }

    fn parse_timezone(&self) -> Result<Tz, RoutineError> {
        self.config
            .timezone
            .parse()
            .map_err(|_| RoutineError::InvalidTimezone(self.config.timezone.clone()))
    }
}

impl Routine for ClockRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(5, 1), Size::new(100, 1))
    }

    fn check(&self) -> Result<(), RoutineError> {
        if self.config.military && self.config.ampm_text {
            return Err(RoutineError::ClockFormatConflict);
        }
        self.parse_timezone()?;
        Ok(())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        self.size = size;
        self.tz = Some(self.parse_timezone()?);
        self.format = self.format_string();
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        if let Some(last) = self.last_update {
            if (now - last) < chrono::Duration::seconds(1) {
                return None;
            }
        }
        let tz = self.tz?;

        let mut text = now.with_timezone(&tz).format(&self.format).to_string();
        if self.config.remove_leading_zero && text.starts_with('0') {
            text.replace_range(0..1, " ");
        }
        self.last_update = Some(now);
        Some(Message::new(left_pad(&text, self.size)))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "Remove Leading Zero",
                description: "If the time is 04:30, should it be displayed as 4:30 instead",
                field: "remove_leading_zero",
                kind: "bool",
            },
            Parameter {
                name: "24-hour Format",
                description: "Use 24-hour time format (military time)",
                field: "military",
                kind: "bool",
            },
            Parameter {
                name: "Show AM/PM",
                description: "Show AM/PM text after the time",
                field: "AMPM_text",
                kind: "bool",
            },
            Parameter {
                name: "Timezone",
                description: "IANA timezone name (e.g., 'America/New_York', 'Europe/London')",
                field: "timezone",
                kind: "string",
            },
        ]
    }
}
