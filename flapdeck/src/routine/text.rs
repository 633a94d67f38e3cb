//! Static text routine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{Size, SizeRange};
use crate::provider::ProviderValues;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConfig {
    pub text: String,
}

pub struct TextRoutine {
    config: TextConfig,
    last_update: Option<DateTime<Utc>>,
}

impl TextRoutine {
    pub fn new(config: TextConfig) -> Self {
        Self {
            config,
            last_update: None,
        }
    }
}

impl Routine for TextRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(1, 1), Size::new(100, 100))
    }

    fn check(&self) -> Result<(), RoutineError> {
        Ok(())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        if self.config.text.chars().count() > size.area() {
            return Err(RoutineError::TextTooLong);
        }
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        if let Some(last) = self.last_update {
            if (now - last) < chrono::Duration::seconds(1) {
                return None;
            }
        }
        self.last_update = Some(now);
        Some(Message::new(self.config.text.clone()))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter {
            name: "Text",
            description: "The text content to display",
            field: "text",
            kind: "string",
        }]
    }
}
