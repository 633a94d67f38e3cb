//! Count-up timer routine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{left_pad, Size, SizeRange};
use crate::provider::ProviderValues;

/// Glyph repeated across the region once the timer is done.
const DONE_GLYPH: char = 'g';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// When the timer ends.
    pub end: DateTime<Utc>,
}

pub struct TimerRoutine {
    config: TimerConfig,
    size: Size,
    start: Option<DateTime<Utc>>,
    last_update: Option<DateTime<Utc>>,
}

impl TimerRoutine {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            size: Size::new(0, 0),
            start: None,
            last_update: None,
        }
    }
}

impl Routine for TimerRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(5, 1), Size::new(5, 1))
    }

    fn check(&self) -> Result<(), RoutineError> {
        Ok(())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        self.size = size;
        self.start = None;
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        if let Some(last) = self.last_update {
            if (now - last) < chrono::Duration::seconds(1) {
                return None;
            }
        }
        // the count anchors on the first tick after init
        let start = *self.start.get_or_insert(now);

        let text = if now >= self.config.end {
            DONE_GLYPH.to_string().repeat(self.size.width)
        } else {
            let elapsed = now - start;
            let mins = elapsed.num_minutes() % 60;
            let secs = elapsed.num_seconds() % 60;
            left_pad(&format!("{mins:02}:{secs:02}"), self.size)
        };

        self.last_update = Some(now);
        Some(Message::new(text))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter {
            name: "End Time",
            description: "The time when the timer should end",
            field: "end",
            kind: "time",
        }]
    }
}
