//! Timed text-sequence routine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{left_pad, Size, SizeRange};
use crate::provider::ProviderValues;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceElement {
    pub text: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub sequences: Vec<SequenceElement>,
    /// Wrap to the first entry after the last, instead of halting.
    #[serde(default)]
    pub cycle: bool,
}

enum Cursor {
    NotStarted,
    At(usize),
    Finished,
}

pub struct SequenceRoutine {
    config: SequenceConfig,
    size: Size,
    cursor: Cursor,
    last_update: Option<DateTime<Utc>>,
}

impl SequenceRoutine {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            size: Size::new(0, 0),
            cursor: Cursor::NotStarted,
            last_update: None,
        }
    }
}

impl Routine for SequenceRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(1, 1), Size::new(100, 100))
    }

    fn check(&self) -> Result<(), RoutineError> {
        if self.config.sequences.is_empty() {
            return Err(RoutineError::EmptySequence);
        }
        if self.config.sequences.iter().any(|e| e.duration_ms < 1) {
            return Err(RoutineError::SequenceDurationTooShort);
        }
        Ok(())
    }

    fn init(&mut self, size: Size, _ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        if self
            .config
            .sequences
            .iter()
            .any(|e| e.text.chars().count() > size.area())
        {
            return Err(RoutineError::TextTooLong);
        }
        self.size = size;
        self.cursor = Cursor::NotStarted;
        self.last_update = None;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        let entries = &self.config.sequences;
        match self.cursor {
            Cursor::Finished => None,
            // the first entry goes out immediately
            Cursor::NotStarted => {
                self.cursor = Cursor::At(0);
                self.last_update = Some(now);
                Some(Message::new(left_pad(&entries[0].text, self.size)))
            }
            Cursor::At(index) => {
                let elapsed_ms = (now - self.last_update?).num_milliseconds();
                if elapsed_ms < entries[index].duration_ms as i64 {
                    return None;
                }
                self.last_update = Some(now);

                let mut next = index + 1;
                if next >= entries.len() {
                    if !self.config.cycle {
                        self.cursor = Cursor::Finished;
                        return None;
                    }
                    next = 0;
                }
                self.cursor = Cursor::At(next);
                Some(Message::new(left_pad(&entries[next].text, self.size)))
            }
        }
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "Sequences",
                description: "Sequences of text and their respective durations in milliseconds",
                field: "sequences",
                kind: "{\"text\": string, \"duration_ms\": int}",
            },
            Parameter {
                name: "Cycle",
                description: "Should the sequence cycle around after completion",
                field: "cycle",
                kind: "bool",
            },
        ]
    }
}
