//! Letter-by-letter reveal routine.
//!
//! Each letter is scheduled so it lands on its target glyph as the letters
//! before it settle: a letter far down the alphabet starts spinning earlier
//! because it has more flaps to travel. Before its start time a letter is
//! blank; after it, it advances one alphabet step per flap interval until
//! it reaches its target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InitContext, Message, Parameter, Routine, RoutineError};
use crate::geometry::{Size, SizeRange};
use crate::provider::ProviderValues;

/// Time one flap takes to fall, in milliseconds.
const MS_PER_FLAP: i64 = 65;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowTextConfig {
    pub text: String,
    /// Spacing between consecutive letters' arrivals.
    pub letter_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LetterSchedule {
    target: char,
    pos: usize,
    /// When this letter starts spinning, relative to the reveal start.
    start_ms: i64,
    /// Flaps from blank to the target glyph.
    travel: usize,
}

pub struct SlowTextRoutine {
    config: SlowTextConfig,
    size: Size,
    glyphs: Vec<char>,
    schedule: Vec<LetterSchedule>,
    started_at: Option<DateTime<Utc>>,
    done: bool,
}

impl SlowTextRoutine {
    pub fn new(config: SlowTextConfig) -> Self {
        Self {
            config,
            size: Size::new(0, 0),
            glyphs: Vec::new(),
            schedule: Vec::new(),
            started_at: None,
            done: false,
        }
    }

    fn build_schedule(text: &str, delay_ms: i64, glyphs: &[char]) -> Vec<LetterSchedule> {
        let mut minimum = 0i64;
        let mut schedule: Vec<LetterSchedule> = text
            .chars()
            .enumerate()
            .map(|(i, target)| {
                let mut travel = glyphs.iter().position(|&g| g == target).unwrap_or(0);
                if travel == 0 {
                    travel = glyphs.len().saturating_sub(1);
                }
                let start_ms = i as i64 * delay_ms - travel as i64 * MS_PER_FLAP;
                minimum = minimum.min(start_ms);
                LetterSchedule {
                    target,
                    pos: i,
                    start_ms,
                    travel,
                }
            })
            .collect();

        // shift so the earliest letter starts at zero
        for letter in &mut schedule {
            letter.start_ms += minimum.abs();
        }
        schedule.sort_by_key(|letter| letter.start_ms);
        schedule
    }

    fn frame_at(&self, elapsed_ms: i64) -> (String, bool) {
        let mut buffer = vec![' '; self.size.area()];
        let mut all_settled = true;
        let len = self.glyphs.len().max(1);

        for letter in &self.schedule {
            if elapsed_ms < letter.start_ms {
                all_settled = false;
                continue;
            }
            let steps = ((elapsed_ms - letter.start_ms) / MS_PER_FLAP) as usize;
            if steps >= letter.travel {
                buffer[letter.pos] = letter.target;
            } else {
                all_settled = false;
                buffer[letter.pos] = self.glyphs.get(steps % len).copied().unwrap_or(' ');
            }
        }
        (buffer.into_iter().collect(), all_settled)
    }
}

impl Routine for SlowTextRoutine {
    fn size_range(&self) -> SizeRange {
        SizeRange::new(Size::new(1, 1), Size::new(100, 100))
    }

    fn check(&self) -> Result<(), RoutineError> {
        Ok(())
    }

    fn init(&mut self, size: Size, ctx: &InitContext) -> Result<(), RoutineError> {
        if !self.supports_size(size) {
            return Err(RoutineError::UnsupportedSize(size));
        }
        if self.config.text.chars().count() > size.area() {
            return Err(RoutineError::TextTooLong);
        }
        self.size = size;
        self.glyphs = ctx.alphabet.glyphs();
        self.schedule = Self::build_schedule(
            &self.config.text,
            self.config.letter_delay_ms as i64,
            &self.glyphs,
        );
        self.started_at = None;
        self.done = false;
        Ok(())
    }

    fn update(&mut self, now: DateTime<Utc>, _values: &ProviderValues) -> Option<Message> {
        if self.done {
            return None;
        }
        let started_at = *self.started_at.get_or_insert(now);
        let elapsed_ms = (now - started_at).num_milliseconds();

        let (frame, all_settled) = self.frame_at(elapsed_ms);
        if all_settled {
            self.done = true;
        }
        Some(Message::new(frame))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter {
                name: "Text",
                description: "The text content to display",
                field: "text",
                kind: "string",
            },
            Parameter {
                name: "Letter Delay",
                description: "The delay in milliseconds between letters appearing",
                field: "letter_delay_ms",
                kind: "int",
            },
        ]
    }
}
