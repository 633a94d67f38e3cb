//! Content routines.
//!
//! A routine renders a rectangular sub-region of the display. Routines are
//! configured as JSON with a `type` discriminator; [`RoutineConfig`] is the
//! closed union of known types and instantiates the live routine. Unknown
//! tags fail the decode.

mod clock;
mod days_until;
mod sequence;
mod slow_text;
mod temperature;
mod text;
mod timer;

pub use clock::{ClockConfig, ClockRoutine};
pub use days_until::{DaysUntilConfig, DaysUntilRoutine};
pub use sequence::{SequenceConfig, SequenceElement, SequenceRoutine};
pub use slow_text::{SlowTextConfig, SlowTextRoutine};
pub use temperature::{TemperatureConfig, TemperatureRoutine};
pub use text::{TextConfig, TextRoutine};
pub use timer::{TimerConfig, TimerRoutine};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alphabet::AlphabetHandle;
use crate::geometry::{Location, Size, SizeRange};
use crate::provider::ProviderValues;

/// A routine's rendered output for its own region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A configurable field of a routine, for parameter introspection by the
/// control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: &'static str,
    pub description: &'static str,
    pub field: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Errors from routine validation and initialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutineError {
    #[error("routine does not support size {}x{}", .0.width, .0.height)]
    UnsupportedSize(Size),
    #[error("military and AM/PM text cannot both be set on clock routine")]
    ClockFormatConflict,
    #[error("invalid timezone {0:?}")]
    InvalidTimezone(String),
    #[error("invalid date {0:?}, expected MM/DD/YYYY")]
    InvalidDate(String),
    #[error("no sequence entries provided")]
    EmptySequence,
    #[error("sequence durations must be at least 1 ms")]
    SequenceDurationTooShort,
    #[error("text length exceeds the routine's area")]
    TextTooLong,
}

/// Handles a routine may need at initialization. Routines that work with
/// flap indices get the alphabet here rather than through any global.
#[derive(Clone)]
pub struct InitContext {
    pub alphabet: AlphabetHandle,
}

impl InitContext {
    /// A context over the seeded default alphabet.
    pub fn seeded() -> Self {
        Self {
            alphabet: AlphabetHandle::seeded(),
        }
    }
}

/// The routine contract.
///
/// `update` must be idempotent and return `None` when no new content is
/// warranted; implementations throttle their own refresh cadence.
pub trait Routine: Send {
    /// The range of sizes this routine can be bound to.
    fn size_range(&self) -> SizeRange;

    /// Validate the configuration.
    fn check(&self) -> Result<(), RoutineError>;

    /// Bind to a size and prepare for `update` calls.
    fn init(&mut self, size: Size, ctx: &InitContext) -> Result<(), RoutineError>;

    fn update(&mut self, now: DateTime<Utc>, values: &ProviderValues) -> Option<Message>;

    /// Name of the provider this routine reads, if any.
    fn provider_name(&self) -> Option<&str> {
        None
    }

    /// The configurable fields of this routine type.
    fn parameters(&self) -> Vec<Parameter>;

    fn supports_size(&self, size: Size) -> bool {
        self.size_range().contains(size)
    }
}

/// Tagged routine configuration. The JSON form is
/// `{"type": "CLOCK", "routine": { ... }}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "routine")]
pub enum RoutineConfig {
    #[serde(rename = "TEXT")]
    Text(TextConfig),
    #[serde(rename = "CLOCK")]
    Clock(ClockConfig),
    #[serde(rename = "TIMER")]
    Timer(TimerConfig),
    #[serde(rename = "DAYSUNTIL")]
    DaysUntil(DaysUntilConfig),
    #[serde(rename = "SEQUENCE")]
    Sequence(SequenceConfig),
    #[serde(rename = "TEMPERATURE")]
    Temperature(TemperatureConfig),
    #[serde(rename = "SLOWTEXT")]
    SlowText(SlowTextConfig),
}

impl RoutineConfig {
    /// Instantiate the configured routine, not yet initialized.
    pub fn build(&self) -> Box<dyn Routine> {
        match self {
            Self::Text(config) => Box::new(TextRoutine::new(config.clone())),
            Self::Clock(config) => Box::new(ClockRoutine::new(config.clone())),
            Self::Timer(config) => Box::new(TimerRoutine::new(config.clone())),
            Self::DaysUntil(config) => Box::new(DaysUntilRoutine::new(config.clone())),
            Self::Sequence(config) => Box::new(SequenceRoutine::new(config.clone())),
            Self::Temperature(config) => Box::new(TemperatureRoutine::new(config.clone())),
            Self::SlowText(config) => Box::new(SlowTextRoutine::new(config.clone())),
        }
    }

    /// Provider dependency, readable without instantiation.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::Temperature(config) => Some(&config.provider_name),
            _ => None,
        }
    }
}

/// A routine as placed on a dashboard: its config plus region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSpec {
    #[serde(flatten)]
    pub config: RoutineConfig,
    pub location: Location,
    pub size: Size,
}
