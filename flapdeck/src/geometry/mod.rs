//! Display geometry: sizes, locations, and the physical wiring layout.

mod layout;
mod pad;

pub use layout::{arrange, invert_layout, validate_layout, LayoutError};
pub use pad::{left_pad, right_pad};

use serde::{Deserialize, Serialize};

/// A rectangular extent in modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of modules covered by this extent.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// A module position on the display, zero-based from the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: usize,
    pub y: usize,
}

impl Location {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Inclusive bounds on the sizes a routine can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Size,
    pub max: Size,
}

impl SizeRange {
    pub fn new(min: Size, max: Size) -> Self {
        Self { min, max }
    }

    /// Whether `size` lies within these bounds on both axes.
    pub fn contains(&self, size: Size) -> bool {
        size.width >= self.min.width
            && size.width <= self.max.width
            && size.height >= self.min.height
            && size.height <= self.max.height
    }
}
