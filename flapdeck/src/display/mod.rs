//! The display aggregate: geometry, translations, dashboards, rotations,
//! providers and the wiring layout, persisted as one JSON document.
//!
//! Configuration mutations validate first, then persist, then commit to
//! memory, so a failed persist leaves the in-memory state untouched. The
//! runtime half (the tick loop that actually drives the hardware) lives in
//! [`engine`].

mod client;
mod engine;
mod store;

pub use client::Client;
pub use engine::{compose, state_channel, DirectCommand, DisplayHandle, Engine};
pub use store::StoreError;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dashboard::{Dashboard, Rotation};
use crate::geometry::Size;
use crate::provider::ProviderEntry;
use crate::routine::{RoutineError, RoutineSpec};

/// Smallest allowed tick interval.
pub const MIN_POLL_RATE_MS: u64 = 100;

const DEFAULT_POLL_RATE_MS: u64 = 500;

/// Errors from display configuration APIs.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("dashboard {0:?} already exists")]
    DashboardExists(String),
    #[error("dashboard {0:?} does not exist")]
    UnknownDashboard(String),
    #[error("cannot delete currently active dashboard {0:?}")]
    DashboardActive(String),
    #[error("dashboard {dashboard:?} is part of rotation {rotation:?}")]
    DashboardInRotation { dashboard: String, rotation: String },
    #[error("routine does not fit the display at its location")]
    RoutineOutOfBounds,
    #[error(transparent)]
    Routine(#[from] RoutineError),
    #[error("rotation {0:?} already exists")]
    RotationExists(String),
    #[error("rotation {0:?} does not exist")]
    UnknownRotation(String),
    #[error("cannot delete currently active rotation {0:?}")]
    RotationActive(String),
    #[error("2 or more dashboards are required to form a rotation")]
    RotationTooShort,
    #[error("rotation entries must last at least 1 second")]
    RotationDurationTooShort,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The persisted display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    pub size: Size,
    #[serde(default)]
    pub translations: BTreeMap<char, char>,
    #[serde(default)]
    pub dashboards: BTreeMap<String, Dashboard>,
    #[serde(default)]
    pub rotations: BTreeMap<String, Rotation>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
    pub layout: Vec<usize>,
    pub poll_rate_ms: u64,

    #[serde(skip)]
    active_dashboard: String,
    #[serde(skip)]
    active_rotation: String,
    #[serde(skip)]
    last_state: String,
    #[serde(skip)]
    filepath: PathBuf,
}

impl Display {
    /// A blank display with the identity layout.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            translations: BTreeMap::new(),
            dashboards: BTreeMap::new(),
            rotations: BTreeMap::new(),
            providers: BTreeMap::new(),
            layout: (0..size.area()).collect(),
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            active_dashboard: String::new(),
            active_rotation: String::new(),
            last_state: String::new(),
            filepath: PathBuf::new(),
        }
    }

    pub fn active_dashboard(&self) -> &str {
        &self.active_dashboard
    }

    pub fn active_rotation(&self) -> &str {
        &self.active_rotation
    }

    /// Last hardware state, in logical display order.
    pub fn last_state(&self) -> &str {
        &self.last_state
    }

    pub fn filepath(&self) -> &std::path::Path {
        &self.filepath
    }

    /// Apply a mutation to a candidate copy, persist it, and only then
    /// commit it to memory.
    fn commit<F>(&mut self, mutate: F) -> Result<(), DisplayError>
    where
        F: FnOnce(&mut Display) -> Result<(), DisplayError>,
    {
        let mut candidate = self.clone();
        mutate(&mut candidate)?;
        candidate.persist()?;
        *self = candidate;
        Ok(())
    }

    pub fn create_dashboard(&mut self, name: &str) -> Result<(), DisplayError> {
        self.commit(|display| {
            if display.dashboards.contains_key(name) {
                return Err(DisplayError::DashboardExists(name.to_string()));
            }
            display.dashboards.insert(name.to_string(), Dashboard::default());
            Ok(())
        })
    }

    /// Delete a dashboard. Refused while it is active or referenced by any
    /// rotation.
    pub fn delete_dashboard(&mut self, name: &str) -> Result<(), DisplayError> {
        if name == self.active_dashboard {
            return Err(DisplayError::DashboardActive(name.to_string()));
        }
        self.commit(|display| {
            if !display.dashboards.contains_key(name) {
                return Err(DisplayError::UnknownDashboard(name.to_string()));
            }
            for (rotation_name, rotation) in &display.rotations {
                if rotation.rotation.iter().any(|entry| entry.name == name) {
                    return Err(DisplayError::DashboardInRotation {
                        dashboard: name.to_string(),
                        rotation: rotation_name.clone(),
                    });
                }
            }
            display.dashboards.remove(name);
            Ok(())
        })
    }

    /// Validate a routine's config, size range and placement, then add it
    /// to the named dashboard.
    pub fn add_routine_to_dashboard(
        &mut self,
        dashboard_name: &str,
        spec: RoutineSpec,
    ) -> Result<(), DisplayError> {
        let display_size = self.size;
        self.commit(move |display| {
            let Some(dashboard) = display.dashboards.get_mut(dashboard_name) else {
                return Err(DisplayError::UnknownDashboard(dashboard_name.to_string()));
            };

            let routine = spec.config.build();
            routine.check()?;
            if !routine.supports_size(spec.size) {
                return Err(RoutineError::UnsupportedSize(spec.size).into());
            }
            if spec.location.x + spec.size.width > display_size.width
                || spec.location.y + spec.size.height > display_size.height
            {
                return Err(DisplayError::RoutineOutOfBounds);
            }

            dashboard.routines.push(spec);
            Ok(())
        })
    }

    /// Add a rotation. Requires at least two entries, second-or-longer
    /// durations, and entries naming existing dashboards.
    pub fn create_rotation(&mut self, name: &str, rotation: Rotation) -> Result<(), DisplayError> {
        self.commit(move |display| {
            if display.rotations.contains_key(name) {
                return Err(DisplayError::RotationExists(name.to_string()));
            }
            if rotation.rotation.len() < 2 {
                return Err(DisplayError::RotationTooShort);
            }
            for entry in &rotation.rotation {
                if !display.dashboards.contains_key(&entry.name) {
                    return Err(DisplayError::UnknownDashboard(entry.name.clone()));
                }
                if entry.duration_secs < 1 {
                    return Err(DisplayError::RotationDurationTooShort);
                }
            }
            display.rotations.insert(name.to_string(), rotation);
            Ok(())
        })
    }

    /// Delete a rotation. Refused while it is active.
    pub fn delete_rotation(&mut self, name: &str) -> Result<(), DisplayError> {
        if name == self.active_rotation {
            return Err(DisplayError::RotationActive(name.to_string()));
        }
        self.commit(|display| {
            if display.rotations.remove(name).is_none() {
                return Err(DisplayError::UnknownRotation(name.to_string()));
            }
            Ok(())
        })
    }

    pub fn set_translation(&mut self, from: char, to: char) -> Result<(), DisplayError> {
        self.commit(|display| {
            display.translations.insert(from, to);
            Ok(())
        })
    }

    pub fn remove_translation(&mut self, from: char) -> Result<(), DisplayError> {
        self.commit(|display| {
            display.translations.remove(&from);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::RotationEntry;
    use crate::geometry::Location;
    use crate::routine::{RoutineConfig, TextConfig};
    use tempfile::tempdir;

    fn display_at_tempfile() -> (Display, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut display = Display::new(Size::new(12, 1));
        display.save_to(dir.path().join("display.json")).unwrap();
        (display, dir)
    }

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
    fn test_create_dashboard_rejects_duplicates() {
        let (mut display, _dir) = display_at_tempfile();
        display.create_dashboard("main").unwrap();
        assert!(matches!(
            display.create_dashboard("main"),
            Err(DisplayError::DashboardExists(_))
        ));
    }

    #[test]
    fn test_delete_dashboard_refused_while_in_rotation() {
        let (mut display, _dir) = display_at_tempfile();
        display.create_dashboard("a").unwrap();
        display.create_dashboard("b").unwrap();
        display
            .create_rotation(
                "cycle",
                Rotation::new(vec![
                    RotationEntry {
                        name: "a".to_string(),
                        duration_secs: 5,
                    },
                    RotationEntry {
                        name: "b".to_string(),
                        duration_secs: 5,
                    },
                ]),
            )
            .unwrap();

        assert!(matches!(
            display.delete_dashboard("a"),
            Err(DisplayError::DashboardInRotation { .. })
        ));
        // a failed delete must not have removed it
        assert!(display.dashboards.contains_key("a"));
    }

    #[test]
    fn test_add_routine_bounds_checks() {
        let (mut display, _dir) = display_at_tempfile();
        display.create_dashboard("main").unwrap();

        // x + width exceeds the display
        assert!(matches!(
            display.add_routine_to_dashboard("main", text_spec("HI", 10, 4)),
            Err(DisplayError::RoutineOutOfBounds)
        ));
        // fits exactly
        display
            .add_routine_to_dashboard("main", text_spec("HI", 10, 2))
            .unwrap();
    }

    #[test]
    fn test_add_routine_to_unknown_dashboard() {
        let (mut display, _dir) = display_at_tempfile();
        assert!(matches!(
            display.add_routine_to_dashboard("ghost", text_spec("X", 0, 1)),
            Err(DisplayError::UnknownDashboard(_))
        ));
    }

    #[test]
    fn test_rotation_requires_two_entries() {
        let (mut display, _dir) = display_at_tempfile();
        display.create_dashboard("solo").unwrap();
        let rotation = Rotation::new(vec![RotationEntry {
            name: "solo".to_string(),
            duration_secs: 5,
        }]);
        assert!(matches!(
            display.create_rotation("cycle", rotation),
            Err(DisplayError::RotationTooShort)
        ));
    }

    #[test]
    fn test_rotation_rejects_unknown_dashboard_and_short_duration() {
        let (mut display, _dir) = display_at_tempfile();
        display.create_dashboard("a").unwrap();
        display.create_dashboard("b").unwrap();

        let unknown = Rotation::new(vec![
            RotationEntry {
                name: "a".to_string(),
                duration_secs: 5,
            },
            RotationEntry {
                name: "ghost".to_string(),
                duration_secs: 5,
            },
        ]);
        assert!(matches!(
            display.create_rotation("cycle", unknown),
            Err(DisplayError::UnknownDashboard(_))
        ));

        let zero = Rotation::new(vec![
            RotationEntry {
                name: "a".to_string(),
                duration_secs: 0,
            },
            RotationEntry {
                name: "b".to_string(),
                duration_secs: 5,
            },
        ]);
        assert!(matches!(
            display.create_rotation("cycle", zero),
            Err(DisplayError::RotationDurationTooShort)
        ));
    }

    #[test]
    fn test_translations_persist_and_remove() {
        let (mut display, _dir) = display_at_tempfile();
        display.set_translation('°', 'd').unwrap();
        assert_eq!(display.translations.get(&'°'), Some(&'d'));
        display.remove_translation('°').unwrap();
        assert!(display.translations.is_empty());
    }

    #[test]
    fn test_failed_persist_leaves_memory_untouched() {
        // no filepath set: every commit must fail and change nothing
        let mut display = Display::new(Size::new(6, 1));
        assert!(matches!(
            display.create_dashboard("main"),
            Err(DisplayError::Store(StoreError::FilepathUnset))
        ));
        assert!(display.dashboards.is_empty());
    }
}
