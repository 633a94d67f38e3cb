//! JSON persistence for the display configuration.
//!
//! One document at a configurable path, loaded once at start and rewritten
//! on every configuration mutation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::Display;
use crate::geometry::Size;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("filepath not set on display")]
    FilepathUnset,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid display document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] crate::geometry::LayoutError),
    #[error("poll_rate_ms must be >= {min}, got {got}", min = super::MIN_POLL_RATE_MS)]
    PollRateTooLow { got: u64 },
}

impl Display {
    /// Load a display document, validating the layout and poll rate.
    pub fn load(path: impl AsRef<Path>) -> Result<Display, StoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mut display: Display = serde_json::from_slice(&bytes)?;

        crate::geometry::validate_layout(display.size, &display.layout)?;
        if display.poll_rate_ms < super::MIN_POLL_RATE_MS {
            return Err(StoreError::PollRateTooLow {
                got: display.poll_rate_ms,
            });
        }

        display.filepath = path.to_path_buf();
        Ok(display)
    }

    /// Load the document at `path`, or create and persist a fresh display
    /// of `default_size` when the file does not exist yet. A file that
    /// exists but fails to parse is an error.
    pub fn load_or_create(
        path: impl AsRef<Path>,
        default_size: Size,
    ) -> Result<Display, StoreError> {
        let path = path.as_ref();
        match Display::load(path) {
            Ok(display) => Ok(display),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "display file not found, creating a new one");
                let mut display = Display::new(default_size);
                display.save_to(path)?;
                Ok(display)
            }
            Err(e) => Err(e),
        }
    }

    /// Bind the display to `path` and write it there.
    pub fn save_to(&mut self, path: impl Into<PathBuf>) -> Result<(), StoreError> {
        self.filepath = path.into();
        self.persist()
    }

    /// Rewrite the bound document.
    pub(crate) fn persist(&self) -> Result<(), StoreError> {
        if self.filepath.as_os_str().is_empty() {
            return Err(StoreError::FilepathUnset);
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&self.filepath, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.json");

        let mut display = Display::new(Size::new(12, 2));
        display.save_to(&path).unwrap();
        display.create_dashboard("main").unwrap();

        let loaded = Display::load(&path).unwrap();
        assert_eq!(loaded.size, Size::new(12, 2));
        assert_eq!(loaded.layout.len(), 24);
        assert!(loaded.dashboards.contains_key("main"));
        assert_eq!(loaded.filepath(), path);
    }

    #[test]
    fn test_load_rejects_low_poll_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.json");
        fs::write(
            &path,
            r#"{"size":{"width":2,"height":1},"layout":[0,1],"poll_rate_ms":50}"#,
        )
        .unwrap();
        assert!(matches!(
            Display::load(&path),
            Err(StoreError::PollRateTooLow { got: 50 })
        ));
    }

    #[test]
    fn test_load_rejects_bad_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.json");
        fs::write(
            &path,
            r#"{"size":{"width":2,"height":1},"layout":[0],"poll_rate_ms":500}"#,
        )
        .unwrap();
        assert!(matches!(Display::load(&path), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn test_load_or_create_makes_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.json");

        let display = Display::load_or_create(&path, Size::new(6, 1)).unwrap();
        assert_eq!(display.size, Size::new(6, 1));
        assert!(path.exists());

        // second load reads the file back
        let again = Display::load_or_create(&path, Size::new(99, 9)).unwrap();
        assert_eq!(again.size, Size::new(6, 1));
    }

    #[test]
    fn test_load_or_create_surfaces_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("display.json");
        fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            Display::load_or_create(&path, Size::new(6, 1)),
            Err(StoreError::Json(_))
        ));
    }
}
