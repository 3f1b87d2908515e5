#![forbid(unsafe_code)]

//! Configuration as data.
//!
//! [`FlotillaConfig`] groups every tunable parameter and loads from TOML or
//! JSON. Every field is defaulted, so an empty document yields the built-in
//! behavior.
//!
//! ```toml
//! [gesture]
//! slop = 8.0
//! tap_timeout_ms = 300
//!
//! [capacity]
//! signal_light = 5
//!
//! [storage]
//! directory = "/var/lib/flotilla"
//!
//! [logging]
//! filter = "flotilla_runtime=debug"
//! ```
//!
//! Loaders reject documents that fail [`FlotillaConfig::validate`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flotilla_core::{GestureConfig, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StorageError;
use crate::logging::LoggingPolicy;
use crate::registry::{Capacities, MAX_CAPACITY};
use crate::storage::{FileStorage, MemoryStorage, StorageBackend};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every tunable parameter of a Flotilla runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlotillaConfig {
    pub gesture: GesturePolicy,
    pub capacity: CapacityPolicy,
    pub storage: StoragePolicy,
    pub logging: LoggingPolicy,
}

/// Gesture thresholds in device-independent units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GesturePolicy {
    pub slop: f32,
    pub tap_timeout_ms: u64,
    pub handle_extent: f32,
    pub min_width: f32,
    pub min_height: f32,
    pub rebase_every: u32,
    pub min_pinch_distance: f32,
}

impl Default for GesturePolicy {
    fn default() -> Self {
        let config = GestureConfig::default();
        Self {
            slop: config.slop,
            tap_timeout_ms: u64::try_from(config.tap_timeout.as_millis()).unwrap_or(u64::MAX),
            handle_extent: config.handle_extent,
            min_width: config.min_size.width,
            min_height: config.min_size.height,
            rebase_every: config.rebase_every,
            min_pinch_distance: config.min_pinch_distance,
        }
    }
}

/// Pool size per feature type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityPolicy {
    pub mask: u32,
    pub spotlight: u32,
    pub signal_light: u32,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        let defaults = Capacities::default();
        Self {
            mask: defaults.mask,
            spotlight: defaults.spotlight,
            signal_light: defaults.signal_light,
        }
    }
}

/// Where durable state lives. No directory means in-memory storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoragePolicy {
    pub directory: Option<PathBuf>,
}

impl FlotillaConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Validate all parameters. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(err) = self.to_gesture_config().validate() {
            errors.push(format!("gesture: {err}"));
        }

        let capacities = [
            ("capacity.mask", self.capacity.mask),
            ("capacity.spotlight", self.capacity.spotlight),
            ("capacity.signal_light", self.capacity.signal_light),
        ];
        for (name, value) in capacities {
            if value == 0 || value > MAX_CAPACITY {
                errors.push(format!("{name} must be in 1..={MAX_CAPACITY}, got {value}"));
            }
        }

        if self
            .storage
            .directory
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            errors.push("storage.directory must not be empty".into());
        }

        if self.logging.filter.trim().is_empty() {
            errors.push("logging.filter must not be empty".into());
        }

        errors
    }

    /// Build a [`GestureConfig`] from this policy.
    #[must_use]
    pub fn to_gesture_config(&self) -> GestureConfig {
        let g = &self.gesture;
        GestureConfig {
            slop: g.slop,
            tap_timeout: Duration::from_millis(g.tap_timeout_ms),
            handle_extent: g.handle_extent,
            min_size: Size::new(g.min_width, g.min_height),
            rebase_every: g.rebase_every,
            min_pinch_distance: g.min_pinch_distance,
        }
    }

    /// Pool sizes for the registry.
    #[must_use]
    pub fn capacities(&self) -> Capacities {
        Capacities {
            mask: self.capacity.mask,
            spotlight: self.capacity.spotlight,
            signal_light: self.capacity.signal_light,
        }
    }

    /// Open the configured storage backend.
    pub fn open_storage(&self) -> Result<Arc<dyn StorageBackend>, StorageError> {
        Ok(match &self.storage.directory {
            Some(dir) => Arc::new(FileStorage::open(dir)?),
            None => Arc::new(MemoryStorage::new()),
        })
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_documents_yield_defaults() {
        let from_toml = FlotillaConfig::from_toml_str("").expect("toml");
        let from_json = FlotillaConfig::from_json_str("{}").expect("json");
        assert_eq!(from_toml, FlotillaConfig::default());
        assert_eq!(from_json, FlotillaConfig::default());
        assert_eq!(from_toml.to_gesture_config(), GestureConfig::default());
        assert_eq!(from_toml.capacities(), Capacities::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = FlotillaConfig::from_toml_str(
            r#"
            [gesture]
            slop = 12.0
            tap_timeout_ms = 250

            [capacity]
            signal_light = 5

            [logging]
            json = true
            "#,
        )
        .expect("parse");
        let gesture = config.to_gesture_config();
        assert_eq!(gesture.slop, 12.0);
        assert_eq!(gesture.tap_timeout, Duration::from_millis(250));
        assert_eq!(gesture.handle_extent, 32.0);
        assert_eq!(config.capacities().signal_light, 5);
        assert_eq!(config.capacities().mask, 4);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = FlotillaConfig::default();
        config.gesture.slop = -1.0;
        config.capacity.mask = 0;
        config.capacity.spotlight = 64;
        let errors = config.validate();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("slop")));
        assert!(errors.iter().any(|e| e.contains("capacity.mask")));
    }

    #[test]
    fn loaders_reject_invalid_documents() {
        let err = FlotillaConfig::from_json_str(r#"{"capacity": {"mask": 40}}"#)
            .expect_err("invalid");
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("capacity.mask"));

        let err = FlotillaConfig::from_toml_str("[gesture\n").expect_err("syntax");
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn storage_defaults_to_memory() {
        let storage = FlotillaConfig::default().open_storage().expect("open");
        assert_eq!(storage.name(), "memory");

        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = FlotillaConfig::default();
        config.storage.directory = Some(dir.path().to_path_buf());
        assert_eq!(config.open_storage().expect("open").name(), "file");
    }

    #[test]
    fn file_loader_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flotilla.toml");
        std::fs::write(&path, "[gesture]\nrebase_every = 60\n").expect("write");
        let config = FlotillaConfig::from_toml_file(&path).expect("load");
        assert_eq!(config.gesture.rebase_every, 60);
    }
}
