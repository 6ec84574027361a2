//! Tracking configuration file format.
//!
//! # Example
//!
//! ```toml
//! [tracking]
//! max_history = 10
//! trace_to_diagnostics = false
//!
//! [store]
//! connection_string = "file:./instances"
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use statetrack_core::DEFAULT_MAX_HISTORY;

/// Connection string used when no `[store]` section is given.
pub const DEFAULT_CONNECTION_STRING: &str = "memory:";

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level tracking configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    pub tracking: TrackingSettings,
    pub store: StoreSettings,
}

/// `[tracking]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingSettings {
    /// Number of entered states each tracker remembers.
    pub max_history: usize,
    /// Mirror every record to the diagnostics log.
    pub trace_to_diagnostics: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            max_history: DEFAULT_MAX_HISTORY,
            trace_to_diagnostics: false,
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// `memory:` or `file:<directory>`.
    pub connection_string: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
        }
    }
}

/// Errors raised while loading a [`TrackingConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected keys.
    #[error("could not parse '{path}': {message}")]
    Parse { path: String, message: String },

    /// The file parsed but a value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl TrackingConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: TrackingConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracking.max_history == 0 {
            return Err(ConfigError::Invalid(
                "tracking.max_history must be at least 1".to_string(),
            ));
        }
        if self.store.connection_string.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.connection_string must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and parse a tracking config TOML file from `path`.
pub fn read_config(path: &Path) -> Result<TrackingConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    TrackingConfig::parse(&content, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_takes_defaults() {
        let config = TrackingConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackingConfig::default());
        assert_eq!(config.tracking.max_history, 10);
        assert!(!config.tracking.trace_to_diagnostics);
        assert_eq!(config.store.connection_string, "memory:");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = TrackingConfig::from_toml_str("[tracking]\nmax_history = 3\n").unwrap();
        assert_eq!(config.tracking.max_history, 3);
        assert!(!config.tracking.trace_to_diagnostics);
        assert_eq!(config.store.connection_string, "memory:");
    }

    #[test]
    fn zero_history_rejected() {
        let err = TrackingConfig::from_toml_str("[tracking]\nmax_history = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = TrackingConfig::from_toml_str("[tracking]\nhistory = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_config(Path::new("/nonexistent/statetrack.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/statetrack.toml"));
    }
}
