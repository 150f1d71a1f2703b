//! TOML configuration loading for [`Configuration`].
//!
//! ```toml
//! threshold = 0.9
//! maybe_threshold = 0.7
//!
//! [[properties]]
//! name = "ssn"
//! role = "identity"
//!
//! [[properties]]
//! name = "last_name"
//! role = "lookup"
//! lookup_behaviour = "required"
//! comparator = { kind = "weighted_levenshtein" }
//! high_probability = 0.95
//! low_probability = 0.1
//! ```

use std::path::Path;

use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::model::Configuration;

/// Parse a [`Configuration`] from a TOML string and validate it.
pub fn from_str(source: &str) -> Result<Configuration, ConfigError> {
    let config: Configuration = toml::from_str(source).map_err(|e| ConfigError::ParseFailed {
        path: "<inline>".into(),
        reason: e.to_string(),
    })?;
    config.validate()?;
    debug!(properties = config.properties.len(), "configuration validated");
    Ok(config)
}

/// Load and validate a [`Configuration`] from a TOML file on disk.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn from_path(path: impl AsRef<Path>) -> Result<Configuration, ConfigError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let config: Configuration = toml::from_str(&source).map_err(|e| ConfigError::ParseFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    config.validate()?;
    debug!(properties = config.properties.len(), "configuration loaded");
    Ok(config)
}
