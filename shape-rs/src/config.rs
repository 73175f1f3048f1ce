//! Process-wide configuration
//!
//! A single versioned [`GlobalConfig`] record. Constructors read it once when
//! a schema is built; execution never reads it, so already-built schemas and
//! compiled functions keep the settings they were created with.
//!
//! # Example
//! ```rust,ignore
//! use shape_rs::{GlobalConfig, UnknownKeys, set_global_config};
//!
//! set_global_config(
//!     GlobalConfig::new()
//!         .with_default_unknown_keys(UnknownKeys::Strict)
//!         .with_nan_number_validation(false),
//! );
//! ```

use std::sync::{Arc, LazyLock, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// What an object does with input keys it does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeys {
    /// Drop them silently.
    #[default]
    Strip,
    /// Fail with `ExcessField` naming the first one.
    Strict,
}

/// Settings applied to schemas built after they are set.
///
/// # Fields
///
/// * `disable_nan_number_validation` - When set, `float()` accepts `NaN`.
///   Default: false.
///
/// * `default_unknown_keys` - Policy given to new object schemas.
///   Default: `Strip`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Accept `NaN` in float schemas (default: false)
    pub disable_nan_number_validation: bool,
    /// Unknown keys policy for new objects (default: Strip)
    pub default_unknown_keys: UnknownKeys,
}

impl GlobalConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the `NaN` rejection of float schemas.
    pub fn with_nan_number_validation(mut self, enabled: bool) -> Self {
        self.disable_nan_number_validation = !enabled;
        self
    }

    /// Set the unknown keys policy for new object schemas.
    pub fn with_default_unknown_keys(mut self, policy: UnknownKeys) -> Self {
        self.default_unknown_keys = policy;
        self
    }
}

struct Versioned {
    version: u64,
    config: Arc<GlobalConfig>,
}

static GLOBAL: LazyLock<RwLock<Versioned>> = LazyLock::new(|| {
    RwLock::new(Versioned {
        version: 0,
        config: Arc::new(GlobalConfig::default()),
    })
});

/// Snapshot of the current configuration.
pub fn global_config() -> Arc<GlobalConfig> {
    let guard = GLOBAL.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard.config)
}

/// Number of times the configuration has been replaced.
pub fn config_version() -> u64 {
    GLOBAL
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .version
}

/// Replace the configuration. Only schemas built afterwards are affected.
pub fn set_global_config(config: GlobalConfig) {
    let mut guard = GLOBAL.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.version += 1;
    debug!(
        version = guard.version,
        disable_nan_number_validation = config.disable_nan_number_validation,
        default_unknown_keys = ?config.default_unknown_keys,
        "Global config updated"
    );
    guard.config = Arc::new(config);
}

/// Restore the default configuration.
pub fn reset_global_config() {
    set_global_config(GlobalConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert!(!config.disable_nan_number_validation);
        assert_eq!(config.default_unknown_keys, UnknownKeys::Strip);
    }

    #[test]
    fn test_builder_methods() {
        let config = GlobalConfig::new()
            .with_nan_number_validation(false)
            .with_default_unknown_keys(UnknownKeys::Strict);
        assert!(config.disable_nan_number_validation);
        assert_eq!(config.default_unknown_keys, UnknownKeys::Strict);
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: GlobalConfig =
            serde_json::from_str(r#"{"default_unknown_keys": "strict"}"#).unwrap();
        assert_eq!(config.default_unknown_keys, UnknownKeys::Strict);
        assert!(!config.disable_nan_number_validation);
    }
}
