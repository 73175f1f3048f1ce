//! Integration tests for the process-wide configuration
//!
//! These tests verify that settings apply to schemas built after they are
//! set, and leave existing schemas and compiled functions alone.

use std::sync::{Mutex, MutexGuard};

use serde_json::json;
use shape_rs::{
    Data, ErrorCode, Exec, GlobalConfig, Repr, UnknownKeys, Value, config_version, float,
    global_config, object_of, reset_global_config, set_global_config, string,
};

// =============================================================================
// Test Helpers
// =============================================================================

static CONFIG_LOCK: Mutex<()> = Mutex::new(());

/// Serializes access to the global configuration and restores it on drop.
struct ConfigGuard {
    _lock: MutexGuard<'static, ()>,
}

impl ConfigGuard {
    fn acquire() -> Self {
        let lock = CONFIG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        reset_global_config();
        Self { _lock: lock }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        reset_global_config();
    }
}

fn with_extra_key() -> Value {
    Value::from_json(json!({"foo": "bar", "extra": 1}))
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_nan_rejected_by_default() {
    let _guard = ConfigGuard::acquire();
    let error = float().parse(&Value::Number(f64::NAN)).unwrap_err();
    assert_eq!(error.reason(), "Expected Float, received NaN Literal (NaN)");
}

#[test]
fn test_nan_validation_can_be_disabled() {
    let _guard = ConfigGuard::acquire();
    let before = float();
    set_global_config(GlobalConfig::new().with_nan_number_validation(false));
    let after = float();

    assert!(before.parse(&Value::Number(f64::NAN)).is_err());
    assert!(after.parse(&Value::Number(f64::NAN)).is_ok());
}

#[test]
fn test_default_unknown_keys_applies_to_new_objects() {
    let _guard = ConfigGuard::acquire();
    let lenient = object_of([("foo", string())]);
    let compiled = lenient.compile(Repr::Input, Repr::Output, Exec::Sync, false);

    set_global_config(GlobalConfig::new().with_default_unknown_keys(UnknownKeys::Strict));
    let strict = object_of([("foo", string())]);

    assert!(lenient.parse(&with_extra_key()).is_ok());
    assert!(compiled.call(Data::Value(with_extra_key())).is_ok());
    let error = strict.parse(&with_extra_key()).unwrap_err();
    assert_eq!(error.code, ErrorCode::ExcessField("extra".to_string()));
}

#[test]
fn test_version_increments_and_reset_restores_defaults() {
    let _guard = ConfigGuard::acquire();
    let start = config_version();
    set_global_config(GlobalConfig::new().with_default_unknown_keys(UnknownKeys::Strict));
    assert_eq!(config_version(), start + 1);
    assert_eq!(global_config().default_unknown_keys, UnknownKeys::Strict);
    reset_global_config();
    assert_eq!(config_version(), start + 2);
    assert_eq!(*global_config(), GlobalConfig::default());
}
