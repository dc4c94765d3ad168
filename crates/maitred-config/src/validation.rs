// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive hold windows and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::MaitredConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MaitredConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.engine.log_level.trim();
    if !LOG_LEVELS.contains(&level) {
        errors.push(ConfigError::Validation {
            message: format!(
                "engine.log_level `{level}` is not one of {}",
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.engine.instance_name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "engine.instance_name must not be empty".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Every hold window must be positive; a zero window would expire jobs
    // the moment they are created.
    let windows = [
        ("holds.taxi_secs", config.holds.taxi_secs),
        ("holds.reservation_secs", config.holds.reservation_secs),
        ("holds.activity_secs", config.holds.activity_secs),
        ("holds.experience_secs", config.holds.experience_secs),
        ("holds.supplies_secs", config.holds.supplies_secs),
    ];
    for (key, value) in windows {
        if value < 1 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be at least 1 second, got {value}"),
            });
        }
    }

    if config.sweeper.interval_secs < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "sweeper.interval_secs must be at least 1, got {}",
                config.sweeper.interval_secs
            ),
        });
    }

    if config.sweeper.batch_limit < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "sweeper.batch_limit must be at least 1, got {}",
                config.sweeper.batch_limit
            ),
        });
    }

    if config.gate.expiry_buffer_secs < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "gate.expiry_buffer_secs must be non-negative, got {}",
                config.gate.expiry_buffer_secs
            ),
        });
    }

    if config.counters.default_shards < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "counters.default_shards must be at least 1, got {}",
                config.counters.default_shards
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = MaitredConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MaitredConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = MaitredConfig::default();
        config.engine.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("log_level"))));
    }

    #[test]
    fn zero_hold_window_fails_validation() {
        let mut config = MaitredConfig::default();
        config.holds.taxi_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("taxi_secs"))));
    }

    #[test]
    fn zero_batch_limit_fails_validation() {
        let mut config = MaitredConfig::default();
        config.sweeper.batch_limit = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("batch_limit"))));
    }

    #[test]
    fn all_errors_are_collected_not_just_first() {
        let mut config = MaitredConfig::default();
        config.storage.database_path = "".to_string();
        config.holds.supplies_secs = -1;
        config.counters.default_shards = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = MaitredConfig::default();
        config.storage.database_path = "/tmp/maitred-test.db".to_string();
        config.holds.taxi_secs = 120;
        config.sweeper.interval_secs = 30;
        config.gate.expiry_buffer_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
