// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BehatError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BehatError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_runner(&raw)?;
        validate_pool(&raw)?;
        validate_exit_codes(&raw)?;

        let max_duration = raw
            .run
            .max_duration
            .as_deref()
            .map(|s| duration_field("[run].max_duration", s))
            .transpose()?;
        let process_timeout = duration_field("[pool].timeout", &raw.pool.timeout)?;
        let long_running_threshold =
            duration_field("[report].long_running_threshold", &raw.report.long_running_threshold)?;

        Ok(ConfigFile::new_unchecked(
            raw,
            max_duration,
            process_timeout,
            long_running_threshold,
        ))
    }
}

/// Validate a raw config without keeping the result.
pub fn validate_config(raw: &RawConfigFile) -> Result<()> {
    ConfigFile::try_from(raw.clone()).map(|_| ())
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    let parsed = parse_duration(value)
        .map_err(|e| BehatError::ConfigError(format!("{field}: {e}")))?;
    if parsed.is_zero() {
        return Err(BehatError::ConfigError(format!(
            "{field} must be greater than zero (got \"{value}\")"
        )));
    }
    Ok(parsed)
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.bin.trim().is_empty() {
        return Err(BehatError::ConfigError(
            "[runner].bin must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_pool(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pool.max_processes == 0 {
        return Err(BehatError::ConfigError(
            "[pool].max_processes must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_exit_codes(cfg: &RawConfigFile) -> Result<()> {
    let codes = [
        ("environment_timeout", cfg.exit_codes.environment_timeout),
        ("transport_error", cfg.exit_codes.transport_error),
        ("scenario_failure", cfg.exit_codes.scenario_failure),
    ];

    for (i, (name, code)) in codes.iter().enumerate() {
        if *code == 0 {
            return Err(BehatError::ConfigError(format!(
                "[exit_codes].{name} must not be 0 (0 means success)"
            )));
        }
        for (other, other_code) in &codes[i + 1..] {
            if code == other_code {
                return Err(BehatError::ConfigError(format!(
                    "[exit_codes].{name} and [exit_codes].{other} are both {code}"
                )));
            }
        }
    }
    Ok(())
}
