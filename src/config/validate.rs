// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile, RetrySection};
use crate::errors::{DagflowError, Result};
use crate::task::{Backoff, RetryPolicy};
use crate::types::BackoffKind;

const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_JITTER: f64 = 0.1;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_global_config(&raw)?;

        let default_retry = if raw.default.is_empty() {
            None
        } else {
            Some(retry_policy("[default]", &raw.default)?)
        };

        let mut task_retry = BTreeMap::new();
        for (name, section) in raw.task.iter() {
            let merged = section.merged_with(&raw.default);
            let policy = retry_policy(&format!("[task.{name}]"), &merged)?;
            task_retry.insert(name.clone(), policy);
        }

        Ok(ConfigFile::new_unchecked(raw, default_retry, task_retry))
    }
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.concurrency_limit == Some(0) {
        return Err(DagflowError::ConfigError(
            "[config].concurrency_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Check one (already merged) retry section and turn it into a policy.
fn retry_policy(section_name: &str, section: &RetrySection) -> Result<RetryPolicy> {
    let max_attempts = section.max_attempts.unwrap_or(1);
    if max_attempts == 0 {
        return Err(DagflowError::ConfigError(format!(
            "{section_name}.max_attempts must be >= 1 (got 0)"
        )));
    }

    let delay = optional_duration(section_name, "delay", section.delay.as_deref())?
        .unwrap_or(Duration::ZERO);
    let max_delay = optional_duration(section_name, "max_delay", section.max_delay.as_deref())?
        .unwrap_or(DEFAULT_MAX_DELAY);

    let multiplier = section.multiplier.unwrap_or(DEFAULT_MULTIPLIER);
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(DagflowError::ConfigError(format!(
            "{section_name}.multiplier must be >= 1.0 (got {multiplier})"
        )));
    }

    if let Some(jitter) = section.jitter {
        if !(0.0..=1.0).contains(&jitter) {
            return Err(DagflowError::ConfigError(format!(
                "{section_name}.jitter must be between 0 and 1 (got {jitter})"
            )));
        }
    }

    let backoff = match section.backoff.unwrap_or_default() {
        BackoffKind::None => Backoff::None,
        BackoffKind::Fixed => Backoff::Fixed(delay),
        BackoffKind::Exponential => Backoff::Exponential {
            initial: delay,
            multiplier,
            max: max_delay,
            jitter: section.jitter.unwrap_or(0.0),
        },
        BackoffKind::ExponentialJitter => Backoff::Exponential {
            initial: delay,
            multiplier,
            max: max_delay,
            jitter: section.jitter.unwrap_or(DEFAULT_JITTER),
        },
    };

    Ok(RetryPolicy::attempts(max_attempts).with_backoff(backoff))
}

fn optional_duration(section_name: &str, field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| {
                DagflowError::ConfigError(format!("{section_name}.{field}: {e}"))
            })
        })
        .transpose()
}

/// Parse durations like `"250ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ))
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: '{s}'"))
}
