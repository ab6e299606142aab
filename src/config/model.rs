// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::engine::flow::{FlowOptions, DEFAULT_CONCURRENCY_LIMIT};
use crate::task::RetryPolicy;
use crate::types::BackoffKind;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// concurrency_limit = 4
///
/// [default]
/// max_attempts = 2
/// backoff = "exponential"
/// delay = "100ms"
///
/// [task.fetch]
/// max_attempts = 5
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Fallback retry settings from `[default]`.
    #[serde(default)]
    pub default: RetrySection,

    /// Per-task retry overrides from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, RetrySection>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Maximum number of tasks dispatched at once. Defaults to
    /// [`DEFAULT_CONCURRENCY_LIMIT`].
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}

impl ConfigSection {
    pub fn effective_concurrency_limit(&self) -> usize {
        self.concurrency_limit.unwrap_or(DEFAULT_CONCURRENCY_LIMIT)
    }
}

/// Retry settings, used by both `[default]` and `[task.<name>]`.
///
/// Every field is optional; a task section inherits unset fields from
/// `[default]`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// `"none"`, `"fixed"`, `"exponential"` or `"exponential_jitter"`.
    #[serde(default)]
    pub backoff: Option<BackoffKind>,

    /// Base delay (e.g. `"250ms"`, `"2s"`).
    #[serde(default)]
    pub delay: Option<String>,

    /// Growth factor for exponential backoff.
    #[serde(default)]
    pub multiplier: Option<f64>,

    /// Upper bound for exponential backoff.
    #[serde(default)]
    pub max_delay: Option<String>,

    /// Random jitter fraction in `[0, 1]`.
    #[serde(default)]
    pub jitter: Option<f64>,
}

impl RetrySection {
    pub fn is_empty(&self) -> bool {
        *self == RetrySection::default()
    }

    /// Fill unset fields from `fallback`.
    pub fn merged_with(&self, fallback: &RetrySection) -> RetrySection {
        RetrySection {
            max_attempts: self.max_attempts.or(fallback.max_attempts),
            backoff: self.backoff.or(fallback.backoff),
            delay: self.delay.clone().or_else(|| fallback.delay.clone()),
            multiplier: self.multiplier.or(fallback.multiplier),
            max_delay: self.max_delay.clone().or_else(|| fallback.max_delay.clone()),
            jitter: self.jitter.or(fallback.jitter),
        }
    }
}

/// Validated configuration.
///
/// Built from a [`RawConfigFile`] through `TryFrom`, which checks every value
/// and resolves the retry sections into [`RetryPolicy`] values.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: RetrySection,
    pub task: BTreeMap<String, RetrySection>,
    default_retry: Option<RetryPolicy>,
    task_retry: BTreeMap<String, RetryPolicy>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        default_retry: Option<RetryPolicy>,
        task_retry: BTreeMap<String, RetryPolicy>,
    ) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            task: raw.task,
            default_retry,
            task_retry,
        }
    }

    pub fn default_retry(&self) -> Option<&RetryPolicy> {
        self.default_retry.as_ref()
    }

    pub fn task_retry(&self, name: &str) -> Option<&RetryPolicy> {
        self.task_retry.get(name)
    }

    /// Options for a `Flow` built from this configuration.
    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            concurrency_limit: self.config.effective_concurrency_limit(),
            default_retry: self.default_retry.clone(),
            task_retry: self.task_retry.clone(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile::new_unchecked(RawConfigFile::default(), None, BTreeMap::new())
    }
}
