#![allow(dead_code)]

use dagflow::config::{ConfigFile, RawConfigFile, RetrySection};
use dagflow::errors::Result;
use dagflow::types::BackoffKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.config.config.concurrency_limit = Some(limit);
        self
    }

    pub fn with_default(mut self, section: RetrySection) -> Self {
        self.config.default = section;
        self
    }

    pub fn with_task(mut self, name: &str, section: RetrySection) -> Self {
        self.config.task.insert(name.to_string(), section);
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `[default]` / `[task.<name>]` retry section.
#[derive(Default)]
pub struct RetrySectionBuilder {
    section: RetrySection,
}

impl RetrySectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.section.max_attempts = Some(n);
        self
    }

    pub fn backoff(mut self, kind: BackoffKind) -> Self {
        self.section.backoff = Some(kind);
        self
    }

    pub fn delay(mut self, d: &str) -> Self {
        self.section.delay = Some(d.to_string());
        self
    }

    pub fn multiplier(mut self, m: f64) -> Self {
        self.section.multiplier = Some(m);
        self
    }

    pub fn max_delay(mut self, d: &str) -> Self {
        self.section.max_delay = Some(d.to_string());
        self
    }

    pub fn jitter(mut self, j: f64) -> Self {
        self.section.jitter = Some(j);
        self
    }

    pub fn build(self) -> RetrySection {
        self.section
    }
}
