// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable naming the config file to use.
pub const CONFIG_ENV: &str = "DAGFLOW_CONFIG";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Checks `concurrency_limit`, attempt counts, durations, multipliers and
///   jitter fractions.
/// - Resolves `[default]` and `[task.<name>]` into retry policies.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    debug!(path = %path.display(), tasks = config.task.len(), "configuration loaded");
    Ok(config)
}

/// Config file to use when none is given on the command line:
/// `$DAGFLOW_CONFIG` if set, else `Dagflow.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("Dagflow.toml"),
    }
}

/// Load the config at `path` if given, else the default path if that file
/// exists, else an empty configuration.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_and_validate(&path)
            } else {
                debug!(path = %path.display(), "no configuration file; using defaults");
                Ok(ConfigFile::default())
            }
        }
    }
}
