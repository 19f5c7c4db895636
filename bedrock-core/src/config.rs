//! Configuration source
//!
//! Every setting is resolved by name with a default. A missing or malformed
//! value degrades to the default and never to an error.
//!
//! Production reads the process environment (after `.env` loading); tests
//! hand in a `HashMap` so they never touch global state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

/// Named-setting lookup backend.
///
/// Implementors only provide [`ConfigSource::lookup`]; typed getters are
/// provided on top of it.
pub trait ConfigSource {
    /// Raw value for `name`, or `None` when unset.
    fn lookup(&self, name: &str) -> Option<String>;

    /// String setting. An empty value counts as set.
    fn get_string(&self, name: &str, default: &str) -> String {
        match self.lookup(name) {
            Some(value) => {
                trace_resolved(name, &value);
                value
            }
            None => {
                trace_default(name, &default);
                default.to_string()
            }
        }
    }

    /// Signed integer setting; unparseable values resolve to `default`.
    fn get_int(&self, name: &str, default: i64) -> i64 {
        parse_or_default(self, name, default, |raw| raw.parse::<i64>().ok())
    }

    /// Unsigned integer setting; negative or unparseable values resolve to `default`.
    fn get_uint(&self, name: &str, default: u64) -> u64 {
        parse_or_default(self, name, default, |raw| raw.parse::<u64>().ok())
    }

    /// Unsigned 32-bit setting, used for pool sizes.
    fn get_u32(&self, name: &str, default: u32) -> u32 {
        parse_or_default(self, name, default, |raw| raw.parse::<u32>().ok())
    }

    /// Boolean setting: `true/false`, `1/0`, `yes/no`, `on/off` (any case).
    fn get_bool(&self, name: &str, default: bool) -> bool {
        parse_or_default(self, name, default, parse_bool)
    }

    /// Duration in whole seconds.
    fn get_secs(&self, name: &str, default_secs: u64) -> Duration {
        Duration::from_secs(self.get_uint(name, default_secs))
    }

    /// Comma-separated list. Entries are trimmed and empty entries dropped;
    /// a list with no entries left resolves to `default`.
    fn get_list(&self, name: &str, default: &[&str]) -> Vec<String> {
        let items: Vec<String> = self
            .lookup(name)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            debug!(setting = name, "using default list");
            default.iter().map(|item| item.to_string()).collect()
        } else {
            items
        }
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Env;

impl ConfigSource for Env {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: ConfigSource + ?Sized> ConfigSource for &S {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}

fn parse_or_default<S, T, F>(source: &S, name: &str, default: T, parse: F) -> T
where
    S: ConfigSource + ?Sized,
    T: std::fmt::Display,
    F: FnOnce(&str) -> Option<T>,
{
    let Some(raw) = source.lookup(name) else {
        trace_default(name, &default);
        return default;
    };

    match parse(raw.trim()) {
        Some(value) => {
            trace_resolved(name, &value);
            value
        }
        None => {
            warn!(setting = name, value = %raw, %default, "unparseable setting, using default");
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_secret(name: &str) -> bool {
    name.contains("PASSWORD")
}

fn trace_resolved(name: &str, value: &dyn std::fmt::Display) {
    if is_secret(name) {
        debug!(setting = name, "resolved from source");
    } else {
        debug!(setting = name, value = %value, "resolved from source");
    }
}

fn trace_default(name: &str, default: &dyn std::fmt::Display) {
    if is_secret(name) {
        debug!(setting = name, "unset, using default");
    } else {
        debug!(setting = name, default = %default, "unset, using default");
    }
}

/// Load environment variables from a `.env` file.
///
/// With `path = None` the current directory (and its parents) are searched
/// and a missing file is not an error. An explicit path must exist.
/// Variables already set in the process are never overwritten.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| ConfigError::dotenv(path, e))?;
            info!("Loaded configuration from {}", path.display());
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(path) => {
                info!("Loaded configuration from {}", path.display());
                Ok(Some(path))
            }
            Err(e) if e.not_found() => {
                info!("Using environment variables only (no .env file found)");
                Ok(None)
            }
            Err(e) => Err(ConfigError::dotenv(".env", e)),
        },
    }
}
