use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BridgeError, Result};

pub const NATIVE_LIB_ENV: &str = "CQLBRIDGE_NATIVE_LIB";
pub const LOG_ENV: &str = "CQLBRIDGE_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";

/// Where the native engine comes from and how chatty the bridge is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Shared library to load the engine from. `None` uses the linked engine.
    pub native_library: Option<PathBuf>,
    /// `tracing` filter directive, e.g. `cqlbridge=debug`.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            native_library: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_env_overrides(lookup)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|err| BridgeError::Config(err.to_string()))
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| BridgeError::Config(err.to_string()))
    }

    /// Loads a config file; `.toml` files need the `toml-config` feature,
    /// everything else is read as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|err| {
            BridgeError::Config(format!("failed to read {}: {err}", path.display()))
        })?;

        #[cfg(feature = "toml-config")]
        if path.extension().is_some_and(|ext| ext == "toml") {
            return Self::from_toml_str(&source);
        }

        Self::from_yaml_str(&source)
    }

    /// Environment variables win over values from the file. Blank values
    /// count as unset.
    pub fn with_env_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            native_library: env_value(&lookup, NATIVE_LIB_ENV)
                .map(PathBuf::from)
                .or(self.native_library),
            log_filter: env_value(&lookup, LOG_ENV).unwrap_or(self.log_filter),
        }
    }
}

fn env_value(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}
