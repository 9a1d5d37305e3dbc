//! Layered configuration: defaults < TOML file < environment < CLI flags.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soilscan_upload::{DEFAULT_ENDPOINT, validate_analysis_endpoint};
use thiserror::Error;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Config file.
    File,
    /// Environment variable.
    Environment,
    /// Command-line flag.
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher wins).
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// Effective value.
    pub value: T,
    /// Layer that supplied it.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Creates a value from `source`.
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Replaces the value when `source` has equal or higher precedence.
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() >= self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Effective client configuration.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Analysis endpoint URL.
    pub endpoint: ConfigValue<String>,
    /// JSON file backing the key-value store.
    pub store_path: ConfigValue<PathBuf>,
    /// HTTP timeout in seconds; `0` disables it.
    pub request_timeout_secs: ConfigValue<u64>,
}

impl LayeredConfig {
    /// Creates a configuration holding only defaults.
    pub fn with_defaults() -> Self {
        Self {
            endpoint: ConfigValue::new(DEFAULT_ENDPOINT.to_string(), ConfigSource::Default),
            store_path: ConfigValue::new(default_store_path(), ConfigSource::Default),
            request_timeout_secs: ConfigValue::new(DEFAULT_TIMEOUT_SECS, ConfigSource::Default),
        }
    }

    /// Applies values from a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_from_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(endpoint) = file_config.endpoint {
            self.endpoint.update(endpoint, ConfigSource::File);
        }
        if let Some(store_path) = file_config.store_path {
            self.store_path.update(store_path, ConfigSource::File);
        }
        if let Some(timeout) = file_config.request_timeout_secs {
            self.request_timeout_secs.update(timeout, ConfigSource::File);
        }

        Ok(self)
    }

    /// Applies `path` when it exists; otherwise returns `self` unchanged.
    ///
    /// # Errors
    /// Same as [`LayeredConfig::load_from_file`] for an existing file.
    pub fn load_from_optional_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().is_file() {
            self.load_from_file(path)
        } else {
            Ok(self)
        }
    }

    /// Applies `SOILSCAN_ENDPOINT`, `SOILSCAN_STORE` and `SOILSCAN_TIMEOUT_SECS`.
    pub fn load_from_env(mut self) -> Self {
        if let Some(endpoint) = non_empty_var("SOILSCAN_ENDPOINT") {
            self.endpoint.update(endpoint, ConfigSource::Environment);
        }

        if let Some(store_path) = non_empty_var("SOILSCAN_STORE") {
            self.store_path
                .update(PathBuf::from(store_path), ConfigSource::Environment);
        }

        if let Ok(raw) = env::var("SOILSCAN_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(timeout) => self
                    .request_timeout_secs
                    .update(timeout, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid SOILSCAN_TIMEOUT_SECS value '{}': expected whole seconds",
                    raw
                ),
            }
        }

        self
    }

    /// Applies command-line overrides.
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint.update(endpoint, ConfigSource::Cli);
        }
        if let Some(store_path) = overrides.store_path {
            self.store_path.update(store_path, ConfigSource::Cli);
        }
        if let Some(timeout) = overrides.request_timeout_secs {
            self.request_timeout_secs.update(timeout, ConfigSource::Cli);
        }
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for an unusable endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_analysis_endpoint(&self.endpoint.value).map_err(|error| ConfigError::Invalid {
            key: "endpoint".to_string(),
            reason: error.to_string(),
        })?;
        Ok(())
    }

    /// HTTP timeout, `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs.value {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Effective values and their sources, keyed by name.
    pub fn to_inspection_map(&self) -> BTreeMap<&'static str, (String, ConfigSource)> {
        BTreeMap::from([
            (
                "endpoint",
                (self.endpoint.value.clone(), self.endpoint.source),
            ),
            (
                "store_path",
                (
                    self.store_path.value.display().to_string(),
                    self.store_path.source,
                ),
            ),
            (
                "request_timeout_secs",
                (
                    self.request_timeout_secs.value.to_string(),
                    self.request_timeout_secs.source,
                ),
            ),
        ])
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Keys accepted in the TOML file.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    endpoint: Option<String>,
    store_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

/// Command-line overrides.
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    /// `--endpoint`.
    pub endpoint: Option<String>,
    /// `--store`.
    pub store_path: Option<PathBuf>,
    /// `--timeout-secs`.
    pub request_timeout_secs: Option<u64>,
}

/// Default config file location (`<config_dir>/soilscan/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soilscan").join("config.toml"))
}

/// Default store location (`<data_local_dir>/soilscan/store.json`).
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("soilscan")
        .join("store.json")
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this schema.
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value violates its constraints.
    #[error("invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Offending key.
        key: String,
        /// Explanation.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.endpoint.value, DEFAULT_ENDPOINT);
        assert_eq!(config.endpoint.source, ConfigSource::Default);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(config.store_path.value.ends_with("soilscan/store.json"));
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(1, ConfigSource::Default);

        value.update(2, ConfigSource::File);
        assert_eq!(value.value, 2);

        value.update(3, ConfigSource::Environment);
        assert_eq!(value.value, 3);

        value.update(4, ConfigSource::Cli);
        assert_eq!(value.value, 4);
        assert_eq!(value.source, ConfigSource::Cli);

        // Lower precedence should not override
        value.update(5, ConfigSource::File);
        assert_eq!(value.value, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
endpoint = "https://soil.example.test/api/analyze"
store_path = "/tmp/soilscan-test/store.json"
request_timeout_secs = 0
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults()
            .load_from_file(file.path())
            .unwrap();

        assert_eq!(config.endpoint.value, "https://soil.example.test/api/analyze");
        assert_eq!(config.endpoint.source, ConfigSource::File);
        assert_eq!(
            config.store_path.value,
            PathBuf::from("/tmp/soilscan-test/store.json")
        );
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "guest_limit = 50").unwrap();

        let error = LayeredConfig::with_defaults()
            .load_from_file(file.path())
            .unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_optional_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = LayeredConfig::with_defaults()
            .load_from_optional_file(dir.path().join("absent.toml"))
            .unwrap();
        assert_eq!(config.endpoint.source, ConfigSource::Default);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"endpoint = "http://file.example.test/api/analyze""#).unwrap();

        // Safety: env mutation is serialized with #[serial] and reverted below.
        unsafe {
            env::set_var("SOILSCAN_ENDPOINT", "http://env.example.test/api/analyze");
            env::set_var("SOILSCAN_TIMEOUT_SECS", "not-a-number");
        }

        let config = LayeredConfig::with_defaults()
            .load_from_file(file.path())
            .unwrap()
            .load_from_env();

        // Safety: see above.
        unsafe {
            env::remove_var("SOILSCAN_ENDPOINT");
            env::remove_var("SOILSCAN_TIMEOUT_SECS");
        }

        assert_eq!(config.endpoint.value, "http://env.example.test/api/analyze");
        assert_eq!(config.endpoint.source, ConfigSource::Environment);
        assert_eq!(config.request_timeout_secs.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            endpoint: Some("ftp://nope".to_string()),
            store_path: None,
            request_timeout_secs: Some(5),
        });

        assert_eq!(config.endpoint.source, ConfigSource::Cli);
        assert_eq!(config.store_path.source, ConfigSource::Default);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_inspection_map() {
        let map = LayeredConfig::with_defaults().to_inspection_map();
        assert_eq!(map.len(), 3);
        let (timeout, source) = &map["request_timeout_secs"];
        assert_eq!(timeout, "30");
        assert_eq!(*source, ConfigSource::Default);
    }
}
