//! Run configuration: the key-value document named in the external
//! interfaces (output/seed directories, the oracle binary, logging).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration document, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub basic: BasicConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub logs: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    pub output_directory: PathBuf,
    pub seed_directory: PathBuf,
    pub binary_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub backend: OracleBackend,
    /// Per-request timeout, in milliseconds, before the worker is restarted.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum consecutive worker restarts before a phase aborts.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: OracleBackend::default(),
            timeout_ms: default_timeout_ms(),
            max_restarts: default_max_restarts(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_restarts() -> u32 {
    3
}

/// Selects the oracle backend. Only `Process` is implemented; the variant
/// exists so additional backends can be added without breaking config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleBackend {
    #[default]
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads and parses a configuration document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grammarminer.toml");
        std::fs::write(
            &path,
            r#"
            [basic]
            output_directory = "out"
            seed_directory = "seeds"
            binary_file = "sut"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.basic.output_directory, PathBuf::from("out"));
        assert_eq!(config.oracle.backend, OracleBackend::Process);
        assert_eq!(config.oracle.timeout_ms, 5_000);
        assert_eq!(config.logs.log_level, "info");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Config::load("/nonexistent/grammarminer.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grammarminer.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
