//! Configuration file handling for pregyp
//!
//! A `.pregyp.{json,yaml,yml}` file supplies default option values. Anything
//! given on the command line or inherited from the environment wins over it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::{OptionValue, OptionsMap};

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unknown working directory: {0}")]
    UnknownWorkingDirectory(String),
    #[error("Unable to parse YAML config file {}: {source}", .path.display())]
    Yaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("Unable to parse JSON config file {}: {source}", .path.display())]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Scalar option value as written in a config file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<ConfigValue> for OptionValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Bool(b) => OptionValue::Bool(b),
            ConfigValue::Int(i) => OptionValue::Str(i.to_string()),
            ConfigValue::Float(f) => OptionValue::Str(f.to_string()),
            ConfigValue::Str(s) => OptionValue::Str(s),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub options: BTreeMap<String, ConfigValue>,
}

/// List of supported configuration file names
const FILENAMES: [&str; 3] = [".pregyp.json", ".pregyp.yaml", ".pregyp.yml"];

impl Config {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, or
    /// `ConfigError::Yaml`/`ConfigError::Json` if parsing fails.
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        let config: Config = if file.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Json {
                source: e,
                path: file.to_path_buf(),
            })?
        } else if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml {
                source: e,
                path: file.to_path_buf(),
            })?
        };
        Ok(config)
    }

    /// Searches for a configuration file in `start` and its parents.
    #[must_use]
    pub fn find_config(start: &Path) -> Option<PathBuf> {
        let mut path = start.to_path_buf();
        debug!("Searching for config file in {}", start.display());
        loop {
            for file in &FILENAMES {
                let config_path = path.join(file);
                if config_path.exists() {
                    info!("Found config file: {}", config_path.display());
                    return Some(config_path);
                }
            }
            if !path.pop() {
                return None;
            }
        }
    }

    /// Find and load the configuration for `start`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a config file exists but cannot be loaded.
    pub fn discover(start: &Path) -> Result<Option<(Config, PathBuf)>, ConfigError> {
        Self::find_config(start)
            .map(|path| Self::from_file(&path).map(|config| (config, path)))
            .transpose()
    }

    /// The configured options, ready to be layered under other sources.
    #[must_use]
    pub fn into_options(self) -> OptionsMap {
        self.options
            .into_iter()
            .map(|(name, value)| (name, OptionValue::from(value)))
            .collect()
    }
}

/// The directory config discovery starts from: `--directory` when given,
/// otherwise the current directory.
///
/// # Errors
///
/// Returns `ConfigError::UnknownWorkingDirectory` if the cwd cannot be determined.
pub fn search_root(options: &OptionsMap) -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir()
        .map_err(|e| ConfigError::UnknownWorkingDirectory(e.to_string()))?;
    Ok(match options.get_str("directory") {
        Some(dir) if !dir.is_empty() => cwd.join(dir),
        _ => cwd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pregyp.json");
        std::fs::write(
            &path,
            r#"{"options": {"arch": "arm64", "debug": true, "jobs": 8}}"#,
        )
        .unwrap();
        let options = Config::from_file(&path).unwrap().into_options();
        assert_eq!(options.get_str("arch"), Some("arm64"));
        assert!(options.flag("debug"));
        assert_eq!(options.get_str("jobs"), Some("8"));
    }

    #[test]
    fn test_from_file_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pregyp.yaml");
        std::fs::write(&path, "options:\n  proxy: http://proxy:3128\n  debug: false\n").unwrap();
        let options = Config::from_file(&path).unwrap().into_options();
        assert_eq!(options.get_str("proxy"), Some("http://proxy:3128"));
        assert_eq!(options.get("debug"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pregyp.yml");
        std::fs::write(&path, "\n").unwrap();
        assert!(Config::from_file(&path).unwrap().options.is_empty());
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".pregyp.yaml"), "options:\n  arch: ia32\n").unwrap();

        let (config, path) = Config::discover(&nested).unwrap().unwrap();
        assert_eq!(path, dir.path().join(".pregyp.yaml"));
        assert_eq!(config.into_options().get_str("arch"), Some("ia32"));
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".pregyp.json");
        std::fs::write(&path, "{ not json").unwrap();
        match Config::from_file(&path) {
            Err(ConfigError::Json { path: err_path, .. }) => assert_eq!(err_path, path),
            other => panic!("Expected ConfigError::Json, got: {other:?}"),
        }
    }
}
