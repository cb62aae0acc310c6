//! Configuration parser for loading settings and bindings.
//!
//! Settings come from an optional YAML file, then environment variable
//! overrides; bindings come from the environment (including a `.env` file).

use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::settings::{Bindings, Settings, ValidatorConfig};

/// Overrides the polling interval.
pub const ENV_POLL_INTERVAL: &str = "UPGRADE_ORDERS_POLL_INTERVAL_SECS";

/// Overrides the step timeout.
pub const ENV_STEP_TIMEOUT: &str = "UPGRADE_ORDERS_STEP_TIMEOUT_SECS";

/// Overrides the artifact download server.
pub const ENV_ARTIFACT_URL: &str = "UPGRADE_ORDERS_ARTIFACT_URL";

/// Overrides the log directory.
pub const ENV_LOG_DIR: &str = "UPGRADE_ORDERS_LOG_DIR";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["upgrade-orders.yaml", "upgrade-orders.yml"];

/// Configuration parser for loading validator configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the full configuration from the process environment and an
    /// optional settings file.
    ///
    /// When `config_path` is `None`, the current directory and its parents are
    /// searched for a default settings file; if none exists, defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound file cannot be parsed or a binding is missing.
    pub fn load(&self, config_path: Option<&Path>) -> Result<ValidatorConfig> {
        self.load_dotenv()?;

        let mut settings = match config_path {
            Some(path) => self.load_file(path)?,
            None => match find_config_file(".") {
                Some(path) => self.load_file(&path)?,
                None => {
                    debug!("No settings file found, using defaults");
                    Settings::default()
                }
            },
        };

        Self::apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;

        Ok(ValidatorConfig {
            bindings: Bindings::from_env()?,
            settings,
        })
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Settings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        let settings: Settings = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        Ok(settings)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric override is not a number.
    pub fn apply_env_overrides(
        settings: &mut Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup(ENV_POLL_INTERVAL) {
            debug!("Overriding polling.interval_secs from environment");
            settings.polling.interval_secs = parse_secs(ENV_POLL_INTERVAL, &value)?;
        }

        if let Some(value) = lookup(ENV_STEP_TIMEOUT) {
            debug!("Overriding polling.step_timeout_secs from environment");
            settings.polling.step_timeout_secs = parse_secs(ENV_STEP_TIMEOUT, &value)?;
        }

        if let Some(url) = lookup(ENV_ARTIFACT_URL) {
            debug!("Overriding artifacts.base_url from environment");
            settings.artifacts.base_url = url;
        }

        if let Some(dir) = lookup(ENV_LOG_DIR) {
            debug!("Overriding log.dir from environment");
            settings.log.dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Parses a number of seconds from an environment override.
fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        ConfigError::validation(format!("'{value}' is not a number of seconds"), name).into()
    })
}

/// Finds a settings file in the given directory or its parents.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found settings file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_empty_settings() {
        let parser = ConfigParser::new();
        let settings = parser.parse_yaml("", None).unwrap();
        assert_eq!(settings.polling.interval_secs, 10);
    }

    #[test]
    fn test_parse_full_settings() {
        let yaml = r"
polling:
  interval_secs: 5
  step_timeout_secs: 300
artifacts:
  base_url: https://mirror.example.org
  work_dir: /var/tmp/artifacts
log:
  dir: /var/log/upgrade-orders
commands:
  timeout_secs: 60
";
        let parser = ConfigParser::new();
        let settings = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(settings.polling.interval_secs, 5);
        assert_eq!(settings.polling.step_timeout_secs, 300);
        assert_eq!(settings.artifacts.base_url, "https://mirror.example.org");
        assert_eq!(settings.log.dir, Some(PathBuf::from("/var/log/upgrade-orders")));
        assert_eq!(settings.commands.timeout_secs, 60);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let parser = ConfigParser::new();
        assert!(parser.parse_yaml("polling:\n  intervall_secs: 5\n", None).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_POLL_INTERVAL, "2"),
            (ENV_STEP_TIMEOUT, "30"),
            (ENV_LOG_DIR, "/tmp/logs"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        ConfigParser::apply_env_overrides(&mut settings, |k| {
            vars.get(k).map(|v| (*v).to_string())
        })
        .unwrap();

        assert_eq!(settings.polling.interval_secs, 2);
        assert_eq!(settings.polling.step_timeout_secs, 30);
        assert_eq!(settings.log.dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_non_numeric_override_rejected() {
        let mut settings = Settings::default();
        let result = ConfigParser::apply_env_overrides(&mut settings, |k| {
            (k == ENV_POLL_INTERVAL).then(|| String::from("soon"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("upgrade-orders.yaml"), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("upgrade-orders.yaml"));
    }
}
