//! Configuration types for the upgrade-order validator.
//!
//! A [`ValidatorConfig`] is built once at startup from three layers: the
//! required environment bindings, an optional `upgrade-orders.yaml` holding
//! tunables, and command-line overrides. It is immutable afterwards and passed
//! by reference to each component.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::DEFAULT_ARTIFACT_URL;
use crate::error::{ConfigError, Result};

/// Environment variable naming the network entry endpoint.
pub const ENV_NETWORK_URL: &str = "NNS_URL";

/// Environment variable naming the operator identity PEM file.
pub const ENV_IDENTITY_PEM: &str = "PEM";

/// Environment variable naming the funding wallet canister.
pub const ENV_WALLET: &str = "WALLET";

/// Environment variable naming the governance-client binary.
pub const ENV_GOVERNANCE_CLIENT: &str = "SNS_CLI";

/// Environment variable naming the Candid-to-JSON converter binary.
pub const ENV_CONVERTER: &str = "IDL2JSON";

/// The complete, immutable configuration of a run.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Required pre-flight bindings.
    pub bindings: Bindings,
    /// Tunables.
    pub settings: Settings,
}

/// Pre-flight bindings supplied by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    /// Network entry endpoint.
    pub network_url: String,
    /// Operator identity (PEM file).
    pub identity_pem: PathBuf,
    /// Funding wallet canister id.
    pub funding_wallet: String,
    /// Governance-client binary.
    pub governance_client: PathBuf,
    /// Candid-to-JSON converter binary.
    pub converter: PathBuf,
}

/// Tunables, as read from the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Convergence polling.
    #[serde(default)]
    pub polling: PollingSettings,
    /// Artifact retrieval and staging.
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    /// Result log location.
    #[serde(default)]
    pub log: LogSettings,
    /// Collaborator binary invocation.
    #[serde(default)]
    pub commands: CommandSettings,
}

/// Polling tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingSettings {
    /// Seconds between two convergence probes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Seconds a single upgrade step may take.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

/// Artifact tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSettings {
    /// Base URL of the build download server.
    #[serde(default = "default_artifact_url")]
    pub base_url: String,
    /// Directory artifacts are staged in before publishing.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

/// Log tunables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSettings {
    /// Directory the result log is created in (system temp dir if unset).
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Command tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSettings {
    /// Seconds a single collaborator invocation may take.
    #[serde(default = "default_command_timeout_secs")]
    pub timeout_secs: u64,
}

/// Polling parameters handed to the upgrade driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay between two probes.
    pub interval: Duration,
    /// Deadline for one upgrade step, from upload to convergence.
    pub step_timeout: Duration,
}

const fn default_interval_secs() -> u64 {
    10
}

const fn default_step_timeout_secs() -> u64 {
    600
}

fn default_artifact_url() -> String {
    String::from(DEFAULT_ARTIFACT_URL)
}

const fn default_command_timeout_secs() -> u64 {
    crate::network::DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            base_url: default_artifact_url(),
            work_dir: None,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl PollingConfig {
    /// Creates polling parameters.
    #[must_use]
    pub const fn new(interval: Duration, step_timeout: Duration) -> Self {
        Self {
            interval,
            step_timeout,
        }
    }
}

impl Bindings {
    /// Reads the bindings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or empty variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingEnvVar {
                        name: name.to_string(),
                    }
                    .into()
                })
        };

        Ok(Self {
            network_url: require(ENV_NETWORK_URL)?,
            identity_pem: PathBuf::from(require(ENV_IDENTITY_PEM)?),
            funding_wallet: require(ENV_WALLET)?,
            governance_client: PathBuf::from(require(ENV_GOVERNANCE_CLIENT)?),
            converter: PathBuf::from(require(ENV_CONVERTER)?),
        })
    }

    /// Reads the bindings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl ValidatorConfig {
    /// Polling parameters for the upgrade driver.
    #[must_use]
    pub const fn polling(&self) -> PollingConfig {
        PollingConfig::new(
            Duration::from_secs(self.settings.polling.interval_secs),
            Duration::from_secs(self.settings.polling.step_timeout_secs),
        )
    }

    /// Timeout for a single collaborator invocation.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.commands.timeout_secs)
    }

    /// Directory artifacts are staged in.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.settings
            .artifacts
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("upgrade-orders-artifacts"))
    }

    /// Directory the result log is created in.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.settings
            .log
            .dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
