//! Configuration module for the upgrade-order validator.
//!
//! This module handles all configuration-related functionality:
//! - Reading the required environment bindings
//! - Parsing the optional `upgrade-orders.yaml` tunables file
//! - Validation of configuration values and the module selection

mod parser;
mod settings;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_ARTIFACT_URL, ENV_LOG_DIR, ENV_POLL_INTERVAL,
    ENV_STEP_TIMEOUT, find_config_file,
};
pub use settings::{
    ArtifactSettings, Bindings, CommandSettings, ENV_CONVERTER, ENV_GOVERNANCE_CLIENT,
    ENV_IDENTITY_PEM, ENV_NETWORK_URL, ENV_WALLET, LogSettings, PollingConfig, PollingSettings,
    Settings, ValidatorConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
