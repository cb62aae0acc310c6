//! Error types for the upgrade-order validator.
//!
//! This module provides the error hierarchy for every stage of a sweep:
//! configuration, talking to the governed network, artifact integrity,
//! upgrade convergence, and result reporting.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::canister::ModuleType;

/// The main error type for the upgrade-order validator.
#[derive(Debug, Error)]
pub enum UpgradeOrdersError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors talking to the governed network or the artifact store.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Artifact integrity errors.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// A module never converged within its step deadline.
    #[error("Upgrade timeout: {0}")]
    Timeout(#[from] UpgradeTimeoutError),

    /// Result log and report errors.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// No module types were selected.
    #[error("At least one module type is required")]
    EmptyModuleSet,

    /// A module type was selected more than once.
    #[error("Module type '{module}' was given more than once")]
    DuplicateModuleType {
        /// The duplicated module type.
        module: ModuleType,
    },

    /// The token does not name a module type.
    #[error("Unknown module type '{token}' (expected one of: root, governance, ledger, swap, index)")]
    UnknownModuleType {
        /// The unrecognised token.
        token: String,
    },

    /// The module type exists but cannot be upgraded in a live test.
    #[error("Module type '{module}' cannot be tested: {reason}")]
    UntestableModuleType {
        /// The rejected module type.
        module: ModuleType,
        /// Why it is excluded.
        reason: String,
    },
}

/// Errors talking to the governed network and artifact store.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never completed (connection reset, timeout, DNS).
    #[error("Transport failure: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// An HTTP endpoint answered with a non-success status.
    #[error("Request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// The governance client exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        /// Program that was run.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A collaborator binary could not be started at all.
    #[error("Failed to start '{program}': {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Description of the failure.
        message: String,
    },

    /// A response could not be interpreted.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The governing system refused the request.
    #[error("Request rejected: {message}")]
    Rejected {
        /// Reason given by the governing system.
        message: String,
    },

    /// No artifact exists for the module at the requested version.
    #[error("No {module} artifact published for version {version}")]
    ArtifactNotFound {
        /// Module the artifact was requested for.
        module: ModuleType,
        /// Requested version.
        version: String,
    },
}

/// Artifact integrity errors.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// Decompression produced content with the same hash as its input.
    #[error("Compressed and decompressed {module} artifacts share hash {hash}")]
    HashesIdentical {
        /// Module whose artifact failed the check.
        module: ModuleType,
        /// The shared hash.
        hash: String,
    },

    /// The compressed artifact could not be decompressed.
    #[error("Failed to decompress {module} artifact with {codec}: {reason}")]
    DecompressionFailed {
        /// Module whose artifact failed the check.
        module: ModuleType,
        /// Codec in use.
        codec: &'static str,
        /// Description of the failure.
        reason: String,
    },
}

/// A module did not converge on its expected version or content hash.
#[derive(Debug, Error)]
#[error("{module} did not report {expectation} '{expected}' within {waited:?} (last observed: {})",
    .last_observed.as_deref().unwrap_or("nothing"))]
pub struct UpgradeTimeoutError {
    /// Module that failed to converge.
    pub module: ModuleType,
    /// What was being compared ("version" or "module hash").
    pub expectation: &'static str,
    /// Expected value.
    pub expected: String,
    /// Last value observed before the deadline, if any.
    pub last_observed: Option<String>,
    /// How long the step waited.
    pub waited: Duration,
}

/// Result log and report errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// An attempt for the same ordering, step and variant already exists.
    #[error("Attempt already recorded for ordering #{ordering}, step {step} ({variant})")]
    DuplicateAttempt {
        /// Ordering index.
        ordering: usize,
        /// Step index.
        step: usize,
        /// Artifact variant.
        variant: String,
    },

    /// The log file could not be written.
    #[error("Failed to write log {path}: {message}")]
    WriteFailed {
        /// Path of the log or report.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Serialization error.
    #[error("Report serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Result type alias for validator operations.
pub type Result<T> = std::result::Result<T, UpgradeOrdersError>;

impl UpgradeOrdersError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is transient and the operation may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error must terminate the process.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl NetworkError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an HTTP request error.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if retrying within the step deadline may succeed.
    ///
    /// Unparseable responses count as transient: a canister in the middle of
    /// an upgrade answers queries with errors until it restarts.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::CommandFailed { .. } | Self::InvalidResponse { .. } => {
                true
            }
            Self::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            Self::Spawn { .. } | Self::Rejected { .. } | Self::ArtifactNotFound { .. } => false,
        }
    }
}

impl ReportError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}
