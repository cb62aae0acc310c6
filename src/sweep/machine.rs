//! Per-ordering state machine.
//!
//! Each ordering moves through provisioning, one upgrade pass with the
//! compressed artifacts and one integrity pass with the decompressed ones.
//! Any failure ends the ordering in [`OrderingPhase::Aborted`]; the sweep
//! itself always continues with the next ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canister::ModuleType;
use crate::error::{IntegrityError, Result, UpgradeOrdersError};

/// Phase of one ordering. Step numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingPhase {
    /// Nothing has happened yet.
    Init,
    /// A fresh deployment exists.
    Provisioned,
    /// Fetching and publishing the compressed artifact for a step.
    Uploading(usize),
    /// Submitting the upgrade proposal for a step.
    Proposing(usize),
    /// Waiting for the module to report the target version.
    Polling(usize),
    /// The module reports the target version.
    VersionOk(usize),
    /// The step did not converge before its deadline.
    Timeout(usize),
    /// The step was refused outright.
    Rejected(usize),
    /// All modules were upgraded; integrity checks start.
    IntegrityCheck,
    /// Compressed and decompressed hashes differ for a step.
    HashDiffOk(usize),
    /// Compressed and decompressed hashes coincide, or decompression failed.
    HashMismatch(usize),
    /// Replaying the upgrade with the decompressed artifact.
    ReUpgrade(usize),
    /// The module reports the decompressed artifact's hash.
    ContentHashOk(usize),
    /// Every check passed.
    Done,
    /// The ordering was abandoned.
    Aborted,
}

impl OrderingPhase {
    /// Returns true for phases with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for OrderingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Provisioned => write!(f, "PROVISIONED"),
            Self::Uploading(s) => write!(f, "UPLOADING({s})"),
            Self::Proposing(s) => write!(f, "PROPOSING({s})"),
            Self::Polling(s) => write!(f, "POLLING({s})"),
            Self::VersionOk(s) => write!(f, "VERSION_OK({s})"),
            Self::Timeout(s) => write!(f, "TIMEOUT({s})"),
            Self::Rejected(s) => write!(f, "REJECTED({s})"),
            Self::IntegrityCheck => write!(f, "INTEGRITY_CHECK"),
            Self::HashDiffOk(s) => write!(f, "HASH_DIFF_OK({s})"),
            Self::HashMismatch(s) => write!(f, "HASH_MISMATCH({s})"),
            Self::ReUpgrade(s) => write!(f, "RE_UPGRADE({s})"),
            Self::ContentHashOk(s) => write!(f, "CONTENT_HASH_OK({s})"),
            Self::Done => write!(f, "DONE"),
            Self::Aborted => write!(f, "ABORTED_ORDERING"),
        }
    }
}

/// Validates and records the phase transitions of one ordering.
#[derive(Debug, Clone)]
pub struct OrderingMachine {
    steps: usize,
    phase: OrderingPhase,
    history: Vec<OrderingPhase>,
}

impl OrderingMachine {
    /// Creates a machine for an ordering of `steps` modules.
    #[must_use]
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            phase: OrderingPhase::Init,
            history: vec![OrderingPhase::Init],
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> OrderingPhase {
        self.phase
    }

    /// Every phase visited so far, starting with `Init`.
    #[must_use]
    pub fn history(&self) -> &[OrderingPhase] {
        &self.history
    }

    /// Number of steps in the ordering.
    #[must_use]
    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `next` is not reachable from the current phase.
    pub fn advance(&mut self, next: OrderingPhase) -> Result<()> {
        if !self.allows(next) {
            return Err(UpgradeOrdersError::internal(format!(
                "Invalid ordering transition {} -> {next}",
                self.phase
            )));
        }

        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Ends the ordering from any non-terminal phase.
    ///
    /// Does nothing if the ordering already finished.
    pub fn abort(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = OrderingPhase::Aborted;
            self.history.push(OrderingPhase::Aborted);
        }
    }

    /// Whether `next` directly follows the current phase.
    fn allows(&self, next: OrderingPhase) -> bool {
        use OrderingPhase::{
            Aborted, ContentHashOk, Done, HashDiffOk, HashMismatch, Init, IntegrityCheck,
            Polling, Proposing, Provisioned, ReUpgrade, Rejected, Timeout, Uploading, VersionOk,
        };

        let first = 1;
        let last = self.steps;

        match (self.phase, next) {
            (Init, Provisioned | Aborted) => true,
            (Provisioned, Uploading(s)) => s == first,
            (Uploading(a), Proposing(b)) | (Proposing(a), Polling(b)) | (Polling(a), VersionOk(b)) => {
                a == b
            }
            (Uploading(a) | Proposing(a) | Polling(a) | ReUpgrade(a), Timeout(b) | Rejected(b)) => {
                a == b
            }
            (VersionOk(a), Uploading(b)) => a < last && b == a + 1,
            (VersionOk(a), IntegrityCheck) => a == last,
            (IntegrityCheck, HashDiffOk(s) | HashMismatch(s)) => s == first,
            (HashDiffOk(a), ReUpgrade(b)) | (ReUpgrade(a), ContentHashOk(b)) => a == b,
            (ContentHashOk(a), HashDiffOk(b) | HashMismatch(b)) => a < last && b == a + 1,
            (ContentHashOk(a), Done) => a == last,
            (Timeout(_) | Rejected(_) | HashMismatch(_), Aborted) => true,
            _ => false,
        }
    }
}

/// Why an ordering stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// A deployment could not be created.
    Provisioning,
    /// A step ran out of time, including transient errors that never cleared.
    Timeout,
    /// The governing system or artifact store refused a request.
    Rejected,
    /// Compressed and decompressed artifacts hash the same.
    HashMismatch,
    /// The compressed artifact could not be decompressed.
    Decompression,
}

impl AbortReason {
    /// Classifies the error that ended a step.
    #[must_use]
    pub const fn from_error(error: &UpgradeOrdersError) -> Self {
        match error {
            UpgradeOrdersError::Timeout(_) => Self::Timeout,
            UpgradeOrdersError::Integrity(IntegrityError::HashesIdentical { .. }) => {
                Self::HashMismatch
            }
            UpgradeOrdersError::Integrity(IntegrityError::DecompressionFailed { .. }) => {
                Self::Decompression
            }
            e if e.is_retryable() => Self::Timeout,
            _ => Self::Rejected,
        }
    }

    /// Phase a step moves to when it fails for this reason.
    #[must_use]
    pub const fn failure_phase(self, step: usize) -> OrderingPhase {
        match self {
            Self::Timeout => OrderingPhase::Timeout(step),
            Self::HashMismatch | Self::Decompression => OrderingPhase::HashMismatch(step),
            Self::Provisioning | Self::Rejected => OrderingPhase::Rejected(step),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Provisioning => "provisioning failed",
            Self::Timeout => "timed out",
            Self::Rejected => "rejected",
            Self::HashMismatch => "hashes identical",
            Self::Decompression => "decompression failed",
        };
        write!(f, "{s}")
    }
}

/// Final result of one ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderingOutcome {
    /// Every module converged with both artifact variants.
    Passed,
    /// No deployment could be created for the ordering.
    ProvisionFailed {
        /// Error reported by the governed network.
        message: String,
    },
    /// A step of the compressed upgrade pass failed.
    UpgradeFailed {
        /// Failing step, starting at 1.
        step: usize,
        /// Module upgraded at that step.
        module: ModuleType,
        /// Failure class.
        reason: AbortReason,
        /// Error message.
        message: String,
    },
    /// A step of the integrity pass failed.
    IntegrityFailed {
        /// Failing step, starting at 1.
        step: usize,
        /// Module checked at that step.
        module: ModuleType,
        /// Failure class.
        reason: AbortReason,
        /// Error message.
        message: String,
    },
}

impl OrderingOutcome {
    /// Returns true if the ordering passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Failing step and module, if the ordering failed at a step.
    #[must_use]
    pub const fn failed_step(&self) -> Option<(usize, ModuleType)> {
        match self {
            Self::UpgradeFailed { step, module, .. } | Self::IntegrityFailed { step, module, .. } => {
                Some((*step, *module))
            }
            Self::Passed | Self::ProvisionFailed { .. } => None,
        }
    }

    /// Short status label.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::ProvisionFailed { .. } => "provision failed",
            Self::UpgradeFailed { .. } => "upgrade failed",
            Self::IntegrityFailed { .. } => "integrity failed",
        }
    }
}

impl fmt::Display for OrderingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::ProvisionFailed { message } => write!(f, "provision failed: {message}"),
            Self::UpgradeFailed {
                step,
                module,
                reason,
                ..
            }
            | Self::IntegrityFailed {
                step,
                module,
                reason,
                ..
            } => write!(f, "{} at step {step} ({module}): {reason}", self.status()),
        }
    }
}
