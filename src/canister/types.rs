//! Module types, upgrade targets and per-ordering deployments.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A kind of canister in a governed deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// Root canister, controller of the other canisters.
    Root,
    /// Governance canister, executes upgrade proposals.
    Governance,
    /// Ledger canister.
    Ledger,
    /// Decentralization swap canister.
    Swap,
    /// Ledger archive canister.
    Archive,
    /// Ledger index canister.
    Index,
}

impl ModuleType {
    /// Every module type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Root,
        Self::Governance,
        Self::Ledger,
        Self::Swap,
        Self::Archive,
        Self::Index,
    ];

    /// Lowercase token used on the command line and by the governance client.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Governance => "governance",
            Self::Ledger => "ledger",
            Self::Swap => "swap",
            Self::Archive => "archive",
            Self::Index => "index",
        }
    }

    /// File stem of the published build artifact.
    #[must_use]
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::Root => "sns-root-canister",
            Self::Governance => "sns-governance-canister",
            Self::Ledger => "ic-icrc1-ledger",
            Self::Swap => "sns-swap-canister",
            Self::Archive => "ic-icrc1-archive",
            Self::Index => "ic-icrc1-index",
        }
    }

    /// Returns true if the module exists as soon as a deployment is created.
    ///
    /// Archives are only spawned by the ledger once enough blocks exist.
    #[must_use]
    pub const fn is_live_testable(self) -> bool {
        !matches!(self, Self::Archive)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == token)
            .ok_or_else(|| ConfigError::UnknownModuleType {
                token: s.to_string(),
            })
    }
}

/// The version every module is upgraded to during a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeTarget(String);

impl UpgradeTarget {
    /// Wraps a revision identifier.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the raw version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if a module reporting `observed` is running this target.
    #[must_use]
    pub fn matches(&self, observed: &str) -> bool {
        observed.trim() == self.0
    }
}

impl fmt::Display for UpgradeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Principal of a canister, as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanisterId(String);

impl CanisterId {
    /// Wraps a textual principal.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the textual principal.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A freshly provisioned deployment used by exactly one ordering.
///
/// Not `Clone`: the sweep moves it into `discard` once the ordering is over,
/// so no later ordering can reach its canisters.
#[derive(Debug, PartialEq, Eq)]
pub struct DeploymentInstance {
    label: String,
    canisters: HashMap<ModuleType, CanisterId>,
}

impl DeploymentInstance {
    /// Creates an instance from its label and canister identities.
    #[must_use]
    pub const fn new(label: String, canisters: HashMap<ModuleType, CanisterId>) -> Self {
        Self { label, canisters }
    }

    /// Label the deployment was provisioned under.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Canister id of a module, if the deployment has one.
    #[must_use]
    pub fn canister(&self, module: ModuleType) -> Option<&CanisterId> {
        self.canisters.get(&module)
    }

    /// Module types present in this deployment.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleType> {
        let mut modules: Vec<_> = self.canisters.keys().copied().collect();
        modules.sort_unstable();
        modules
    }
}
