//! Canister domain types.
//!
//! Module types of a governed deployment, the version they are upgraded to,
//! and the per-ordering deployment that owns their identities.

mod types;

pub use types::{CanisterId, DeploymentInstance, ModuleType, UpgradeTarget};
