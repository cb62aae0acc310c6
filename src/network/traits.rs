//! The governed network as seen by the validator.

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::canister::{DeploymentInstance, ModuleType};
use crate::error::Result;

/// Operations the validator needs from the governance system and artifact store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GovernedNetwork: Send + Sync {
    /// Provisions a fresh, isolated deployment under `label`.
    async fn provision(&self, label: &str) -> Result<DeploymentInstance>;

    /// Publishes an artifact to the shared store. Republishing identical
    /// content succeeds without side effects.
    async fn publish_artifact(&self, artifact: &Artifact) -> Result<()>;

    /// Submits an upgrade of `module` in `instance` to `artifact`.
    async fn propose_upgrade(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
        artifact: &Artifact,
    ) -> Result<()>;

    /// Version the module reports it is running.
    async fn running_version(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
    ) -> Result<String>;

    /// Hash of the module's installed code.
    async fn module_hash(&self, instance: &DeploymentInstance, module: ModuleType)
    -> Result<String>;

    /// Tears a deployment down once its ordering is finished.
    async fn discard(&self, instance: DeploymentInstance) -> Result<()>;
}
