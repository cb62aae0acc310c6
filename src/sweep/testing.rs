//! In-memory collaborators for sweep tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::artifact::{Artifact, ArtifactSource, ArtifactVariant, Codec, GzipCodec};
use crate::canister::{CanisterId, DeploymentInstance, ModuleType, UpgradeTarget};
use crate::error::{NetworkError, Result, UpgradeOrdersError};
use crate::network::GovernedNetwork;

/// Version every module of a fresh deployment runs.
pub const INITIAL_VERSION: &str = "0.9.0";

/// Serves deterministic artifacts without touching the network.
#[derive(Debug)]
pub struct FakeArtifactSource {
    compress: bool,
}

impl FakeArtifactSource {
    /// Serves gzip-compressed artifacts.
    pub const fn new() -> Self {
        Self { compress: true }
    }

    /// Serves raw module bytes labelled as compressed.
    pub const fn uncompressed() -> Self {
        Self { compress: false }
    }
}

#[async_trait]
impl ArtifactSource for FakeArtifactSource {
    async fn fetch_compressed(&self, module: ModuleType, target: &UpgradeTarget) -> Result<Artifact> {
        let raw = format!("\0asm {} built at {target}", module.artifact_name()).into_bytes();
        let bytes = if self.compress {
            GzipCodec::default().compress(&raw)?
        } else {
            raw
        };
        Ok(Artifact::new(module, target.clone(), ArtifactVariant::Compressed, bytes))
    }
}

/// Deployed state of one module.
#[derive(Debug, Clone)]
struct ModuleState {
    version: String,
    hash: String,
}

#[derive(Debug, Default)]
struct FakeState {
    deployments: HashMap<String, HashMap<ModuleType, ModuleState>>,
    provisioned: Vec<String>,
    published: HashMap<String, ArtifactVariant>,
    proposals: Vec<(String, ModuleType, ArtifactVariant)>,
    discarded: Vec<String>,
}

/// A governed network that upgrades modules as soon as a proposal arrives.
///
/// Deployments are labelled `upgrade-order-<n>-...`; failures can be injected
/// per ordering number.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    state: Mutex<FakeState>,
    stuck: Vec<(usize, ModuleType)>,
    content_stuck: Vec<(usize, ModuleType)>,
    failing_provisions: Vec<usize>,
}

impl FakeNetwork {
    /// Creates a network where every upgrade succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `module` ignore upgrades in the deployment of ordering `ordering`.
    pub fn never_converges(mut self, ordering: usize, module: ModuleType) -> Self {
        self.stuck.push((ordering, module));
        self
    }

    /// Makes `module` ignore decompressed re-upgrades in ordering `ordering`,
    /// so its content hash never follows.
    pub fn content_never_converges(mut self, ordering: usize, module: ModuleType) -> Self {
        self.content_stuck.push((ordering, module));
        self
    }

    /// Makes provisioning fail for ordering `ordering`.
    pub fn fail_provision(mut self, ordering: usize) -> Self {
        self.failing_provisions.push(ordering);
        self
    }

    /// Labels of every deployment provisioned so far.
    pub fn provisioned(&self) -> Vec<String> {
        self.state.lock().unwrap().provisioned.clone()
    }

    /// Labels of every deployment discarded so far.
    pub fn discarded(&self) -> Vec<String> {
        self.state.lock().unwrap().discarded.clone()
    }

    /// Modules proposed for ordering `ordering` with the given variant, in order.
    pub fn proposals(&self, ordering: usize, variant: ArtifactVariant) -> Vec<ModuleType> {
        self.state
            .lock()
            .unwrap()
            .proposals
            .iter()
            .filter(|(label, _, v)| ordering_of(label) == Some(ordering) && *v == variant)
            .map(|(_, module, _)| *module)
            .collect()
    }

    /// Number of distinct artifacts of a variant in the store.
    pub fn published_variants(&self, variant: ArtifactVariant) -> usize {
        self.state
            .lock()
            .unwrap()
            .published
            .values()
            .filter(|v| **v == variant)
            .count()
    }

    fn rejected(message: impl Into<String>) -> UpgradeOrdersError {
        NetworkError::Rejected {
            message: message.into(),
        }
        .into()
    }

    fn module_state(&self, instance: &DeploymentInstance, module: ModuleType) -> Result<ModuleState> {
        let state = self.state.lock().unwrap();
        state
            .deployments
            .get(instance.label())
            .and_then(|modules| modules.get(&module))
            .cloned()
            .ok_or_else(|| Self::rejected(format!("{module} not found in {}", instance.label())))
    }
}

/// Ordering number encoded in a deployment label.
fn ordering_of(label: &str) -> Option<usize> {
    label
        .strip_prefix("upgrade-order-")?
        .split('-')
        .next()?
        .parse()
        .ok()
}

#[async_trait]
impl GovernedNetwork for FakeNetwork {
    async fn provision(&self, label: &str) -> Result<DeploymentInstance> {
        if ordering_of(label).is_some_and(|n| self.failing_provisions.contains(&n)) {
            return Err(Self::rejected("wallet has insufficient cycles"));
        }

        let mut state = self.state.lock().unwrap();
        if state.provisioned.iter().any(|l| l == label) {
            return Err(Self::rejected(format!("label {label} already used")));
        }

        let mut canisters = HashMap::new();
        let mut modules = HashMap::new();
        for module in ModuleType::ALL {
            canisters.insert(module, CanisterId::new(format!("{label}-{module}")));
            modules.insert(
                module,
                ModuleState {
                    version: String::from(INITIAL_VERSION),
                    hash: String::from("00"),
                },
            );
        }

        state.deployments.insert(label.to_string(), modules);
        state.provisioned.push(label.to_string());
        Ok(DeploymentInstance::new(label.to_string(), canisters))
    }

    async fn publish_artifact(&self, artifact: &Artifact) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .published
            .insert(artifact.hash().to_string(), artifact.variant());
        Ok(())
    }

    async fn propose_upgrade(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
        artifact: &Artifact,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.published.contains_key(artifact.hash()) {
            return Err(Self::rejected(format!("{} was never published", artifact.hash())));
        }

        let label = instance.label().to_string();
        let stuck = ordering_of(&label).is_some_and(|n| {
            self.stuck.contains(&(n, module))
                || (artifact.variant() == ArtifactVariant::Decompressed
                    && self.content_stuck.contains(&(n, module)))
        });
        state
            .proposals
            .push((label.clone(), module, artifact.variant()));

        let deployment = state
            .deployments
            .get_mut(&label)
            .ok_or_else(|| Self::rejected(format!("deployment {label} was discarded")))?;

        if !stuck && let Some(current) = deployment.get_mut(&module) {
            current.version = artifact.target().to_string();
            current.hash = artifact.hash().to_string();
        }
        Ok(())
    }

    async fn running_version(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
    ) -> Result<String> {
        Ok(self.module_state(instance, module)?.version)
    }

    async fn module_hash(&self, instance: &DeploymentInstance, module: ModuleType) -> Result<String> {
        Ok(self.module_state(instance, module)?.hash)
    }

    async fn discard(&self, instance: DeploymentInstance) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deployments.remove(instance.label());
        state.discarded.push(instance.label().to_string());
        Ok(())
    }
}
