//! Governed network driven through the governance-client binary.
//!
//! Every call shells out to the governance client with the operator identity
//! and network endpoint, then converts its Candid output to JSON with the
//! converter binary. Upgrades go through the deployment's own governance, so a
//! proposal must name both the root and governance canisters.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactHasher};
use crate::canister::{CanisterId, DeploymentInstance, ModuleType};
use crate::config::{Bindings, ValidatorConfig};
use crate::error::{NetworkError, Result, UpgradeOrdersError};

use super::command::CommandRunner;
use super::traits::GovernedNetwork;

/// Metadata section holding the build revision of a canister.
const VERSION_METADATA: &str = "git_commit_id";

/// Status endpoint probed during preflight.
const STATUS_PATH: &str = "/api/v2/status";

/// Timeout for the preflight status probe in seconds.
const PREFLIGHT_TIMEOUT_SECS: u64 = 10;

/// Governed network backed by the governance-client binary.
#[derive(Debug)]
pub struct SnsCliNetwork {
    /// Endpoint, identity, funding and binary locations.
    bindings: Bindings,
    /// Runs the collaborator binaries.
    runner: CommandRunner,
    /// Directory artifacts are staged in before publishing.
    work_dir: PathBuf,
    /// HTTP client for the preflight probe.
    http: Client,
}

impl SnsCliNetwork {
    /// Creates a network client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PREFLIGHT_TIMEOUT_SECS))
            .build()
            .map_err(|e| NetworkError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            bindings: config.bindings.clone(),
            runner: CommandRunner::new(config.command_timeout()),
            work_dir: config.work_dir(),
            http,
        })
    }

    /// Checks that both collaborator binaries start and the endpoint answers.
    ///
    /// # Errors
    ///
    /// Returns an error if any required collaborator is unreachable.
    pub async fn preflight(&self) -> Result<()> {
        let version = [String::from("--version")];

        let client_version = self
            .runner
            .run_checked(&self.bindings.governance_client, &version, None)
            .await?;
        info!("Governance client: {}", client_version.trim());

        self.runner
            .run_checked(&self.bindings.converter, &version, None)
            .await?;

        let url = format!(
            "{}{STATUS_PATH}",
            self.bindings.network_url.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::transport(format!("Cannot reach {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(NetworkError::request(
                response.status().as_u16(),
                format!("{url} is not healthy"),
            )
            .into());
        }

        info!("Network endpoint reachable: {}", self.bindings.network_url);
        Ok(())
    }

    /// Arguments every governance-client call starts with.
    fn base_args(&self) -> Vec<String> {
        vec![
            String::from("--network"),
            self.bindings.network_url.clone(),
            String::from("--identity-pem"),
            self.bindings.identity_pem.display().to_string(),
        ]
    }

    /// Runs the governance client and returns its stdout.
    async fn client(&self, args: &[&str]) -> Result<String> {
        let mut full = self.base_args();
        full.extend(args.iter().map(|a| (*a).to_string()));
        self.runner
            .run_checked(&self.bindings.governance_client, &full, None)
            .await
    }

    /// Runs the governance client and converts its Candid output to JSON.
    async fn client_json(&self, args: &[&str]) -> Result<Value> {
        let candid = self.client(args).await?;
        let json = self
            .runner
            .run_checked(&self.bindings.converter, &[], Some(candid.as_bytes()))
            .await?;

        serde_json::from_str(&json)
            .map_err(|e| NetworkError::invalid_response(format!("Converter output: {e}")).into())
    }

    /// Writes an artifact to the staging directory and returns its path.
    ///
    /// A file already staged under the same name is reused only if its
    /// content still hashes to the artifact's hash. New content is written
    /// to a temporary file and renamed into place.
    async fn stage(&self, artifact: &Artifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(artifact.file_name());

        if let Ok(existing) = tokio::fs::read(&path).await {
            let staged = ArtifactHasher::new().hash_bytes(&existing);
            if ArtifactHasher::hashes_match(&staged, artifact.hash()) {
                return Ok(path);
            }
            warn!("Staged {} is stale or truncated, rewriting", path.display());
        }

        let temp_path = self.work_dir.join(format!(
            "{}.tmp-{}",
            artifact.file_name(),
            uuid::Uuid::new_v4().simple()
        ));
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(artifact.bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &path).await?;
        debug!("Staged {artifact} at {}", path.display());

        Ok(path)
    }
}

/// Turns a governance client that ran and refused a request into a rejection.
///
/// Transport failures and client timeouts are left unchanged.
fn refusal(error: UpgradeOrdersError) -> UpgradeOrdersError {
    match error {
        UpgradeOrdersError::Network(NetworkError::CommandFailed { status, stderr, .. }) => {
            let message = if stderr.is_empty() {
                format!("governance client {status}")
            } else {
                stderr
            };
            NetworkError::Rejected { message }.into()
        }
        other => other,
    }
}

/// Looks up a module's canister in a deployment.
fn require_canister(instance: &DeploymentInstance, module: ModuleType) -> Result<&CanisterId> {
    instance.canister(module).ok_or_else(|| {
        UpgradeOrdersError::internal(format!(
            "Deployment '{}' has no {module} canister",
            instance.label()
        ))
    })
}

/// Reads a Candid text value that may be wrapped in an `opt` (a JSON array).
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Parses the canister ids of a freshly deployed instance.
fn parse_deployment(label: &str, value: &Value) -> Result<DeploymentInstance> {
    let mut canisters = HashMap::new();

    for module in ModuleType::ALL {
        let key = format!("{}_canister_id", module.as_str());
        if let Some(id) = text_field(value, &key) {
            canisters.insert(module, CanisterId::new(id));
        }
    }

    for required in [ModuleType::Root, ModuleType::Governance] {
        if !canisters.contains_key(&required) {
            return Err(NetworkError::invalid_response(format!(
                "Deployment output has no {required} canister id"
            ))
            .into());
        }
    }

    Ok(DeploymentInstance::new(label.to_string(), canisters))
}

/// Interprets the store's answer to a publish request.
fn parse_publish_result(value: &Value, expected_hash: &str) -> Result<()> {
    let result = match value.get("result") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    }
    .ok_or_else(|| NetworkError::invalid_response("Publish response has no result"))?;

    if let Some(error) = result.get("Error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(NetworkError::Rejected {
            message: message.to_string(),
        }
        .into());
    }

    let stored = result
        .get("Hash")
        .and_then(Value::as_str)
        .ok_or_else(|| NetworkError::invalid_response("Publish response has no hash"))?;

    if ArtifactHasher::hashes_match(stored, expected_hash) {
        Ok(())
    } else {
        Err(NetworkError::invalid_response(format!(
            "Store recorded hash {stored}, expected {expected_hash}"
        ))
        .into())
    }
}

/// Reads the installed module hash from a canister status.
fn parse_module_hash(value: &Value) -> Result<String> {
    text_field(value, "module_hash")
        .map(|h| ArtifactHasher::normalize(&h))
        .ok_or_else(|| NetworkError::invalid_response("Canister has no module installed").into())
}

#[async_trait]
impl GovernedNetwork for SnsCliNetwork {
    async fn provision(&self, label: &str) -> Result<DeploymentInstance> {
        info!("Provisioning deployment '{label}'");
        let wallet = self.bindings.funding_wallet.clone();
        let value = self
            .client_json(&["deploy-testflight", "--wallet", wallet.as_str(), "--label", label])
            .await?;
        parse_deployment(label, &value)
    }

    async fn publish_artifact(&self, artifact: &Artifact) -> Result<()> {
        let path = self.stage(artifact).await?;
        let path = path.display().to_string();
        let value = self
            .client_json(&[
                "add-wasm",
                "--canister-type",
                artifact.module().as_str(),
                "--wasm-file",
                path.as_str(),
                "--hash",
                artifact.hash(),
            ])
            .await?;
        parse_publish_result(&value, artifact.hash())
    }

    async fn propose_upgrade(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
        artifact: &Artifact,
    ) -> Result<()> {
        let root = require_canister(instance, ModuleType::Root)?.to_string();
        let governance = require_canister(instance, ModuleType::Governance)?.to_string();
        require_canister(instance, module)?;

        self.client(&[
            "propose-upgrade",
            "--sns-root",
            root.as_str(),
            "--sns-governance",
            governance.as_str(),
            "--canister-type",
            module.as_str(),
            "--wasm-hash",
            artifact.hash(),
        ])
        .await
        .map(|_| ())
        .map_err(refusal)
    }

    async fn running_version(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
    ) -> Result<String> {
        let canister = require_canister(instance, module)?.to_string();
        let output = self
            .client(&["canister-metadata", canister.as_str(), VERSION_METADATA])
            .await?;

        let version = output.trim();
        if version.is_empty() {
            return Err(NetworkError::invalid_response(format!(
                "{module} reported no {VERSION_METADATA}"
            ))
            .into());
        }
        Ok(version.to_string())
    }

    async fn module_hash(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
    ) -> Result<String> {
        let canister = require_canister(instance, module)?.to_string();
        let value = self.client_json(&["canister-status", canister.as_str()]).await?;
        parse_module_hash(&value)
    }

    async fn discard(&self, instance: DeploymentInstance) -> Result<()> {
        let root = require_canister(&instance, ModuleType::Root)?.to_string();
        info!("Discarding deployment '{}'", instance.label());
        self.client(&["uninstall-testflight", "--sns-root", root.as_str()])
            .await
            .map(|_| ())
    }
}
