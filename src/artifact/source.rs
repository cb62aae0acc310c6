//! Artifact source backed by the public build download server.
//!
//! Compressed builds live at `{base}/ic/{version}/canisters/{name}.wasm.gz`.
//! Downloads are retried on transient failures and cached for the lifetime of
//! the source, so every ordering of a run upgrades from identical bytes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::canister::{ModuleType, UpgradeTarget};
use crate::error::{NetworkError, Result, UpgradeOrdersError};

use super::types::{Artifact, ArtifactVariant};

/// Default download server.
pub const DEFAULT_ARTIFACT_URL: &str = "https://download.dfinity.systems";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Where compressed build artifacts come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetches the compressed build of `module` at `target`.
    async fn fetch_compressed(&self, module: ModuleType, target: &UpgradeTarget)
    -> Result<Artifact>;
}

/// HTTP artifact source.
#[derive(Debug)]
pub struct HttpArtifactSource {
    /// HTTP client.
    client: Client,
    /// Base URL of the download server.
    base_url: String,
    /// Downloaded artifacts, keyed by module and version.
    cache: Mutex<HashMap<(ModuleType, UpgradeTarget), Artifact>>,
}

impl HttpArtifactSource {
    /// Creates a source for the given download server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a source with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NetworkError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// URL of the compressed build for a module at a version.
    #[must_use]
    pub fn artifact_url(&self, module: ModuleType, target: &UpgradeTarget) -> String {
        format!(
            "{}/ic/{}/canisters/{}.{}",
            self.base_url,
            target,
            module.artifact_name(),
            ArtifactVariant::Compressed.extension()
        )
    }

    /// Downloads with retries on transient failures.
    async fn download(&self, module: ModuleType, target: &UpgradeTarget) -> Result<Vec<u8>> {
        let url = self.artifact_url(module, target);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {url}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.download_once(module, target, &url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            UpgradeOrdersError::Network(NetworkError::transport("Max retries exceeded"))
        }))
    }

    /// Executes a single download request.
    async fn download_once(
        &self,
        module: ModuleType,
        target: &UpgradeTarget,
        url: &str,
    ) -> Result<Vec<u8>> {
        trace!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::transport(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(NetworkError::ArtifactNotFound {
                module,
                version: target.to_string(),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::request(status.as_u16(), body).into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkError::transport(format!("Failed to read body: {e}")))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch_compressed(
        &self,
        module: ModuleType,
        target: &UpgradeTarget,
    ) -> Result<Artifact> {
        let key = (module, target.clone());
        let mut cache = self.cache.lock().await;

        if let Some(artifact) = cache.get(&key) {
            trace!("Using cached {artifact}");
            return Ok(artifact.clone());
        }

        let bytes = self.download(module, target).await?;
        let artifact = Artifact::new(module, target.clone(), ArtifactVariant::Compressed, bytes);
        if artifact.is_empty() {
            return Err(NetworkError::invalid_response(format!(
                "{} served an empty artifact",
                self.artifact_url(module, target)
            ))
            .into());
        }
        info!("Downloaded {artifact}");

        cache.insert(key, artifact.clone());
        Ok(artifact)
    }
}
