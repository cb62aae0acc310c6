//! Artifact references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::canister::{ModuleType, UpgradeTarget};

use super::hash::ArtifactHasher;

/// How an artifact's bytes are delivered to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactVariant {
    /// The gzip-compressed build output, as published.
    Compressed,
    /// The raw module bytes obtained by decompressing the published build.
    Decompressed,
}

impl ArtifactVariant {
    /// File extension used when the artifact is written to disk.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Compressed => "wasm.gz",
            Self::Decompressed => "wasm",
        }
    }
}

impl fmt::Display for ArtifactVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compressed => "compressed",
            Self::Decompressed => "decompressed",
        };
        write!(f, "{s}")
    }
}

/// Build artifact bytes together with their content hash.
#[derive(Debug, Clone)]
pub struct Artifact {
    module: ModuleType,
    target: UpgradeTarget,
    variant: ArtifactVariant,
    bytes: Arc<[u8]>,
    hash: String,
}

impl Artifact {
    /// Wraps artifact bytes, computing their SHA-256 hash.
    #[must_use]
    pub fn new(
        module: ModuleType,
        target: UpgradeTarget,
        variant: ArtifactVariant,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        let hash = ArtifactHasher::new().hash_bytes(&bytes);
        Self {
            module,
            target,
            variant,
            bytes,
            hash,
        }
    }

    /// Module the artifact was built for.
    #[must_use]
    pub const fn module(&self) -> ModuleType {
        self.module
    }

    /// Version the artifact was built at.
    #[must_use]
    pub const fn target(&self) -> &UpgradeTarget {
        &self.target
    }

    /// Delivery variant.
    #[must_use]
    pub const fn variant(&self) -> ArtifactVariant {
        self.variant
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex SHA-256 of the bytes.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the artifact carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used when staging the artifact for the governance client.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.module.artifact_name(),
            self.target,
            ArtifactHasher::short_hash(&self.hash),
            self.variant.extension()
        )
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} artifact @ {} (sha256 {}, {} bytes)",
            self.variant,
            self.module,
            self.target,
            ArtifactHasher::short_hash(&self.hash),
            self.bytes.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_hash_and_file_name() {
        let artifact = Artifact::new(
            ModuleType::Swap,
            UpgradeTarget::new("deadbeef"),
            ArtifactVariant::Decompressed,
            b"abc".to_vec(),
        );

        assert_eq!(
            artifact.hash(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(artifact.file_name(), "sns-swap-canister-deadbeef-ba7816bf.wasm");
        assert_eq!(artifact.len(), 3);
    }
}
