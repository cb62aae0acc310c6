//! Content hashing for artifacts.
//!
//! Every artifact is identified by the SHA-256 of its bytes, the same digest
//! the artifact store and the canister status report use.

use sha2::{Digest, Sha256};

/// Hasher for computing artifact content hashes.
#[derive(Debug, Default)]
pub struct ArtifactHasher;

impl ArtifactHasher {
    /// Creates a new artifact hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the lowercase hex SHA-256 of `bytes`.
    #[must_use]
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Normalises a hash reported by the network: strips a `0x` prefix and
    /// surrounding whitespace, lowercases the hex digits.
    #[must_use]
    pub fn normalize(hash: &str) -> String {
        let trimmed = hash.trim();
        trimmed
            .strip_prefix("0x")
            .unwrap_or(trimmed)
            .to_ascii_lowercase()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        let hash1 = Self::normalize(hash1);
        let hash2 = Self::normalize(hash2);

        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hasher = ArtifactHasher::new();
        assert_eq!(
            hasher.hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_different_bytes_different_hash() {
        let hasher = ArtifactHasher::new();
        assert_ne!(hasher.hash_bytes(b"wasm-a"), hasher.hash_bytes(b"wasm-b"));
    }

    #[test]
    fn test_short_hash() {
        let short = ArtifactHasher::short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ArtifactHasher::hashes_match("abc123", "abc123"));
        assert!(ArtifactHasher::hashes_match("0xABC123", "abc123\n"));
        assert!(!ArtifactHasher::hashes_match("abc123", "abc124"));
        assert!(!ArtifactHasher::hashes_match("abc123", "abc12"));
    }
}
