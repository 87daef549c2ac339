//! Content checksums for node values
//!
//! The arena only compares checksums; it never interprets their bytes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque content digest of a node value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for display (first 8 characters).
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pure, synchronous digest of a string value.
pub trait ChecksumService: fmt::Debug + Send + Sync {
    fn digest(&self, value: &str) -> Checksum;
}

/// Default checksum service: lowercase hex SHA-256.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Checksum;

impl ChecksumService for Sha256Checksum {
    fn digest(&self, value: &str) -> Checksum {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        Checksum(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_checksum_deterministic() {
        let a = Sha256Checksum.digest("types.ts");
        let b = Sha256Checksum.digest("types.ts");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_sha256_checksum_known_value() {
        assert_eq!(
            Sha256Checksum.digest("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_short_checksum() {
        let sum = Sha256Checksum.digest("src");
        assert_eq!(sum.short().len(), 8);
        assert!(sum.as_str().starts_with(sum.short()));
        assert_eq!(Checksum::new("abc").short(), "abc");
    }
}
