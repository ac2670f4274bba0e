//! Domain-separated SHA-256 digests.
//!
//! [`canonical_hash`] is the only function that produces a digest; every
//! identifier and journal checksum goes through it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub use super::hash_domain::HashDomain;

/// Algorithm tag written in front of every digest.
pub const HASH_ALGORITHM: &str = "sha256";

const DIGEST_HEX_LEN: usize = 64;

/// A digest rendered as `sha256:<64 lowercase hex>`.
///
/// Only [`canonical_hash`] and [`ContentHash::parse`] construct one, so the
/// rendering is always well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Accepts exactly the form [`canonical_hash`] renders.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix(HASH_ALGORITHM)?.strip_prefix(':')?;
        let well_formed = hex.len() == DIGEST_HEX_LEN
            && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(s.to_string()))
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        HASH_ALGORITHM
    }

    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.0[HASH_ALGORITHM.len() + 1..]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first eight digest bytes read as a little-endian integer.
    #[must_use]
    pub fn prefix_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        if hex::decode_to_slice(&self.hex_digest()[..16], &mut bytes).is_err() {
            return 0;
        }
        u64::from_le_bytes(bytes)
    }

    /// First 12 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.hex_digest()[..12]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash: {s}")))
    }
}

/// `sha256(domain separator || data)`.
#[must_use]
pub fn canonical_hash(domain: HashDomain, data: &[u8]) -> ContentHash {
    let digest = Sha256::new()
        .chain_update(domain.as_bytes())
        .chain_update(data)
        .finalize();
    ContentHash(format!("{HASH_ALGORITHM}:{}", hex::encode(digest)))
}
