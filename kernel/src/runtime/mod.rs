//! Determinism runtime: the only place canonical bytes, digests, logical time,
//! and pseudo-random draws come from.
//!
//! Nothing in this module reads wall-clock time or process environment.

pub mod canon;
pub mod clock;
pub mod config;
pub mod hash;
pub mod hash_domain;
pub mod rng;

use std::sync::Arc;

use serde_json::Value;

use self::canon::{canonical_json_bytes, canonicalize, CanonicalForm, EncodingError};
use self::clock::LogicalClock;
use self::config::DeterminismConfig;
use self::hash::{canonical_hash, ContentHash};
use self::hash_domain::HashDomain;
use self::rng::DeterministicRng;

/// Process-scoped determinism context.
///
/// Built once at startup from a [`DeterminismConfig`] and shared by
/// reference (`Arc`) with every component constructor. Tests build their own
/// runtime per case to swap seeds or precision.
#[derive(Debug)]
pub struct DeterminismRuntime {
    config: DeterminismConfig,
    config_digest: ContentHash,
    clock: LogicalClock,
}

impl DeterminismRuntime {
    /// Build a runtime, computing the configuration digest once.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if the configuration is invalid
    /// (precision above [`config::MAX_FLOAT_PRECISION`]).
    pub fn new(config: DeterminismConfig) -> Result<Self, EncodingError> {
        config.validate()?;
        let bytes = canonicalize(&config, config.float_precision)?;
        let config_digest = canonical_hash(HashDomain::DeterminismConfig, &bytes);
        let clock = LogicalClock::new(config.frozen_epoch, config.clock_mode);
        Ok(Self {
            config,
            config_digest,
            clock,
        })
    }

    /// Convenience constructor returning a shareable handle.
    ///
    /// # Errors
    ///
    /// See [`DeterminismRuntime::new`].
    pub fn shared(config: DeterminismConfig) -> Result<Arc<Self>, EncodingError> {
        Self::new(config).map(Arc::new)
    }

    #[must_use]
    pub fn config(&self) -> &DeterminismConfig {
        &self.config
    }

    /// Digest of the canonical configuration (bound into every plan id).
    #[must_use]
    pub fn config_digest(&self) -> &ContentHash {
        &self.config_digest
    }

    #[must_use]
    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    /// Canonical bytes of a contract value at the configured precision.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] for non-finite or out-of-range floats.
    pub fn canonicalize<T: CanonicalForm + ?Sized>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, EncodingError> {
        canonicalize(value, self.config.float_precision)
    }

    /// Canonical bytes of an already-built JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] for out-of-range floats.
    pub fn canonicalize_value(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        canonical_json_bytes(value, self.config.float_precision)
    }

    /// Domain-separated content hash of a contract value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if canonicalization fails.
    pub fn hash<T: CanonicalForm + ?Sized>(
        &self,
        domain: HashDomain,
        value: &T,
    ) -> Result<ContentHash, EncodingError> {
        let bytes = self.canonicalize(value)?;
        Ok(canonical_hash(domain, &bytes))
    }

    /// Domain-separated content hash of a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if canonicalization fails.
    pub fn hash_value(&self, domain: HashDomain, value: &Value) -> Result<ContentHash, EncodingError> {
        let bytes = self.canonicalize_value(value)?;
        Ok(canonical_hash(domain, &bytes))
    }

    /// A fresh generator seeded directly from the configured seed.
    #[must_use]
    pub fn rng(&self) -> DeterministicRng {
        DeterministicRng::new(self.config.seed)
    }

    /// A generator for a named stream.
    ///
    /// The stream seed is the first eight digest bytes of
    /// `sha256(RngStream || seed_le || name)`, so streams with different names
    /// are independent while staying a pure function of the configured seed.
    #[must_use]
    pub fn rng_stream(&self, name: &str) -> DeterministicRng {
        let mut data = Vec::with_capacity(8 + name.len());
        data.extend_from_slice(&self.config.seed.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        let digest = canonical_hash(HashDomain::RngStream, &data);
        DeterministicRng::new(digest.prefix_u64())
    }
}
