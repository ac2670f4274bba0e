//! Stable identifiers derived by content hashing.

use serde::{Deserialize, Serialize};

use crate::runtime::hash::ContentHash;

macro_rules! content_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ContentHash);

        impl $name {
            #[must_use]
            pub fn from_hash(hash: ContentHash) -> Self {
                Self(hash)
            }

            /// Parse from `"sha256:<hex>"`.
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                ContentHash::parse(s).map(Self)
            }

            #[must_use]
            pub fn as_hash(&self) -> &ContentHash {
                &self.0
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Shortened hex for log lines.
            #[must_use]
            pub fn short(&self) -> &str {
                self.0.short()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

content_id! {
    /// Identity of a plan: instruction + snapshot pair + config digest.
    PlanId
}

content_id! {
    /// Identity of a chunk within a plan: plan id + ordinal + payload.
    ChunkId
}
