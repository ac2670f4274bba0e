//! Domain separators for [`super::hash::canonical_hash`].
//!
//! Each domain is declared once below by its tag. The separator bytes are
//! `MRCP::<TAG>::V1` followed by a NUL, assembled at compile time, so no
//! other module spells a separator out by hand.

macro_rules! hash_domains {
    ($( $(#[$doc:meta])* $variant:ident: $tag:literal; )+) => {
        /// Which kind of value a digest commits to.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum HashDomain {
            $( $(#[$doc])* $variant, )+
        }

        impl HashDomain {
            /// Every domain, in declaration order.
            pub const ALL: &[HashDomain] = &[$( Self::$variant ),+];

            /// Short upper-case tag, e.g. `PLAN_ID`.
            #[must_use]
            pub const fn tag(self) -> &'static str {
                match self {
                    $( Self::$variant => $tag, )+
                }
            }

            /// Separator hashed ahead of the payload (NUL-terminated).
            #[must_use]
            pub const fn as_bytes(&self) -> &'static [u8] {
                match self {
                    $( Self::$variant => concat!("MRCP::", $tag, "::V1\0").as_bytes(), )+
                }
            }
        }

        impl core::fmt::Display for HashDomain {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => stringify!($variant), )+
                })
            }
        }
    };
}

hash_domains! {
    /// Digest of the active `DeterminismConfig`.
    DeterminismConfig: "DETERMINISM_CONFIG";
    /// Seeds of named RNG streams.
    RngStream: "RNG_STREAM";
    /// Any other contract value (snapshots, reports, responses).
    ContractValue: "CONTRACT_VALUE";
    /// Config digest, instruction and snapshot pair.
    PlanId: "PLAN_ID";
    /// Plan id, ordinal and chunk payload.
    ChunkId: "CHUNK_ID";
    /// Robot state, as a verification memo key.
    StateDigest: "STATE_DIGEST";
    /// Journal line integrity.
    ExecutionRecord: "EXECUTION_RECORD";
}
