//! MRCP Kernel: the deterministic core shared by every pipeline tier.
//!
//! # API Surface
//!
//! - [`runtime`] -- canonical serialization, content hashing, the logical
//!   clock, and seeded randomness, bundled as [`runtime::DeterminismRuntime`]
//! - [`contracts`] -- immutable value types (snapshots, trajectory chunks,
//!   safety reports, execution results, robot profiles)
//!
//! # Module Dependency Direction
//!
//! `runtime` ← `contracts`
//!
//! One-way only. `contracts` hashes and canonicalizes through `runtime`;
//! `runtime` knows nothing about contract types.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod contracts;
pub mod runtime;
