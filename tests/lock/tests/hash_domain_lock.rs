//! Locks the hash domain set.
//!
//! Identifiers persisted in journals depend on these exact bytes, so the
//! set is pinned here: count, layout, the digest formula (checked against
//! an independent SHA-256), and that no production module spells a
//! separator out by hand.

use std::path::{Path, PathBuf};

use mrcp_kernel::runtime::hash::{canonical_hash, HashDomain};
use sha2::{Digest, Sha256};

const PINNED: [(HashDomain, &str); 7] = [
    (HashDomain::DeterminismConfig, "MRCP::DETERMINISM_CONFIG::V1"),
    (HashDomain::RngStream, "MRCP::RNG_STREAM::V1"),
    (HashDomain::ContractValue, "MRCP::CONTRACT_VALUE::V1"),
    (HashDomain::PlanId, "MRCP::PLAN_ID::V1"),
    (HashDomain::ChunkId, "MRCP::CHUNK_ID::V1"),
    (HashDomain::StateDigest, "MRCP::STATE_DIGEST::V1"),
    (HashDomain::ExecutionRecord, "MRCP::EXECUTION_RECORD::V1"),
];

#[test]
fn domain_bytes_are_pinned() {
    assert_eq!(
        HashDomain::ALL.len(),
        PINNED.len(),
        "domain added or removed; pin its bytes here"
    );
    for (domain, text) in PINNED {
        let mut expected = text.as_bytes().to_vec();
        expected.push(0);
        assert_eq!(domain.as_bytes(), expected.as_slice(), "{domain}");
    }
}

#[test]
fn digest_is_sha256_of_separator_then_payload() {
    let payload = br#"{"instruction":"pick up the red cup"}"#;
    for &domain in HashDomain::ALL {
        let digest = Sha256::new()
            .chain_update(domain.as_bytes())
            .chain_update(payload)
            .finalize();
        assert_eq!(
            canonical_hash(domain, payload).as_str(),
            format!("sha256:{}", hex::encode(digest)),
            "{domain}"
        );
    }
}

#[test]
fn equal_payloads_differ_across_domains() {
    let digests: std::collections::BTreeSet<_> = HashDomain::ALL
        .iter()
        .map(|&d| canonical_hash(d, b"same").as_str().to_string())
        .collect();
    assert_eq!(digests.len(), HashDomain::ALL.len());
}

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = std::fs::read_dir(dir).unwrap_or_else(|e| panic!("{}: {e}", dir.display()));
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_sources(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            out.push(path);
        }
    }
}

/// Production code only: unit-test modules sit at the end of each file.
fn production_part(source: &str) -> &str {
    source.split("#[cfg(test)]").next().unwrap_or(source)
}

#[test]
fn separators_are_declared_in_one_place() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut files = Vec::new();
    for krate in ["kernel", "safety", "harness"] {
        rust_sources(&root.join(krate).join("src"), &mut files);
    }
    assert!(!files.is_empty());

    let offenders: Vec<String> = files
        .iter()
        .filter(|p| p.file_name().is_some_and(|n| n != "hash_domain.rs"))
        .flat_map(|p| {
            let source = std::fs::read_to_string(p).unwrap();
            production_part(&source)
                .lines()
                .enumerate()
                .filter(|(_, l)| !l.trim_start().starts_with("//") && l.contains("\"MRCP::"))
                .map(|(i, l)| format!("{}:{}: {}", p.display(), i + 1, l.trim()))
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(
        offenders.is_empty(),
        "domain separator literals outside hash_domain.rs:\n{}",
        offenders.join("\n")
    );
}
