//! Append-only execution journal (`executions.jsonl`).
//!
//! # Line format
//!
//! One canonical JSON object per line:
//!
//! ```text
//! {"record":<canonical ExecutionResult>,"record_digest":"sha256:<hex>"}
//! ```
//!
//! `record_digest` is `canonical_hash(ExecutionRecord, canonical(record))`.
//!
//! # Fail-closed loading
//!
//! - Unreadable file, non-JSON line, missing field, or a record that does not
//!   parse as a result → [`JournalError::Corrupt`] (nothing is loaded).
//! - Record parses but its digest does not match → that key is poisoned.
//! - Two different records for one key → that key is poisoned.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use mrcp_kernel::contracts::execution::ExecutionResult;
use mrcp_kernel::runtime::canon::{canonical_json_bytes, to_canonical_value, EncodingError};
use mrcp_kernel::runtime::hash::{canonical_hash, ContentHash, HashDomain};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::CacheKey;

/// File name inside a journal directory.
pub const JOURNAL_FILENAME: &str = "executions.jsonl";

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("journal line {line} is corrupt: {detail}")]
    Corrupt { line: usize, detail: String },
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// What [`ExecutionJournal::open`] read back.
#[derive(Debug, Default)]
pub struct JournalLoad {
    /// Intact records, in file order, one per key.
    pub entries: Vec<ExecutionResult>,
    /// Keys whose records failed verification, with the reason.
    pub poisoned: Vec<(CacheKey, String)>,
}

/// An open journal. Appends are serialized and synced before returning.
#[derive(Debug)]
pub struct ExecutionJournal {
    path: PathBuf,
    precision: u32,
    file: Mutex<File>,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> JournalError + '_ {
    move |source| JournalError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Canonical journal line for `result` (without the newline).
///
/// # Errors
///
/// Returns [`EncodingError`] if the result cannot be canonicalized.
pub fn encode_line(result: &ExecutionResult, precision: u32) -> Result<Vec<u8>, EncodingError> {
    let record = to_canonical_value(result)?;
    let digest = record_digest(&record, precision)?;
    canonical_json_bytes(&json!({ "record": record, "record_digest": digest.as_str() }), precision)
}

fn record_digest(record: &Value, precision: u32) -> Result<ContentHash, EncodingError> {
    let bytes = canonical_json_bytes(record, precision)?;
    Ok(canonical_hash(HashDomain::ExecutionRecord, &bytes))
}

enum Decoded {
    Intact(ExecutionResult),
    DigestMismatch(ExecutionResult),
}

fn decode_line(line_no: usize, line: &str, precision: u32) -> Result<Decoded, JournalError> {
    let corrupt = |detail: String| JournalError::Corrupt {
        line: line_no,
        detail,
    };
    let value: Value = serde_json::from_str(line).map_err(|e| corrupt(e.to_string()))?;
    let record = value
        .get("record")
        .ok_or_else(|| corrupt("missing `record`".into()))?;
    let stored = value
        .get("record_digest")
        .and_then(Value::as_str)
        .and_then(ContentHash::parse)
        .ok_or_else(|| corrupt("missing or malformed `record_digest`".into()))?;
    let result: ExecutionResult =
        serde_json::from_value(record.clone()).map_err(|e| corrupt(e.to_string()))?;
    result
        .final_state()
        .validate()
        .map_err(|e| corrupt(e.to_string()))?;
    if record_digest(record, precision)? == stored {
        Ok(Decoded::Intact(result))
    } else {
        Ok(Decoded::DigestMismatch(result))
    }
}

impl ExecutionJournal {
    /// Open (creating if needed) the journal at `path` and read it back.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] on I/O failure or a corrupt line.
    pub fn open(path: impl AsRef<Path>, precision: u32) -> Result<(Self, JournalLoad), JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let load = Self::load(&contents, precision)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        info!(
            path = %path.display(),
            entries = load.entries.len(),
            poisoned = load.poisoned.len(),
            "execution journal loaded"
        );
        Ok((
            Self {
                path,
                precision,
                file: Mutex::new(file),
            },
            load,
        ))
    }

    /// Open `<dir>/executions.jsonl`.
    ///
    /// # Errors
    ///
    /// See [`ExecutionJournal::open`].
    pub fn open_in_dir(dir: impl AsRef<Path>, precision: u32) -> Result<(Self, JournalLoad), JournalError> {
        Self::open(dir.as_ref().join(JOURNAL_FILENAME), precision)
    }

    fn load(contents: &str, precision: u32) -> Result<JournalLoad, JournalError> {
        let mut intact: BTreeMap<CacheKey, (usize, ExecutionResult)> = BTreeMap::new();
        let mut poisoned: BTreeMap<CacheKey, String> = BTreeMap::new();
        for (i, line) in contents.lines().enumerate() {
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(line_no, line, precision)? {
                Decoded::Intact(result) => {
                    let key = CacheKey::of(&result);
                    match intact.get(&key) {
                        Some((_, existing)) if existing.same_payload(&result) => {}
                        Some(_) => {
                            poisoned
                                .entry(key)
                                .or_insert_with(|| format!("conflicting journal records (line {line_no})"));
                        }
                        None => {
                            intact.insert(key, (line_no, result));
                        }
                    }
                }
                Decoded::DigestMismatch(result) => {
                    let key = CacheKey::of(&result);
                    warn!(line = line_no, key = %key, "journal record digest mismatch");
                    poisoned
                        .entry(key)
                        .or_insert_with(|| format!("journal record digest mismatch (line {line_no})"));
                }
            }
        }
        let mut entries: Vec<(usize, ExecutionResult)> = intact
            .into_iter()
            .filter(|(k, _)| !poisoned.contains_key(k))
            .map(|(_, v)| v)
            .collect();
        entries.sort_by_key(|(line, _)| *line);
        Ok(JournalLoad {
            entries: entries.into_iter().map(|(_, r)| r).collect(),
            poisoned: poisoned.into_iter().collect(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one result and sync it to disk.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if encoding or the write fails.
    pub fn append(&self, result: &ExecutionResult) -> Result<(), JournalError> {
        let mut line = encode_line(result, self.precision)?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line).map_err(io_error(&self.path))?;
        file.sync_data().map_err(io_error(&self.path))
    }
}
