//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! [determinism]
//! seed = 42
//! float_precision = 6
//!
//! [safety]
//! continuity_tolerance_rad = 0.1
//! min_zmp_score = 0.4
//!
//! [freshness]
//! enforce = true
//! max_age_ns = 500000000
//!
//! [execution]
//! mode = "simulated"
//! tick_ns = 10000000
//! journal_path = "state/executions.jsonl"
//! ```
//!
//! Every section is optional; missing values take their defaults. The robot
//! profile defaults to the seven-joint reference cobot.

use std::path::{Path, PathBuf};

use mrcp_kernel::contracts::profile::RobotProfile;
use mrcp_kernel::runtime::config::DeterminismConfig;
use mrcp_safety::SafetyThresholds;
use serde::{Deserialize, Serialize};

use crate::execution::hardware::DEFAULT_RESULT_TIMEOUT;
use crate::execution::simulator::DEFAULT_TICK_NS;
use crate::execution::ExecutionMode;
use crate::status::DEFAULT_HISTORY_LIMIT;

/// Robot id of the default profile.
pub const DEFAULT_ROBOT_ID: &str = "humanoid_01";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Snapshot freshness and reuse policy for `begin_plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FreshnessConfig {
    /// Reject snapshots older than `max_age_ns` relative to the logical clock.
    pub enforce: bool,
    pub max_age_ns: u64,
    /// Reject a snapshot pair already used for a different instruction.
    pub reject_snapshot_reuse: bool,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            enforce: false,
            max_age_ns: 500_000_000,
            reject_snapshot_reuse: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Backend chosen when the adapter is built.
    pub mode: ExecutionMode,
    /// Simulator tick length.
    pub tick_ns: u64,
    /// Bound on one hardware goal.
    pub result_timeout_ms: u64,
    /// Journal file; in-memory cache only when absent.
    pub journal_path: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulated,
            tick_ns: DEFAULT_TICK_NS,
            result_timeout_ms: u64::try_from(DEFAULT_RESULT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            journal_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusConfig {
    pub history_limit: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn default_robot() -> RobotProfile {
    RobotProfile::reference_cobot(DEFAULT_ROBOT_ID)
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub determinism: DeterminismConfig,
    #[serde(default)]
    pub safety: SafetyThresholds,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default = "default_robot")]
    pub robot: RobotProfile,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            determinism: DeterminismConfig::default(),
            safety: SafetyThresholds::default(),
            freshness: FreshnessConfig::default(),
            execution: ExecutionConfig::default(),
            status: StatusConfig::default(),
            robot: default_robot(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.determinism
            .validate()
            .map_err(|e| ConfigError::Validation(format!("determinism: {e}")))?;
        self.safety
            .validate()
            .map_err(|e| ConfigError::Validation(format!("safety: {e}")))?;
        self.robot
            .validate()
            .map_err(|e| ConfigError::Validation(format!("robot: {e}")))?;
        if self.execution.tick_ns == 0 {
            return Err(ConfigError::Validation("execution.tick_ns must be > 0".into()));
        }
        if self.execution.result_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "execution.result_timeout_ms must be > 0".into(),
            ));
        }
        if self.status.history_limit == 0 {
            return Err(ConfigError::Validation("status.history_limit must be > 0".into()));
        }
        Ok(())
    }
}
