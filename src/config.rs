//! Runtime configuration, loaded with a `Default` impl layered under a
//! TOML file: defaults first, then overridden by whatever the file
//! actually specifies.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DkgConfig {
    /// Per-field provenance history depth (bounded, configurable).
    pub provenance_history_depth: usize,
    /// Default edge-selection hop count for the Constraint Projector when a
    /// constraint has no `to_pattern`.
    pub constraint_projection_default_depth: usize,
    /// Slack threshold (ns) below which the Timing Aggregator raises a
    /// `Critical` alert.
    pub timing_critical_slack_ns: f64,
    /// Fraction of the clock period within which a node counts as
    /// "near-critical" for the Timing Aggregator's ratio metric.
    pub timing_near_critical_alpha: f64,
}

impl Default for DkgConfig {
    fn default() -> Self {
        Self {
            provenance_history_depth: 32,
            constraint_projection_default_depth: 0,
            timing_critical_slack_ns: crate::timing::DEFAULT_CRITICAL_SLACK_NS,
            timing_near_critical_alpha: crate::timing::DEFAULT_NEAR_CRITICAL_ALPHA,
        }
    }
}

impl DkgConfig {
    /// Load from a TOML file, falling back to `Default` values for any key
    /// the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
