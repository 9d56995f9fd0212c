//! Scheduler-wide configuration consumed by the allocation engine.
//!
//! Mirrors the `[scheduler]` table of a fairgrid TOML file:
//!
//! ```toml
//! [scheduler]
//! continuous_scheduling_enabled = false
//! node_locality_threshold = 0.5
//! rack_locality_threshold = 0.7
//! ```
//!
//! Negative thresholds or delays disable delay scheduling entirely.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scheduler config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render scheduler config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Which delay-scheduling strategy relaxes locality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalityMode {
    /// Count offers the attempt passed on, relative to cluster size.
    MissedOpportunities,
    /// Wall-clock (logical) time since the last container was scheduled.
    ElapsedTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Continuous scheduling switches locality relaxation to time-based delays.
    pub continuous_scheduling_enabled: bool,
    /// Fraction of cluster nodes to pass on before accepting rack-local.
    pub node_locality_threshold: f64,
    /// Fraction of cluster nodes to pass on before accepting off-switch.
    pub rack_locality_threshold: f64,
    /// Milliseconds to wait before accepting rack-local (continuous mode).
    pub node_locality_delay_ms: i64,
    /// Milliseconds to wait before accepting off-switch (continuous mode).
    pub rack_locality_delay_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            continuous_scheduling_enabled: false,
            node_locality_threshold: -1.0,
            rack_locality_threshold: -1.0,
            node_locality_delay_ms: -1,
            rack_locality_delay_ms: -1,
        }
    }
}

/// File wrapper so the config can live under `[scheduler]`.
#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default)]
    scheduler: SchedulerConfig,
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a document containing a `[scheduler]` table.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.scheduler)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        let file = ConfigFile {
            scheduler: self.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    pub fn locality_mode(&self) -> LocalityMode {
        if self.continuous_scheduling_enabled {
            LocalityMode::ElapsedTime
        } else {
            LocalityMode::MissedOpportunities
        }
    }

    /// Whether the active strategy will ever hold back a container.
    pub fn delay_scheduling_enabled(&self) -> bool {
        match self.locality_mode() {
            LocalityMode::MissedOpportunities => {
                self.node_locality_threshold >= 0.0 && self.rack_locality_threshold >= 0.0
            }
            LocalityMode::ElapsedTime => {
                self.node_locality_delay_ms >= 0 && self.rack_locality_delay_ms >= 0
            }
        }
    }
}
