use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Typed oracle configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub watch: WatchConfig,
    pub drain: DrainConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory the node writes sidecar files into.
    pub root_dir: String,
    pub poll_interval_ms: u64,
    pub completion: CompletionConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_dir: "data/sidecars".to_string(),
            poll_interval_ms: 250,
            completion: CompletionConfig::default(),
        }
    }
}

/// How the watcher decides a file is fully written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CompletionConfig {
    /// Complete once the name carries `data_suffix` (producer renames on close).
    Suffix { data_suffix: String },
    /// `X<data_suffix>` is complete once `X<marker_suffix>` exists.
    CompanionMarker {
        data_suffix: String,
        marker_suffix: String,
    },
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig::Suffix {
            data_suffix: ".rcd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Upper bound on `wait_until_finished`.
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Root for `<run_id>/report.json` exports.
    pub exports_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            exports_dir: "exports".to_string(),
        }
    }
}

impl OracleConfig {
    /// Reject values the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.watch.root_dir.trim().is_empty() {
            bail!("CONFIG_INVALID: watch.root_dir must not be empty");
        }
        if self.watch.poll_interval_ms == 0 {
            bail!("CONFIG_INVALID: watch.poll_interval_ms must be > 0");
        }
        if self.drain.poll_interval_ms == 0 {
            bail!("CONFIG_INVALID: drain.poll_interval_ms must be > 0");
        }
        match &self.watch.completion {
            CompletionConfig::Suffix { data_suffix } => {
                if data_suffix.is_empty() {
                    bail!("CONFIG_INVALID: watch.completion.data_suffix must not be empty");
                }
            }
            CompletionConfig::CompanionMarker {
                data_suffix,
                marker_suffix,
            } => {
                if data_suffix.is_empty() || marker_suffix.is_empty() {
                    bail!("CONFIG_INVALID: watch.completion suffixes must not be empty");
                }
                if data_suffix == marker_suffix {
                    bail!("CONFIG_INVALID: watch.completion.marker_suffix must differ from data_suffix");
                }
            }
        }
        Ok(())
    }

    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain.timeout_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain.poll_interval_ms)
    }
}
