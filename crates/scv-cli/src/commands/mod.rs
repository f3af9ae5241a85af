//! Command handlers for the `scv` binary.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod decode;
pub mod verify;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use scv_reconcile::VerificationSummary;

/// Environment override for `watch.root_dir`.
pub const ENV_ROOT_DIR: &str = "SCV_ROOT_DIR";

/// Read a UTF-8 JSON file (a leading BOM is tolerated).
pub fn read_json_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    serde_json::from_slice(bytes).with_context(|| format!("{path} must contain valid JSON"))
}

/// Write `exports/<run_id>/report.json`, creating the run directory.
pub fn write_report(exports_root: &Path, summary: &VerificationSummary) -> Result<PathBuf> {
    let run_dir = exports_root.join(summary.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    let report_path = run_dir.join("report.json");
    let json = serde_json::to_string_pretty(summary).context("serialize report failed")?;
    fs::write(&report_path, format!("{json}\n"))
        .with_context(|| format!("write report failed: {}", report_path.display()))?;
    Ok(report_path)
}
