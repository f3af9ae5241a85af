use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use scv_codec::RawSidecarRecord;
use scv_config::{report_unused_keys, LoadedConfig, UnusedKeyPolicy};
use scv_reconcile::Reconciler;
use scv_watch::SidecarWatcher;

use super::{read_json_file, write_report, ENV_ROOT_DIR};

/// One entry of the `--expectations` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationEntry {
    pub scenario: String,
    pub record: RawSidecarRecord,
}

fn load_config(config_paths: &[String], strict: bool) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let mut loaded = scv_config::load_layered_yaml(&path_refs)?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    for key in &unused.unused_leaf_pointers {
        tracing::warn!(key = %key, "config key is not read by anything");
    }

    if let Ok(root) = std::env::var(ENV_ROOT_DIR) {
        tracing::info!(root = %root, "watch.root_dir overridden from {ENV_ROOT_DIR}");
        loaded.config.watch.root_dir = root;
        loaded.config.validate()?;
    }
    Ok(loaded)
}

/// Register the expectations, wait for them to drain, print and export the
/// report. Returns whether verification passed.
pub async fn run(config_paths: &[String], expectations_path: &str, strict: bool) -> Result<bool> {
    let loaded = load_config(config_paths, strict)?;
    let entries: Vec<ExpectationEntry> = read_json_file(expectations_path)
        .with_context(|| format!("load expectations failed: {expectations_path}"))?;

    let run_id = Uuid::new_v4();
    tracing::info!(
        %run_id,
        config_hash = %loaded.config_hash,
        root = %loaded.config.watch.root_dir,
        expectations = entries.len(),
        "verification started"
    );

    // Register everything before the first poll: the root may already hold
    // files the node wrote before this command ran.
    let reconciler = Reconciler::default();
    for entry in &entries {
        reconciler.add_expected_raw(entry.scenario.as_str(), &entry.record);
    }
    let watcher = SidecarWatcher::start_preloaded(&loaded.config, reconciler)?;

    let outcome = watcher.wait_until_finished().await;
    watcher.tear_down();
    watcher.join().await;

    let report = watcher.report();
    let summary = report.summary(run_id);
    let report_path = write_report(Path::new(&loaded.config.report.exports_dir), &summary)?;

    println!("run_id={run_id}");
    println!("drain={}", outcome.as_str());
    println!("matched={}", report.matched);
    if report.passed() {
        println!("result=PASS");
    } else {
        println!("result=FAIL");
        println!("{}", report.get_errors());
    }
    println!("report={}", report_path.display());

    Ok(report.passed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectation_entries_parse_wire_records() {
        let json = r#"[{
            "scenario": "create",
            "record": {
                "consensus_timestamp": "1700000000.000000001",
                "state_changes": [{
                    "contract_id": "0.0.1002",
                    "storage_changes": [{ "slot": "0x0", "value_read": "0x0", "value_written": "0x37" }]
                }]
            }
        }]"#;
        let entries: Vec<ExpectationEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].scenario, "create");
        assert!(scv_codec::normalize_record(&entries[0].record).is_ok());
    }

    #[test]
    fn strict_config_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cfg.yaml");
        std::fs::write(&p, "watch:\n  pol_interval_ms: 5\n").unwrap();
        let paths = vec![p.to_string_lossy().to_string()];

        assert!(load_config(&paths, false).is_ok());
        let err = load_config(&paths, true).unwrap_err();
        assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
    }
}
