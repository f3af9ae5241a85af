use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;

use scv_types::{ConsensusTimestamp, SidecarRecord};

fn write_config(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let cfg = dir.join("oracle.yaml");
    std::fs::write(
        &cfg,
        "watch:\n  root_dir: sidecars\n  poll_interval_ms: 10\n\
         drain:\n  timeout_ms: 300\n  poll_interval_ms: 10\n\
         report:\n  exports_dir: exports\n",
    )?;
    std::fs::create_dir_all(dir.join("sidecars"))?;
    Ok(cfg)
}

fn write_expectations(dir: &Path, record: &SidecarRecord) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("expectations.json");
    let entries = serde_json::json!([
        { "scenario": "call", "record": scv_codec::to_raw(record) }
    ]);
    std::fs::write(&path, serde_json::to_vec_pretty(&entries)?)?;
    Ok(path)
}

#[test]
fn cli_verify_passes_when_sidecars_match() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path())?;
    let record = SidecarRecord::actions(ConsensusTimestamp::new(1, 0), vec![]);
    let exp = write_expectations(dir.path(), &record)?;
    std::fs::write(
        dir.path().join("sidecars").join("1.rcd"),
        scv_codec::encode(&[record])?,
    )?;

    Command::cargo_bin("scv")?
        .current_dir(dir.path())
        .env_remove("SCV_ROOT_DIR")
        .args(["verify", "--config"])
        .arg(&cfg)
        .arg("--expectations")
        .arg(&exp)
        .assert()
        .success()
        .stdout(predicate::str::contains("result=PASS"))
        .stdout(predicate::str::contains("matched=1"));

    let runs: Vec<_> = std::fs::read_dir(dir.path().join("exports"))?.collect();
    assert_eq!(runs.len(), 1);
    Ok(())
}

#[test]
fn cli_verify_fails_and_lists_pending() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path())?;
    let record = SidecarRecord::actions(ConsensusTimestamp::new(2, 0), vec![]);
    let exp = write_expectations(dir.path(), &record)?;

    Command::cargo_bin("scv")?
        .current_dir(dir.path())
        .env_remove("SCV_ROOT_DIR")
        .args(["verify", "--config"])
        .arg(&cfg)
        .arg("--expectations")
        .arg(&exp)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("result=FAIL"))
        .stdout(predicate::str::contains("drain=timed_out"))
        .stdout(predicate::str::contains(
            "[call] expected sidecar 2.000000000/actions never arrived",
        ));
    Ok(())
}

#[test]
fn cli_root_dir_env_override_wins() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path())?;
    let record = SidecarRecord::actions(ConsensusTimestamp::new(3, 0), vec![]);
    let exp = write_expectations(dir.path(), &record)?;
    let other = dir.path().join("elsewhere");
    std::fs::create_dir_all(&other)?;
    std::fs::write(other.join("3.rcd"), scv_codec::encode(&[record])?)?;

    Command::cargo_bin("scv")?
        .current_dir(dir.path())
        .env("SCV_ROOT_DIR", &other)
        .args(["verify", "--config"])
        .arg(&cfg)
        .arg("--expectations")
        .arg(&exp)
        .assert()
        .success();
    Ok(())
}

#[test]
fn cli_verify_matches_files_written_before_it_started() -> anyhow::Result<()> {
    const N: i64 = 5_000;
    let dir = tempfile::tempdir()?;
    let cfg = write_config(dir.path())?;

    let records: Vec<SidecarRecord> = (0..N)
        .map(|i| SidecarRecord::actions(ConsensusTimestamp::new(100 + i, 0), vec![]))
        .collect();
    let entries: Vec<_> = records
        .iter()
        .map(|r| serde_json::json!({ "scenario": "bulk", "record": scv_codec::to_raw(r) }))
        .collect();
    let exp = dir.path().join("expectations.json");
    std::fs::write(&exp, serde_json::to_vec(&entries)?)?;

    // The node already wrote everything, newest record last.
    std::fs::write(
        dir.path().join("sidecars").join("100.rcd"),
        scv_codec::encode(&records)?,
    )?;

    Command::cargo_bin("scv")?
        .current_dir(dir.path())
        .env_remove("SCV_ROOT_DIR")
        .args(["verify", "--config"])
        .arg(&cfg)
        .arg("--expectations")
        .arg(&exp)
        .assert()
        .success()
        .stdout(predicate::str::contains("result=PASS"))
        .stdout(predicate::str::contains(format!("matched={N}")))
        .stdout(predicate::str::contains("unexpected sidecar").not());
    Ok(())
}
