use anyhow::{Context, Result};
use std::fs;

use scv_codec::{to_raw, FramedJsonDecoder, RecordDecoder};

/// Print every record of `file` as one JSON line, in file order.
pub fn run(file: &str) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("read sidecar file failed: {file}"))?;
    let records = FramedJsonDecoder
        .decode(&bytes)
        .with_context(|| format!("decode failed: {file}"))?;
    for record in &records {
        let line = serde_json::to_string(&to_raw(record)).context("serialize record failed")?;
        println!("{line}");
    }
    tracing::debug!(file, records = records.len(), "decoded");
    Ok(())
}
