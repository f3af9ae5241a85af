use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use scv_codec::FramedJsonDecoder;
use scv_reconcile::Reconciler;
use scv_types::{ConsensusTimestamp, SidecarRecord};
use scv_watch::{CompletionRule, SidecarWatcher, WatchTiming};

/// Suffix a producer writes under before renaming to the final name.
const IN_PROGRESS_SUFFIX: &str = ".part";

/// File stem for records at `ts`. Stems sort in timestamp order.
pub fn file_stem_for(ts: ConsensusTimestamp) -> String {
    match ts.to_utc() {
        Some(t) => t.format("%Y-%m-%dT%H_%M_%S%.9fZ").to_string(),
        None => format!("{:020}_{:09}", ts.seconds, ts.nanos),
    }
}

/// Writes sidecar files into a private temp directory the way the node does.
#[derive(Debug)]
pub struct SidecarDirWriter {
    dir: TempDir,
    completion: CompletionRule,
}

impl SidecarDirWriter {
    pub fn new(completion: CompletionRule) -> Result<Self> {
        let dir = tempfile::tempdir().context("create sidecar temp dir")?;
        Ok(Self { dir, completion })
    }

    /// `.rcd` files renamed into place on close.
    pub fn with_suffix() -> Result<Self> {
        Self::new(CompletionRule::Suffix {
            suffix: ".rcd".to_string(),
        })
    }

    /// `.rcd` data followed by a `.rcd_sig` marker.
    pub fn with_marker() -> Result<Self> {
        Self::new(CompletionRule::CompanionMarker {
            data_suffix: ".rcd".to_string(),
            marker_suffix: ".rcd_sig".to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn completion(&self) -> &CompletionRule {
        &self.completion
    }

    /// Start a watcher on this directory with the matching completion rule.
    pub fn watcher(&self, timing: WatchTiming) -> Result<SidecarWatcher> {
        SidecarWatcher::start_with(
            self.root(),
            self.completion.clone(),
            Box::new(FramedJsonDecoder),
            timing,
        )
    }

    /// Like [`watcher`](Self::watcher), with `reconciler`'s expectations
    /// registered before the first poll.
    pub fn watcher_preloaded(
        &self,
        timing: WatchTiming,
        reconciler: Reconciler,
    ) -> Result<SidecarWatcher> {
        SidecarWatcher::start_with_reconciler(
            self.root(),
            self.completion.clone(),
            Box::new(FramedJsonDecoder),
            timing,
            reconciler,
        )
    }

    fn data_suffix(&self) -> &str {
        match &self.completion {
            CompletionRule::Suffix { suffix } => suffix,
            CompletionRule::CompanionMarker { data_suffix, .. } => data_suffix,
        }
    }

    fn data_path(&self, stem: &str) -> PathBuf {
        self.root().join(format!("{stem}{}", self.data_suffix()))
    }

    fn in_progress_path(&self, stem: &str) -> PathBuf {
        self.root()
            .join(format!("{stem}{}{IN_PROGRESS_SUFFIX}", self.data_suffix()))
    }

    /// Write raw bytes as a file that is not yet complete.
    pub fn write_incomplete_bytes(&self, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = match &self.completion {
            CompletionRule::Suffix { .. } => self.in_progress_path(stem),
            CompletionRule::CompanionMarker { .. } => self.data_path(stem),
        };
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_incomplete(&self, stem: &str, records: &[SidecarRecord]) -> Result<PathBuf> {
        let bytes = scv_codec::encode(records).context("encode sidecar records")?;
        self.write_incomplete_bytes(stem, &bytes)
    }

    /// Finish a file started with `write_incomplete*`.
    pub fn complete(&self, stem: &str) -> Result<PathBuf> {
        let data = self.data_path(stem);
        match &self.completion {
            CompletionRule::Suffix { .. } => {
                let partial = self.in_progress_path(stem);
                if !partial.exists() {
                    bail!("no in-progress file for {stem}");
                }
                fs::rename(&partial, &data)
                    .with_context(|| format!("rename {}", partial.display()))?;
            }
            CompletionRule::CompanionMarker { marker_suffix, .. } => {
                if !data.exists() {
                    bail!("no data file for {stem}");
                }
                let marker = self.root().join(format!("{stem}{marker_suffix}"));
                fs::write(&marker, b"").with_context(|| format!("write {}", marker.display()))?;
            }
        }
        Ok(data)
    }

    pub fn write_complete_bytes(&self, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.write_incomplete_bytes(stem, bytes)?;
        self.complete(stem)
    }

    pub fn write_complete(&self, stem: &str, records: &[SidecarRecord]) -> Result<PathBuf> {
        self.write_incomplete(stem, records)?;
        self.complete(stem)
    }

    /// Write `records` in one complete file named after the first record.
    pub fn emit(&self, records: &[SidecarRecord]) -> Result<PathBuf> {
        let Some(first) = records.first() else {
            bail!("emit needs at least one record");
        };
        self.write_complete(&file_stem_for(first.consensus_timestamp), records)
    }
}
