use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use scv_codec::DecodeError;
use scv_config::CompletionConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal pipeline failure. Either one aborts the background task.
#[derive(Debug)]
pub enum WatchError {
    Io { path: PathBuf, source: io::Error },
    Decode { file: String, source: DecodeError },
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::Io { path, source } => {
                write!(f, "io error on {}: {source}", path.display())
            }
            WatchError::Decode { file, source } => write!(f, "{file}: {source}"),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::Io { source, .. } => Some(source),
            WatchError::Decode { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion rule
// ---------------------------------------------------------------------------

/// How a file is known to be fully written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionRule {
    /// Complete iff the name ends with `suffix`.
    Suffix { suffix: String },
    /// `X<data_suffix>` is complete iff `X<marker_suffix>` is present.
    CompanionMarker {
        data_suffix: String,
        marker_suffix: String,
    },
}

impl CompletionRule {
    pub fn from_config(cfg: &CompletionConfig) -> Self {
        match cfg {
            CompletionConfig::Suffix { data_suffix } => CompletionRule::Suffix {
                suffix: data_suffix.clone(),
            },
            CompletionConfig::CompanionMarker {
                data_suffix,
                marker_suffix,
            } => CompletionRule::CompanionMarker {
                data_suffix: data_suffix.clone(),
                marker_suffix: marker_suffix.clone(),
            },
        }
    }

    /// `name` is a data file and is complete given the current listing.
    fn is_complete(&self, name: &str, listing: &BTreeSet<String>) -> bool {
        match self {
            CompletionRule::Suffix { suffix } => name.ends_with(suffix.as_str()),
            CompletionRule::CompanionMarker {
                data_suffix,
                marker_suffix,
            } => match name.strip_suffix(data_suffix.as_str()) {
                Some(stem) => listing.contains(&format!("{stem}{marker_suffix}")),
                None => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// A newly completed sidecar file, read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Lists the sidecar root and hands out each completed file exactly once.
///
/// Files are emitted in lexicographic name order. Sidecar file names lead
/// with the consensus timestamp, so that is creation order.
#[derive(Debug)]
pub struct DirectoryWatcher {
    root: PathBuf,
    completion: CompletionRule,
    processed: BTreeSet<String>,
}

impl DirectoryWatcher {
    pub fn new(root: impl Into<PathBuf>, completion: CompletionRule) -> Self {
        Self {
            root: root.into(),
            completion,
            processed: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Files that became complete since the previous call.
    ///
    /// # Errors
    /// [`WatchError::Io`] if the root cannot be listed or a complete file
    /// cannot be read. A missing root yields no files.
    pub fn poll_once(&mut self) -> Result<Vec<CompletedFile>, WatchError> {
        let listing = match list_file_names(&self.root) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(WatchError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut out = Vec::new();
        for name in &listing {
            if self.processed.contains(name) || !self.completion.is_complete(name, &listing) {
                continue;
            }
            let path = self.root.join(name);
            let bytes = std::fs::read(&path).map_err(|source| WatchError::Io { path, source })?;
            tracing::debug!(file = %name, bytes = bytes.len(), "sidecar file completed");
            self.processed.insert(name.clone());
            out.push(CompletedFile {
                name: name.clone(),
                bytes,
            });
        }
        Ok(out)
    }
}

fn list_file_names(root: &Path) -> io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        // Non-UTF-8 names are never sidecar files.
        if let Ok(name) = entry.file_name().into_string() {
            names.insert(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn suffix() -> CompletionRule {
        CompletionRule::Suffix {
            suffix: ".rcd".to_string(),
        }
    }

    fn marker() -> CompletionRule {
        CompletionRule::CompanionMarker {
            data_suffix: ".rcd".to_string(),
            marker_suffix: ".rcd_sig".to_string(),
        }
    }

    #[test]
    fn missing_root_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = DirectoryWatcher::new(dir.path().join("not-yet"), suffix());
        assert!(w.poll_once().unwrap().is_empty());
    }

    #[test]
    fn suffix_rule_skips_temp_names_and_emits_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("002.rcd"), b"b").unwrap();
        fs::write(dir.path().join("001.rcd"), b"a").unwrap();
        fs::write(dir.path().join("003.rcd.tmp"), b"partial").unwrap();

        let mut w = DirectoryWatcher::new(dir.path(), suffix());
        let files = w.poll_once().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["001.rcd", "002.rcd"]);
        assert_eq!(files[0].bytes, b"a");

        assert!(w.poll_once().unwrap().is_empty());

        fs::rename(dir.path().join("003.rcd.tmp"), dir.path().join("003.rcd")).unwrap();
        let files = w.poll_once().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "003.rcd");
        assert_eq!(w.processed_count(), 3);
    }

    #[test]
    fn marker_rule_waits_for_companion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("001.rcd"), b"a").unwrap();

        let mut w = DirectoryWatcher::new(dir.path(), marker());
        assert!(w.poll_once().unwrap().is_empty());

        fs::write(dir.path().join("001.rcd_sig"), b"").unwrap();
        let files = w.poll_once().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "001.rcd");
    }

    #[test]
    fn subdirectories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested.rcd")).unwrap();
        let mut w = DirectoryWatcher::new(dir.path(), suffix());
        assert!(w.poll_once().unwrap().is_empty());
    }

    #[test]
    fn rule_from_config() {
        let cfg = CompletionConfig::CompanionMarker {
            data_suffix: ".rcd".to_string(),
            marker_suffix: ".rcd_sig".to_string(),
        };
        assert_eq!(CompletionRule::from_config(&cfg), marker());
    }
}
