use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scv_types::{ExpectedSidecar, SidecarKey};

use crate::FieldDiff;

/// One failed reconciliation, in the order it was observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// The node emitted a record no scenario registered.
    UnexpectedActual { key: SidecarKey },
    /// Expected and actual share a key but differ in content.
    ContentMismatch {
        scenario_name: String,
        key: SidecarKey,
        diffs: Vec<FieldDiff>,
    },
    /// A scenario registered a raw fixture that could not be normalized.
    InvalidExpectation {
        scenario_name: String,
        reason: String,
    },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::UnexpectedActual { key } => {
                write!(f, "unexpected sidecar {key}: no scenario expected it")
            }
            Mismatch::ContentMismatch {
                scenario_name,
                key,
                diffs,
            } => {
                write!(f, "[{scenario_name}] sidecar {key} differs in {} field(s)", diffs.len())?;
                for d in diffs {
                    write!(f, "\n    {d}")?;
                }
                Ok(())
            }
            Mismatch::InvalidExpectation {
                scenario_name,
                reason,
            } => write!(f, "[{scenario_name}] invalid expectation: {reason}"),
        }
    }
}

/// Final verdict of one oracle run. Read-only once built.
#[derive(Clone, Debug, Default)]
pub struct MismatchReport {
    pub mismatches: Vec<Mismatch>,
    /// Expectations never satisfied by an actual record.
    pub pending: Vec<ExpectedSidecar>,
    pub matched: usize,
    /// Pipeline abort (unreadable directory, malformed file), if any.
    pub fatal: Option<String>,
}

impl MismatchReport {
    /// True when no mismatch was recorded and the pipeline did not abort.
    pub fn there_are_no_mismatched_sidecars(&self) -> bool {
        self.mismatches.is_empty() && self.fatal.is_none()
    }

    pub fn there_are_no_pending_sidecars(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn passed(&self) -> bool {
        self.there_are_no_mismatched_sidecars() && self.there_are_no_pending_sidecars()
    }

    /// Human-readable diagnostics. Empty when the run passed.
    pub fn get_errors(&self) -> String {
        if self.passed() {
            return String::new();
        }

        let mut out = format!(
            "sidecar verification failed: {} mismatch(es), {} pending, {} matched",
            self.mismatches.len(),
            self.pending.len(),
            self.matched
        );
        for m in &self.mismatches {
            out.push_str(&format!("\n  {m}"));
        }
        for p in &self.pending {
            out.push_str(&format!(
                "\n  [{}] expected sidecar {} never arrived",
                p.scenario_name,
                p.key()
            ));
        }
        if let Some(fatal) = &self.fatal {
            out.push_str(&format!("\n  fatal: {fatal}"));
        }
        out
    }

    pub fn summary(&self, run_id: Uuid) -> VerificationSummary {
        let mut entries: Vec<SummaryEntry> = self
            .mismatches
            .iter()
            .map(|m| match m {
                Mismatch::UnexpectedActual { key } => SummaryEntry::UnexpectedActual {
                    key: key.to_string(),
                },
                Mismatch::ContentMismatch {
                    scenario_name,
                    key,
                    diffs,
                } => SummaryEntry::ContentMismatch {
                    scenario_name: scenario_name.clone(),
                    key: key.to_string(),
                    diffs: diffs.clone(),
                },
                Mismatch::InvalidExpectation {
                    scenario_name,
                    reason,
                } => SummaryEntry::InvalidExpectation {
                    scenario_name: scenario_name.clone(),
                    reason: reason.clone(),
                },
            })
            .collect();
        entries.extend(self.pending.iter().map(|p| SummaryEntry::Pending {
            scenario_name: p.scenario_name.clone(),
            key: p.key().to_string(),
        }));

        VerificationSummary {
            run_id,
            finished_at_utc: Utc::now(),
            matched: self.matched,
            entries,
            fatal: self.fatal.clone(),
            passed: self.passed(),
        }
    }
}

/// Serializable form of one report line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryEntry {
    UnexpectedActual {
        key: String,
    },
    ContentMismatch {
        scenario_name: String,
        key: String,
        diffs: Vec<FieldDiff>,
    },
    InvalidExpectation {
        scenario_name: String,
        reason: String,
    },
    Pending {
        scenario_name: String,
        key: String,
    },
}

/// What gets written to `exports/<run_id>/report.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub run_id: Uuid,
    pub finished_at_utc: DateTime<Utc>,
    pub matched: usize,
    pub entries: Vec<SummaryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
    pub passed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scv_types::{ConsensusTimestamp, PayloadKind, SidecarRecord};

    fn key() -> SidecarKey {
        SidecarKey {
            consensus_timestamp: ConsensusTimestamp::new(5, 0),
            kind: PayloadKind::Actions,
        }
    }

    #[test]
    fn empty_report_passes_with_no_errors() {
        let r = MismatchReport::default();
        assert!(r.passed());
        assert_eq!(r.get_errors(), "");
    }

    #[test]
    fn fatal_fails_the_mismatch_predicate() {
        let r = MismatchReport {
            fatal: Some("malformed frame at byte 8".to_string()),
            ..Default::default()
        };
        assert!(!r.there_are_no_mismatched_sidecars());
        assert!(r.there_are_no_pending_sidecars());
        assert!(r.get_errors().contains("fatal: malformed frame at byte 8"));
    }

    #[test]
    fn errors_list_mismatches_then_pending() {
        let r = MismatchReport {
            mismatches: vec![Mismatch::UnexpectedActual { key: key() }],
            pending: vec![ExpectedSidecar::new(
                "late",
                SidecarRecord::state_changes(ConsensusTimestamp::new(6, 0), vec![]),
            )],
            matched: 3,
            fatal: None,
        };
        let text = r.get_errors();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "sidecar verification failed: 1 mismatch(es), 1 pending, 3 matched"
        );
        assert!(lines[1].contains("unexpected sidecar 5.000000000/actions"));
        assert!(lines[2].contains("[late] expected sidecar 6.000000000/state_changes"));
    }

    #[test]
    fn summary_serializes_tagged_entries() {
        let r = MismatchReport {
            mismatches: vec![Mismatch::UnexpectedActual { key: key() }],
            ..Default::default()
        };
        let s = r.summary(Uuid::nil());
        assert!(!s.passed);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["entries"][0]["kind"], "unexpected_actual");
        assert_eq!(v["entries"][0]["key"], "5.000000000/actions");
        assert!(v.get("fatal").is_none());
    }
}
