use std::sync::{Arc, Mutex, MutexGuard};

use scv_codec::{normalize_record, RawSidecarRecord};
use scv_types::{SidecarKey, SidecarRecord};

use crate::{compare_records, ExpectationRegistry, FieldDiff, Mismatch, MismatchReport};

/// Outcome of reconciling one actual record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Matched {
        scenario_name: String,
        key: SidecarKey,
    },
    ContentMismatch {
        scenario_name: String,
        key: SidecarKey,
        diffs: Vec<FieldDiff>,
    },
    UnexpectedActual {
        key: SidecarKey,
    },
}

#[derive(Debug, Default)]
struct Log {
    mismatches: Vec<Mismatch>,
    matched: usize,
}

/// Sole consumer of actual records and sole writer of the mismatch log.
///
/// Expectations may be registered from any thread at any time; an actual
/// record is resolved against whatever is registered when it arrives.
#[derive(Debug, Default)]
pub struct Reconciler {
    registry: Arc<ExpectationRegistry>,
    log: Mutex<Log>,
}

impl Reconciler {
    pub fn new(registry: Arc<ExpectationRegistry>) -> Self {
        Self {
            registry,
            log: Mutex::new(Log::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ExpectationRegistry> {
        &self.registry
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_expected(&self, scenario_name: impl Into<String>, record: SidecarRecord) {
        let scenario_name = scenario_name.into();
        tracing::debug!(scenario = %scenario_name, key = %record.key(), "expectation registered");
        self.registry.add(scenario_name, record);
    }

    /// Register a fixture in wire form. A fixture that fails normalization is
    /// logged as [`Mismatch::InvalidExpectation`] rather than rejected.
    pub fn add_expected_raw(&self, scenario_name: impl Into<String>, raw: &RawSidecarRecord) {
        let scenario_name = scenario_name.into();
        match normalize_record(raw) {
            Ok(record) => self.add_expected(scenario_name, record),
            Err(e) => {
                tracing::warn!(scenario = %scenario_name, error = %e, "invalid expectation");
                self.log().mismatches.push(Mismatch::InvalidExpectation {
                    scenario_name,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Resolve one actual record against the registry.
    pub fn reconcile(&self, actual: SidecarRecord) -> Verdict {
        let key = actual.key();
        let Some(expected) = self.registry.take_if_present(&key) else {
            tracing::warn!(%key, "unexpected sidecar");
            self.log().mismatches.push(Mismatch::UnexpectedActual { key });
            return Verdict::UnexpectedActual { key };
        };

        let diffs = compare_records(&expected.record, &actual);
        if diffs.is_empty() {
            tracing::debug!(scenario = %expected.scenario_name, %key, "sidecar matched");
            self.log().matched += 1;
            return Verdict::Matched {
                scenario_name: expected.scenario_name,
                key,
            };
        }

        tracing::warn!(
            scenario = %expected.scenario_name,
            %key,
            diffs = diffs.len(),
            "sidecar content mismatch"
        );
        self.log().mismatches.push(Mismatch::ContentMismatch {
            scenario_name: expected.scenario_name.clone(),
            key,
            diffs: diffs.clone(),
        });
        Verdict::ContentMismatch {
            scenario_name: expected.scenario_name,
            key,
            diffs,
        }
    }

    pub fn mismatch_count(&self) -> usize {
        self.log().mismatches.len()
    }

    pub fn matched_count(&self) -> usize {
        self.log().matched
    }

    /// Snapshot of the run so far. Whatever is still registered is reported
    /// as pending.
    pub fn final_report(&self, fatal: Option<String>) -> MismatchReport {
        let log = self.log();
        MismatchReport {
            mismatches: log.mismatches.clone(),
            pending: self.registry.snapshot_remaining(),
            matched: log.matched,
            fatal,
        }
    }
}
