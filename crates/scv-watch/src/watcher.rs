use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;

use scv_codec::{FramedJsonDecoder, RawSidecarRecord, RecordDecoder};
use scv_config::OracleConfig;
use scv_reconcile::{ExpectationRegistry, MismatchReport, Reconciler};
use scv_types::SidecarRecord;

use crate::pipeline::{self, Shared};
use crate::{CompletionGate, CompletionRule, DirectoryWatcher, DrainOutcome};

/// Poll cadences and drain bound for one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTiming {
    pub poll_interval: Duration,
    pub drain_timeout: Duration,
    pub drain_poll_interval: Duration,
}

impl WatchTiming {
    pub fn from_config(cfg: &OracleConfig) -> Self {
        Self {
            poll_interval: cfg.watch_poll_interval(),
            drain_timeout: cfg.drain_timeout(),
            drain_poll_interval: cfg.drain_poll_interval(),
        }
    }
}

impl Default for WatchTiming {
    fn default() -> Self {
        Self::from_config(&OracleConfig::default())
    }
}

/// Streaming sidecar oracle for one test suite.
///
/// Starting it spawns the background pipeline on the current tokio runtime.
/// Scenarios call [`add_expected_sidecar`](Self::add_expected_sidecar) from
/// any thread; the suite finishes with
/// [`assert_expectations`](Self::assert_expectations) (or the individual
/// wait / tear-down / predicate calls). Dropping the watcher tears it down.
#[derive(Debug)]
pub struct SidecarWatcher {
    shared: Arc<Shared>,
    gate: CompletionGate,
}

impl SidecarWatcher {
    /// Start watching with the settings of a loaded config.
    ///
    /// # Errors
    /// Fails when called outside a tokio runtime.
    pub fn start(cfg: &OracleConfig) -> Result<Self> {
        Self::start_with(
            &cfg.watch.root_dir,
            CompletionRule::from_config(&cfg.watch.completion),
            Box::new(FramedJsonDecoder),
            WatchTiming::from_config(cfg),
        )
    }

    /// Start watching with expectations already registered in `reconciler`.
    ///
    /// Files present in the root at start are reconciled on the first tick;
    /// registering their expectations here, before the pipeline exists,
    /// keeps them from being classified as unexpected.
    pub fn start_preloaded(cfg: &OracleConfig, reconciler: Reconciler) -> Result<Self> {
        Self::start_with_reconciler(
            &cfg.watch.root_dir,
            CompletionRule::from_config(&cfg.watch.completion),
            Box::new(FramedJsonDecoder),
            WatchTiming::from_config(cfg),
            reconciler,
        )
    }

    pub fn start_with(
        root: impl Into<PathBuf>,
        completion: CompletionRule,
        decoder: Box<dyn RecordDecoder>,
        timing: WatchTiming,
    ) -> Result<Self> {
        Self::start_with_reconciler(
            root,
            completion,
            decoder,
            timing,
            Reconciler::new(Arc::new(ExpectationRegistry::new())),
        )
    }

    pub fn start_with_reconciler(
        root: impl Into<PathBuf>,
        completion: CompletionRule,
        decoder: Box<dyn RecordDecoder>,
        timing: WatchTiming,
        reconciler: Reconciler,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("SidecarWatcher must be started inside a tokio runtime")?;

        let shared = Arc::new(Shared::new(reconciler));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = pipeline::spawn(
            &runtime,
            DirectoryWatcher::new(root, completion),
            decoder,
            Arc::clone(&shared),
            timing.poll_interval,
            shutdown_rx,
        );
        let gate = CompletionGate::new(
            Arc::clone(&shared),
            shutdown_tx,
            task,
            timing.drain_timeout,
            timing.drain_poll_interval,
        );
        Ok(Self { shared, gate })
    }

    /// Register an expected record. Never fails; safe from any thread.
    pub fn add_expected_sidecar(&self, scenario_name: impl Into<String>, record: SidecarRecord) {
        self.shared.reconciler.add_expected(scenario_name, record);
    }

    /// Register a wire-form fixture. An invalid fixture becomes a mismatch.
    pub fn add_expected_raw(&self, scenario_name: impl Into<String>, raw: &RawSidecarRecord) {
        self.shared.reconciler.add_expected_raw(scenario_name, raw);
    }

    pub async fn wait_until_finished(&self) -> DrainOutcome {
        self.gate.wait_until_finished().await
    }

    pub fn tear_down(&self) {
        self.gate.tear_down();
    }

    pub async fn join(&self) {
        self.gate.join().await;
    }

    pub fn files_processed(&self) -> usize {
        self.shared.files_processed()
    }

    /// Snapshot of the run: mismatches so far, current pending set, and the
    /// pipeline failure if any. Meant to be read after draining.
    pub fn report(&self) -> MismatchReport {
        self.shared.reconciler.final_report(self.shared.fatal())
    }

    pub fn there_are_no_mismatched_sidecars(&self) -> bool {
        self.report().there_are_no_mismatched_sidecars()
    }

    pub fn there_are_no_pending_sidecars(&self) -> bool {
        self.report().there_are_no_pending_sidecars()
    }

    pub fn get_errors(&self) -> String {
        self.report().get_errors()
    }

    /// Wait, shut down, and fail with the full diagnostics if anything is
    /// mismatched, pending, or the pipeline aborted.
    pub async fn assert_expectations(&self) -> Result<MismatchReport> {
        let outcome = self.wait_until_finished().await;
        self.tear_down();
        self.join().await;

        let report = self.report();
        if !report.passed() {
            bail!(
                "SIDECAR_VERIFICATION_FAILED ({}): {}",
                outcome.as_str(),
                report.get_errors()
            );
        }
        Ok(report)
    }
}

impl Drop for SidecarWatcher {
    fn drop(&mut self) {
        self.gate.tear_down();
    }
}
