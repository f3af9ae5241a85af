//! Drain wait and shutdown for the background pipeline.
//!
//! `wait_until_finished` returns once every registered expectation has been
//! consumed, the pipeline has aborted, or the drain timeout elapsed. It is
//! woken early after each processed file and otherwise re-checks on a fixed
//! poll interval, so a missed wake-up costs at most one interval.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::pipeline::Shared;

/// Why `wait_until_finished` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No expectation is left in the registry.
    Drained,
    TimedOut,
    /// The pipeline stopped on a fatal error.
    PipelineFailed,
}

impl DrainOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainOutcome::Drained => "drained",
            DrainOutcome::TimedOut => "timed_out",
            DrainOutcome::PipelineFailed => "pipeline_failed",
        }
    }
}

#[derive(Debug)]
pub struct CompletionGate {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    drain_timeout: Duration,
    drain_poll_interval: Duration,
}

impl CompletionGate {
    pub(crate) fn new(
        shared: Arc<Shared>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
        drain_timeout: Duration,
        drain_poll_interval: Duration,
    ) -> Self {
        Self {
            shared,
            shutdown,
            task: Mutex::new(Some(task)),
            drain_timeout,
            drain_poll_interval,
        }
    }

    /// Never fails; the outcome is informational.
    pub async fn wait_until_finished(&self) -> DrainOutcome {
        let deadline = Instant::now() + self.drain_timeout;
        let registry = self.shared.reconciler.registry();
        let outcome = loop {
            // Register interest before checking, so a file processed in
            // between still wakes us.
            let progressed = self.shared.progress.notified();
            tokio::pin!(progressed);
            progressed.as_mut().enable();

            if self.shared.fatal().is_some() {
                break DrainOutcome::PipelineFailed;
            }
            if registry.is_empty() {
                break DrainOutcome::Drained;
            }
            let now = Instant::now();
            if now >= deadline {
                break DrainOutcome::TimedOut;
            }
            let nap = self.drain_poll_interval.min(deadline - now);
            tokio::select! {
                _ = &mut progressed => {}
                _ = tokio::time::sleep(nap) => {}
            }
        };

        match outcome {
            DrainOutcome::Drained => tracing::info!("all expected sidecars observed"),
            DrainOutcome::TimedOut => tracing::warn!(
                pending = registry.len(),
                timeout_ms = self.drain_timeout.as_millis() as u64,
                "drain timed out"
            ),
            DrainOutcome::PipelineFailed => {
                tracing::warn!("drain stopped: sidecar pipeline failed")
            }
        }
        outcome
    }

    /// Ask the background loop to stop at its next poll boundary. Idempotent.
    pub fn tear_down(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_torn_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for the background task to exit. Later calls return immediately.
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(task) = task else {
            return;
        };
        if let Err(e) = task.await {
            tracing::error!(error = %e, "sidecar pipeline task panicked");
            self.shared.set_fatal(format!("pipeline task panicked: {e}"));
        }
    }
}
