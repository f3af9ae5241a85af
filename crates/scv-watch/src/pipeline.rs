use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use scv_codec::RecordDecoder;
use scv_reconcile::Reconciler;

use crate::{DirectoryWatcher, WatchError};

/// State shared between the background task and scenario-facing callers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) reconciler: Reconciler,
    /// Signalled after every processed file and on abort.
    pub(crate) progress: Notify,
    fatal: Mutex<Option<String>>,
    files_processed: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            progress: Notify::new(),
            fatal: Mutex::new(None),
            files_processed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fatal(&self) -> Option<String> {
        self.fatal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn set_fatal(&self, msg: String) {
        let mut slot = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
        // First failure wins.
        if slot.is_none() {
            *slot = Some(msg);
        }
    }

    pub(crate) fn files_processed(&self) -> usize {
        self.files_processed.load(Ordering::Relaxed)
    }
}

/// One poll: read every newly completed file and reconcile its records in
/// file order.
fn tick(
    watcher: &mut DirectoryWatcher,
    decoder: &dyn RecordDecoder,
    shared: &Shared,
) -> Result<(), WatchError> {
    for file in watcher.poll_once()? {
        let records = decoder
            .decode(&file.bytes)
            .map_err(|source| WatchError::Decode {
                file: file.name.clone(),
                source,
            })?;
        let n = records.len();
        for record in records {
            shared.reconciler.reconcile(record);
        }
        shared.files_processed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(file = %file.name, records = n, "sidecar file reconciled");
        shared.progress.notify_waiters();
    }
    Ok(())
}

/// Spawn the watch -> decode -> reconcile loop on the given runtime.
///
/// The loop stops when `shutdown` flips to `true` (checked at each poll
/// boundary) or on the first fatal error, which is stored in `shared`.
pub(crate) fn spawn(
    runtime: &tokio::runtime::Handle,
    mut watcher: DirectoryWatcher,
    decoder: Box<dyn RecordDecoder>,
    shared: Arc<Shared>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        tracing::info!(
            root = %watcher.root().display(),
            decoder = decoder.name(),
            poll_ms = poll_interval.as_millis() as u64,
            "sidecar pipeline started"
        );
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender also means stop.
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = tick(&mut watcher, decoder.as_ref(), &shared) {
                tracing::error!(error = %e, "sidecar pipeline aborted");
                shared.set_fatal(e.to_string());
                shared.progress.notify_waiters();
                return;
            }
        }
        tracing::info!(
            files = shared.files_processed(),
            "sidecar pipeline stopped"
        );
    })
}
