//! scv-watch
//!
//! Runtime half of the sidecar oracle. A single background tokio task polls
//! the sidecar directory, decodes each newly completed file and feeds its
//! records to the [`scv_reconcile::Reconciler`]. Scenario code registers
//! expectations concurrently through [`SidecarWatcher`], then waits for the
//! registry to drain and asserts on the final report.
//!
//! Layout:
//! - [`directory`]: completion-aware directory listing.
//! - `pipeline`: the background poll loop.
//! - [`gate`]: drain wait and cooperative shutdown.
//! - [`watcher`]: public facade.
//! - [`collaborators`]: executor / ledger-query seams used to build expectations.

pub mod collaborators;
pub mod directory;
pub mod gate;
mod pipeline;
pub mod watcher;

pub use collaborators::{
    expect_after_settlement, expected_bytecode_sidecar, LedgerStateQuery, TransactionExecutor,
};
pub use directory::{CompletedFile, CompletionRule, DirectoryWatcher, WatchError};
pub use gate::{CompletionGate, DrainOutcome};
pub use watcher::{SidecarWatcher, WatchTiming};
