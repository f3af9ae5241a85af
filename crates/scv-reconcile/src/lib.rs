//! scv-reconcile
//!
//! Matching core of the sidecar oracle:
//! - [`ExpectationRegistry`]: concurrent store of expected records keyed by
//!   (consensus timestamp, payload kind).
//! - [`compare_records`]: exact structural comparison producing field diffs.
//! - [`Reconciler`]: consumes actual records in arrival order, classifies each
//!   as matched / content mismatch / unexpected, and is the sole writer of the
//!   mismatch log.
//! - [`MismatchReport`]: post-drain, read-only verdict with pass/fail
//!   predicates and rendered diagnostics.
//!
//! Deterministic, no IO.

mod compare;
mod reconciler;
mod registry;
mod report;

pub use compare::{compare_records, render_bytes, FieldDiff};
pub use reconciler::{Reconciler, Verdict};
pub use registry::ExpectationRegistry;
pub use report::{Mismatch, MismatchReport, SummaryEntry, VerificationSummary};
