//! scv-testkit
//!
//! Fixtures for exercising the sidecar oracle end to end: record builders
//! for the common contract scenarios and a [`SidecarDirWriter`] that plays
//! the node's part, writing sidecar files under either completion
//! convention (and leaving them incomplete on request).

mod dir_writer;
mod fixtures;

pub use dir_writer::{file_stem_for, SidecarDirWriter};
pub use fixtures::*;
