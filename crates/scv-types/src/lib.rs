//! scv-types
//!
//! Data model for sidecar verification: the records a ledger node emits next
//! to its transaction records (contract actions, storage state changes,
//! deployed bytecode) and the expectations test scenarios register for them.
//!
//! Mutually exclusive field groups (caller identity, action outcome, action
//! recipient, record payload) are sum types, so invalid combinations cannot be
//! constructed in memory. Wire-level validation lives in `scv-codec`.
//!
//! Pure data. No IO.

mod ids;
mod record;

pub use ids::*;
pub use record::*;
