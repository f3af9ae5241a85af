use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use scv_types::{ExpectedSidecar, SidecarKey, SidecarRecord};

type Slots = BTreeMap<SidecarKey, VecDeque<ExpectedSidecar>>;

/// Expected sidecars awaiting their actual counterpart.
///
/// Shared between many registering scenario threads and the single
/// reconciling consumer. A coarse mutex is enough at tens of records per
/// second. Registrations for an already-occupied key queue behind it and are
/// taken in registration order.
#[derive(Debug, Default)]
pub struct ExpectationRegistry {
    slots: Mutex<Slots>,
}

impl ExpectationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: no operation below leaves the map half-updated.
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an expectation. Never fails.
    pub fn add(&self, scenario_name: impl Into<String>, record: SidecarRecord) {
        let expected = ExpectedSidecar::new(scenario_name, record);
        self.slots()
            .entry(expected.key())
            .or_default()
            .push_back(expected);
    }

    /// Remove and return the oldest expectation for `key`, if any.
    pub fn take_if_present(&self, key: &SidecarKey) -> Option<ExpectedSidecar> {
        let mut slots = self.slots();
        let queue = slots.get_mut(key)?;
        let taken = queue.pop_front();
        if queue.is_empty() {
            slots.remove(key);
        }
        taken
    }

    /// Everything still registered, in key order then registration order.
    pub fn snapshot_remaining(&self) -> Vec<ExpectedSidecar> {
        self.slots().values().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots().values().map(VecDeque::len).sum()
    }
}
