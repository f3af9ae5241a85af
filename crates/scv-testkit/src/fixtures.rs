use anyhow::{Context, Result};
use std::fs;
use std::time::Duration;

use scv_codec::RawSidecarRecord;
use scv_types::{
    ActionOutcome, CallOperationType, CallType, Caller, ContractAction, ContractStateChange,
    EntityId, Recipient, StorageChange,
};
use scv_watch::WatchTiming;

/// Top-level CREATE by an account that yields `contract`, with empty output.
pub fn create_action(payer: u64, contract: u64, gas: u64, gas_used: u64) -> ContractAction {
    ContractAction::new(
        CallType::Create,
        CallOperationType::OpCreate,
        Caller::CallingAccount(EntityId::num(payer)),
        gas,
        gas_used,
        Some(Recipient::Contract(EntityId::num(contract))),
        ActionOutcome::Output(Vec::new()),
    )
}

/// Top-level CALL into `contract` that returned `output`.
pub fn call_action(
    payer: u64,
    contract: u64,
    gas: u64,
    gas_used: u64,
    input: &[u8],
    output: &[u8],
) -> ContractAction {
    ContractAction::new(
        CallType::Call,
        CallOperationType::OpCall,
        Caller::CallingAccount(EntityId::num(payer)),
        gas,
        gas_used,
        Some(Recipient::Contract(EntityId::num(contract))),
        ActionOutcome::Output(output.to_vec()),
    )
    .with_input(input)
}

/// Nested call from one contract into another that reverted.
pub fn reverted_inner_call(
    from_contract: u64,
    to_contract: u64,
    gas: u64,
    gas_used: u64,
    reason: &[u8],
) -> ContractAction {
    ContractAction::new(
        CallType::Call,
        CallOperationType::OpCall,
        Caller::CallingContract(EntityId::num(from_contract)),
        gas,
        gas_used,
        Some(Recipient::Contract(EntityId::num(to_contract))),
        ActionOutcome::RevertReason(reason.to_vec()),
    )
    .with_call_depth(1)
}

/// One contract with a single slot written.
pub fn storage_write(contract: u64, slot: u64, read: u64, written: u64) -> ContractStateChange {
    ContractStateChange::new(
        EntityId::num(contract),
        vec![StorageChange::read_write(slot, read, written)],
    )
}

/// One contract with a single slot only read.
pub fn storage_read(contract: u64, slot: u64, read: u64) -> ContractStateChange {
    ContractStateChange::new(
        EntityId::num(contract),
        vec![StorageChange::read_only(slot, read)],
    )
}

/// Short cadences for tests; drains fail within `drain_timeout_ms`.
pub fn fast_timing(drain_timeout_ms: u64) -> WatchTiming {
    WatchTiming {
        poll_interval: Duration::from_millis(10),
        drain_timeout: Duration::from_millis(drain_timeout_ms),
        drain_poll_interval: Duration::from_millis(10),
    }
}

/// Parse a wire-form fixture as authored in test data.
pub fn raw_fixture(json: &str) -> Result<RawSidecarRecord> {
    serde_json::from_str(json).context("parse raw sidecar fixture")
}

pub fn load_raw_fixture(path: &str) -> Result<RawSidecarRecord> {
    let s = fs::read_to_string(path).with_context(|| format!("read fixture: {path}"))?;
    raw_fixture(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_action_shape() {
        let a = create_action(1001, 1002, 197_000, 68_492);
        assert_eq!(a.caller, Caller::CallingAccount(EntityId::num(1001)));
        assert_eq!(a.recipient, Some(Recipient::Contract(EntityId::num(1002))));
        assert!(a.outcome.bytes().is_empty());
        assert_eq!(a.call_depth, 0);
    }

    #[test]
    fn fixture_with_two_outcomes_parses_but_is_not_normalizable() {
        let raw = raw_fixture(
            r#"{
                "consensus_timestamp": "5.000000000",
                "actions": [{
                    "call_type": "CALL",
                    "call_operation_type": "OP_CALL",
                    "calling_account": "0.0.1001",
                    "gas": 1, "gas_used": 1,
                    "output": "0x", "revert_reason": "0x"
                }]
            }"#,
        )
        .unwrap();
        assert!(scv_codec::normalize_record(&raw).is_err());
    }
}
