//! Seams to the systems a scenario drives.
//!
//! The oracle never submits transactions or reads ledger state itself. A
//! scenario resolves the consensus timestamp of the transaction it ran
//! through a [`TransactionExecutor`], and the deployed runtime bytecode of a
//! contract through a [`LedgerStateQuery`], then registers the expectation.

use anyhow::{Context, Result};

use scv_types::{
    ConsensusTimestamp, ContractBytecode, EntityId, SidecarKey, SidecarPayload, SidecarRecord,
};

use crate::SidecarWatcher;

/// Resolves a submitted transaction to its ledger-assigned timestamp.
#[async_trait::async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn consensus_timestamp_of(&self, txn_name: &str) -> Result<ConsensusTimestamp>;
}

/// Reads deployed contract state.
#[async_trait::async_trait]
pub trait LedgerStateQuery: Send + Sync {
    async fn runtime_bytecode_of(&self, contract: &str) -> Result<Vec<u8>>;
}

/// Register `payload` as expected at the timestamp the transaction settled at.
///
/// Executor failures are returned as-is; nothing is registered then.
pub async fn expect_after_settlement(
    watcher: &SidecarWatcher,
    executor: &dyn TransactionExecutor,
    scenario_name: &str,
    txn_name: &str,
    payload: SidecarPayload,
) -> Result<SidecarKey> {
    let ts = executor
        .consensus_timestamp_of(txn_name)
        .await
        .with_context(|| format!("resolve consensus timestamp of '{txn_name}'"))?;
    let record = SidecarRecord::new(ts, payload);
    let key = record.key();
    watcher.add_expected_sidecar(scenario_name, record);
    Ok(key)
}

/// Expected bytecode payload for a contract created from `initcode`.
pub async fn expected_bytecode_sidecar(
    query: &dyn LedgerStateQuery,
    contract_name: &str,
    contract_id: EntityId,
    initcode: Vec<u8>,
) -> Result<SidecarPayload> {
    let runtime = query
        .runtime_bytecode_of(contract_name)
        .await
        .with_context(|| format!("fetch runtime bytecode of '{contract_name}'"))?;
    Ok(SidecarPayload::Bytecode(ContractBytecode {
        contract_id: Some(contract_id),
        initcode,
        runtime_bytecode: Some(runtime),
    }))
}
