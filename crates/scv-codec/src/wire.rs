//! Wire-level sidecar structs and normalization.
//!
//! The node writes records with every exclusive field group flattened into
//! independent nullable fields (`calling_account` / `calling_contract`,
//! `output` / `revert_reason` / `error` / `invalid_solidity_address`, and one
//! optional field per payload kind). [`normalize_record`] checks that exactly
//! one member of each group is populated and builds the sum-typed model;
//! [`to_raw`] is its inverse.
//!
//! Byte strings are `0x`-prefixed lowercase hex. Entity ids are `shard.realm.num`.
//! Timestamps are `seconds.nanos`.

use serde::{Deserialize, Serialize};

use scv_types::{
    ActionOutcome, CallOperationType, CallType, Caller, ConsensusTimestamp, ContractAction,
    ContractBytecode, ContractStateChange, EntityId, Recipient, SidecarPayload, SidecarRecord,
    StorageChange, Word,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A raw record that cannot be represented in the model.
///
/// `field` values are paths into the record, e.g. `actions[1].input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    BadTimestamp { raw: String },
    /// None of `actions` / `state_changes` / `bytecode` is populated.
    NoPayload,
    /// More than one payload field is populated.
    MultiplePayloads { populated: Vec<&'static str> },
    UnknownCallType { field: String, raw: String },
    UnknownCallOperationType { field: String, raw: String },
    /// Caller group must have exactly one of `calling_account` / `calling_contract`.
    CallerNotExactlyOne { field: String, populated: usize },
    /// Both `recipient_account` and `recipient_contract` are populated.
    RecipientConflict { field: String },
    /// Outcome group must have exactly one populated member.
    OutcomeNotExactlyOne { field: String, populated: usize },
    BadHex { field: String, raw: String },
    BadEntityId { field: String, raw: String },
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadTimestamp { raw } => write!(f, "bad consensus_timestamp '{raw}'"),
            Self::NoPayload => f.write_str("record has no payload"),
            Self::MultiplePayloads { populated } => {
                write!(f, "record has multiple payloads: {}", populated.join(", "))
            }
            Self::UnknownCallType { field, raw } => {
                write!(f, "{field}: unrecognised call_type '{raw}'")
            }
            Self::UnknownCallOperationType { field, raw } => {
                write!(f, "{field}: unrecognised call_operation_type '{raw}'")
            }
            Self::CallerNotExactlyOne { field, populated } => write!(
                f,
                "{field}: expected exactly one of calling_account/calling_contract, got {populated}"
            ),
            Self::RecipientConflict { field } => write!(
                f,
                "{field}: recipient_account and recipient_contract are both set"
            ),
            Self::OutcomeNotExactlyOne { field, populated } => write!(
                f,
                "{field}: expected exactly one of output/revert_reason/error/invalid_solidity_address, got {populated}"
            ),
            Self::BadHex { field, raw } => write!(f, "{field}: invalid hex '{raw}'"),
            Self::BadEntityId { field, raw } => write!(f, "{field}: invalid entity id '{raw}'"),
        }
    }
}

impl std::error::Error for NormalizeError {}

// ---------------------------------------------------------------------------
// Raw structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContractAction {
    pub call_type: String,
    pub call_operation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calling_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calling_contract: Option<String>,
    pub gas: u64,
    pub gas_used: u64,
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub call_depth: u32,
    #[serde(default)]
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_solidity_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStorageChange {
    pub slot: String,
    pub value_read: String,
    /// Absent means the slot was only read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_written: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContractStateChange {
    pub contract_id: String,
    #[serde(default)]
    pub storage_changes: Vec<RawStorageChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContractBytecode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub initcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_bytecode: Option<String>,
}

/// One sidecar record as serialized inside a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSidecarRecord {
    pub consensus_timestamp: String,
    #[serde(default)]
    pub migration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<RawContractAction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changes: Option<Vec<RawContractStateChange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<RawContractBytecode>,
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn parse_bytes(field: &str, raw: &str) -> Result<Vec<u8>, NormalizeError> {
    let t = raw.trim();
    let t = t.strip_prefix("0x").unwrap_or(t);
    hex::decode(t).map_err(|_| NormalizeError::BadHex {
        field: field.to_string(),
        raw: raw.to_string(),
    })
}

fn parse_word(field: &str, raw: &str) -> Result<Word, NormalizeError> {
    Word::from_hex(raw).ok_or_else(|| NormalizeError::BadHex {
        field: field.to_string(),
        raw: raw.to_string(),
    })
}

fn parse_entity(field: &str, raw: &str) -> Result<EntityId, NormalizeError> {
    EntityId::parse(raw).ok_or_else(|| NormalizeError::BadEntityId {
        field: field.to_string(),
        raw: raw.to_string(),
    })
}

fn bytes_hex(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn normalize_action(
    path: &str,
    raw: &RawContractAction,
) -> Result<ContractAction, NormalizeError> {
    let call_type =
        CallType::parse(&raw.call_type).ok_or_else(|| NormalizeError::UnknownCallType {
            field: format!("{path}.call_type"),
            raw: raw.call_type.clone(),
        })?;
    let call_operation_type = CallOperationType::parse(&raw.call_operation_type).ok_or_else(
        || NormalizeError::UnknownCallOperationType {
            field: format!("{path}.call_operation_type"),
            raw: raw.call_operation_type.clone(),
        },
    )?;

    let caller = match (&raw.calling_account, &raw.calling_contract) {
        (Some(a), None) => Caller::CallingAccount(parse_entity(
            &format!("{path}.calling_account"),
            a,
        )?),
        (None, Some(c)) => Caller::CallingContract(parse_entity(
            &format!("{path}.calling_contract"),
            c,
        )?),
        (a, c) => {
            return Err(NormalizeError::CallerNotExactlyOne {
                field: format!("{path}.caller"),
                populated: usize::from(a.is_some()) + usize::from(c.is_some()),
            })
        }
    };

    let recipient = match (&raw.recipient_account, &raw.recipient_contract) {
        (None, None) => None,
        (Some(a), None) => Some(Recipient::Account(parse_entity(
            &format!("{path}.recipient_account"),
            a,
        )?)),
        (None, Some(c)) => Some(Recipient::Contract(parse_entity(
            &format!("{path}.recipient_contract"),
            c,
        )?)),
        (Some(_), Some(_)) => {
            return Err(NormalizeError::RecipientConflict {
                field: format!("{path}.recipient"),
            })
        }
    };

    let outcomes = [
        ("output", &raw.output),
        ("revert_reason", &raw.revert_reason),
        ("error", &raw.error),
        ("invalid_solidity_address", &raw.invalid_solidity_address),
    ];
    let populated: Vec<(&str, &String)> = outcomes
        .iter()
        .filter_map(|(name, v)| v.as_ref().map(|s| (*name, s)))
        .collect();
    if populated.len() != 1 {
        return Err(NormalizeError::OutcomeNotExactlyOne {
            field: format!("{path}.outcome"),
            populated: populated.len(),
        });
    }
    let (name, raw_bytes) = populated[0];
    let bytes = parse_bytes(&format!("{path}.{name}"), raw_bytes)?;
    let outcome = match name {
        "output" => ActionOutcome::Output(bytes),
        "revert_reason" => ActionOutcome::RevertReason(bytes),
        "error" => ActionOutcome::Error(bytes),
        _ => ActionOutcome::InvalidSolidityAddress(bytes),
    };

    Ok(ContractAction {
        call_type,
        call_operation_type,
        caller,
        gas: raw.gas,
        gas_used: raw.gas_used,
        value: raw.value,
        call_depth: raw.call_depth,
        input: parse_bytes(&format!("{path}.input"), &raw.input)?,
        recipient,
        outcome,
    })
}

fn normalize_state_change(
    path: &str,
    raw: &RawContractStateChange,
) -> Result<ContractStateChange, NormalizeError> {
    let contract_id = parse_entity(&format!("{path}.contract_id"), &raw.contract_id)?;
    let mut storage_changes = Vec::with_capacity(raw.storage_changes.len());
    for (i, sc) in raw.storage_changes.iter().enumerate() {
        let p = format!("{path}.storage_changes[{i}]");
        storage_changes.push(StorageChange {
            slot: parse_word(&format!("{p}.slot"), &sc.slot)?,
            value_read: parse_word(&format!("{p}.value_read"), &sc.value_read)?,
            value_written: sc
                .value_written
                .as_deref()
                .map(|w| parse_word(&format!("{p}.value_written"), w))
                .transpose()?,
        });
    }
    Ok(ContractStateChange {
        contract_id,
        storage_changes,
    })
}

fn normalize_bytecode(raw: &RawContractBytecode) -> Result<ContractBytecode, NormalizeError> {
    Ok(ContractBytecode {
        contract_id: raw
            .contract_id
            .as_deref()
            .map(|c| parse_entity("bytecode.contract_id", c))
            .transpose()?,
        initcode: parse_bytes("bytecode.initcode", &raw.initcode)?,
        runtime_bytecode: raw
            .runtime_bytecode
            .as_deref()
            .map(|r| parse_bytes("bytecode.runtime_bytecode", r))
            .transpose()?,
    })
}

/// Validate a raw record and convert it into the model.
///
/// # Errors
/// Returns the first [`NormalizeError`] found; fields are checked in
/// declaration order.
pub fn normalize_record(raw: &RawSidecarRecord) -> Result<SidecarRecord, NormalizeError> {
    let consensus_timestamp = ConsensusTimestamp::parse(&raw.consensus_timestamp).ok_or_else(
        || NormalizeError::BadTimestamp {
            raw: raw.consensus_timestamp.clone(),
        },
    )?;

    let mut populated: Vec<&'static str> = Vec::new();
    if raw.actions.is_some() {
        populated.push("actions");
    }
    if raw.state_changes.is_some() {
        populated.push("state_changes");
    }
    if raw.bytecode.is_some() {
        populated.push("bytecode");
    }
    if populated.len() > 1 {
        return Err(NormalizeError::MultiplePayloads { populated });
    }

    let payload = if let Some(actions) = &raw.actions {
        let mut out = Vec::with_capacity(actions.len());
        for (i, a) in actions.iter().enumerate() {
            out.push(normalize_action(&format!("actions[{i}]"), a)?);
        }
        SidecarPayload::Actions(out)
    } else if let Some(changes) = &raw.state_changes {
        let mut out = Vec::with_capacity(changes.len());
        for (i, c) in changes.iter().enumerate() {
            out.push(normalize_state_change(&format!("state_changes[{i}]"), c)?);
        }
        SidecarPayload::StateChanges(out)
    } else if let Some(bytecode) = &raw.bytecode {
        SidecarPayload::Bytecode(normalize_bytecode(bytecode)?)
    } else {
        return Err(NormalizeError::NoPayload);
    };

    Ok(SidecarRecord {
        consensus_timestamp,
        migration: raw.migration,
        payload,
    })
}

// ---------------------------------------------------------------------------
// Model -> wire
// ---------------------------------------------------------------------------

fn raw_action(a: &ContractAction) -> RawContractAction {
    let mut raw = RawContractAction {
        call_type: a.call_type.as_str().to_string(),
        call_operation_type: a.call_operation_type.as_str().to_string(),
        gas: a.gas,
        gas_used: a.gas_used,
        value: a.value,
        call_depth: a.call_depth,
        input: bytes_hex(&a.input),
        ..RawContractAction::default()
    };
    match &a.caller {
        Caller::CallingAccount(id) => raw.calling_account = Some(id.to_string()),
        Caller::CallingContract(id) => raw.calling_contract = Some(id.to_string()),
    }
    match &a.recipient {
        Some(Recipient::Account(id)) => raw.recipient_account = Some(id.to_string()),
        Some(Recipient::Contract(id)) => raw.recipient_contract = Some(id.to_string()),
        None => {}
    }
    let hex = bytes_hex(a.outcome.bytes());
    match &a.outcome {
        ActionOutcome::Output(_) => raw.output = Some(hex),
        ActionOutcome::RevertReason(_) => raw.revert_reason = Some(hex),
        ActionOutcome::Error(_) => raw.error = Some(hex),
        ActionOutcome::InvalidSolidityAddress(_) => raw.invalid_solidity_address = Some(hex),
    }
    raw
}

/// Convert a model record to its wire form. `normalize_record(&to_raw(r)) == Ok(r)`.
pub fn to_raw(record: &SidecarRecord) -> RawSidecarRecord {
    let mut raw = RawSidecarRecord {
        consensus_timestamp: record.consensus_timestamp.to_string(),
        migration: record.migration,
        ..RawSidecarRecord::default()
    };
    match &record.payload {
        SidecarPayload::Actions(actions) => {
            raw.actions = Some(actions.iter().map(raw_action).collect());
        }
        SidecarPayload::StateChanges(changes) => {
            raw.state_changes = Some(
                changes
                    .iter()
                    .map(|c| RawContractStateChange {
                        contract_id: c.contract_id.to_string(),
                        storage_changes: c
                            .storage_changes
                            .iter()
                            .map(|sc| RawStorageChange {
                                slot: sc.slot.to_string(),
                                value_read: sc.value_read.to_string(),
                                value_written: sc.value_written.as_ref().map(|w| w.to_string()),
                            })
                            .collect(),
                    })
                    .collect(),
            );
        }
        SidecarPayload::Bytecode(b) => {
            raw.bytecode = Some(RawContractBytecode {
                contract_id: b.contract_id.map(|id| id.to_string()),
                initcode: bytes_hex(&b.initcode),
                runtime_bytecode: b.runtime_bytecode.as_deref().map(bytes_hex),
            });
        }
    }
    raw
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
