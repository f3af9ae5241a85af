use std::fmt;

use crate::{ConsensusTimestamp, EntityId, Word};

// ---------------------------------------------------------------------------
// Contract actions
// ---------------------------------------------------------------------------

/// Coarse classification of a call-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallType {
    Create,
    Call,
    /// Call into a precompiled contract.
    Precompile,
    /// Call into a ledger system contract.
    System,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Create => "CREATE",
            CallType::Call => "CALL",
            CallType::Precompile => "PRECOMPILE",
            CallType::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Some(CallType::Create),
            "CALL" => Some(CallType::Call),
            "PRECOMPILE" => Some(CallType::Precompile),
            "SYSTEM" => Some(CallType::System),
            _ => None,
        }
    }
}

/// EVM opcode that opened the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallOperationType {
    OpCall,
    OpCreate,
    OpCallCode,
    OpDelegateCall,
    OpStaticCall,
    OpCreate2,
}

impl CallOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOperationType::OpCall => "OP_CALL",
            CallOperationType::OpCreate => "OP_CREATE",
            CallOperationType::OpCallCode => "OP_CALLCODE",
            CallOperationType::OpDelegateCall => "OP_DELEGATECALL",
            CallOperationType::OpStaticCall => "OP_STATICCALL",
            CallOperationType::OpCreate2 => "OP_CREATE2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OP_CALL" => Some(CallOperationType::OpCall),
            "OP_CREATE" => Some(CallOperationType::OpCreate),
            "OP_CALLCODE" => Some(CallOperationType::OpCallCode),
            "OP_DELEGATECALL" => Some(CallOperationType::OpDelegateCall),
            "OP_STATICCALL" => Some(CallOperationType::OpStaticCall),
            "OP_CREATE2" => Some(CallOperationType::OpCreate2),
            _ => None,
        }
    }
}

/// Who initiated the frame. Top-level frames are called by an account;
/// nested frames by a contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    CallingAccount(EntityId),
    CallingContract(EntityId),
}

impl Caller {
    pub fn field_name(&self) -> &'static str {
        match self {
            Caller::CallingAccount(_) => "calling_account",
            Caller::CallingContract(_) => "calling_contract",
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Caller::CallingAccount(id) | Caller::CallingContract(id) => *id,
        }
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.field_name(), self.id())
    }
}

/// Target of the frame when its address resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Account(EntityId),
    Contract(EntityId),
}

impl Recipient {
    pub fn field_name(&self) -> &'static str {
        match self {
            Recipient::Account(_) => "recipient_account",
            Recipient::Contract(_) => "recipient_contract",
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Recipient::Account(id) | Recipient::Contract(id) => *id,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.field_name(), self.id())
    }
}

/// How the frame ended. Exactly one per action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Output(Vec<u8>),
    RevertReason(Vec<u8>),
    Error(Vec<u8>),
    /// The call targeted an address that does not resolve to a ledger entity.
    InvalidSolidityAddress(Vec<u8>),
}

impl ActionOutcome {
    pub fn field_name(&self) -> &'static str {
        match self {
            ActionOutcome::Output(_) => "output",
            ActionOutcome::RevertReason(_) => "revert_reason",
            ActionOutcome::Error(_) => "error",
            ActionOutcome::InvalidSolidityAddress(_) => "invalid_solidity_address",
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            ActionOutcome::Output(b)
            | ActionOutcome::RevertReason(b)
            | ActionOutcome::Error(b)
            | ActionOutcome::InvalidSolidityAddress(b) => b,
        }
    }
}

/// One node of a transaction's call tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractAction {
    pub call_type: CallType,
    pub call_operation_type: CallOperationType,
    pub caller: Caller,
    pub gas: u64,
    pub gas_used: u64,
    /// Value transferred with the call, in the ledger's smallest unit.
    pub value: u64,
    pub call_depth: u32,
    pub input: Vec<u8>,
    /// `None` only when the call failed to resolve an address.
    pub recipient: Option<Recipient>,
    pub outcome: ActionOutcome,
}

impl ContractAction {
    /// Top-level action with the common defaults (no value, depth 0, empty input).
    pub fn new(
        call_type: CallType,
        call_operation_type: CallOperationType,
        caller: Caller,
        gas: u64,
        gas_used: u64,
        recipient: Option<Recipient>,
        outcome: ActionOutcome,
    ) -> Self {
        Self {
            call_type,
            call_operation_type,
            caller,
            gas,
            gas_used,
            value: 0,
            call_depth: 0,
            input: Vec::new(),
            recipient,
            outcome,
        }
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }

    pub fn with_call_depth(mut self, call_depth: u32) -> Self {
        self.call_depth = call_depth;
        self
    }
}

// ---------------------------------------------------------------------------
// State changes
// ---------------------------------------------------------------------------

/// One storage slot touched by a transaction.
///
/// `value_written == None` means the slot was only read. That is distinct
/// from `Some(Word::zero())`, which means zero was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageChange {
    pub slot: Word,
    pub value_read: Word,
    pub value_written: Option<Word>,
}

impl StorageChange {
    pub fn read_only(slot: impl Into<Word>, value_read: impl Into<Word>) -> Self {
        Self {
            slot: slot.into(),
            value_read: value_read.into(),
            value_written: None,
        }
    }

    pub fn read_write(
        slot: impl Into<Word>,
        value_read: impl Into<Word>,
        value_written: impl Into<Word>,
    ) -> Self {
        Self {
            slot: slot.into(),
            value_read: value_read.into(),
            value_written: Some(value_written.into()),
        }
    }
}

/// All storage touched in one contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractStateChange {
    pub contract_id: EntityId,
    pub storage_changes: Vec<StorageChange>,
}

impl ContractStateChange {
    pub fn new(contract_id: EntityId, storage_changes: Vec<StorageChange>) -> Self {
        Self {
            contract_id,
            storage_changes,
        }
    }
}

// ---------------------------------------------------------------------------
// Bytecode
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractBytecode {
    /// Absent when contract creation failed.
    pub contract_id: Option<EntityId>,
    pub initcode: Vec<u8>,
    pub runtime_bytecode: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Payload discriminant; the second half of the correlation key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PayloadKind {
    Actions,
    StateChanges,
    Bytecode,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Actions => "actions",
            PayloadKind::StateChanges => "state_changes",
            PayloadKind::Bytecode => "bytecode",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SidecarPayload {
    Actions(Vec<ContractAction>),
    StateChanges(Vec<ContractStateChange>),
    Bytecode(ContractBytecode),
}

impl SidecarPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            SidecarPayload::Actions(_) => PayloadKind::Actions,
            SidecarPayload::StateChanges(_) => PayloadKind::StateChanges,
            SidecarPayload::Bytecode(_) => PayloadKind::Bytecode,
        }
    }
}

/// Correlation key: at most one record per (timestamp, kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SidecarKey {
    pub consensus_timestamp: ConsensusTimestamp,
    pub kind: PayloadKind,
}

impl fmt::Display for SidecarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.consensus_timestamp, self.kind)
    }
}

/// One sidecar record, as emitted by the node or as expected by a scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SidecarRecord {
    pub consensus_timestamp: ConsensusTimestamp,
    /// Emitted by a node-side state migration rather than a user transaction.
    pub migration: bool,
    pub payload: SidecarPayload,
}

impl SidecarRecord {
    pub fn new(consensus_timestamp: ConsensusTimestamp, payload: SidecarPayload) -> Self {
        Self {
            consensus_timestamp,
            migration: false,
            payload,
        }
    }

    pub fn actions(consensus_timestamp: ConsensusTimestamp, actions: Vec<ContractAction>) -> Self {
        Self::new(consensus_timestamp, SidecarPayload::Actions(actions))
    }

    pub fn state_changes(
        consensus_timestamp: ConsensusTimestamp,
        changes: Vec<ContractStateChange>,
    ) -> Self {
        Self::new(consensus_timestamp, SidecarPayload::StateChanges(changes))
    }

    pub fn bytecode(consensus_timestamp: ConsensusTimestamp, bytecode: ContractBytecode) -> Self {
        Self::new(consensus_timestamp, SidecarPayload::Bytecode(bytecode))
    }

    pub fn as_migration(mut self) -> Self {
        self.migration = true;
        self
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn key(&self) -> SidecarKey {
        SidecarKey {
            consensus_timestamp: self.consensus_timestamp,
            kind: self.kind(),
        }
    }
}

/// A record a scenario expects to see, tagged with the scenario for reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedSidecar {
    pub scenario_name: String,
    pub record: SidecarRecord,
}

impl ExpectedSidecar {
    pub fn new(scenario_name: impl Into<String>, record: SidecarRecord) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            record,
        }
    }

    pub fn key(&self) -> SidecarKey {
        self.record.key()
    }
}
