use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use scv_types::{
    ContractAction, ContractBytecode, ContractStateChange, Recipient, SidecarPayload,
    SidecarRecord, StorageChange, Word,
};

/// Byte strings longer than this are rendered as length + digest.
const INLINE_BYTES_LIMIT: usize = 64;

/// One differing field between an expected and an actual record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Path into the record, e.g. `actions[1].outcome`.
    pub path: String,
    pub expected: String,
    pub actual: String,
    /// Extra locator for humans (contract and slot for storage diffs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl std::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({ctx})")?;
        }
        write!(f, ": expected {}, actual {}", self.expected, self.actual)
    }
}

/// Hex for short byte strings; `len=N sha256=<prefix>` for long ones.
pub fn render_bytes(b: &[u8]) -> String {
    if b.len() <= INLINE_BYTES_LIMIT {
        return format!("0x{}", hex::encode(b));
    }
    let digest = Sha256::digest(b);
    format!("len={} sha256={}", b.len(), &hex::encode(digest)[..16])
}

fn render_word(w: &Word) -> String {
    // Small words also get their decimal value.
    if w.as_bytes().len() <= 8 {
        let mut buf = [0u8; 8];
        buf[8 - w.as_bytes().len()..].copy_from_slice(w.as_bytes());
        return format!("{w} ({})", u64::from_be_bytes(buf));
    }
    w.to_string()
}

fn render_opt_word(w: &Option<Word>) -> String {
    match w {
        Some(w) => render_word(w),
        None => "<read-only>".to_string(),
    }
}

fn render_recipient(r: &Option<Recipient>) -> String {
    match r {
        Some(r) => r.to_string(),
        None => "<unresolved>".to_string(),
    }
}

fn render_action(a: &ContractAction) -> String {
    format!(
        "{} {} by {} gas={}",
        a.call_type.as_str(),
        a.call_operation_type.as_str(),
        a.caller,
        a.gas
    )
}

fn render_storage(s: &StorageChange) -> String {
    format!(
        "read {} written {}",
        render_word(&s.value_read),
        render_opt_word(&s.value_written)
    )
}

fn render_contract(c: &ContractStateChange) -> String {
    format!(
        "contract {} with {} storage change(s)",
        c.contract_id,
        c.storage_changes.len()
    )
}

struct Diffs(Vec<FieldDiff>);

impl Diffs {
    fn push(&mut self, path: String, expected: String, actual: String) {
        self.0.push(FieldDiff {
            path,
            expected,
            actual,
            context: None,
        });
    }

    fn push_with(&mut self, path: String, context: &str, expected: String, actual: String) {
        self.0.push(FieldDiff {
            path,
            expected,
            actual,
            context: Some(context.to_string()),
        });
    }

    fn check<T: PartialEq + ToString>(&mut self, path: String, expected: &T, actual: &T) {
        if expected != actual {
            self.push(path, expected.to_string(), actual.to_string());
        }
    }

    fn check_bytes(&mut self, path: String, expected: &[u8], actual: &[u8]) {
        if expected != actual {
            self.push(path, render_bytes(expected), render_bytes(actual));
        }
    }
}

fn compare_action(p: &str, e: &ContractAction, a: &ContractAction, d: &mut Diffs) {
    if e.call_type != a.call_type {
        d.push(
            format!("{p}.call_type"),
            e.call_type.as_str().to_string(),
            a.call_type.as_str().to_string(),
        );
    }
    if e.call_operation_type != a.call_operation_type {
        d.push(
            format!("{p}.call_operation_type"),
            e.call_operation_type.as_str().to_string(),
            a.call_operation_type.as_str().to_string(),
        );
    }

    // Which union member is populated is itself compared, before the value.
    if e.caller.field_name() != a.caller.field_name() {
        d.push(
            format!("{p}.caller"),
            e.caller.to_string(),
            a.caller.to_string(),
        );
    } else {
        d.check(
            format!("{p}.{}", e.caller.field_name()),
            &e.caller.id(),
            &a.caller.id(),
        );
    }

    d.check(format!("{p}.gas"), &e.gas, &a.gas);
    d.check(format!("{p}.gas_used"), &e.gas_used, &a.gas_used);
    d.check(format!("{p}.value"), &e.value, &a.value);
    d.check(format!("{p}.call_depth"), &e.call_depth, &a.call_depth);
    d.check_bytes(format!("{p}.input"), &e.input, &a.input);

    match (&e.recipient, &a.recipient) {
        (Some(er), Some(ar)) if er.field_name() == ar.field_name() => {
            d.check(
                format!("{p}.{}", er.field_name()),
                &er.id(),
                &ar.id(),
            );
        }
        (None, None) => {}
        (er, ar) => d.push(
            format!("{p}.recipient"),
            render_recipient(er),
            render_recipient(ar),
        ),
    }

    if e.outcome.field_name() != a.outcome.field_name() {
        d.push(
            format!("{p}.outcome"),
            format!(
                "{}={}",
                e.outcome.field_name(),
                render_bytes(e.outcome.bytes())
            ),
            format!(
                "{}={}",
                a.outcome.field_name(),
                render_bytes(a.outcome.bytes())
            ),
        );
    } else {
        d.check_bytes(
            format!("{p}.{}", e.outcome.field_name()),
            e.outcome.bytes(),
            a.outcome.bytes(),
        );
    }
}

fn compare_actions(e: &[ContractAction], a: &[ContractAction], d: &mut Diffs) {
    d.check("actions.len".to_string(), &e.len(), &a.len());
    for (i, (ea, aa)) in e.iter().zip(a).enumerate() {
        compare_action(&format!("actions[{i}]"), ea, aa, d);
    }
    for (i, ea) in e.iter().enumerate().skip(a.len()) {
        d.push(format!("actions[{i}]"), render_action(ea), "<missing>".to_string());
    }
    for (i, aa) in a.iter().enumerate().skip(e.len()) {
        d.push(format!("actions[{i}]"), "<none>".to_string(), render_action(aa));
    }
}

fn compare_storage(
    p: &str,
    contract: &str,
    e: &StorageChange,
    a: &StorageChange,
    d: &mut Diffs,
) {
    let ctx = format!("contract {contract}, slot {}", e.slot);
    if e.slot != a.slot {
        d.push_with(
            format!("{p}.slot"),
            &ctx,
            render_word(&e.slot),
            render_word(&a.slot),
        );
    }
    if e.value_read != a.value_read {
        d.push_with(
            format!("{p}.value_read"),
            &ctx,
            render_word(&e.value_read),
            render_word(&a.value_read),
        );
    }
    // Read-only (None) never equals a write of zero.
    if e.value_written != a.value_written {
        d.push_with(
            format!("{p}.value_written"),
            &ctx,
            render_opt_word(&e.value_written),
            render_opt_word(&a.value_written),
        );
    }
}

fn compare_state_changes(e: &[ContractStateChange], a: &[ContractStateChange], d: &mut Diffs) {
    d.check("state_changes.len".to_string(), &e.len(), &a.len());
    for (i, (ec, ac)) in e.iter().zip(a).enumerate() {
        let p = format!("state_changes[{i}]");
        if ec.contract_id != ac.contract_id {
            d.check(format!("{p}.contract_id"), &ec.contract_id, &ac.contract_id);
            // Storage of a different contract is not comparable slot by slot.
            continue;
        }
        let contract = ec.contract_id.to_string();
        d.check(
            format!("{p}.storage_changes.len"),
            &ec.storage_changes.len(),
            &ac.storage_changes.len(),
        );
        for (j, (es, acs)) in ec.storage_changes.iter().zip(&ac.storage_changes).enumerate() {
            compare_storage(&format!("{p}.storage_changes[{j}]"), &contract, es, acs, d);
        }
        let (en, an) = (ec.storage_changes.len(), ac.storage_changes.len());
        for (j, es) in ec.storage_changes.iter().enumerate().skip(an) {
            d.push_with(
                format!("{p}.storage_changes[{j}]"),
                &format!("contract {contract}, slot {}", es.slot),
                render_storage(es),
                "<missing>".to_string(),
            );
        }
        for (j, acs) in ac.storage_changes.iter().enumerate().skip(en) {
            d.push_with(
                format!("{p}.storage_changes[{j}]"),
                &format!("contract {contract}, slot {}", acs.slot),
                "<none>".to_string(),
                render_storage(acs),
            );
        }
    }
    for (i, ec) in e.iter().enumerate().skip(a.len()) {
        d.push(
            format!("state_changes[{i}]"),
            render_contract(ec),
            "<missing>".to_string(),
        );
    }
    for (i, ac) in a.iter().enumerate().skip(e.len()) {
        d.push(
            format!("state_changes[{i}]"),
            "<none>".to_string(),
            render_contract(ac),
        );
    }
}

fn compare_bytecode(e: &ContractBytecode, a: &ContractBytecode, d: &mut Diffs) {
    if e.contract_id != a.contract_id {
        d.push(
            "bytecode.contract_id".to_string(),
            e.contract_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            a.contract_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
        );
    }
    d.check_bytes("bytecode.initcode".to_string(), &e.initcode, &a.initcode);
    match (&e.runtime_bytecode, &a.runtime_bytecode) {
        (Some(eb), Some(ab)) => d.check_bytes("bytecode.runtime_bytecode".to_string(), eb, ab),
        (None, None) => {}
        (eb, ab) => d.push(
            "bytecode.runtime_bytecode".to_string(),
            eb.as_deref().map(render_bytes).unwrap_or_else(|| "<none>".to_string()),
            ab.as_deref().map(render_bytes).unwrap_or_else(|| "<none>".to_string()),
        ),
    }
}

/// Deep structural comparison. An empty result means the records are equal.
///
/// Diffs are emitted in field order, so the output is deterministic for a
/// given pair of inputs.
pub fn compare_records(expected: &SidecarRecord, actual: &SidecarRecord) -> Vec<FieldDiff> {
    let mut d = Diffs(Vec::new());
    d.check(
        "consensus_timestamp".to_string(),
        &expected.consensus_timestamp,
        &actual.consensus_timestamp,
    );
    d.check("migration".to_string(), &expected.migration, &actual.migration);

    match (&expected.payload, &actual.payload) {
        (SidecarPayload::Actions(e), SidecarPayload::Actions(a)) => compare_actions(e, a, &mut d),
        (SidecarPayload::StateChanges(e), SidecarPayload::StateChanges(a)) => {
            compare_state_changes(e, a, &mut d)
        }
        (SidecarPayload::Bytecode(e), SidecarPayload::Bytecode(a)) => {
            compare_bytecode(e, a, &mut d)
        }
        (e, a) => d.push(
            "payload".to_string(),
            e.kind().to_string(),
            a.kind().to_string(),
        ),
    }
    d.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use scv_types::{
        ActionOutcome, CallOperationType, CallType, Caller, ConsensusTimestamp, EntityId,
    };

    fn ts() -> ConsensusTimestamp {
        ConsensusTimestamp::new(1_700_000_000, 1)
    }

    fn create_action() -> ContractAction {
        ContractAction::new(
            CallType::Create,
            CallOperationType::OpCreate,
            Caller::CallingAccount(EntityId::num(1001)),
            197_000,
            68_492,
            Some(Recipient::Contract(EntityId::num(1002))),
            ActionOutcome::Output(vec![]),
        )
    }

    #[test]
    fn identical_records_have_no_diffs() {
        let r = SidecarRecord::actions(ts(), vec![create_action()]);
        assert!(compare_records(&r, &r.clone()).is_empty());
    }

    #[test]
    fn caller_variant_mismatch_is_reported_as_union_diff() {
        let e = SidecarRecord::actions(ts(), vec![create_action()]);
        let mut other = create_action();
        other.caller = Caller::CallingContract(EntityId::num(1001));
        let a = SidecarRecord::actions(ts(), vec![other]);

        let diffs = compare_records(&e, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "actions[0].caller");
        assert_eq!(diffs[0].expected, "calling_account(0.0.1001)");
        assert_eq!(diffs[0].actual, "calling_contract(0.0.1001)");
    }

    #[test]
    fn same_caller_variant_compares_value() {
        let e = SidecarRecord::actions(ts(), vec![create_action()]);
        let mut other = create_action();
        other.caller = Caller::CallingAccount(EntityId::num(9));
        let diffs = compare_records(&e, &SidecarRecord::actions(ts(), vec![other]));
        assert_eq!(diffs[0].path, "actions[0].calling_account");
    }

    #[test]
    fn outcome_variant_mismatch_even_with_equal_bytes() {
        let e = SidecarRecord::actions(ts(), vec![create_action()]);
        let mut other = create_action();
        other.outcome = ActionOutcome::RevertReason(vec![]);
        let diffs = compare_records(&e, &SidecarRecord::actions(ts(), vec![other]));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "actions[0].outcome");
        assert_eq!(diffs[0].expected, "output=0x");
        assert_eq!(diffs[0].actual, "revert_reason=0x");
    }

    #[test]
    fn gas_used_diff() {
        let e = SidecarRecord::actions(ts(), vec![create_action()]);
        let mut other = create_action();
        other.gas_used = 68_493;
        let diffs = compare_records(&e, &SidecarRecord::actions(ts(), vec![other]));
        assert_eq!(
            diffs,
            vec![FieldDiff {
                path: "actions[0].gas_used".to_string(),
                expected: "68492".to_string(),
                actual: "68493".to_string(),
                context: None,
            }]
        );
    }

    #[test]
    fn extra_actual_action_is_listed() {
        let e = SidecarRecord::actions(ts(), vec![create_action()]);
        let a = SidecarRecord::actions(ts(), vec![create_action(), create_action()]);
        let diffs = compare_records(&e, &a);
        let paths: Vec<_> = diffs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["actions.len", "actions[1]"]);
        assert_eq!(diffs[1].expected, "<none>");
    }

    #[test]
    fn storage_value_written_diff_names_slot_and_values() {
        let e = SidecarRecord::state_changes(
            ts(),
            vec![ContractStateChange::new(
                EntityId::num(1002),
                vec![StorageChange::read_write(0u64, 0u64, 55u64)],
            )],
        );
        let a = SidecarRecord::state_changes(
            ts(),
            vec![ContractStateChange::new(
                EntityId::num(1002),
                vec![StorageChange::read_write(0u64, 0u64, 54u64)],
            )],
        );
        let diffs = compare_records(&e, &a);
        assert_eq!(diffs.len(), 1);
        let rendered = diffs[0].to_string();
        assert_eq!(
            rendered,
            "state_changes[0].storage_changes[0].value_written (contract 0.0.1002, slot 0x0): \
             expected 0x37 (55), actual 0x36 (54)"
        );
    }

    #[test]
    fn extra_and_missing_state_entries_are_listed() {
        let e = SidecarRecord::state_changes(
            ts(),
            vec![
                ContractStateChange::new(
                    EntityId::num(1002),
                    vec![StorageChange::read_write(0u64, 0u64, 55u64)],
                ),
                ContractStateChange::new(
                    EntityId::num(1003),
                    vec![StorageChange::read_only(0u64, 1u64)],
                ),
            ],
        );
        let a = SidecarRecord::state_changes(
            ts(),
            vec![ContractStateChange::new(
                EntityId::num(1002),
                vec![
                    StorageChange::read_write(0u64, 0u64, 55u64),
                    StorageChange::read_only(1u64, 7u64),
                ],
            )],
        );
        let diffs = compare_records(&e, &a);
        let paths: Vec<_> = diffs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "state_changes.len",
                "state_changes[0].storage_changes.len",
                "state_changes[0].storage_changes[1]",
                "state_changes[1]",
            ]
        );
        assert_eq!(
            diffs[2].to_string(),
            "state_changes[0].storage_changes[1] (contract 0.0.1002, slot 0x01): \
             expected <none>, actual read 0x07 (7) written <read-only>"
        );
        assert_eq!(diffs[3].expected, "contract 0.0.1003 with 1 storage change(s)");
        assert_eq!(diffs[3].actual, "<missing>");
    }

    #[test]
    fn read_only_vs_write_zero_is_a_diff() {
        let e = SidecarRecord::state_changes(
            ts(),
            vec![ContractStateChange::new(
                EntityId::num(7),
                vec![StorageChange::read_only(0u64, 0u64)],
            )],
        );
        let a = SidecarRecord::state_changes(
            ts(),
            vec![ContractStateChange::new(
                EntityId::num(7),
                vec![StorageChange::read_write(0u64, 0u64, 0u64)],
            )],
        );
        let diffs = compare_records(&e, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].expected, "<read-only>");
        assert_eq!(diffs[0].actual, "0x0 (0)");
    }

    #[test]
    fn long_bytecode_renders_as_digest() {
        let e = SidecarRecord::bytecode(
            ts(),
            ContractBytecode {
                contract_id: Some(EntityId::num(5)),
                initcode: vec![1; 10],
                runtime_bytecode: Some(vec![0xaa; 200]),
            },
        );
        let mut a = e.clone();
        if let SidecarPayload::Bytecode(b) = &mut a.payload {
            b.runtime_bytecode = Some(vec![0xab; 200]);
        }
        let diffs = compare_records(&e, &a);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path, "bytecode.runtime_bytecode");
        assert!(diffs[0].expected.starts_with("len=200 sha256="));
        assert_ne!(diffs[0].expected, diffs[0].actual);
    }

    #[test]
    fn migration_flag_is_compared() {
        let e = SidecarRecord::actions(ts(), vec![]);
        let a = e.clone().as_migration();
        let diffs = compare_records(&e, &a);
        assert_eq!(diffs[0].path, "migration");
    }
}
