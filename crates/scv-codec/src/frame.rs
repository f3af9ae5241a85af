//! Sidecar file framing.
//!
//! Layout (all integers big-endian):
//! ```text
//!   magic    : [u8; 4]  = "SCV1"
//!   version  : u32      = 1
//!   frame*   :
//!     length : u32      payload byte count, 1..=MAX_FRAME_BYTES
//!     payload: [u8]     UTF-8 JSON of one RawSidecarRecord
//! ```
//! A file ends exactly at a frame boundary. Anything else is a
//! [`DecodeError::MalformedFrame`]; there is no partial recovery.

use scv_types::SidecarRecord;

use crate::wire::{normalize_record, to_raw, NormalizeError, RawSidecarRecord};

/// Magic bytes at the start of every sidecar file.
pub const FILE_MAGIC: [u8; 4] = *b"SCV1";

/// Current framing version.
pub const FORMAT_VERSION: u32 = 1;

/// Byte size of the file header (magic + version).
pub const HEADER_BYTES: usize = 8;

/// Upper bound on one frame's payload; larger declared lengths are corrupt.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What was wrong with the bytes at the reported offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFault {
    HeaderTooShort { len: usize },
    BadMagic,
    UnsupportedVersion { version: u32 },
    /// Fewer than four bytes remain where a length prefix was expected.
    TruncatedLength { available: usize },
    TruncatedPayload { declared: usize, available: usize },
    EmptyFrame,
    Oversized { declared: usize },
    /// Payload is not a JSON `RawSidecarRecord`.
    Payload(String),
    /// Payload parsed but violates a record invariant.
    Invalid(NormalizeError),
}

impl std::fmt::Display for FrameFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HeaderTooShort { len } => {
                write!(f, "file header too short ({len} < {HEADER_BYTES} bytes)")
            }
            Self::BadMagic => f.write_str("bad magic in sidecar file header"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported sidecar format version {version}")
            }
            Self::TruncatedLength { available } => {
                write!(f, "truncated length prefix ({available} trailing bytes)")
            }
            Self::TruncatedPayload {
                declared,
                available,
            } => write!(
                f,
                "truncated frame: declared {declared} bytes, {available} available"
            ),
            Self::EmptyFrame => f.write_str("zero-length frame"),
            Self::Oversized { declared } => write!(
                f,
                "frame length {declared} exceeds limit {MAX_FRAME_BYTES}"
            ),
            Self::Payload(msg) => write!(f, "unparsable frame payload: {msg}"),
            Self::Invalid(e) => write!(f, "invalid record: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Corrupt or truncated bytes. `offset` is the start of the offending
    /// frame (or 0 for header faults).
    MalformedFrame { offset: usize, fault: FrameFault },
}

impl DecodeError {
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::MalformedFrame { offset, .. } => *offset,
        }
    }

    pub fn fault(&self) -> &FrameFault {
        match self {
            DecodeError::MalformedFrame { fault, .. } => fault,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::MalformedFrame { offset, fault } => {
                write!(f, "malformed frame at byte {offset}: {fault}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Why a set of records could not be written as a sidecar file.
#[derive(Debug)]
pub enum EncodeError {
    Json(serde_json::Error),
    /// Record `index` serializes to more than [`MAX_FRAME_BYTES`].
    Oversized { index: usize, len: usize },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Json(e) => write!(f, "serialize record: {e}"),
            EncodeError::Oversized { index, len } => write!(
                f,
                "record {index} encodes to {len} bytes, limit {MAX_FRAME_BYTES}"
            ),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Json(e) => Some(e),
            EncodeError::Oversized { .. } => None,
        }
    }
}

fn malformed(offset: usize, fault: FrameFault) -> DecodeError {
    DecodeError::MalformedFrame { offset, fault }
}

// ---------------------------------------------------------------------------
// Decode / encode
// ---------------------------------------------------------------------------

/// Decode one complete sidecar file into its records, in file order.
///
/// # Errors
/// Fails fast with [`DecodeError::MalformedFrame`] on the first bad frame.
pub fn decode(bytes: &[u8]) -> Result<Vec<SidecarRecord>, DecodeError> {
    if bytes.len() < HEADER_BYTES {
        return Err(malformed(0, FrameFault::HeaderTooShort { len: bytes.len() }));
    }
    if bytes[0..4] != FILE_MAGIC {
        return Err(malformed(0, FrameFault::BadMagic));
    }
    let version = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(malformed(0, FrameFault::UnsupportedVersion { version }));
    }

    let mut out = Vec::new();
    let mut offset = HEADER_BYTES;
    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < LENGTH_PREFIX_BYTES {
            return Err(malformed(
                offset,
                FrameFault::TruncatedLength {
                    available: remaining,
                },
            ));
        }
        let declared = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        if declared == 0 {
            return Err(malformed(offset, FrameFault::EmptyFrame));
        }
        if declared > MAX_FRAME_BYTES {
            return Err(malformed(offset, FrameFault::Oversized { declared }));
        }
        let start = offset + LENGTH_PREFIX_BYTES;
        let available = bytes.len() - start;
        if declared > available {
            return Err(malformed(
                offset,
                FrameFault::TruncatedPayload {
                    declared,
                    available,
                },
            ));
        }

        let payload = &bytes[start..start + declared];
        let raw: RawSidecarRecord = serde_json::from_slice(payload)
            .map_err(|e| malformed(offset, FrameFault::Payload(e.to_string())))?;
        let record =
            normalize_record(&raw).map_err(|e| malformed(offset, FrameFault::Invalid(e)))?;
        out.push(record);

        offset = start + declared;
    }
    Ok(out)
}

/// Encode records into a complete sidecar file. Inverse of [`decode`].
///
/// # Errors
/// A record whose JSON exceeds [`MAX_FRAME_BYTES`] is refused rather than
/// written as a frame `decode` would reject.
pub fn encode(records: &[SidecarRecord]) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(HEADER_BYTES + records.len() * 256);
    buf.extend_from_slice(&FILE_MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    for (index, record) in records.iter().enumerate() {
        let payload = serde_json::to_vec(&to_raw(record)).map_err(EncodeError::Json)?;
        if payload.len() > MAX_FRAME_BYTES {
            return Err(EncodeError::Oversized {
                index,
                len: payload.len(),
            });
        }
        // MAX_FRAME_BYTES fits in a u32.
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Pluggable decoder seam
// ---------------------------------------------------------------------------

/// Turns one completed sidecar file into records.
///
/// The watcher pipeline holds a `Box<dyn RecordDecoder>` so a ledger's
/// published record-stream format can be swapped in without touching the
/// reconciler.
pub trait RecordDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SidecarRecord>, DecodeError>;
}

/// Default decoder for the framing described in this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedJsonDecoder;

impl RecordDecoder for FramedJsonDecoder {
    fn name(&self) -> &'static str {
        "framed-json-v1"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<SidecarRecord>, DecodeError> {
        decode(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scv_types::{
        ActionOutcome, CallOperationType, CallType, Caller, ConsensusTimestamp, ContractAction,
        ContractBytecode, ContractStateChange, EntityId, Recipient, StorageChange,
    };

    fn ts(n: u32) -> ConsensusTimestamp {
        ConsensusTimestamp::new(1_700_000_000, n)
    }

    fn sample_records() -> Vec<SidecarRecord> {
        let create = ContractAction::new(
            CallType::Create,
            CallOperationType::OpCreate,
            Caller::CallingAccount(EntityId::num(1001)),
            197_000,
            68_492,
            Some(Recipient::Contract(EntityId::num(1002))),
            ActionOutcome::Output(vec![]),
        );
        let nested = ContractAction::new(
            CallType::Call,
            CallOperationType::OpDelegateCall,
            Caller::CallingContract(EntityId::num(1002)),
            50_000,
            1_200,
            Some(Recipient::Contract(EntityId::num(1003))),
            ActionOutcome::RevertReason(b"nope".to_vec()),
        )
        .with_call_depth(1)
        .with_input(vec![0xde, 0xad, 0xbe, 0xef])
        .with_value(10);
        vec![
            SidecarRecord::actions(ts(1), vec![create, nested]),
            SidecarRecord::state_changes(
                ts(1),
                vec![ContractStateChange::new(
                    EntityId::num(1002),
                    vec![
                        StorageChange::read_write(0u64, 0u64, 55u64),
                        StorageChange::read_only(1u64, 7u64),
                        StorageChange::read_write(2u64, 9u64, 0u64),
                    ],
                )],
            ),
            SidecarRecord::bytecode(
                ts(2),
                ContractBytecode {
                    contract_id: Some(EntityId::num(1002)),
                    initcode: vec![0x60, 0x80, 0x60, 0x40],
                    runtime_bytecode: Some(vec![0x60, 0x80]),
                },
            )
            .as_migration(),
        ]
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FILE_MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn decode_reproduces_encoded_sequence() {
        let records = sample_records();
        let bytes = encode(&records).unwrap();
        assert_eq!(decode(&bytes).unwrap(), records);
    }

    #[test]
    fn header_only_file_has_no_records() {
        let bytes = encode(&[]).unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn short_header_is_malformed_at_zero() {
        let err = decode(b"SCV").unwrap_err();
        assert_eq!(err.offset(), 0);
        assert_eq!(err.fault(), &FrameFault::HeaderTooShort { len: 3 });
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = encode(&[]).unwrap();
        bytes[0] = b'X';
        assert_eq!(decode(&bytes).unwrap_err().fault(), &FrameFault::BadMagic);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = encode(&[]).unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_be_bytes());
        assert_eq!(
            decode(&bytes).unwrap_err().fault(),
            &FrameFault::UnsupportedVersion { version: 2 }
        );
    }

    #[test]
    fn truncated_payload_reports_frame_offset() {
        let records = sample_records();
        let full = encode(&records).unwrap();
        let first_len = u32::from_be_bytes([full[8], full[9], full[10], full[11]]) as usize;
        let second_frame_at = HEADER_BYTES + 4 + first_len;

        let cut = &full[..second_frame_at + 6];
        let err = decode(cut).unwrap_err();
        assert_eq!(err.offset(), second_frame_at);
        assert!(matches!(
            err.fault(),
            FrameFault::TruncatedPayload { available: 2, .. }
        ));
    }

    #[test]
    fn truncated_length_prefix_rejected() {
        let mut bytes = encode(&sample_records()[..1]).unwrap();
        let end = bytes.len();
        bytes.extend_from_slice(&[0, 0]);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.offset(), end);
        assert_eq!(err.fault(), &FrameFault::TruncatedLength { available: 2 });
    }

    #[test]
    fn zero_length_frame_rejected() {
        let mut bytes = encode(&[]).unwrap();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::MalformedFrame {
                offset: HEADER_BYTES,
                fault: FrameFault::EmptyFrame
            }
        );
    }

    #[test]
    fn oversized_frame_rejected_without_reading_payload() {
        let mut bytes = encode(&[]).unwrap();
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode(&bytes).unwrap_err().fault(),
            FrameFault::Oversized { .. }
        ));
    }

    #[test]
    fn encode_refuses_record_larger_than_a_frame() {
        // Hex doubles the byte count, so this lands above the frame limit.
        let huge = SidecarRecord::bytecode(
            ts(3),
            ContractBytecode {
                contract_id: Some(EntityId::num(1003)),
                initcode: vec![0x60],
                runtime_bytecode: Some(vec![0xfe; MAX_FRAME_BYTES / 2 + 1]),
            },
        );
        let records = vec![sample_records().remove(0), huge];
        match encode(&records).unwrap_err() {
            EncodeError::Oversized { index, len } => {
                assert_eq!(index, 1);
                assert!(len > MAX_FRAME_BYTES);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_payload_rejected() {
        let err = decode(&frame(b"not json")).unwrap_err();
        assert_eq!(err.offset(), HEADER_BYTES);
        assert!(matches!(err.fault(), FrameFault::Payload(_)));
    }

    #[test]
    fn invalid_union_in_payload_rejected() {
        let json = br#"{"consensus_timestamp":"1.000000000","actions":[{
            "call_type":"CALL","call_operation_type":"OP_CALL",
            "calling_account":"0.0.2","gas":1,"gas_used":1,
            "output":"0x","error":"0x00"}]}"#;
        let err = decode(&frame(json)).unwrap_err();
        assert!(matches!(
            err.fault(),
            FrameFault::Invalid(NormalizeError::OutcomeNotExactlyOne { populated: 2, .. })
        ));
    }

    #[test]
    fn framed_json_decoder_delegates() {
        let records = sample_records();
        let bytes = encode(&records).unwrap();
        let d: Box<dyn RecordDecoder> = Box::new(FramedJsonDecoder);
        assert_eq!(d.decode(&bytes).unwrap(), records);
        assert_eq!(d.name(), "framed-json-v1");
    }
}
