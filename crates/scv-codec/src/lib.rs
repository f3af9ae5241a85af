//! scv-codec
//!
//! Sidecar file codec. Turns the bytes of one completed sidecar file into an
//! ordered sequence of [`scv_types::SidecarRecord`]s, and back.
//!
//! Two layers:
//! - [`wire`]: raw, nullable-field structs mirroring the node's record layout,
//!   plus normalization into the sum-typed model (rejecting records whose
//!   exclusive field groups are zero or multiply populated).
//! - [`frame`]: the length-prefixed file framing.
//!
//! Pure and stateless. No IO.

pub mod frame;
pub mod wire;

pub use frame::{
    decode, encode, DecodeError, EncodeError, FrameFault, FramedJsonDecoder, RecordDecoder,
    FILE_MAGIC, FORMAT_VERSION, HEADER_BYTES, MAX_FRAME_BYTES,
};
pub use wire::{
    normalize_record, to_raw, NormalizeError, RawContractAction, RawContractBytecode,
    RawContractStateChange, RawSidecarRecord, RawStorageChange,
};
