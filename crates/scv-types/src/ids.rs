use chrono::{DateTime, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// ConsensusTimestamp
// ---------------------------------------------------------------------------

/// Ledger-assigned consensus timestamp of a transaction.
///
/// This is the correlation key between a triggering transaction and the
/// sidecar records it produces. Ordering is (seconds, nanos).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsensusTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl ConsensusTimestamp {
    pub const NANOS_PER_SECOND: u32 = 1_000_000_000;

    /// Builds a timestamp; `nanos` overflow is carried into `seconds`.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds + i64::from(nanos / Self::NANOS_PER_SECOND),
            nanos: nanos % Self::NANOS_PER_SECOND,
        }
    }

    /// Parse the `seconds.nanos` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (secs, nanos) = s.trim().split_once('.')?;
        if nanos.is_empty() || nanos.len() > 9 {
            return None;
        }
        let seconds: i64 = secs.parse().ok()?;
        // Right-pad so "1.5" means 1.500000000.
        let padded = format!("{nanos:0<9}");
        let nanos: u32 = padded.parse().ok()?;
        Some(Self::new(seconds, nanos))
    }

    /// UTC wall-clock rendering for diagnostics. `None` if out of chrono's range.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.seconds, self.nanos)
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Ledger entity identity (`shard.realm.num`) for accounts and contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Shorthand for `0.0.num`.
    pub const fn num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let shard = parts.next()?.parse().ok()?;
        let realm = parts.next()?.parse().ok()?;
        let num = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { shard, realm, num })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

/// Big-endian storage word with leading zero bytes trimmed.
///
/// Zero is the empty byte string. Two words are equal iff their trimmed
/// big-endian representations are equal, so `0x0037` and `0x37` compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Word(Vec<u8>);

impl Word {
    pub fn zero() -> Self {
        Self(Vec::new())
    }

    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Self(bytes[first..].to_vec())
    }

    pub fn from_u64(v: u64) -> Self {
        Self::from_be_bytes(&v.to_be_bytes())
    }

    /// Trimmed big-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `0x`-prefixed (or bare) hex. Odd-length input is left-padded.
    pub fn from_hex(s: &str) -> Option<Self> {
        let t = s.trim();
        let t = t.strip_prefix("0x").unwrap_or(t);
        if t.is_empty() {
            return Some(Self::zero());
        }
        let padded = if t.len() % 2 == 1 {
            format!("0{t}")
        } else {
            t.to_string()
        };
        hex::decode(padded).ok().map(|b| Self::from_be_bytes(&b))
    }
}

impl From<u64> for Word {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("0x0");
        }
        write!(f, "0x{}", hex::encode(&self.0))
    }
}
