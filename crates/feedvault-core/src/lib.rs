pub mod flake;

use core::fmt;
use std::str::FromStr;

use rand::Rng as _;

pub use flake::{Generator, IdError, MAX_TIME_MS};

/// A 128 bit k-ordered identifier, big-endian throughout.
///
/// * The first 64 bits encode milliseconds since the unix epoch.
/// * The next 48 bits encode the worker that generated the id, usually
///   the hardware address of its first network interface.
/// * The final 16 bits encode a sequence differentiating ids generated
///   within the same millisecond.
///
/// Because the timestamp leads, ids sort by generation time under plain
/// byte-lexicographic comparison, which is what the store's key order
/// relies on.
#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlakeId([u8; 16]);

impl FlakeId {
    pub const ZERO: Self = Self([0; 16]);
    pub const MAX: Self = Self([0xff; 16]);

    pub fn from_parts(timestamp_ms: i64, worker: WorkerId, seq: u16) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&(timestamp_ms as u64).to_be_bytes());
        bytes[8..14].copy_from_slice(worker.as_slice());
        bytes[14..16].copy_from_slice(&seq.to_be_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Milliseconds since epoch recovered from the leading 64 bits.
    pub fn timestamp_ms(&self) -> i64 {
        u64::from_be_bytes(self.0[0..8].try_into().expect("Fixed size")) as i64
    }

    /// Original timestamp of a reverse-time id, milliseconds since epoch.
    pub fn reverse_timestamp_ms(&self) -> i64 {
        MAX_TIME_MS - self.timestamp_ms()
    }

    pub fn worker(&self) -> WorkerId {
        WorkerId(self.0[8..14].try_into().expect("Fixed size"))
    }

    pub fn seq(&self) -> u16 {
        u16::from_be_bytes(self.0[14..16].try_into().expect("Fixed size"))
    }
}

impl fmt::Display for FlakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        data_encoding::HEXLOWER.encode_write(self.as_slice(), f)
    }
}

impl FromStr for FlakeId {
    type Err = data_encoding::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = data_encoding::HEXLOWER_PERMISSIVE.decode(s.as_bytes())?;
        let a = v.try_into().map_err(|_| data_encoding::DecodeError {
            position: 0,
            kind: data_encoding::DecodeKind::Length,
        })?;
        Ok(Self(a))
    }
}

/// A 48 bit worker identifier, usually the machine's hardware address.
#[derive(Copy, Clone, Hash, Debug, PartialEq, Eq)]
pub struct WorkerId([u8; 6]);

impl WorkerId {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// First non-loopback hardware address, or a cryptographically
    /// random 48 bit value when the machine has none.
    pub fn detect() -> Self {
        match mac_address::get_mac_address() {
            Ok(Some(addr)) if addr.bytes() != [0u8; 6] => Self(addr.bytes()),
            _ => Self::random(),
        }
    }

    pub fn random() -> Self {
        Self(rand::rng().random())
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}
