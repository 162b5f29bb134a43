//! Composite key shapes over the prefix-partitioned keyspace.
//!
//! Every key starts with a 4 byte big-endian table prefix. The numeric
//! prefix values are the stable on-disk contract; changing one is a
//! breaking format change.

use core::fmt;

use feedvault_core::FlakeId;
use uuid::Uuid;

/// Table prefixes.
///
/// Gaps in the numbering are tables of earlier layouts that must not
/// be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrefixTable {
    Feedinfo = 2,
    Entry = 3,
    /// Newest-first per-feed index; values are primary entry keys.
    ReverseEntryIndex = 5,
    /// Persisted public-feed rings.
    IndexCache = 6,

    Profile = 100,
    Service = 101,
    Subscription = 102,
    Subscriber = 103,
    OauthTwitter = 104,
    OauthGoogle = 105,

    JobFeed = 200,
    JobRunning = 201,
    JobHistory = 202,
}

impl PrefixTable {
    pub const LEN: usize = 4;

    pub fn bytes(self) -> [u8; Self::LEN] {
        (self as u32).to_be_bytes()
    }
}

impl fmt::Display for PrefixTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        data_encoding::HEXLOWER.encode_write(&self.bytes(), f)
    }
}

/// `‖prefix(4)‖utf8 string‖` — id-keyed lookups such as
/// `JobHistory[target_id]` and `OauthGoogle[user_id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaKey {
    pub table: PrefixTable,
    pub meta: String,
}

impl MetaKey {
    pub fn new(table: PrefixTable, meta: impl Into<String>) -> Self {
        Self {
            table,
            meta: meta.into(),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PrefixTable::LEN + self.meta.len());
        buf.extend_from_slice(&self.table.bytes());
        buf.extend_from_slice(self.meta.as_bytes());
        buf
    }

    /// Scan boundary: the table tag alone.
    pub fn scan_prefix(&self) -> [u8; PrefixTable::LEN] {
        self.table.bytes()
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.table, self.meta)
    }
}

/// `‖prefix(4)‖flake id(16)‖` — time-ordered queue keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlakeKey {
    pub table: PrefixTable,
    pub id: FlakeId,
}

impl FlakeKey {
    pub const LEN: usize = PrefixTable::LEN + 16;

    pub fn new(table: PrefixTable, id: FlakeId) -> Self {
        Self { table, id }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend_from_slice(&self.table.bytes());
        buf.extend_from_slice(self.id.as_slice());
        buf
    }

    pub fn scan_prefix(&self) -> [u8; PrefixTable::LEN] {
        self.table.bytes()
    }
}

impl fmt::Display for FlakeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        data_encoding::HEXLOWER.encode_write(&self.bytes(), f)
    }
}

/// `‖prefix(4)‖uuid(16)‖` — primary-by-uuid records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UuidKey {
    pub table: PrefixTable,
    pub uuid: Uuid,
}

impl UuidKey {
    pub const LEN: usize = PrefixTable::LEN + 16;

    pub fn new(table: PrefixTable, uuid: Uuid) -> Self {
        Self { table, uuid }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend_from_slice(&self.table.bytes());
        buf.extend_from_slice(self.uuid.as_bytes());
        buf
    }

    pub fn scan_prefix(&self) -> [u8; PrefixTable::LEN] {
        self.table.bytes()
    }
}

impl fmt::Display for UuidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        data_encoding::HEXLOWER.encode_write(&self.bytes(), f)
    }
}

/// `‖prefix(4)‖uuid(16)‖flake id(16)‖` — per-owner time-ordered
/// indexes. The scan boundary is the 20 byte `‖prefix‖uuid‖` view so a
/// scan stays inside one owner's partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UuidFlakeKey {
    pub table: PrefixTable,
    pub uuid: Uuid,
    pub id: FlakeId,
}

impl UuidFlakeKey {
    pub const LEN: usize = UuidKey::LEN + 16;

    pub fn new(table: PrefixTable, uuid: Uuid, id: FlakeId) -> Self {
        Self { table, uuid, id }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend_from_slice(&self.table.bytes());
        buf.extend_from_slice(self.uuid.as_bytes());
        buf.extend_from_slice(self.id.as_slice());
        buf
    }

    pub fn scan_prefix(&self) -> [u8; UuidKey::LEN] {
        let mut buf = [0u8; UuidKey::LEN];
        buf[..PrefixTable::LEN].copy_from_slice(&self.table.bytes());
        buf[PrefixTable::LEN..].copy_from_slice(self.uuid.as_bytes());
        buf
    }
}

impl fmt::Display for UuidFlakeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        data_encoding::HEXLOWER.encode_write(&self.bytes(), f)
    }
}
