//! Typed read/write of the archive's entities over the key codec and
//! the store facade.

use feedvault_wire::{Entry, FeedJob, Feedinfo, OAuthUser, Profile};
use prost::Message as _;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;
use uuid::Uuid;

use crate::store::StoreError;
use crate::{MetaKey, PrefixTable, Store, UuidFlakeKey, UuidKey, LOG_TARGET};

/// Legacy entry ids arrive as `"e/<32 hex>"`; stored ids never carry
/// the prefix.
const LEGACY_ENTRY_PREFIX: &str = "e/";

#[derive(Debug, Snafu)]
pub enum RepoError {
    #[snafu(display("Record not found"))]
    NotFound,
    #[snafu(display("No user data"))]
    NoUserData,
    #[snafu(display("Can not bind to another user"))]
    AlreadyBound,
    #[snafu(display("Unknown oauth provider `{provider}`"))]
    UnknownProvider { provider: String },
    #[snafu(display("Invalid uuid: {source}"))]
    InvalidUuid { source: uuid::Error },
    #[snafu(display("Invalid date: {source}"))]
    InvalidDate { source: chrono::ParseError },
    #[snafu(display("Stored record does not decode: {source}"))]
    Decoding { source: prost::DecodeError },
    #[snafu(transparent)]
    Store { source: StoreError },
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// Outcome of a non-force entry write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// The primary key already existed and the write was skipped.
    AlreadyPresent,
}

/// Store an entry under its primary key and index it under the owner's
/// reverse-time partition.
///
/// Without `force` a present primary record is left untouched and the
/// call reports [`PutOutcome::AlreadyPresent`]. With `force` the value
/// is replaced; the index key is derived from the entry date, so a
/// force-write with an unchanged date lands on the same index record
/// while a new date adds a second index row pointing at the same
/// primary key.
pub fn put_entry(
    rdb: &Store,
    entry: &mut Entry,
    force: bool,
) -> RepoResult<(UuidKey, PutOutcome)> {
    let owner_uuid = Uuid::parse_str(&entry.profile_uuid).context(InvalidUuidSnafu)?;

    if let Some(stripped) = entry.id.strip_prefix(LEGACY_ENTRY_PREFIX) {
        entry.id = stripped.to_owned();
    }
    let entry_uuid = Uuid::parse_str(&entry.id).context(InvalidUuidSnafu)?;

    let key = UuidKey::new(PrefixTable::Entry, entry_uuid);
    let key_bytes = key.bytes();

    if !force && rdb.get(&key_bytes)?.is_some() {
        debug!(target: LOG_TARGET, key = %key, "Entry exists, skipping");
        return Ok((key, PutOutcome::AlreadyPresent));
    }

    // Serialize after the legacy prefix strip so the stored id is
    // already canonical.
    rdb.put(&key_bytes, &entry.encode_to_vec())?;

    let date_ms = chrono::DateTime::parse_from_rfc3339(&entry.date)
        .context(InvalidDateSnafu)?
        .timestamp_millis();
    let index_key = UuidFlakeKey::new(
        PrefixTable::ReverseEntryIndex,
        owner_uuid,
        rdb.reverse_id_at(date_ms),
    );
    rdb.put(&index_key.bytes(), &key_bytes)?;

    Ok((key, PutOutcome::Stored))
}

pub fn get_entry(rdb: &Store, uuid_str: &str) -> RepoResult<Entry> {
    let entry_uuid = Uuid::parse_str(uuid_str).context(InvalidUuidSnafu)?;
    let key = UuidKey::new(PrefixTable::Entry, entry_uuid);
    let raw = rdb.get(&key.bytes())?.ok_or(RepoError::NotFound)?;
    Entry::decode(raw.as_slice()).context(DecodingSnafu)
}

/// Rewrite an entry's primary record in place, leaving the reverse
/// index alone. Used by like/comment mutations which never change the
/// entry date.
pub fn update_entry(rdb: &Store, entry: &Entry) -> RepoResult<()> {
    let entry_uuid = Uuid::parse_str(&entry.id).context(InvalidUuidSnafu)?;
    let key = UuidKey::new(PrefixTable::Entry, entry_uuid);
    rdb.put(&key.bytes(), &entry.encode_to_vec())?;
    Ok(())
}

/// Write the profile record and the `id → uuid` mapping.
///
/// An empty incoming `remote_key` preserves whatever key the stored
/// record already carries. The mapping is written after the record, so
/// a reader that resolves the mapping always finds the record behind
/// it.
pub fn update_profile(mdb: &Store, profile: &mut Profile) -> RepoResult<()> {
    let uuid = Uuid::parse_str(&profile.uuid).context(InvalidUuidSnafu)?;
    let key = UuidKey::new(PrefixTable::Profile, uuid);
    let key_bytes = key.bytes();

    if profile.remote_key.is_empty() {
        if let Some(raw) = mdb.get(&key_bytes)? {
            let old = Profile::decode(raw.as_slice()).context(DecodingSnafu)?;
            profile.remote_key = old.remote_key;
        }
    }

    mdb.put(&key_bytes, &profile.encode_to_vec())?;
    mdb.put(profile.id.as_bytes(), uuid.as_bytes())?;
    debug!(target: LOG_TARGET, id = %profile.id, uuid = %profile.uuid, "Profile updated");
    Ok(())
}

/// Two-hop lookup: raw id → uuid mapping, then the profile record.
/// Either hop missing reads as not-found.
pub fn get_profile_by_id(mdb: &Store, id: &str) -> RepoResult<Profile> {
    let raw_uuid = mdb.get(id.as_bytes())?.ok_or(RepoError::NotFound)?;
    let uuid = Uuid::from_slice(&raw_uuid).context(InvalidUuidSnafu)?;
    get_profile_by_uuid(mdb, uuid)
}

pub fn get_profile_by_uuid(mdb: &Store, uuid: Uuid) -> RepoResult<Profile> {
    let key = UuidKey::new(PrefixTable::Profile, uuid);
    let raw = mdb.get(&key.bytes())?.ok_or(RepoError::NotFound)?;
    Profile::decode(raw.as_slice()).context(DecodingSnafu)
}

/// Store a feedinfo under its uuid, with the same remote-key
/// preservation rule as profiles.
pub fn save_feedinfo(rdb: &Store, uuid_str: &str, info: &mut Feedinfo) -> RepoResult<()> {
    let uuid = Uuid::parse_str(uuid_str).context(InvalidUuidSnafu)?;
    let key = UuidKey::new(PrefixTable::Feedinfo, uuid);
    let key_bytes = key.bytes();

    if info.remote_key.is_empty() {
        if let Some(raw) = rdb.get(&key_bytes)? {
            let old = Feedinfo::decode(raw.as_slice()).context(DecodingSnafu)?;
            info.remote_key = old.remote_key;
        }
    }

    rdb.put(&key_bytes, &info.encode_to_vec())?;
    Ok(())
}

pub fn get_feedinfo(rdb: &Store, uuid_str: &str) -> RepoResult<Feedinfo> {
    let uuid = Uuid::parse_str(uuid_str).context(InvalidUuidSnafu)?;
    let key = UuidKey::new(PrefixTable::Feedinfo, uuid);
    let raw = rdb.get(&key.bytes())?.ok_or(RepoError::NotFound)?;
    Feedinfo::decode(raw.as_slice()).context(DecodingSnafu)
}

fn oauth_table(provider: &str) -> RepoResult<PrefixTable> {
    match provider {
        "google" => Ok(PrefixTable::OauthGoogle),
        "twitter" => Ok(PrefixTable::OauthTwitter),
        other => UnknownProviderSnafu { provider: other }.fail(),
    }
}

/// Refresh a credential record, carrying forward any uuid the stored
/// record was already bound to.
pub fn update_oauth_user(mdb: &Store, user: &mut OAuthUser) -> RepoResult<()> {
    let key = MetaKey::new(oauth_table(&user.provider)?, user.user_id.clone());
    let key_bytes = key.bytes();

    if let Some(raw) = mdb.get(&key_bytes)? {
        let old = OAuthUser::decode(raw.as_slice()).context(DecodingSnafu)?;
        user.uuid = old.uuid;
    }

    mdb.put(&key_bytes, &user.encode_to_vec())?;
    Ok(())
}

/// Bind a credential to a profile.
///
/// Requires an existing credential record. Binding is idempotent for
/// the uuid already stored; a record bound to a different uuid refuses
/// to rebind.
pub fn bind_oauth_user(mdb: &Store, user: &OAuthUser) -> RepoResult<OAuthUser> {
    let key = MetaKey::new(oauth_table(&user.provider)?, user.user_id.clone());
    let key_bytes = key.bytes();

    let raw = mdb.get(&key_bytes)?.ok_or(RepoError::NoUserData)?;
    let mut stored = OAuthUser::decode(raw.as_slice()).context(DecodingSnafu)?;

    if stored.uuid == user.uuid {
        return Ok(stored);
    }
    if !stored.uuid.is_empty() {
        return Err(RepoError::AlreadyBound);
    }

    stored.uuid = user.uuid.clone();
    mdb.put(&key_bytes, &stored.encode_to_vec())?;
    Ok(stored)
}

pub fn get_oauth_user(mdb: &Store, provider: &str, user_id: &str) -> RepoResult<OAuthUser> {
    let key = MetaKey::new(oauth_table(provider)?, user_id);
    let raw = mdb.get(&key.bytes())?.ok_or(RepoError::NotFound)?;
    OAuthUser::decode(raw.as_slice()).context(DecodingSnafu)
}

/// Terminal job record for a target feed, if it was ever archived.
pub fn archive_history(mdb: &Store, target_id: &str) -> RepoResult<FeedJob> {
    let key = MetaKey::new(PrefixTable::JobHistory, target_id);
    let raw = mdb.get(&key.bytes())?.ok_or(RepoError::NotFound)?;
    FeedJob::decode(raw.as_slice()).context(DecodingSnafu)
}
