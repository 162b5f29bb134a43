//! Prefix-partitioned KV storage for the feed archive.
//!
//! The keyspace is split by a 4 byte big-endian table prefix ([`keys`]),
//! persisted values are the prost encoding of the corresponding wire
//! entity, and newest-first reads come from a redundant reverse-time
//! index rather than reverse iteration, so the layout ports to any
//! ordered KV engine.
//!
//! Two [`Store`]s are provisioned by the server: `meta` for small
//! records (profiles, jobs, oauth, the id→uuid map) and `records` for
//! the large ones (feedinfo, entries and their index, index caches).

mod keys;
mod repo;
mod store;

pub use keys::{FlakeKey, MetaKey, PrefixTable, UuidFlakeKey, UuidKey};
pub use repo::{
    archive_history, bind_oauth_user, get_entry, get_feedinfo, get_oauth_user, get_profile_by_id,
    get_profile_by_uuid, put_entry, save_feedinfo, update_entry, update_oauth_user, update_profile,
    PutOutcome, RepoError, RepoResult,
};
pub use store::{ScanControl, Store, StoreError, StoreResult};

pub(crate) const LOG_TARGET: &str = "feedvault::store";
