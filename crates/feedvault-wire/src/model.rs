//! Message definitions shared by the server, the crawl workers and the
//! front-end.
//!
//! These are proto-shaped and additive-only: tags are a stable wire
//! contract, and the same encoding is what the store persists for each
//! entity. Fields are only ever appended, never renumbered.

use std::collections::HashMap;

/// One archived feed subject: a user, a group, or one of the special
/// built-in feeds.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Profile {
    #[prost(string, tag = "1")]
    pub uuid: String,
    /// Public handle, unique across the archive.
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub name: String,
    /// One of "user", "group", "special".
    #[prost(string, tag = "4")]
    pub kind: String,
    #[prost(bool, tag = "5")]
    pub private: bool,
    #[prost(string, tag = "6")]
    pub sup_id: String,
    #[prost(string, tag = "7")]
    pub description: String,
    /// Upstream credential for refetching; preserved across updates
    /// that omit it.
    #[prost(string, tag = "8")]
    pub remote_key: String,
    #[prost(string, tag = "9")]
    pub picture: String,
}

/// Extended profile: the full subscription/admin/service state of a
/// feed. Stored under the profile's uuid in the records store.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Feedinfo {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub kind: String,
    #[prost(bool, tag = "5")]
    pub private: bool,
    #[prost(string, tag = "6")]
    pub sup_id: String,
    #[prost(string, tag = "7")]
    pub description: String,
    #[prost(string, tag = "8")]
    pub remote_key: String,
    #[prost(string, tag = "9")]
    pub picture: String,
    #[prost(message, repeated, tag = "10")]
    pub subscriptions: Vec<Profile>,
    #[prost(message, repeated, tag = "11")]
    pub subscribers: Vec<Profile>,
    #[prost(message, repeated, tag = "12")]
    pub admins: Vec<Profile>,
    #[prost(message, repeated, tag = "13")]
    pub services: Vec<Service>,
    /// Only populated on the wire during ingestion; stripped before
    /// the record is stored.
    #[prost(message, repeated, tag = "14")]
    pub entries: Vec<Entry>,
}

/// A third-party service attached to a feed (e.g. a linked twitter
/// account used for crawling).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub icon: String,
    #[prost(string, tag = "4")]
    pub profile: String,
    #[prost(string, tag = "5")]
    pub username: String,
    #[prost(message, optional, tag = "6")]
    pub oauth: Option<OAuthUser>,
}

/// Credential record keyed by `(provider, user_id)`; carries the
/// profile uuid once bound.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OAuthUser {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
    #[prost(string, tag = "3")]
    pub name: String,
    /// "google" or "twitter".
    #[prost(string, tag = "4")]
    pub provider: String,
    #[prost(string, tag = "5")]
    pub access_token: String,
    #[prost(string, tag = "6")]
    pub access_token_secret: String,
    #[prost(string, tag = "7")]
    pub picture: String,
}

/// A single archived feed item.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entry {
    /// 32 hex chars, globally unique. Legacy ids may arrive with an
    /// "e/" prefix which is stripped before storage.
    #[prost(string, tag = "1")]
    pub id: String,
    /// RFC3339, UTC.
    #[prost(string, tag = "2")]
    pub date: String,
    #[prost(string, tag = "3")]
    pub body: String,
    #[prost(string, tag = "4")]
    pub raw_body: String,
    #[prost(string, tag = "5")]
    pub url: String,
    #[prost(message, optional, tag = "6")]
    pub from: Option<Feed>,
    /// Owning feed.
    #[prost(string, tag = "7")]
    pub profile_uuid: String,
    #[prost(message, repeated, tag = "8")]
    pub comments: Vec<Comment>,
    #[prost(message, repeated, tag = "9")]
    pub likes: Vec<Like>,
    #[prost(message, repeated, tag = "10")]
    pub thumbnails: Vec<Thumbnail>,
    #[prost(message, repeated, tag = "11")]
    pub files: Vec<EntryFile>,
    #[prost(message, optional, tag = "12")]
    pub via: Option<Via>,
    /// Per-viewer actions, computed at read time; never stored.
    #[prost(string, repeated, tag = "13")]
    pub commands: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Comment {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub date: String,
    #[prost(string, tag = "3")]
    pub body: String,
    #[prost(string, tag = "4")]
    pub raw_body: String,
    #[prost(message, optional, tag = "5")]
    pub from: Option<Feed>,
    #[prost(string, repeated, tag = "6")]
    pub commands: Vec<String>,
    /// Collapsed-placeholder bookkeeping: how many comments the
    /// placeholder stands for.
    #[prost(int32, tag = "7")]
    pub num: i32,
    #[prost(bool, tag = "8")]
    pub placeholder: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Like {
    #[prost(string, tag = "1")]
    pub date: String,
    #[prost(string, tag = "2")]
    pub body: String,
    #[prost(message, optional, tag = "3")]
    pub from: Option<Feed>,
    #[prost(int32, tag = "4")]
    pub num: i32,
    #[prost(bool, tag = "5")]
    pub placeholder: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Thumbnail {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub link: String,
    #[prost(int32, tag = "3")]
    pub width: i32,
    #[prost(int32, tag = "4")]
    pub height: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntryFile {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub kind: String,
    #[prost(string, tag = "4")]
    pub icon: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Via {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub url: String,
}

/// A feed as served to readers: profile envelope plus a page of
/// entries. Also used as the lightweight author reference inside
/// entries, comments and likes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Feed {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub picture: String,
    #[prost(string, tag = "5")]
    pub kind: String,
    #[prost(bool, tag = "6")]
    pub private: bool,
    #[prost(string, tag = "7")]
    pub sup_id: String,
    #[prost(string, tag = "8")]
    pub description: String,
    #[prost(message, repeated, tag = "9")]
    pub entries: Vec<Entry>,
}

/// Subscription/admin/service adjacency derived from a Feedinfo at
/// read time; never stored.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Graph {
    #[prost(map = "string, message", tag = "1")]
    pub subscriptions: HashMap<String, Profile>,
    #[prost(map = "string, message", tag = "2")]
    pub admins: HashMap<String, Profile>,
    #[prost(map = "string, message", tag = "3")]
    pub services: HashMap<String, Service>,
}

/// One queued unit of crawl work.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedJob {
    /// Hex of the full queue key; rewritten every time the job moves
    /// between queues.
    #[prost(string, tag = "1")]
    pub key: String,
    /// The crawling worker's own feed.
    #[prost(string, tag = "2")]
    pub id: String,
    /// The feed to fetch; defaults to `id` at enqueue time.
    #[prost(string, tag = "3")]
    pub target_id: String,
    #[prost(string, tag = "4")]
    pub uuid: String,
    #[prost(string, tag = "5")]
    pub remote_key: String,
    #[prost(message, optional, tag = "6")]
    pub service: Option<Service>,
    #[prost(message, optional, tag = "7")]
    pub profile: Option<Profile>,
    #[prost(int32, tag = "8")]
    pub start: i32,
    #[prost(int32, tag = "9")]
    pub page_size: i32,
    #[prost(int32, tag = "10")]
    pub max_limit: i32,
    #[prost(bool, tag = "11")]
    pub force_update: bool,
    #[prost(int64, tag = "12")]
    pub created: i64,
    #[prost(int64, tag = "13")]
    pub updated: i64,
    #[prost(string, tag = "14")]
    pub worker: String,
    #[prost(string, tag = "15")]
    pub status: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Worker {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(int32, tag = "2")]
    pub start: i32,
    #[prost(int32, tag = "3")]
    pub page_size: i32,
    /// 0 collapses long comment threads to three rows.
    #[prost(int32, tag = "4")]
    pub max_comments: i32,
    /// 0 collapses long like lists to four rows.
    #[prost(int32, tag = "5")]
    pub max_likes: i32,
    /// Profile id of the logged-in viewer, empty when anonymous.
    #[prost(string, tag = "6")]
    pub viewer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntryRequest {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(int32, tag = "2")]
    pub max_comments: i32,
    #[prost(int32, tag = "3")]
    pub max_likes: i32,
    #[prost(string, tag = "4")]
    pub viewer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProfileRequest {
    #[prost(string, tag = "1")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedinfoRequest {
    #[prost(string, tag = "1")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GraphRequest {
    #[prost(string, tag = "1")]
    pub uuid: String,
}

/// Reply to an archive stream: what was ingested and how long it took.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedSummary {
    #[prost(int32, tag = "1")]
    pub entry_count: i32,
    #[prost(string, tag = "2")]
    pub date_start: String,
    #[prost(string, tag = "3")]
    pub date_end: String,
    #[prost(int32, tag = "4")]
    pub elapsed_time: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LikeRequest {
    /// Entry uuid.
    #[prost(string, tag = "1")]
    pub entry: String,
    /// Acting profile uuid.
    #[prost(string, tag = "2")]
    pub user: String,
    /// true to like, false to unlike.
    #[prost(bool, tag = "3")]
    pub like: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommentRequest {
    #[prost(string, tag = "1")]
    pub entry: String,
    #[prost(string, tag = "2")]
    pub user: String,
    #[prost(string, tag = "3")]
    pub body: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommentDeleteRequest {
    #[prost(string, tag = "1")]
    pub entry: String,
    #[prost(string, tag = "2")]
    pub comment_id: String,
    #[prost(string, tag = "3")]
    pub user: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceDeleteRequest {
    /// Acting profile uuid.
    #[prost(string, tag = "1")]
    pub user: String,
    /// Service id to remove.
    #[prost(string, tag = "2")]
    pub service: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandRequest {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(string, tag = "2")]
    pub arg: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// Persisted form of a public-feed ring: the buffer's keys in
/// most-recent-first order, empty slots included.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexCacheRecord {
    #[prost(string, repeated, tag = "1")]
    pub keys: Vec<String>,
}
