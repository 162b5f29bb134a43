//! Unary and streaming RPC handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use feedvault_core::FlakeId;
use feedvault_store::{
    get_entry, get_feedinfo, get_profile_by_id, get_profile_by_uuid, put_entry, save_feedinfo,
    update_entry, update_oauth_user, PrefixTable, RepoError, Store, StoreError, UuidFlakeKey,
};
use feedvault_wire::rpc::{self, Status, WireError};
use feedvault_wire::{
    Comment, CommentDeleteRequest, CommentRequest, Entry, EntryRequest, Feed, FeedRequest,
    FeedSummary, Feedinfo, FeedinfoRequest, Graph, GraphRequest, Like, LikeRequest, OAuthUser,
    Profile, ProfileRequest, Service, ServiceDeleteRequest,
};
use prost::Message as _;
use snafu::{ResultExt as _, Snafu};
use tokio::net::TcpStream;
use tracing::warn;
use uuid::Uuid;

use crate::format::{build_graph, feed_lite, format_entry};
use crate::index::IndexError;
use crate::media::mirror_entry;
use crate::server::{blocking, ApiServer};
use crate::{FeedIndex, LOG_TARGET, PUBLIC_FEED_ID};

#[derive(Debug, Snafu)]
pub enum ServiceError {
    /// The front-end renders its 404 page off this marker.
    #[snafu(display("404 profile not found"))]
    ProfileNotFound,
    #[snafu(display("Unauthorized"))]
    Unauthorized,
    #[snafu(display("No more job available"))]
    NoMoreJobs,
    #[snafu(display("Deadline exceeded"))]
    DeadlineExceeded,
    #[snafu(display("Invalid request: {msg}"))]
    InvalidRequest { msg: String },
    #[snafu(display("Unknown command `{name}`"))]
    UnknownCommand { name: String },
    #[snafu(display("Stored job key `{key}` does not decode"))]
    BadJobKey { key: String },
    #[snafu(display("Request does not decode: {source}"))]
    RequestDecoding { source: prost::DecodeError },
    #[snafu(transparent)]
    Repo { source: RepoError },
    #[snafu(transparent)]
    Store { source: StoreError },
    #[snafu(transparent)]
    Index { source: IndexError },
    #[snafu(transparent)]
    Wire { source: WireError },
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> Status {
        match self {
            Self::ProfileNotFound | Self::NoMoreJobs => Status::NotFound,
            Self::Unauthorized => Status::Unauthorized,
            Self::DeadlineExceeded => Status::DeadlineExceeded,
            Self::InvalidRequest { .. }
            | Self::UnknownCommand { .. }
            | Self::RequestDecoding { .. } => Status::InvalidArgument,
            Self::BadJobKey { .. } => Status::Internal,
            Self::Repo { source } => match source {
                RepoError::NotFound | RepoError::NoUserData => Status::NotFound,
                RepoError::AlreadyBound => Status::AlreadyExists,
                RepoError::InvalidUuid { .. }
                | RepoError::InvalidDate { .. }
                | RepoError::UnknownProvider { .. } => Status::InvalidArgument,
                RepoError::Decoding { .. } | RepoError::Store { .. } => Status::Internal,
            },
            Self::Store { .. } | Self::Index { .. } | Self::Wire { .. } => Status::Internal,
        }
    }
}

/// Sentinel a scan callback fails with once its request is cancelled.
#[derive(Debug, Snafu)]
#[snafu(display("Scan cancelled"))]
pub(crate) struct ScanCancelled;

/// Scan failures carrying the cancellation sentinel surface as a
/// retryable deadline, everything else as an internal error.
pub(crate) fn map_scan_err(err: StoreError) -> ServiceError {
    if let StoreError::Logic { source, .. } = &err {
        if source.is::<ScanCancelled>() {
            return ServiceError::DeadlineExceeded;
        }
    }
    ServiceError::Store { source: err }
}

pub(crate) fn decode<M: prost::Message + Default>(body: &[u8]) -> ServiceResult<M> {
    M::decode(body).context(RequestDecodingSnafu)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn parse_uuid(raw: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| ServiceError::InvalidRequest {
        msg: format!("bad uuid `{raw}`: {err}"),
    })
}

/// Resolve the logged-in viewer, treating an unknown id as anonymous.
fn viewer_profile(mdb: &Store, viewer_id: &str) -> ServiceResult<Option<Profile>> {
    if viewer_id.is_empty() {
        return Ok(None);
    }
    match get_profile_by_id(mdb, viewer_id) {
        Ok(profile) => Ok(Some(profile)),
        Err(RepoError::NotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// The viewed feed's adjacency; feeds without a stored feedinfo get an
/// empty graph.
fn owner_graph(rdb: &Store, owner_uuid: &str) -> Graph {
    match get_feedinfo(rdb, owner_uuid) {
        Ok(info) => build_graph(&info),
        Err(_) => Graph::default(),
    }
}

impl ApiServer {
    /// Upsert the profile, then the feedinfo with its entries stripped.
    pub async fn post_feedinfo(&self, mut info: Feedinfo) -> ServiceResult<Profile> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut profile = Profile {
                uuid: info.uuid.clone(),
                id: info.id.clone(),
                name: info.name.clone(),
                kind: info.kind.clone(),
                private: info.private,
                sup_id: info.sup_id.clone(),
                description: info.description.clone(),
                // Only present when the subject crawls its own feed.
                remote_key: info.remote_key.clone(),
                picture: info.picture.clone(),
            };
            feedvault_store::update_profile(&mdb, &mut profile)?;

            info.entries = Vec::new();
            let uuid = profile.uuid.clone();
            save_feedinfo(&rdb, &uuid, &mut info)?;
            Ok(profile)
        })
        .await
    }

    pub async fn fetch_profile(&self, req: ProfileRequest) -> ServiceResult<Profile> {
        let mdb = self.mdb.clone();
        blocking(move || {
            let uuid = parse_uuid(&req.uuid)?;
            match get_profile_by_uuid(&mdb, uuid) {
                Ok(profile) => Ok(profile),
                Err(RepoError::NotFound) => Err(ServiceError::ProfileNotFound),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    pub async fn fetch_feedinfo(&self, req: FeedinfoRequest) -> ServiceResult<Feedinfo> {
        let rdb = self.rdb.clone();
        blocking(move || Ok(get_feedinfo(&rdb, &req.uuid)?)).await
    }

    pub async fn fetch_graph(&self, req: GraphRequest) -> ServiceResult<Graph> {
        let rdb = self.rdb.clone();
        blocking(move || {
            let info = get_feedinfo(&rdb, &req.uuid)?;
            Ok(build_graph(&info))
        })
        .await
    }

    pub async fn fetch_feed(
        &self,
        mut req: FeedRequest,
        cancel: Arc<AtomicBool>,
    ) -> ServiceResult<Feed> {
        if req.page_size <= 0 || req.page_size >= 100 {
            req.page_size = 50;
        }
        if let Some(index) = self.cached.get(&req.id) {
            return self.cached_feed(req, index.clone()).await;
        }
        self.indexed_feed(req, cancel).await
    }

    /// Serve from the in-memory ring: resolve each cached key to its
    /// entry record. Keys whose entry has meanwhile vanished are
    /// skipped.
    async fn cached_feed(&self, req: FeedRequest, index: Arc<FeedIndex>) -> ServiceResult<Feed> {
        let keys = index.snapshot();
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let viewer = viewer_profile(&mdb, &req.viewer)?;
            let graph = Graph::default();

            let mut entries = Vec::new();
            let mut skip = req.start.max(0) as usize;
            for key_hex in keys {
                if key_hex.is_empty() {
                    break;
                }
                if entries.len() >= req.page_size as usize {
                    break;
                }
                if skip > 0 {
                    skip -= 1;
                    continue;
                }
                let Ok(key) = data_encoding::HEXLOWER_PERMISSIVE.decode(key_hex.as_bytes())
                else {
                    warn!(target: LOG_TARGET, key = %key_hex, "Undecodable ring key");
                    continue;
                };
                let Some(raw) = rdb.get(&key)? else {
                    continue;
                };
                let mut entry =
                    Entry::decode(raw.as_slice()).map_err(|source| RepoError::Decoding { source })?;
                format_entry(
                    &mdb,
                    req.max_comments,
                    req.max_likes,
                    viewer.as_ref(),
                    &graph,
                    &mut entry,
                )?;
                entries.push(entry);
            }

            Ok(Feed {
                uuid: PUBLIC_FEED_ID.to_owned(),
                id: PUBLIC_FEED_ID.to_owned(),
                name: "Everyone's feed".to_owned(),
                kind: "group".to_owned(),
                private: false,
                sup_id: "0000-00".to_owned(),
                entries,
                ..Default::default()
            })
        })
        .await
    }

    /// Serve a subject feed from its reverse-time index, newest first.
    async fn indexed_feed(
        &self,
        req: FeedRequest,
        cancel: Arc<AtomicBool>,
    ) -> ServiceResult<Feed> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let profile = match get_profile_by_id(&mdb, &req.id) {
                Ok(profile) => profile,
                Err(RepoError::NotFound) => return Err(ServiceError::ProfileNotFound),
                Err(err) => return Err(err.into()),
            };
            let owner = parse_uuid(&profile.uuid)?;
            let viewer = viewer_profile(&mdb, &req.viewer)?;
            let graph = owner_graph(&rdb, &profile.uuid);

            let prefix =
                UuidFlakeKey::new(PrefixTable::ReverseEntryIndex, owner, FlakeId::ZERO)
                    .scan_prefix();
            let page = req.page_size as usize;
            let mut skip = req.start.max(0) as usize;
            let mut entries = Vec::new();

            rdb.scan_forward(&prefix, |_i, _k, v| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(ScanCancelled.into());
                }
                if skip > 0 {
                    skip -= 1;
                    return Ok(feedvault_store::ScanControl::Continue);
                }
                // The index value points at the primary entry key.
                let Some(raw) = rdb.get(v)? else {
                    return Ok(feedvault_store::ScanControl::Continue);
                };
                let mut entry = Entry::decode(raw.as_slice())?;
                format_entry(
                    &mdb,
                    req.max_comments,
                    req.max_likes,
                    viewer.as_ref(),
                    &graph,
                    &mut entry,
                )?;
                entries.push(entry);
                if entries.len() >= page {
                    Ok(feedvault_store::ScanControl::Stop)
                } else {
                    Ok(feedvault_store::ScanControl::Continue)
                }
            })
            .map_err(map_scan_err)?;

            let mut feed = feed_lite(&profile);
            feed.entries = entries;
            Ok(feed)
        })
        .await
    }

    pub async fn fetch_entry(&self, req: EntryRequest) -> ServiceResult<Feed> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut entry = get_entry(&rdb, &req.uuid)?;

            let author_id = entry
                .from
                .as_ref()
                .map(|from| from.id.clone())
                .unwrap_or_default();
            let profile = match get_profile_by_id(&mdb, &author_id) {
                Ok(profile) => profile,
                Err(RepoError::NotFound) => return Err(ServiceError::ProfileNotFound),
                Err(err) => return Err(err.into()),
            };

            let viewer = viewer_profile(&mdb, &req.viewer)?;
            let graph = owner_graph(&rdb, &entry.profile_uuid);
            format_entry(
                &mdb,
                req.max_comments,
                req.max_likes,
                viewer.as_ref(),
                &graph,
                &mut entry,
            )?;

            let mut feed = feed_lite(&profile);
            feed.entries = vec![entry];
            Ok(feed)
        })
        .await
    }

    /// Drain one archive stream, persisting each entry as it arrives.
    ///
    /// Duplicate entries are counted but skipped; every persisted (or
    /// already-present) key is pushed onto the public ring, and the
    /// media mirror is kicked off per entry without ever blocking the
    /// ingest path.
    pub(crate) async fn archive_stream(
        &self,
        stream: &mut TcpStream,
        force: bool,
    ) -> ServiceResult<FeedSummary> {
        let started = tokio::time::Instant::now();
        let mut entry_count = 0i32;
        let mut date_start = String::new();
        let mut date_end = String::new();

        while let Some(raw) = rpc::read_stream_item(stream).await? {
            let mut entry = Entry::decode(raw.as_slice()).context(RequestDecodingSnafu)?;
            entry_count += 1;
            if date_end.is_empty() {
                date_end = entry.date.clone();
            }
            date_start = entry.date.clone();

            let rdb = self.rdb.clone();
            let result =
                blocking(move || put_entry(&rdb, &mut entry, force).map(|ok| (ok, entry))).await;

            match result {
                Ok(((key, _outcome), entry)) => {
                    if let Some(index) = self.cached.get(PUBLIC_FEED_ID) {
                        index.push(key.to_string());
                    }
                    tokio::spawn(mirror_entry(self.media.clone(), entry));
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err, "Archive write failed");
                }
            }
        }

        Ok(FeedSummary {
            entry_count,
            date_start,
            date_end,
            elapsed_time: started.elapsed().as_secs() as i32,
        })
    }

    /// Originate a new entry from the logged-in user.
    pub async fn post_entry(&self, mut entry: Entry) -> ServiceResult<Entry> {
        if entry.body.is_empty() {
            return Err(ServiceError::InvalidRequest {
                msg: "empty entry body".to_owned(),
            });
        }
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        let (key, entry) = blocking(move || {
            let owner = parse_uuid(&entry.profile_uuid)?;
            let profile = match get_profile_by_uuid(&mdb, owner) {
                Ok(profile) => profile,
                Err(RepoError::NotFound) => return Err(ServiceError::ProfileNotFound),
                Err(err) => return Err(err.into()),
            };

            entry.id = new_record_id();
            entry.date = now_rfc3339();
            entry.from = Some(feed_lite(&profile));
            let (key, _outcome) = put_entry(&rdb, &mut entry, false)?;
            Ok((key, entry))
        })
        .await?;

        if let Some(index) = self.cached.get(PUBLIC_FEED_ID) {
            index.push(key.to_string());
        }
        Ok(entry)
    }

    /// Toggle a like on an entry.
    pub async fn like_entry(&self, req: LikeRequest) -> ServiceResult<Entry> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut entry = get_entry(&rdb, &req.entry)?;
            let user = parse_uuid(&req.user)?;
            let profile = get_profile_by_uuid(&mdb, user)?;

            let already = entry.likes.iter().any(|like| {
                like.from
                    .as_ref()
                    .is_some_and(|from| from.id == profile.id)
            });
            if req.like && !already {
                entry.likes.push(Like {
                    date: now_rfc3339(),
                    from: Some(feed_lite(&profile)),
                    ..Default::default()
                });
            } else if !req.like {
                entry.likes.retain(|like| {
                    like.from
                        .as_ref()
                        .is_none_or(|from| from.id != profile.id)
                });
            }

            update_entry(&rdb, &entry)?;
            Ok(entry)
        })
        .await
    }

    pub async fn comment_entry(&self, req: CommentRequest) -> ServiceResult<Entry> {
        if req.body.is_empty() {
            return Err(ServiceError::InvalidRequest {
                msg: "empty comment body".to_owned(),
            });
        }
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut entry = get_entry(&rdb, &req.entry)?;
            let user = parse_uuid(&req.user)?;
            let profile = get_profile_by_uuid(&mdb, user)?;

            entry.comments.push(Comment {
                id: new_record_id(),
                date: now_rfc3339(),
                body: req.body,
                from: Some(feed_lite(&profile)),
                ..Default::default()
            });

            update_entry(&rdb, &entry)?;
            Ok(entry)
        })
        .await
    }

    /// Remove a comment; only its author may.
    pub async fn delete_comment(&self, req: CommentDeleteRequest) -> ServiceResult<Entry> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut entry = get_entry(&rdb, &req.entry)?;
            let user = parse_uuid(&req.user)?;
            let profile = get_profile_by_uuid(&mdb, user)?;

            let pos = entry
                .comments
                .iter()
                .position(|comment| comment.id == req.comment_id)
                .ok_or(RepoError::NotFound)?;
            let author = entry.comments[pos]
                .from
                .as_ref()
                .map(|from| from.id.clone())
                .unwrap_or_default();
            if author != profile.id {
                return Err(ServiceError::Unauthorized);
            }

            entry.comments.remove(pos);
            update_entry(&rdb, &entry)?;
            Ok(entry)
        })
        .await
    }

    /// Resolve a login credential to its bound profile.
    pub async fn auth(&self, req: OAuthUser) -> ServiceResult<Profile> {
        let mdb = self.mdb.clone();
        blocking(move || {
            let stored = feedvault_store::get_oauth_user(&mdb, &req.provider, &req.user_id)?;
            if stored.uuid.is_empty() {
                return Err(ServiceError::ProfileNotFound);
            }
            let uuid = parse_uuid(&stored.uuid)?;
            Ok(get_profile_by_uuid(&mdb, uuid)?)
        })
        .await
    }

    /// Refresh a credential record; for a bound twitter credential the
    /// profile's feedinfo grows a twitter service entry.
    pub async fn put_oauth(&self, mut user: OAuthUser) -> ServiceResult<Profile> {
        let mdb = self.mdb.clone();
        let rdb = self.rdb.clone();
        blocking(move || {
            update_oauth_user(&mdb, &mut user)?;

            if user.uuid.is_empty() {
                return Ok(Profile::default());
            }

            let uuid = parse_uuid(&user.uuid)?;
            let profile = get_profile_by_uuid(&mdb, uuid)?;

            if user.provider == "twitter" {
                let mut info = get_feedinfo(&rdb, &profile.uuid)?;
                info.services.push(Service {
                    id: "twitter".to_owned(),
                    name: "Twitter".to_owned(),
                    icon: "/static/images/icons/twitter.png".to_owned(),
                    profile: format!("https://twitter.com/{}", user.name),
                    username: user.name.clone(),
                    oauth: Some(user.clone()),
                });
                let uuid = profile.uuid.clone();
                save_feedinfo(&rdb, &uuid, &mut info)?;
            }

            Ok(profile)
        })
        .await
    }

    pub async fn bind_user_feed(&self, req: OAuthUser) -> ServiceResult<OAuthUser> {
        let mdb = self.mdb.clone();
        blocking(move || Ok(feedvault_store::bind_oauth_user(&mdb, &req)?)).await
    }

    /// Remove a service record from the user's feedinfo.
    pub async fn delete_service(&self, req: ServiceDeleteRequest) -> ServiceResult<Feedinfo> {
        let rdb = self.rdb.clone();
        blocking(move || {
            let mut info = get_feedinfo(&rdb, &req.user)?;
            info.services.retain(|service| service.id != req.service);
            let uuid = info.uuid.clone();
            save_feedinfo(&rdb, &uuid, &mut info)?;
            Ok(info)
        })
        .await
    }
}
