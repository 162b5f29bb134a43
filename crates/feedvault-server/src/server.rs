//! Server assembly: the two stores, the public ring, the RPC accept
//! loop and the periodic maintenance tickers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedvault_store::{Store, StoreError};
use feedvault_wire::rpc::{self, RpcIdKnown, Status};
use feedvault_wire::Entry;
use prost::Message as _;
use snafu::Snafu;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::index::IndexError;
use crate::jobs::refetch_user_feed_sync;
use crate::media::{LocalStorage, MediaConfig, MediaStorage, NullStorage};
use crate::service::{decode, ServiceError, ServiceResult};
use crate::{FeedIndex, LOG_TARGET, PUBLIC_FEED_ID};

/// Server-side ceiling per unary request. Front-ends run much tighter
/// caller-side deadlines; this one only reclaims stuck handlers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const REFETCH_TICK: Duration = Duration::from_secs(15 * 60);
const INDEX_DUMP_TICK: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Snafu)]
pub enum ServerError {
    #[snafu(transparent)]
    Store { source: StoreError },
    #[snafu(transparent)]
    Index { source: IndexError },
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;

pub(crate) async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("Blocking task panicked")
}

pub struct ApiServer {
    /// Meta store: profiles, jobs, oauth, the id→uuid map.
    pub(crate) mdb: Arc<Store>,
    /// Records store: feedinfo, entries and their index, ring caches.
    pub(crate) rdb: Arc<Store>,
    /// In-memory feed rings; only "public" today.
    pub(crate) cached: HashMap<String, Arc<FeedIndex>>,
    /// Serializes job claim (scan + delete) across workers.
    pub(crate) job_lock: Arc<Mutex<()>>,
    pub(crate) media: Arc<dyn MediaStorage>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ApiServer {
    /// Open both stores under `db_dir` and load the public ring.
    pub fn open(db_dir: &Path, media: Option<MediaConfig>) -> ServerResult<Arc<Self>> {
        let rdb = Arc::new(Store::open(db_dir)?);
        let mdb = Arc::new(Store::open(db_dir.join("meta"))?);
        Self::assemble(mdb, rdb, media)
    }

    /// Fully in-memory server for tests.
    pub fn open_memory() -> ServerResult<Arc<Self>> {
        let rdb = Arc::new(Store::open_memory()?);
        let mdb = Arc::new(Store::open_memory()?);
        Self::assemble(mdb, rdb, None)
    }

    fn assemble(
        mdb: Arc<Store>,
        rdb: Arc<Store>,
        media: Option<MediaConfig>,
    ) -> ServerResult<Arc<Self>> {
        let public = FeedIndex::new(PUBLIC_FEED_ID, Uuid::nil());
        public.load(&rdb)?;
        let mut cached = HashMap::new();
        cached.insert(PUBLIC_FEED_ID.to_owned(), public);

        let media: Arc<dyn MediaStorage> = match media {
            Some(config) => Arc::new(LocalStorage::new(config)),
            None => Arc::new(NullStorage),
        };

        Ok(Arc::new(Self {
            mdb,
            rdb,
            cached,
            job_lock: Arc::new(Mutex::new(())),
            media,
            background: Mutex::new(Vec::new()),
        }))
    }

    /// Start the ring serve loops and the maintenance tickers.
    pub fn start_background(&self) {
        let mut handles = self.background.lock().expect("Locking failed");
        for index in self.cached.values() {
            handles.push(index.clone().spawn_serve());
        }
        handles.push(self.spawn_refetch_ticker());
        handles.push(self.spawn_index_dump_ticker());
    }

    fn spawn_refetch_ticker(&self) -> JoinHandle<()> {
        let mdb = self.mdb.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(REFETCH_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await; // the immediate first tick
            loop {
                tick.tick().await;
                info!(target: LOG_TARGET, "Refetching user feeds");
                let mdb = mdb.clone();
                if let Err(err) = blocking(move || refetch_user_feed_sync(&mdb)).await {
                    warn!(target: LOG_TARGET, err = %err, "Refetch sweep failed");
                }
            }
        })
    }

    fn spawn_index_dump_ticker(&self) -> JoinHandle<()> {
        let rdb = self.rdb.clone();
        let indexes: Vec<Arc<FeedIndex>> = self.cached.values().cloned().collect();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(INDEX_DUMP_TICK);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await;
            loop {
                tick.tick().await;
                debug!(target: LOG_TARGET, "Dumping feed indexes");
                for index in &indexes {
                    let index = index.clone();
                    let rdb = rdb.clone();
                    if let Err(err) = blocking(move || index.dump(&rdb)).await {
                        warn!(target: LOG_TARGET, err = %err, "Feed index dump failed");
                    }
                }
            }
        })
    }

    async fn dump_indexes(&self) {
        for index in self.cached.values() {
            let index = index.clone();
            let rdb = self.rdb.clone();
            if let Err(err) = blocking(move || index.dump(&rdb)).await {
                warn!(target: LOG_TARGET, err = %err, "Feed index dump failed");
            }
        }
    }

    /// Accept loop; one task per connection.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        info!(
            target: LOG_TARGET,
            addr = ?listener.local_addr().ok(),
            "Serving archival rpc"
        );
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(self.clone().handle_connection(stream, peer));
                }
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err, "Accept failed");
                }
            }
        }
    }

    /// Final index dump, then stop the serve loops and tickers. The
    /// stores close when the server drops.
    pub async fn shutdown(&self) {
        info!(target: LOG_TARGET, "Shutting down");
        self.dump_indexes().await;
        for index in self.cached.values() {
            index.shutdown();
        }
        for handle in self.background.lock().expect("Locking failed").drain(..) {
            handle.abort();
        }
    }

    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream, peer: SocketAddr) {
        debug!(target: LOG_TARGET, %peer, "Connection accepted");
        loop {
            let (id, body) = match rpc::read_request(&mut stream).await {
                Ok(frame) => frame,
                // Peer hangup between requests is the normal end.
                Err(err) => {
                    debug!(target: LOG_TARGET, %peer, err = %err, "Connection closed");
                    return;
                }
            };

            let Some(known) = id.to_known() else {
                let _ = rpc::write_response(
                    &mut stream,
                    Status::InvalidArgument,
                    format!("unknown rpc id {id}").as_bytes(),
                )
                .await;
                return;
            };

            match known {
                RpcIdKnown::ArchiveFeed | RpcIdKnown::ForceArchiveFeed => {
                    let force = known == RpcIdKnown::ForceArchiveFeed;
                    match self.archive_stream(&mut stream, force).await {
                        Ok(summary) => {
                            if rpc::write_response(&mut stream, Status::Ok, &summary.encode_to_vec())
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        // A dead stream cannot carry an error reply.
                        Err(ServiceError::Wire { source }) => {
                            debug!(target: LOG_TARGET, %peer, err = %source, "Archive stream broke");
                            return;
                        }
                        Err(err) => {
                            if write_error(&mut stream, &err).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                _ => {
                    let cancel = Arc::new(AtomicBool::new(false));
                    let result = match tokio::time::timeout(
                        REQUEST_TIMEOUT,
                        self.dispatch_unary(known, &body, cancel.clone()),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_elapsed) => {
                            // In-flight scans poll this flag each step.
                            cancel.store(true, Ordering::Relaxed);
                            Err(ServiceError::DeadlineExceeded)
                        }
                    };

                    let written = match result {
                        Ok(payload) => {
                            rpc::write_response(&mut stream, Status::Ok, &payload).await
                        }
                        Err(err) => {
                            debug!(target: LOG_TARGET, %peer, rpc = ?known, err = %err, "Request failed");
                            write_error(&mut stream, &err).await
                        }
                    };
                    if written.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn dispatch_unary(
        &self,
        known: RpcIdKnown,
        body: &[u8],
        cancel: Arc<AtomicBool>,
    ) -> ServiceResult<Vec<u8>> {
        use RpcIdKnown as K;
        Ok(match known {
            K::PostFeedinfo => self.post_feedinfo(decode(body)?).await?.encode_to_vec(),
            K::FetchProfile => self.fetch_profile(decode(body)?).await?.encode_to_vec(),
            K::FetchFeedinfo => self.fetch_feedinfo(decode(body)?).await?.encode_to_vec(),
            K::FetchGraph => self.fetch_graph(decode(body)?).await?.encode_to_vec(),
            K::FetchFeed => self
                .fetch_feed(decode(body)?, cancel)
                .await?
                .encode_to_vec(),
            K::FetchEntry => self.fetch_entry(decode(body)?).await?.encode_to_vec(),
            K::PostEntry => self
                .post_entry(decode::<Entry>(body)?)
                .await?
                .encode_to_vec(),
            K::LikeEntry => self.like_entry(decode(body)?).await?.encode_to_vec(),
            K::CommentEntry => self.comment_entry(decode(body)?).await?.encode_to_vec(),
            K::DeleteComment => self.delete_comment(decode(body)?).await?.encode_to_vec(),
            K::EnqueJob => self.enque_job(decode(body)?).await?.encode_to_vec(),
            K::GetFeedJob => self.get_feed_job(decode(body)?).await?.encode_to_vec(),
            K::FinishJob => self.finish_job(decode(body)?).await?.encode_to_vec(),
            K::Auth => self.auth(decode(body)?).await?.encode_to_vec(),
            K::PutOauth => self.put_oauth(decode(body)?).await?.encode_to_vec(),
            K::BindUserFeed => self.bind_user_feed(decode(body)?).await?.encode_to_vec(),
            K::DeleteService => self.delete_service(decode(body)?).await?.encode_to_vec(),
            K::Command => self.command(decode(body)?).await?.encode_to_vec(),
            K::ArchiveFeed | K::ForceArchiveFeed => {
                unreachable!("Streaming rpcs are handled on the connection path")
            }
        })
    }
}

async fn write_error(
    stream: &mut TcpStream,
    err: &ServiceError,
) -> feedvault_wire::WireResult<()> {
    rpc::write_response(stream, err.status(), err.to_string().as_bytes()).await
}
