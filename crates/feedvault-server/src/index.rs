//! Bounded deduplicating ring over the most recent entry keys,
//! serving the global "public" feed.
//!
//! Pushes from the ingest path land in an unbounded FIFO and only a
//! non-blocking wake-up crosses to the serving task, so archival
//! streams never feel backpressure from readers. The query surface is
//! `buf`: a fixed-size most-recent-first snapshot rebuilt on demand.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feedvault_store::{PrefixTable, Store, StoreError, UuidKey};
use feedvault_wire::IndexCacheRecord;
use prost::Message as _;
use snafu::{ResultExt as _, Snafu};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::LOG_TARGET;

/// Ring capacity; slots beyond the live tail hold empty strings.
pub const RING_CAPACITY: usize = 500;

/// Reserved id of the everyone's-feed ring created at startup.
pub const PUBLIC_FEED_ID: &str = "public";

#[derive(Debug, Snafu)]
pub enum IndexError {
    #[snafu(transparent)]
    Store { source: StoreError },
    #[snafu(display("Persisted ring does not decode: {source}"))]
    Decoding { source: prost::DecodeError },
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

struct Inner {
    /// Most-recent-first snapshot, the query surface.
    buf: Vec<String>,
    /// Pushes since the last rebuild, oldest first.
    incoming: VecDeque<String>,
    dirty: bool,
}

pub struct FeedIndex {
    pub id: String,
    uuid: Uuid,
    inner: Mutex<Inner>,
    wake_tx: watch::Sender<u64>,
    shutdown_tx: watch::Sender<bool>,
}

impl FeedIndex {
    pub fn new(id: impl Into<String>, uuid: Uuid) -> Arc<Self> {
        let (wake_tx, _) = watch::channel(0);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: id.into(),
            uuid,
            inner: Mutex::new(Inner {
                buf: vec![String::new(); RING_CAPACITY],
                incoming: VecDeque::new(),
                dirty: false,
            }),
            wake_tx,
            shutdown_tx,
        })
    }

    /// Key the ring persists under.
    fn cache_key(&self) -> UuidKey {
        UuidKey::new(PrefixTable::IndexCache, self.uuid)
    }

    /// Queue a key for the next rebuild. Never blocks; the wake-up is
    /// coalesced and the serving loop's timer covers a lost one.
    pub fn push(&self, key: String) {
        {
            let mut inner = self.inner.lock().expect("Locking failed");
            inner.incoming.push_back(key);
            inner.dirty = true;
        }
        self.wake_tx.send_modify(|n| *n += 1);
    }

    /// Rebuild the snapshot: drain `incoming` newest-first eliding
    /// duplicates, then backfill surviving rows of the previous
    /// snapshot until the ring is full.
    pub fn rebuild(&self) {
        let mut inner = self.inner.lock().expect("Locking failed");

        let old = std::mem::replace(&mut inner.buf, vec![String::new(); RING_CAPACITY]);
        let mut incoming = std::mem::take(&mut inner.incoming);
        let mut seen = HashSet::new();
        let mut filled = 0;

        while let Some(item) = incoming.pop_back() {
            if filled == RING_CAPACITY {
                break;
            }
            if seen.insert(item.clone()) {
                inner.buf[filled] = item;
                filled += 1;
            }
        }

        for item in old {
            if filled == RING_CAPACITY {
                break;
            }
            if item.is_empty() {
                break;
            }
            if seen.insert(item.clone()) {
                inner.buf[filled] = item;
                filled += 1;
            }
        }

        inner.dirty = false;
    }

    fn rebuild_if_dirty(&self) {
        let dirty = self.inner.lock().expect("Locking failed").dirty;
        if dirty {
            self.rebuild();
        }
    }

    /// Drop a key from the snapshot (entry deletion). The ring keeps
    /// its size; the freed slot moves to the tail.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().expect("Locking failed");
        if let Some(pos) = inner.buf.iter().position(|item| item == key) {
            inner.buf.remove(pos);
            inner.buf.push(String::new());
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().expect("Locking failed").buf.clone()
    }

    pub fn load(&self, db: &Store) -> IndexResult<()> {
        let Some(raw) = db.get(&self.cache_key().bytes())? else {
            return Ok(());
        };
        let record = IndexCacheRecord::decode(raw.as_slice()).context(DecodingSnafu)?;

        let mut buf = record.keys;
        buf.resize(RING_CAPACITY, String::new());
        self.inner.lock().expect("Locking failed").buf = buf;
        debug!(target: LOG_TARGET, id = %self.id, "Feed index loaded");
        Ok(())
    }

    pub fn dump(&self, db: &Store) -> IndexResult<()> {
        let record = IndexCacheRecord {
            keys: self.snapshot(),
        };
        db.put(&self.cache_key().bytes(), &record.encode_to_vec())?;
        debug!(target: LOG_TARGET, id = %self.id, "Feed index dumped");
        Ok(())
    }

    /// Serving loop: rebuild on a push wake-up or on the 1 second tick,
    /// until shutdown.
    pub fn spawn_serve(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let index = self;
            let mut wake_rx = index.wake_tx.subscribe();
            let mut shutdown_rx = index.shutdown_tx.subscribe();
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    changed = wake_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        index.rebuild_if_dirty();
                    }
                    _ = tick.tick() => {
                        index.rebuild_if_dirty();
                    }
                    _ = shutdown_rx.changed() => {
                        debug!(target: LOG_TARGET, id = %index.id, "Feed index serve loop stopping");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            warn!(target: LOG_TARGET, id = %self.id, "Feed index serve loop already gone");
        }
    }
}
