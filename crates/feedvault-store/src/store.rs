use std::path::PathBuf;
use std::time::Duration;

use feedvault_core::{FlakeId, Generator};
use redb::{Database, ReadableTable as _, TableDefinition};
use snafu::{Location, ResultExt as _, Snafu};
use tracing::{debug, warn};

use crate::LOG_TARGET;

/// The single raw-bytes table every store keeps its partitions in.
/// Partitioning happens in key space (4 byte table prefixes), not in
/// engine tables, so the layout stays portable across KV engines.
const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Snafu)]
pub enum StoreError {
    Io {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    Open {
        source: redb::DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Table {
        source: redb::TableError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(transparent)]
    Storage {
        source: redb::StorageError,
        #[snafu(implicit)]
        location: Location,
    },
    Transaction {
        #[snafu(source(from(redb::TransactionError, Box::new)))]
        source: Box<redb::TransactionError>,
        #[snafu(implicit)]
        location: Location,
    },
    Commit {
        source: redb::CommitError,
        #[snafu(implicit)]
        location: Location,
    },
    /// A scan callback failed with its own error.
    #[snafu(transparent)]
    Logic {
        source: BoxedError,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Scan callback verdict. `Stop` terminates the scan early and is not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// An ordered KV store with prefix-bounded forward scans and a
/// k-ordered id generator.
pub struct Store {
    db: Database,
    generator: Generator,
}

impl Store {
    /// Open (or create) a store under `dir`.
    ///
    /// A failed open is retried once — the engine runs its repair path
    /// on the retry — and a second failure is surfaced so the process
    /// can abort rather than serve from a corrupted store.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context(IoSnafu)?;
        let path = dir.join("store.redb");
        debug!(target: LOG_TARGET, path = %path.display(), "Opening store");

        let db = match Database::create(&path) {
            Ok(db) => db,
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    err = %err,
                    path = %path.display(),
                    "Open failed, retrying once with repair"
                );
                Database::create(&path).context(OpenSnafu)?
            }
        };

        Self::init(db)
    }

    /// In-memory store for tests.
    pub fn open_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .context(OpenSnafu)?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let wtx = db.begin_write().context(TransactionSnafu)?;
        wtx.open_table(TABLE)?;
        wtx.commit().context(CommitSnafu)?;
        Ok(Self {
            db,
            generator: Generator::new(),
        })
    }

    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let rtx = self.db.begin_read().context(TransactionSnafu)?;
        let table = rtx.open_table(TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let wtx = self.db.begin_write().context(TransactionSnafu)?;
        {
            let mut table = wtx.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        wtx.commit().context(CommitSnafu)?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        let wtx = self.db.begin_write().context(TransactionSnafu)?;
        {
            let mut table = wtx.open_table(TABLE)?;
            table.remove(key)?;
        }
        wtx.commit().context(CommitSnafu)?;
        Ok(())
    }

    /// Forward scan over every key starting with `prefix`, in byte
    /// order.
    ///
    /// Prefix validity is re-checked on every step; a plain
    /// `key >= prefix` seek would run off the end of the partition into
    /// the next table. The callback gets `(n, key, value)` and returns
    /// [`ScanControl::Stop`] to end the scan early; returns the number
    /// of callback invocations that continued.
    pub fn scan_forward<F>(&self, prefix: &[u8], mut f: F) -> StoreResult<usize>
    where
        F: FnMut(usize, &[u8], &[u8]) -> std::result::Result<ScanControl, BoxedError>,
    {
        let rtx = self.db.begin_read().context(TransactionSnafu)?;
        let table = rtx.open_table(TABLE)?;

        let mut n = 0;
        for item in table.range::<&[u8]>(prefix..)? {
            let (key, value) = item?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            match f(n, key, value.value())? {
                ScanControl::Continue => n += 1,
                ScanControl::Stop => return Ok(n),
            }
        }
        Ok(n)
    }

    /// Next id from the store's generator. A clock stepping backwards
    /// only delays issuance; it never fails the caller.
    pub fn next_id(&self) -> FlakeId {
        loop {
            match self.generator.next_id() {
                Ok(id) => return id,
                Err(err) => {
                    warn!(target: LOG_TARGET, err = %err, "Id generation delayed");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    /// Deterministic reverse-time id for a historical timestamp.
    pub fn reverse_id_at(&self, timestamp_ms: i64) -> FlakeId {
        self.generator.next_reverse_id_at(timestamp_ms)
    }
}
