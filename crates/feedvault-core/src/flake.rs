//! K-ordered id generation.
//!
//! A snowflake-style 41 bit timestamp would cap the clock at 2079,
//! which is too tight for the reverse-time ids the store's newest-first
//! indexes are built from. The full 64 bit timestamp layout used here
//! leaves room for a far-future sentinel to subtract from.

use std::sync::Mutex;

use chrono::Utc;
use snafu::Snafu;

use crate::{FlakeId, WorkerId};

/// 2254-06-04T00:00:00Z. Reverse-time ids encode `MAX_TIME_MS - t` so
/// that ascending byte order iterates newest-first.
pub const MAX_TIME_MS: i64 = 8_975_491_200_000;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum IdError {
    #[snafu(display("system clock is moving backwards"))]
    ClockMovingBackwards,
}

pub type TimeSource = Box<dyn Fn() -> i64 + Send + Sync>;

struct GenState {
    /// Millisecond of the most recently issued id, `None` before the
    /// first issue.
    last_ms: Option<i64>,
    seq: u16,
}

/// Issues [`FlakeId`]s that are strictly increasing within one
/// generator instance.
///
/// More than 65 536 ids in one millisecond on a single generator would
/// wrap the sequence; callers are nowhere near that rate and the
/// generator does not defend against it.
pub struct Generator {
    worker: WorkerId,
    time_source: TimeSource,
    state: Mutex<GenState>,
}

impl Generator {
    pub fn new() -> Self {
        Self::with_worker(WorkerId::detect())
    }

    pub fn with_worker(worker: WorkerId) -> Self {
        Self {
            worker,
            time_source: Box::new(|| Utc::now().timestamp_millis()),
            state: Mutex::new(GenState {
                last_ms: None,
                seq: 0,
            }),
        }
    }

    pub fn with_time_source(worker: WorkerId, time_source: TimeSource) -> Self {
        Self {
            worker,
            time_source,
            state: Mutex::new(GenState {
                last_ms: None,
                seq: 0,
            }),
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Issue the next id.
    ///
    /// Within the same millisecond the sequence is incremented; when
    /// time advances it resets to zero. A clock strictly behind the
    /// recorded millisecond refuses to issue.
    pub fn next_id(&self) -> Result<FlakeId, IdError> {
        let now_ms = (self.time_source)();
        let mut state = self.state.lock().expect("Locking failed");

        match state.last_ms {
            Some(last) if now_ms == last => {
                state.seq += 1;
            }
            Some(last) if now_ms < last => {
                return Err(IdError::ClockMovingBackwards);
            }
            _ => {
                state.last_ms = Some(now_ms);
                state.seq = 0;
            }
        }

        Ok(FlakeId::from_parts(now_ms, self.worker, state.seq))
    }

    /// Deterministic id for a supplied timestamp, for historical
    /// ingestion. Does not consult or advance the generator clock.
    pub fn next_id_at(&self, timestamp_ms: i64) -> FlakeId {
        FlakeId::from_parts(timestamp_ms, self.worker, 0)
    }

    /// Id whose byte order is the reverse of `timestamp_ms` order:
    /// newer timestamps yield smaller ids.
    pub fn next_reverse_id_at(&self, timestamp_ms: i64) -> FlakeId {
        self.next_id_at(MAX_TIME_MS - timestamp_ms)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
