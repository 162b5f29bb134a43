//! Time-ordered crawl job queue: pending and running queues under
//! flake keys, terminal history under the target id, and the admin
//! maintenance routines.

use std::str::FromStr;

use chrono::Utc;
use feedvault_store::{
    archive_history, FlakeKey, MetaKey, PrefixTable, RepoError, ScanControl, Store,
};
use feedvault_wire::{CommandRequest, CommandResponse, FeedJob, Profile, Worker};
use prost::Message as _;
use tracing::{debug, info};

use crate::server::{blocking, ApiServer};
use crate::service::{map_scan_err, ServiceError, ServiceResult};
use crate::LOG_TARGET;

/// Pending-queue scans give up looking for a primary job after this
/// many rows so claim latency stays bounded.
const DEQUE_SCAN_BOUND: usize = 1000;

/// Periodic refetches re-crawl a bounded window.
const REFETCH_PAGE_SIZE: i32 = 100;
const REFETCH_MAX_LIMIT: i32 = 99;

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

fn job_key_bytes(job: &FeedJob) -> ServiceResult<Vec<u8>> {
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(job.key.as_bytes())
        .map_err(|_| ServiceError::BadJobKey {
            key: job.key.clone(),
        })
}

/// Append a job to the pending queue under a fresh time-ordered key.
pub(crate) fn enqueue_sync(mdb: &Store, mut job: FeedJob) -> ServiceResult<FeedJob> {
    let key = FlakeKey::new(PrefixTable::JobFeed, mdb.next_id());
    if job.target_id.is_empty() {
        job.target_id = job.id.clone();
    }
    job.key = key.to_string();
    let now = now_unix();
    job.created = now;
    job.updated = now;

    mdb.put(&key.bytes(), &job.encode_to_vec())?;
    debug!(target: LOG_TARGET, key = %job.key, target_id = %job.target_id, "Job enqueued");
    Ok(job)
}

/// Claim the next pending job.
///
/// The scan keeps the first job it sees but prefers the first
/// "primary" job (one crawling the worker's own feed, `id ==
/// target_id`) within the scan bound. The chosen pending record is
/// deleted under the caller-held queue lock, so no two workers claim
/// the same job.
fn deque_sync(mdb: &Store) -> ServiceResult<FeedJob> {
    let mut first: Option<FeedJob> = None;
    let mut primary: Option<FeedJob> = None;

    mdb.scan_forward(&PrefixTable::JobFeed.bytes(), |i, _k, v| {
        let job = FeedJob::decode(v)?;
        if first.is_none() {
            first = Some(job.clone());
        }
        if job.id == job.target_id {
            primary = Some(job);
            return Ok(ScanControl::Stop);
        }
        if i > DEQUE_SCAN_BOUND {
            return Ok(ScanControl::Stop);
        }
        Ok(ScanControl::Continue)
    })
    .map_err(map_scan_err)?;

    let job = primary.or(first).ok_or(ServiceError::NoMoreJobs)?;
    mdb.delete(&job_key_bytes(&job)?)?;
    debug!(target: LOG_TARGET, key = %job.key, "Job dequeued");
    Ok(job)
}

pub(crate) fn list_jobs_sync(mdb: &Store, table: PrefixTable) -> ServiceResult<Vec<FeedJob>> {
    let mut jobs = Vec::new();
    mdb.scan_forward(&table.bytes(), |_i, _k, v| {
        jobs.push(FeedJob::decode(v)?);
        Ok(ScanControl::Continue)
    })
    .map_err(map_scan_err)?;
    Ok(jobs)
}

fn purge_jobs_sync(mdb: &Store) -> ServiceResult<usize> {
    let mut n = 0;
    for table in [PrefixTable::JobFeed, PrefixTable::JobRunning] {
        n += mdb
            .scan_forward(&table.bytes(), |_i, k, _v| {
                mdb.delete(k)?;
                Ok(ScanControl::Continue)
            })
            .map_err(map_scan_err)?;
    }
    Ok(n)
}

/// Delete queued jobs that can never run for lack of a credential.
fn fix_jobs_sync(mdb: &Store) -> ServiceResult<usize> {
    let mut n = 0;
    for table in [PrefixTable::JobFeed, PrefixTable::JobRunning] {
        mdb.scan_forward(&table.bytes(), |_i, k, v| {
            let job = FeedJob::decode(v)?;
            if job.remote_key.is_empty() {
                mdb.delete(k)?;
                n += 1;
            }
            Ok(ScanControl::Continue)
        })
        .map_err(map_scan_err)?;
    }
    Ok(n)
}

/// Delete the periodic-refetch flood (jobs stamped with the refetch
/// max-limit).
fn fix_too_much_jobs_sync(mdb: &Store) -> ServiceResult<usize> {
    let mut n = 0;
    for table in [PrefixTable::JobFeed, PrefixTable::JobRunning] {
        mdb.scan_forward(&table.bytes(), |_i, k, v| {
            let job = FeedJob::decode(v)?;
            if job.max_limit == REFETCH_MAX_LIMIT {
                mdb.delete(k)?;
                n += 1;
            }
            Ok(ScanControl::Continue)
        })
        .map_err(map_scan_err)?;
    }
    Ok(n)
}

/// Requeue every running job into pending; run after worker failures.
fn redo_failed_jobs_sync(mdb: &Store) -> ServiceResult<usize> {
    let mut n = 0;
    mdb.scan_forward(&PrefixTable::JobRunning.bytes(), |_i, k, v| {
        let job = FeedJob::decode(v)?;
        enqueue_sync(mdb, job)?;
        mdb.delete(k)?;
        n += 1;
        Ok(ScanControl::Continue)
    })
    .map_err(map_scan_err)?;
    Ok(n)
}

fn refetch_job(profile: &Profile, remote_key: String) -> FeedJob {
    FeedJob {
        uuid: profile.uuid.clone(),
        id: profile.id.clone(),
        remote_key,
        target_id: profile.id.clone(),
        start: 0,
        page_size: REFETCH_PAGE_SIZE,
        max_limit: REFETCH_MAX_LIMIT,
        force_update: true,
        ..Default::default()
    }
}

/// Enqueue a forced refetch for every profile with a usable
/// credential, i.e. a non-empty `remote_key`.
pub(crate) fn refetch_user_feed_sync(mdb: &Store) -> ServiceResult<(usize, usize)> {
    let mut enqueued = 0;
    let scanned = mdb
        .scan_forward(&PrefixTable::Profile.bytes(), |_i, _k, v| {
            let profile = Profile::decode(v)?;
            if profile.remote_key.is_empty() {
                return Ok(ScanControl::Continue);
            }
            enqueue_sync(mdb, refetch_job(&profile, profile.remote_key.clone()))?;
            enqueued += 1;
            Ok(ScanControl::Continue)
        })
        .map_err(map_scan_err)?;
    info!(
        target: LOG_TARGET,
        scanned, enqueued, "User feed refetch scheduled"
    );
    Ok((scanned, enqueued))
}

/// Enqueue refetches for credential-less profiles whose history still
/// remembers the worker credential that archived them. Profiles with
/// no usable history are skipped.
pub(crate) fn refetch_friend_feed_sync(mdb: &Store) -> ServiceResult<(usize, usize)> {
    let mut enqueued = 0;
    let scanned = mdb
        .scan_forward(&PrefixTable::Profile.bytes(), |_i, _k, v| {
            let profile = Profile::decode(v)?;
            if !profile.remote_key.is_empty() {
                return Ok(ScanControl::Continue);
            }
            let old_job = match archive_history(mdb, &profile.id) {
                Ok(job) => job,
                Err(RepoError::NotFound) => return Ok(ScanControl::Continue),
                Err(err) => return Err(err.into()),
            };
            if old_job.remote_key.is_empty() {
                return Ok(ScanControl::Continue);
            }
            enqueue_sync(mdb, refetch_job(&profile, old_job.remote_key))?;
            enqueued += 1;
            Ok(ScanControl::Continue)
        })
        .map_err(map_scan_err)?;
    info!(
        target: LOG_TARGET,
        scanned, enqueued, "Friend feed refetch scheduled"
    );
    Ok((scanned, enqueued))
}

/// Admin maintenance routines, dispatched from the Command rpc.
/// Unknown tags never reach this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    ReportJobs,
    ReportRunningJobs,
    PurgeJobs,
    FixJobs,
    FixTooMuchJobs,
    RedoFailedJob,
    RefetchUserFeed,
    RefetchFriendFeed,
}

impl FromStr for AdminCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ReportJobs" => Self::ReportJobs,
            "ReportRunningJobs" => Self::ReportRunningJobs,
            "PurgeJobs" => Self::PurgeJobs,
            "FixJobs" => Self::FixJobs,
            "FixTooMuchJobs" => Self::FixTooMuchJobs,
            "RedoFailedJob" => Self::RedoFailedJob,
            "RefetchUserFeed" => Self::RefetchUserFeed,
            "RefetchFriendFeed" => Self::RefetchFriendFeed,
            _ => return Err(()),
        })
    }
}

impl ApiServer {
    pub async fn enque_job(&self, job: FeedJob) -> ServiceResult<FeedJob> {
        let mdb = self.mdb.clone();
        blocking(move || enqueue_sync(&mdb, job)).await
    }

    /// Hand a pending job to a worker: claim it, then persist it in
    /// the running queue under a fresh key.
    pub async fn get_feed_job(&self, worker: Worker) -> ServiceResult<FeedJob> {
        let mdb = self.mdb.clone();
        let lock = self.job_lock.clone();
        blocking(move || {
            let _guard = lock.lock().expect("Locking failed");

            let mut job = deque_sync(&mdb)?;
            let key = FlakeKey::new(PrefixTable::JobRunning, mdb.next_id());
            job.key = key.to_string();
            job.worker = worker.id;
            let now = now_unix();
            job.created = now;
            job.updated = now;

            mdb.put(&key.bytes(), &job.encode_to_vec())?;
            Ok(job)
        })
        .await
    }

    /// Retire a running job into history, keyed by its target so a
    /// re-archive of the same feed overwrites the old terminal record.
    pub async fn finish_job(&self, mut job: FeedJob) -> ServiceResult<FeedJob> {
        let mdb = self.mdb.clone();
        blocking(move || {
            mdb.delete(&job_key_bytes(&job)?)?;

            let key = MetaKey::new(PrefixTable::JobHistory, job.target_id.clone());
            job.key = key.to_string();
            job.status = "done".to_owned();
            job.updated = now_unix();

            mdb.put(&key.bytes(), &job.encode_to_vec())?;
            Ok(job)
        })
        .await
    }

    pub async fn command(&self, req: CommandRequest) -> ServiceResult<CommandResponse> {
        let cmd = AdminCommand::from_str(&req.command).map_err(|()| {
            ServiceError::UnknownCommand {
                name: req.command.clone(),
            }
        })?;
        info!(target: LOG_TARGET, command = ?cmd, "Admin command");

        let mdb = self.mdb.clone();
        blocking(move || {
            let message = match cmd {
                AdminCommand::ReportJobs => {
                    let jobs = list_jobs_sync(&mdb, PrefixTable::JobFeed)?;
                    for job in &jobs {
                        info!(target: LOG_TARGET, key = %job.key, target_id = %job.target_id, "Pending job");
                    }
                    format!("{} pending jobs", jobs.len())
                }
                AdminCommand::ReportRunningJobs => {
                    let jobs = list_jobs_sync(&mdb, PrefixTable::JobRunning)?;
                    for job in &jobs {
                        info!(target: LOG_TARGET, key = %job.key, worker = %job.worker, "Running job");
                    }
                    format!("{} running jobs", jobs.len())
                }
                AdminCommand::PurgeJobs => {
                    format!("{} jobs purged", purge_jobs_sync(&mdb)?)
                }
                AdminCommand::FixJobs => {
                    format!("{} credential-less jobs deleted", fix_jobs_sync(&mdb)?)
                }
                AdminCommand::FixTooMuchJobs => {
                    format!("{} refetch jobs deleted", fix_too_much_jobs_sync(&mdb)?)
                }
                AdminCommand::RedoFailedJob => {
                    format!("{} running jobs requeued", redo_failed_jobs_sync(&mdb)?)
                }
                AdminCommand::RefetchUserFeed => {
                    let (scanned, enqueued) = refetch_user_feed_sync(&mdb)?;
                    format!("{scanned} profiles scanned, {enqueued} refetches enqueued")
                }
                AdminCommand::RefetchFriendFeed => {
                    let (scanned, enqueued) = refetch_friend_feed_sync(&mdb)?;
                    format!("{scanned} profiles scanned, {enqueued} refetches enqueued")
                }
            };
            Ok(CommandResponse { ok: true, message })
        })
        .await
    }
}
