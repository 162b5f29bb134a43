use feedvault_store::{archive_history, put_entry, PrefixTable};
use feedvault_wire::rpc::{Connection, RpcIdKnown};
use feedvault_wire::{
    CommandRequest, CommandResponse, CommentDeleteRequest, CommentRequest, Entry, Feed,
    FeedJob, FeedRequest, Feedinfo, FeedinfoRequest, Graph, GraphRequest, LikeRequest, OAuthUser,
    Profile, ProfileRequest, ServiceDeleteRequest, Worker,
};
use tokio::net::TcpListener;

use crate::jobs::list_jobs_sync;
use crate::service::ServiceError;
use crate::{ApiServer, FeedIndex, PUBLIC_FEED_ID};

const OWNER_UUID: &str = "c6f8dca854f011ddb489003048343a40";
const ENTRY_UUID: &str = "2b43a9066074d120ed2e45494eea1797";

fn sample_feedinfo() -> Feedinfo {
    let subscription = Profile {
        uuid: OWNER_UUID.to_owned(),
        id: "yinhm".to_owned(),
        ..Default::default()
    };
    Feedinfo {
        uuid: OWNER_UUID.to_owned(),
        id: "yinhm".to_owned(),
        name: "yinhm".to_owned(),
        kind: "user".to_owned(),
        remote_key: "xxx".to_owned(),
        subscriptions: vec![subscription],
        ..Default::default()
    }
}

fn sample_entry() -> Entry {
    Entry {
        id: format!("e/{ENTRY_UUID}"),
        date: "2012-09-07T07:40:22Z".to_owned(),
        body: "太师父，武当山的生活太寂寞了。".to_owned(),
        from: Some(Feed {
            id: "yinhm".to_owned(),
            name: "yinhm".to_owned(),
            kind: "user".to_owned(),
            ..Default::default()
        }),
        profile_uuid: OWNER_UUID.to_owned(),
        ..Default::default()
    }
}

fn sample_job() -> FeedJob {
    FeedJob {
        id: "foobar".to_owned(),
        remote_key: "pwd".to_owned(),
        page_size: 100,
        ..Default::default()
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn post_and_fetch_profile() {
    let server = ApiServer::open_memory().expect("Open failed");

    let posted = server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");
    assert_eq!(posted.uuid, OWNER_UUID);
    assert_eq!(posted.remote_key, "xxx");

    let profile = server
        .fetch_profile(ProfileRequest {
            uuid: OWNER_UUID.to_owned(),
        })
        .await
        .expect("Fetch failed");
    assert_eq!(profile.uuid, OWNER_UUID);
    assert_eq!(profile.remote_key, "xxx");

    let info = server
        .fetch_feedinfo(FeedinfoRequest {
            uuid: OWNER_UUID.to_owned(),
        })
        .await
        .expect("Fetch failed");
    assert_eq!(info.uuid, OWNER_UUID);
    assert_eq!(info.remote_key, "xxx");
    assert_eq!(info.subscriptions.len(), 1);

    let graph: Graph = server
        .fetch_graph(GraphRequest {
            uuid: OWNER_UUID.to_owned(),
        })
        .await
        .expect("Fetch failed");
    assert!(graph.subscriptions.contains_key("yinhm"));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn fetch_feed_serves_archived_entries_newest_first() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    let mut entry = sample_entry();
    put_entry(&server.rdb, &mut entry, false).expect("Put failed");
    let mut newer = sample_entry();
    newer.id = "f06e0b4a3c1c11e8b4670ed5f89f718b".to_owned();
    newer.date = "2013-01-01T00:00:00Z".to_owned();
    put_entry(&server.rdb, &mut newer, false).expect("Put failed");

    let feed = server
        .fetch_feed(
            FeedRequest {
                id: "yinhm".to_owned(),
                start: 0,
                page_size: 50,
                ..Default::default()
            },
            Default::default(),
        )
        .await
        .expect("Fetch failed");

    assert_eq!(feed.id, "yinhm");
    assert_eq!(feed.entries.len(), 2);
    // Reverse-time index: the 2013 entry first, and no legacy prefix.
    assert_eq!(feed.entries[0].id, "f06e0b4a3c1c11e8b4670ed5f89f718b");
    assert_eq!(feed.entries[1].id, ENTRY_UUID);

    let missing = server
        .fetch_feed(
            FeedRequest {
                id: "nobody".to_owned(),
                ..Default::default()
            },
            Default::default(),
        )
        .await;
    assert!(matches!(missing, Err(ServiceError::ProfileNotFound)));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn fetch_feed_paginates_from_start() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    for i in 0..5 {
        let mut entry = sample_entry();
        entry.id = format!("{i:032x}");
        entry.date = format!("201{i}-01-01T00:00:00Z");
        put_entry(&server.rdb, &mut entry, false).expect("Put failed");
    }

    let feed = server
        .fetch_feed(
            FeedRequest {
                id: "yinhm".to_owned(),
                start: 2,
                page_size: 2,
                ..Default::default()
            },
            Default::default(),
        )
        .await
        .expect("Fetch failed");

    assert_eq!(feed.entries.len(), 2);
    // Newest-first with the two newest skipped.
    assert_eq!(feed.entries[0].date, "2012-01-01T00:00:00Z");
    assert_eq!(feed.entries[1].date, "2011-01-01T00:00:00Z");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn job_queue_round_trip() {
    let server = ApiServer::open_memory().expect("Open failed");

    let queued = server.enque_job(sample_job()).await.expect("Enqueue failed");
    assert_eq!(queued.target_id, "foobar");
    assert!(!queued.key.is_empty());

    let pulled = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(pulled.id, "foobar");
    assert_eq!(pulled.remote_key, "pwd");
    assert_eq!(pulled.worker, "w1");
    assert_ne!(pulled.key, queued.key);

    // Pending is empty now, running holds the job.
    let empty = server
        .get_feed_job(Worker {
            id: "w2".to_owned(),
        })
        .await;
    assert!(matches!(empty, Err(ServiceError::NoMoreJobs)));
    assert_eq!(
        list_jobs_sync(&server.mdb, PrefixTable::JobRunning)
            .expect("List failed")
            .len(),
        1
    );

    let finished = server.finish_job(pulled.clone()).await.expect("Finish failed");
    assert_eq!(finished.status, "done");
    assert_ne!(finished.key, pulled.key);

    assert_eq!(
        list_jobs_sync(&server.mdb, PrefixTable::JobRunning)
            .expect("List failed")
            .len(),
        0
    );
    let history = archive_history(&server.mdb, "foobar").expect("History missing");
    assert_eq!(history.status, "done");
    assert_eq!(history.key, finished.key);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn dequeue_prefers_primary_jobs() {
    let server = ApiServer::open_memory().expect("Open failed");

    let mut derived = sample_job();
    derived.target_id = "friend".to_owned();
    server.enque_job(derived).await.expect("Enqueue failed");

    let mut primary = sample_job();
    primary.id = "selfcrawl".to_owned();
    server.enque_job(primary).await.expect("Enqueue failed");

    let first = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(first.id, "selfcrawl");

    let second = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(second.target_id, "friend");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn admin_commands() {
    let server = ApiServer::open_memory().expect("Open failed");
    server.enque_job(sample_job()).await.expect("Enqueue failed");

    let unknown = server
        .command(CommandRequest {
            command: "DropEverything".to_owned(),
            ..Default::default()
        })
        .await;
    assert!(matches!(
        unknown,
        Err(ServiceError::UnknownCommand { .. })
    ));

    let response: CommandResponse = server
        .command(CommandRequest {
            command: "PurgeJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.ok);
    assert_eq!(
        list_jobs_sync(&server.mdb, PrefixTable::JobFeed)
            .expect("List failed")
            .len(),
        0
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn refetch_user_feed_enqueues_forced_jobs() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    let response = server
        .command(CommandRequest {
            command: "RefetchUserFeed".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.message.contains("1 refetches"));

    let job = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(job.id, "yinhm");
    assert_eq!(job.remote_key, "xxx");
    assert_eq!(job.max_limit, 99);
    assert!(job.force_update);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn redo_failed_jobs_requeues_running() {
    let server = ApiServer::open_memory().expect("Open failed");
    server.enque_job(sample_job()).await.expect("Enqueue failed");
    server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");

    let response = server
        .command(CommandRequest {
            command: "RedoFailedJob".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.message.contains("1 running jobs requeued"));

    assert_eq!(
        list_jobs_sync(&server.mdb, PrefixTable::JobRunning)
            .expect("List failed")
            .len(),
        0
    );
    let again = server
        .get_feed_job(Worker {
            id: "w2".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(again.id, "foobar");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn report_commands_count_both_queues() {
    let server = ApiServer::open_memory().expect("Open failed");
    server.enque_job(sample_job()).await.expect("Enqueue failed");
    let mut second = sample_job();
    second.id = "bazqux".to_owned();
    server.enque_job(second).await.expect("Enqueue failed");

    let response = server
        .command(CommandRequest {
            command: "ReportJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.ok);
    assert_eq!(response.message, "2 pending jobs");

    server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");

    let response = server
        .command(CommandRequest {
            command: "ReportRunningJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert_eq!(response.message, "1 running jobs");

    let response = server
        .command(CommandRequest {
            command: "ReportJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert_eq!(response.message, "1 pending jobs");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn fix_jobs_deletes_credential_less_jobs() {
    let server = ApiServer::open_memory().expect("Open failed");

    let mut keyless = sample_job();
    keyless.id = "keyless".to_owned();
    keyless.remote_key = String::new();
    server.enque_job(keyless).await.expect("Enqueue failed");
    server.enque_job(sample_job()).await.expect("Enqueue failed");

    // Move the credential-less job into the running queue; the fix
    // sweeps both queues.
    let pulled = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(pulled.id, "keyless");

    let response = server
        .command(CommandRequest {
            command: "FixJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.message.contains("1 credential-less jobs deleted"));

    assert_eq!(
        list_jobs_sync(&server.mdb, PrefixTable::JobRunning)
            .expect("List failed")
            .len(),
        0
    );
    let pending = list_jobs_sync(&server.mdb, PrefixTable::JobFeed).expect("List failed");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].remote_key, "pwd");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn fix_too_much_jobs_deletes_the_refetch_flood() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    // One periodic refetch job (stamped with the refetch max-limit)
    // next to an ordinary one.
    server
        .command(CommandRequest {
            command: "RefetchUserFeed".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    server.enque_job(sample_job()).await.expect("Enqueue failed");

    let response = server
        .command(CommandRequest {
            command: "FixTooMuchJobs".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    assert!(response.message.contains("1 refetch jobs deleted"));

    let pending = list_jobs_sync(&server.mdb, PrefixTable::JobFeed).expect("List failed");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].max_limit, 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn refetch_friend_feed_takes_credentials_from_history() {
    let server = ApiServer::open_memory().expect("Open failed");

    // Two credential-less profiles; only one was ever archived.
    let mut archived = sample_feedinfo();
    archived.remote_key = String::new();
    server.post_feedinfo(archived).await.expect("Post failed");

    let mut loner = sample_feedinfo();
    loner.uuid = "11111111222233334444555566667777".to_owned();
    loner.id = "loner".to_owned();
    loner.remote_key = String::new();
    server.post_feedinfo(loner).await.expect("Post failed");

    // A worker once archived yinhm; its credential lives on in the
    // history record.
    server
        .enque_job(FeedJob {
            id: "yinhm".to_owned(),
            remote_key: "pwd".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Enqueue failed");
    let pulled = server
        .get_feed_job(Worker {
            id: "w1".to_owned(),
        })
        .await
        .expect("Pull failed");
    server.finish_job(pulled).await.expect("Finish failed");

    let response = server
        .command(CommandRequest {
            command: "RefetchFriendFeed".to_owned(),
            ..Default::default()
        })
        .await
        .expect("Command failed");
    // The history-less profile is skipped; it does not abort the sweep.
    assert_eq!(
        response.message,
        "2 profiles scanned, 1 refetches enqueued"
    );

    let job = server
        .get_feed_job(Worker {
            id: "w2".to_owned(),
        })
        .await
        .expect("Pull failed");
    assert_eq!(job.id, "yinhm");
    assert_eq!(job.remote_key, "pwd");
    assert_eq!(job.max_limit, 99);
    assert!(job.force_update);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn like_toggles_and_comments_append() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");
    let mut entry = sample_entry();
    put_entry(&server.rdb, &mut entry, false).expect("Put failed");

    let like = LikeRequest {
        entry: ENTRY_UUID.to_owned(),
        user: OWNER_UUID.to_owned(),
        like: true,
    };
    let liked = server.like_entry(like.clone()).await.expect("Like failed");
    assert_eq!(liked.likes.len(), 1);

    // Liking twice keeps a set.
    let liked = server.like_entry(like.clone()).await.expect("Like failed");
    assert_eq!(liked.likes.len(), 1);

    let unliked = server
        .like_entry(LikeRequest {
            like: false,
            ..like
        })
        .await
        .expect("Unlike failed");
    assert_eq!(unliked.likes.len(), 0);

    let commented = server
        .comment_entry(CommentRequest {
            entry: ENTRY_UUID.to_owned(),
            user: OWNER_UUID.to_owned(),
            body: "nice".to_owned(),
        })
        .await
        .expect("Comment failed");
    assert_eq!(commented.comments.len(), 1);
    let comment_id = commented.comments[0].id.clone();

    // Another profile may not delete the comment.
    let other_uuid = "11111111222233334444555566667777";
    let mut other = Profile {
        uuid: other_uuid.to_owned(),
        id: "other".to_owned(),
        ..Default::default()
    };
    feedvault_store::update_profile(&server.mdb, &mut other).expect("Update failed");

    let denied = server
        .delete_comment(CommentDeleteRequest {
            entry: ENTRY_UUID.to_owned(),
            comment_id: comment_id.clone(),
            user: other_uuid.to_owned(),
        })
        .await;
    assert!(matches!(denied, Err(ServiceError::Unauthorized)));

    let cleaned = server
        .delete_comment(CommentDeleteRequest {
            entry: ENTRY_UUID.to_owned(),
            comment_id,
            user: OWNER_UUID.to_owned(),
        })
        .await
        .expect("Delete failed");
    assert_eq!(cleaned.comments.len(), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn post_entry_originates_from_the_logged_in_user() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    let posted = server
        .post_entry(Entry {
            body: "hello archive".to_owned(),
            profile_uuid: OWNER_UUID.to_owned(),
            ..Default::default()
        })
        .await
        .expect("Post failed");
    assert_eq!(posted.id.len(), 32);
    assert!(!posted.date.is_empty());
    assert_eq!(posted.from.as_ref().expect("Author set").id, "yinhm");

    let feed = server
        .fetch_feed(
            FeedRequest {
                id: "yinhm".to_owned(),
                ..Default::default()
            },
            Default::default(),
        )
        .await
        .expect("Fetch failed");
    assert_eq!(feed.entries.len(), 1);

    let empty = server
        .post_entry(Entry {
            profile_uuid: OWNER_UUID.to_owned(),
            ..Default::default()
        })
        .await;
    assert!(matches!(empty, Err(ServiceError::InvalidRequest { .. })));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn oauth_bind_and_auth_flow() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    // Credential seen before any binding: no profile yet.
    let fresh = OAuthUser {
        provider: "google".to_owned(),
        user_id: "g-1".to_owned(),
        ..Default::default()
    };
    let profile = server.put_oauth(fresh.clone()).await.expect("Put failed");
    assert!(profile.uuid.is_empty());

    let unauthed = server.auth(fresh.clone()).await;
    assert!(matches!(unauthed, Err(ServiceError::ProfileNotFound)));

    let bound = server
        .bind_user_feed(OAuthUser {
            uuid: OWNER_UUID.to_owned(),
            ..fresh.clone()
        })
        .await
        .expect("Bind failed");
    assert_eq!(bound.uuid, OWNER_UUID);

    let authed = server.auth(fresh).await.expect("Auth failed");
    assert_eq!(authed.id, "yinhm");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn twitter_credential_attaches_a_service() {
    let server = ApiServer::open_memory().expect("Open failed");
    server
        .post_feedinfo(sample_feedinfo())
        .await
        .expect("Post failed");

    let twitter = OAuthUser {
        provider: "twitter".to_owned(),
        user_id: "t-1".to_owned(),
        name: "yinhm".to_owned(),
        ..Default::default()
    };
    let mut stored = twitter.clone();
    feedvault_store::update_oauth_user(&server.mdb, &mut stored).expect("Update failed");
    server
        .bind_user_feed(OAuthUser {
            uuid: OWNER_UUID.to_owned(),
            ..twitter.clone()
        })
        .await
        .expect("Bind failed");

    let profile = server.put_oauth(twitter).await.expect("Put failed");
    assert_eq!(profile.id, "yinhm");

    let info = server
        .fetch_feedinfo(FeedinfoRequest {
            uuid: OWNER_UUID.to_owned(),
        })
        .await
        .expect("Fetch failed");
    assert_eq!(info.services.len(), 1);
    assert_eq!(info.services[0].id, "twitter");

    let info = server
        .delete_service(ServiceDeleteRequest {
            user: OWNER_UUID.to_owned(),
            service: "twitter".to_owned(),
        })
        .await
        .expect("Delete failed");
    assert_eq!(info.services.len(), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn shutdown_dumps_the_public_ring() {
    let server = ApiServer::open_memory().expect("Open failed");
    let index = server.cached.get(PUBLIC_FEED_ID).expect("Ring exists");
    index.push("00000003aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_owned());
    index.rebuild();
    server.shutdown().await;

    let reloaded = FeedIndex::new(PUBLIC_FEED_ID, uuid::Uuid::nil());
    reloaded.load(&server.rdb).expect("Load failed");
    assert_eq!(
        reloaded.snapshot()[0],
        "00000003aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn end_to_end_over_tcp() {
    let server = ApiServer::open_memory().expect("Open failed");
    server.start_background();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind failed");
    let addr = listener.local_addr().expect("Addr available");
    tokio::spawn(server.clone().serve(listener));

    let mut conn = Connection::connect(&addr.to_string())
        .await
        .expect("Connect failed");

    let profile: Profile = conn
        .call(RpcIdKnown::PostFeedinfo, &sample_feedinfo())
        .await
        .expect("Post failed");
    assert_eq!(profile.uuid, OWNER_UUID);

    // The same entry twice in one stream: counted twice, stored once.
    let entry = sample_entry();
    let summary = conn
        .archive_feed(false, &[entry.clone(), entry])
        .await
        .expect("Archive failed");
    assert_eq!(summary.entry_count, 2);
    assert_eq!(summary.date_start, "2012-09-07T07:40:22Z");
    assert_eq!(summary.date_end, "2012-09-07T07:40:22Z");

    let feed: Feed = conn
        .call(
            RpcIdKnown::FetchFeed,
            &FeedRequest {
                id: "yinhm".to_owned(),
                start: 0,
                page_size: 50,
                ..Default::default()
            },
        )
        .await
        .expect("Fetch failed");
    assert_eq!(feed.id, "yinhm");
    assert_eq!(feed.entries.len(), 1);
    assert_eq!(feed.entries[0].id, ENTRY_UUID);

    // The archive stream fed the public ring.
    server
        .cached
        .get(PUBLIC_FEED_ID)
        .expect("Ring exists")
        .rebuild();
    let public: Feed = conn
        .call(
            RpcIdKnown::FetchFeed,
            &FeedRequest {
                id: PUBLIC_FEED_ID.to_owned(),
                ..Default::default()
            },
        )
        .await
        .expect("Fetch failed");
    assert_eq!(public.name, "Everyone's feed");
    assert_eq!(public.entries.len(), 1);
    assert_eq!(public.entries[0].id, ENTRY_UUID);

    // Unknown profiles carry the 404 marker to the front-end.
    let missing: Result<Profile, _> = conn
        .call(
            RpcIdKnown::FetchProfile,
            &ProfileRequest {
                uuid: "99999999999999999999999999999999".to_owned(),
            },
        )
        .await;
    match missing {
        Err(feedvault_wire::WireError::Remote { status, message }) => {
            assert_eq!(status, feedvault_wire::Status::NotFound);
            assert!(message.contains("404"));
        }
        other => panic!("Expected a remote not-found error, got {other:?}"),
    }

    server.shutdown().await;
}
