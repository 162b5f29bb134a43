use crate::model::{Entry, ProfileRequest};

use super::*;

#[tokio::test]
async fn request_frame_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let req = ProfileRequest {
        uuid: "c6f8dca854f011ddb489003048343a40".to_owned(),
    };
    write_request(&mut client, RpcIdKnown::FetchProfile, &req)
        .await
        .expect("Write failed");

    let (id, body) = read_request(&mut server).await.expect("Read failed");
    assert_eq!(id.to_known(), Some(RpcIdKnown::FetchProfile));
    let decoded = ProfileRequest::decode(body.as_slice()).expect("Decode failed");
    assert_eq!(decoded, req);
}

#[tokio::test]
async fn empty_request_body_is_valid() {
    let (mut client, mut server) = tokio::io::duplex(64);

    write_request(&mut client, RpcIdKnown::ArchiveFeed, &())
        .await
        .expect("Write failed");

    let (id, body) = read_request(&mut server).await.expect("Read failed");
    assert_eq!(id.to_known(), Some(RpcIdKnown::ArchiveFeed));
    assert!(body.is_empty());
}

#[tokio::test]
async fn stream_items_end_with_the_sentinel() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let entry = Entry {
        id: "2b43a9066074d120ed2e45494eea1797".to_owned(),
        body: "hello".to_owned(),
        ..Default::default()
    };
    write_stream_item(&mut client, &entry)
        .await
        .expect("Write failed");
    write_stream_item(&mut client, &entry)
        .await
        .expect("Write failed");
    write_stream_end(&mut client).await.expect("Write failed");

    let mut received = 0;
    while let Some(raw) = read_stream_item(&mut server).await.expect("Read failed") {
        let decoded = Entry::decode(raw.as_slice()).expect("Decode failed");
        assert_eq!(decoded, entry);
        received += 1;
    }
    assert_eq!(received, 2);
}

#[tokio::test]
async fn error_responses_carry_a_message() {
    let (mut client, mut server) = tokio::io::duplex(256);

    write_response(&mut server, Status::NotFound, b"404 profile not found")
        .await
        .expect("Write failed");

    let (status, payload) = read_response(&mut client).await.expect("Read failed");
    assert_eq!(status, Status::NotFound);
    assert!(!status.is_retryable());
    assert_eq!(payload, b"404 profile not found");
}

#[tokio::test]
async fn oversized_requests_are_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);

    // Hand-craft a frame header announcing more than the limit.
    use tokio::io::AsyncWriteExt as _;
    client
        .write_u16(RpcIdKnown::PostEntry as u16)
        .await
        .expect("Write failed");
    client
        .write_u32(MAX_REQUEST_SIZE + 1)
        .await
        .expect("Write failed");

    let result = read_request(&mut server).await;
    assert!(matches!(result, Err(WireError::MessageTooLarge { .. })));
}

#[test]
fn rpc_ids_round_trip_and_reject_unknown() {
    for id in [
        RpcIdKnown::PostFeedinfo,
        RpcIdKnown::FetchFeed,
        RpcIdKnown::ForceArchiveFeed,
        RpcIdKnown::Command,
    ] {
        assert_eq!(RpcId(id as u16).to_known(), Some(id));
    }
    assert_eq!(RpcId(999).to_known(), None);
}

#[test]
fn unknown_status_bytes_are_rejected() {
    assert_eq!(Status::from_u8(7), Some(Status::Internal));
    assert_eq!(Status::from_u8(42), None);
    assert!(Status::DeadlineExceeded.is_retryable());
}
