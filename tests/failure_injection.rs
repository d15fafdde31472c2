//! Failure injection tests: backend outages, retries, and health gating.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use proxy_relay::protocol::Status;
use proxy_relay::ProxyServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn unreachable_backend_is_backend_failure() {
    let backend = common::dead_backend_addr().await;
    let handle = ProxyServer::start(common::relay_config(backend))
        .await
        .unwrap();

    let mut client = common::TestClient::connect(handle.local_addr()).await;
    let token = common::mint_token("player-1", &["match"], 60);
    client
        .send(&common::request(1, "match", Some(token), None))
        .await;

    let response = client.recv().await;
    assert_eq!(response.request_id, 1);
    assert_eq!(response.error.as_deref(), Some("backend_failure"));

    handle.stop().await;
}

#[tokio::test]
async fn consecutive_failures_mark_target_unavailable() {
    let backend = common::dead_backend_addr().await;
    let mut config = common::relay_config(backend);
    config.retries.retry_count = 0;
    config.health.unreachable_threshold = 3;
    let handle = ProxyServer::start(config).await.unwrap();

    let mut client = common::TestClient::connect(handle.local_addr()).await;
    let token = common::mint_token("player-1", &["match"], 60);
    client
        .send(&common::request(1, "match", Some(token), None))
        .await;
    assert_eq!(client.recv().await.error.as_deref(), Some("backend_failure"));

    for id in 2..=3u64 {
        client.send(&common::request(id, "match", None, None)).await;
        assert_eq!(client.recv().await.error.as_deref(), Some("backend_failure"));
    }

    // Three consecutive failures trip the hysteresis; dispatch now refuses
    // without touching the backend.
    client.send(&common::request(4, "match", None, None)).await;
    assert_eq!(client.recv().await.error.as_deref(), Some("unavailable"));

    handle.stop().await;
}

#[tokio::test]
async fn idempotent_request_retries_past_dropped_connections() {
    // Backend that slams the door on the first two connections, then echoes.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let drops = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&drops);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                drop(stream);
                continue;
            }
            tokio::spawn(async move {
                let codec = proxy_relay::protocol::Codec::new(common::MAX_FRAME);
                let mut buf = bytes::BytesMut::new();
                loop {
                    match codec.decode_request(&mut buf) {
                        Ok(Some(envelope)) => {
                            let response = proxy_relay::protocol::ResponseEnvelope::ok(
                                envelope.request_id,
                                envelope.payload,
                            );
                            let frame = codec.encode_response(&response).unwrap();
                            if stream.write_all(&frame).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => match stream.read_buf(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        },
                        Err(_) => return,
                    }
                }
            });
        }
    });

    let mut config = common::relay_config(backend);
    config.retries.retry_count = 2;
    config.retries.backoff_ms = 10;
    config.retries.idempotent_kinds = vec!["query".into()];
    config.health.unreachable_threshold = 10;
    let handle = ProxyServer::start(config).await.unwrap();

    let mut client = common::TestClient::connect(handle.local_addr()).await;
    let token = common::mint_token("player-1", &["match"], 60);
    client
        .send(&common::request(1, "match", Some(token), Some("query")))
        .await;

    let response = client.recv().await;
    assert_eq!(response.status, Status::Ok);
    assert_eq!(drops.load(Ordering::SeqCst), 3);

    handle.stop().await;
}

#[tokio::test]
async fn non_idempotent_request_is_not_retried() {
    // Backend that drops every connection; count how often the relay tries.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let mut config = common::relay_config(backend);
    config.retries.retry_count = 2;
    config.retries.backoff_ms = 10;
    config.retries.idempotent_kinds = vec!["query".into()];
    let handle = ProxyServer::start(config).await.unwrap();

    let mut client = common::TestClient::connect(handle.local_addr()).await;
    let token = common::mint_token("player-1", &["match"], 60);
    client
        .send(&common::request(1, "match", Some(token), Some("join"))) // not idempotent
        .await;

    let response = client.recv().await;
    assert_eq!(response.error.as_deref(), Some("backend_failure"));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    handle.stop().await;
}
