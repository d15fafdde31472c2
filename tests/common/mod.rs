//! Shared helpers for relay integration tests.

// Each integration test binary compiles this module; not every binary uses
// every helper.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::prelude::*;
use bytes::BytesMut;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use proxy_relay::auth::token::sign_token;
use proxy_relay::auth::{Claims, VerificationKey};
use proxy_relay::config::{ProxyConfig, TargetConfig, VerificationKeyConfig};
use proxy_relay::protocol::{Codec, RequestEnvelope, ResponseEnvelope};

pub const TEST_KEY_ID: &str = "test";
pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const MAX_FRAME: usize = 64 * 1024;

/// Relay config pointing at one plaintext target named "match".
pub fn relay_config(backend: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.auth.verification_keys.push(VerificationKeyConfig {
        id: TEST_KEY_ID.into(),
        secret_base64: BASE64_STANDARD.encode(TEST_SECRET),
    });
    // Keep the probe out of short-lived tests.
    config.health.probe_interval_ms = 60_000;
    config.targets.push(TargetConfig {
        name: "match".into(),
        address: backend.to_string(),
        tls: false,
        server_name: None,
    });
    config
}

/// Sign a token for `subject`. Negative `ttl_secs` mints an expired token.
pub fn mint_token(subject: &str, targets: &[&str], ttl_secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    let expires_at = if ttl_secs < 0 {
        now.saturating_sub(ttl_secs.unsigned_abs())
    } else {
        now + ttl_secs as u64
    };
    let claims = Claims {
        subject: subject.into(),
        key_id: Some(TEST_KEY_ID.into()),
        expires_at,
        targets: targets.iter().map(|t| t.to_string()).collect(),
    };
    sign_token(&claims, &VerificationKey::new(TEST_KEY_ID, TEST_SECRET.to_vec()))
}

pub fn request(
    request_id: u64,
    target: &str,
    token: Option<String>,
    kind: Option<&str>,
) -> RequestEnvelope {
    RequestEnvelope {
        request_id,
        target: target.into(),
        token,
        kind: kind.map(Into::into),
        payload: json!({"n": request_id}),
    }
}

/// Framed backend that answers every request through `handler`.
pub async fn start_backend<F>(handler: F) -> SocketAddr
where
    F: Fn(RequestEnvelope) -> ResponseEnvelope + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let codec = Codec::new(MAX_FRAME);
                let mut buf = BytesMut::new();
                loop {
                    match codec.decode_request(&mut buf) {
                        Ok(Some(envelope)) => {
                            let frame = codec.encode_response(&handler(envelope)).unwrap();
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

    addr
}

/// Backend that echoes the request payload back.
pub async fn start_echo_backend() -> SocketAddr {
    start_backend(|envelope| {
        ResponseEnvelope::ok(
            envelope.request_id,
            json!({
                "echo": envelope.payload,
                "had_token": envelope.token.is_some(),
            }),
        )
    })
    .await
}

/// Echo backend that sleeps before answering.
pub async fn start_slow_echo_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let codec = Codec::new(MAX_FRAME);
                let mut buf = BytesMut::new();
                loop {
                    match codec.decode_request(&mut buf) {
                        Ok(Some(envelope)) => {
                            tokio::time::sleep(delay).await;
                            let response =
                                ResponseEnvelope::ok(envelope.request_id, envelope.payload);
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

    addr
}

/// An address nothing listens on (bound then released).
pub async fn dead_backend_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Plaintext framed client for talking to the relay.
pub struct TestClient {
    stream: TcpStream,
    codec: Codec,
    buf: BytesMut,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            codec: Codec::new(MAX_FRAME),
            buf: BytesMut::new(),
        }
    }

    pub async fn send(&mut self, envelope: &RequestEnvelope) {
        let frame = self.codec.encode_request(envelope).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    pub async fn recv(&mut self) -> ResponseEnvelope {
        loop {
            if let Some(response) = self.codec.decode_response(&mut self.buf).unwrap() {
                return response;
            }
            let n = self.stream.read_buf(&mut self.buf).await.unwrap();
            assert!(n > 0, "connection closed before a response arrived");
        }
    }

    /// Wait for the relay to close the connection.
    pub async fn expect_close(&mut self) {
        loop {
            match self.stream.read_buf(&mut self.buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }

    /// Wait for close and assert no complete response frame ever arrived.
    pub async fn expect_close_without_response(&mut self) {
        self.expect_close().await;
        assert!(
            self.codec.decode_response(&mut self.buf).unwrap().is_none(),
            "relay sent a response before closing"
        );
    }
}
