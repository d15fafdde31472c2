//! Backend forwarding transport.
//!
//! # Responsibilities
//! - Open a (optionally TLS) connection to a backend target
//! - Write one token-stripped request frame, read one response frame
//! - Bound connect and request/response exchange with configured timeouts

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::config::TimeoutConfig;
use crate::error::BackendError;
use crate::protocol::{Codec, RequestEnvelope, ResponseEnvelope};
use crate::routing::target::Target;

/// Polymorphic forwarding seam so the router can be exercised against a mock
/// backend in tests.
pub trait Forward: Send + Sync + 'static {
    fn forward(
        &self,
        target: Arc<Target>,
        request: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseEnvelope, BackendError>> + Send + '_>>;
}

/// Production forwarder: one connection per request exchange.
pub struct Forwarder {
    codec: Codec,
    connector: Option<TlsConnector>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(codec: Codec, connector: Option<TlsConnector>, timeouts: &TimeoutConfig) -> Self {
        Self {
            codec,
            connector,
            connect_timeout: Duration::from_millis(timeouts.connect_timeout_ms),
            request_timeout: Duration::from_millis(timeouts.request_timeout_ms),
        }
    }

    async fn call(
        &self,
        target: Arc<Target>,
        request: RequestEnvelope,
    ) -> Result<ResponseEnvelope, BackendError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(target.addr()))
            .await
            .map_err(|_| BackendError::Timeout(self.connect_timeout))?
            .map_err(|source| BackendError::Connect {
                addr: target.addr().to_string(),
                source,
            })?;

        if target.tls() {
            let connector = self.connector.as_ref().ok_or_else(|| {
                BackendError::Io(std::io::Error::other(
                    "tls target configured without a trusted_ca_bundle",
                ))
            })?;
            let name = server_name(&target)?;
            let stream = connector
                .connect(name, stream)
                .await
                .map_err(BackendError::Io)?;
            self.exchange(stream, &request).await
        } else {
            self.exchange(stream, &request).await
        }
    }

    /// One framed request/response exchange bounded by the request timeout.
    async fn exchange<S>(
        &self,
        mut stream: S,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, BackendError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = self.codec.encode_request(request)?;

        timeout(self.request_timeout, async {
            stream.write_all(&frame).await?;

            let mut buf = BytesMut::with_capacity(4 * 1024);
            loop {
                if let Some(response) = self.codec.decode_response(&mut buf)? {
                    return Ok(response);
                }
                let read = stream.read_buf(&mut buf).await?;
                if read == 0 {
                    return Err(BackendError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "backend closed mid-frame",
                    )));
                }
            }
        })
        .await
        .map_err(|_| BackendError::Timeout(self.request_timeout))?
    }
}

impl Forward for Forwarder {
    fn forward(
        &self,
        target: Arc<Target>,
        request: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseEnvelope, BackendError>> + Send + '_>> {
        Box::pin(self.call(target, request))
    }
}

fn server_name(target: &Target) -> Result<ServerName<'static>, BackendError> {
    match target.server_name() {
        Some(name) => ServerName::try_from(name.to_string()).map_err(|e| {
            BackendError::Io(std::io::Error::other(format!(
                "invalid server_name for target {:?}: {e}",
                target.name()
            )))
        }),
        None => Ok(ServerName::IpAddress(target.addr().ip().into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoutingConfig, TargetConfig};
    use serde_json::json;
    use tokio::net::TcpListener;

    fn target(addr: std::net::SocketAddr) -> Arc<Target> {
        Arc::new(
            Target::from_config(
                &TargetConfig {
                    name: "auth".into(),
                    address: addr.to_string(),
                    tls: false,
                    server_name: None,
                },
                &RoutingConfig::default(),
            )
            .unwrap(),
        )
    }

    fn forwarder() -> Forwarder {
        Forwarder::new(
            Codec::new(64 * 1024),
            None,
            &TimeoutConfig {
                connect_timeout_ms: 1_000,
                request_timeout_ms: 1_000,
                ..TimeoutConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn forwards_request_and_reads_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let codec = Codec::new(64 * 1024);

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let request = loop {
                if let Some(req) = codec.decode_request(&mut buf).unwrap() {
                    break req;
                }
                socket.read_buf(&mut buf).await.unwrap();
            };
            assert!(request.token.is_none(), "token must be stripped");
            let response = ResponseEnvelope::ok(request.request_id, json!({"echo": true}));
            socket
                .write_all(&codec.encode_response(&response).unwrap())
                .await
                .unwrap();
        });

        let request = RequestEnvelope {
            request_id: 42,
            target: "auth".into(),
            token: None,
            kind: None,
            payload: json!({}),
        };
        let response = forwarder().call(target(addr), request).await.unwrap();
        assert_eq!(response.request_id, 42);
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        // Bind then drop to get an address nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = RequestEnvelope {
            request_id: 1,
            target: "auth".into(),
            token: None,
            kind: None,
            payload: json!({}),
        };
        let err = forwarder().call(target(addr), request).await.unwrap_err();
        assert!(matches!(err, BackendError::Connect { .. }));
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and then say nothing.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let fwd = Forwarder::new(
            Codec::new(64 * 1024),
            None,
            &TimeoutConfig {
                connect_timeout_ms: 1_000,
                request_timeout_ms: 100,
                ..TimeoutConfig::default()
            },
        );
        let request = RequestEnvelope {
            request_id: 1,
            target: "auth".into(),
            token: None,
            kind: None,
            payload: json!({}),
        };
        let err = fwd.call(target(addr), request).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));
    }
}
