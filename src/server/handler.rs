//! Per-connection protocol loop.
//!
//! # Responsibilities
//! - Buffer and decode inbound frames, honoring idle and auth-grace windows
//! - Gate the first envelope(s) through token validation
//! - Dispatch authenticated envelopes sequentially and write responses back
//!
//! One logical worker runs per connection: envelopes are processed in
//! arrival order, so responses return in dispatch order. Closing the
//! connection drops the loop and with it any in-flight dispatch; late
//! backend results are discarded with the dropped future, never delivered.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::auth::{Session, TokenValidator};
use crate::config::AuthConfig;
use crate::error::{AuthError, TransportError};
use crate::net::{ConnState, ConnectionGuard};
use crate::observability::metrics;
use crate::protocol::{Codec, ResponseEnvelope};
use crate::routing::Router;

/// Everything a connection loop needs, built once at startup and shared.
pub struct ConnectionContext {
    pub codec: Codec,
    pub validator: TokenValidator,
    pub router: Arc<Router>,
    pub auth: AuthConfig,
    pub idle_timeout: Duration,
}

/// Drive one established (post-handshake) connection to completion.
pub async fn drive<S>(
    ctx: &ConnectionContext,
    guard: &ConnectionGuard,
    mut stream: S,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = guard.id();
    let mut state = ConnState::Unauthenticated;
    let mut session: Option<Session> = None;
    let mut auth_attempts: u32 = 0;
    let mut buf = BytesMut::with_capacity(4 * 1024);
    let auth_grace = Duration::from_millis(ctx.auth.auth_grace_ms);

    metrics::record_connection_opened();

    let close_reason = loop {
        // Drain buffered frames before touching the socket again.
        let envelope = match ctx.codec.decode_request(&mut buf) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                let deadline = if session.is_none() {
                    auth_grace
                } else {
                    ctx.idle_timeout
                };
                let read = tokio::select! {
                    read = timeout(deadline, stream.read_buf(&mut buf)) => read,
                    _ = shutdown.recv() => {
                        state.advance(ConnState::Draining);
                        break "shutdown";
                    }
                };
                match read {
                    Err(_) if session.is_none() => break "auth_grace_elapsed",
                    Err(_) => break "idle_timeout",
                    Ok(Err(e)) => {
                        let error = TransportError::Io(e);
                        tracing::debug!(connection_id = %id, error = %error, "Read failed");
                        break "io_error";
                    }
                    Ok(Ok(0)) => {
                        state.advance(ConnState::Draining);
                        break "peer_closed";
                    }
                    Ok(Ok(_)) => continue,
                }
            }
            Err(e) => {
                // One error reply for the malformed frame, then close; the
                // stream position is no longer trustworthy.
                tracing::debug!(connection_id = %id, error = %e, "Protocol error");
                send_error(ctx, &mut stream, 0, e.wire_code()).await;
                break "protocol_error";
            }
        };

        if session.is_none() {
            let validated = match envelope.token.as_deref() {
                Some(token) => ctx.validator.validate(token),
                None => Err(AuthError::TokenMissing),
            };
            match validated {
                Ok(established) => {
                    state.advance(ConnState::Authenticated);
                    tracing::info!(
                        connection_id = %id,
                        session_id = %established.session_id(),
                        subject = %established.subject(),
                        "Session established"
                    );
                    session = Some(established);
                }
                Err(e) => {
                    auth_attempts += 1;
                    metrics::record_auth_failure(e.wire_code());
                    tracing::debug!(
                        connection_id = %id,
                        attempt = auth_attempts,
                        error = %e,
                        "Token rejected"
                    );
                    if !send_error(ctx, &mut stream, envelope.request_id, e.wire_code()).await {
                        break "io_error";
                    }
                    if auth_attempts >= ctx.auth.auth_max_attempts {
                        break "auth_attempts_exhausted";
                    }
                    continue;
                }
            }
        }

        let Some(active) = session.as_ref() else {
            break "internal_error";
        };

        // The session's expiry is fixed at validation; a connection outliving
        // its token is closed after one final error reply.
        if active.expired() {
            send_error(ctx, &mut stream, envelope.request_id, "token_expired").await;
            break "session_expired";
        }

        let response = ctx.router.dispatch(envelope, active).await;
        if !write_response(ctx, &mut stream, &response).await {
            break "io_error";
        }
    };

    state.advance(ConnState::Closed);
    metrics::record_connection_closed();
    tracing::debug!(
        connection_id = %id,
        reason = close_reason,
        "Connection closed"
    );
}

/// Write an error envelope; false means the connection is gone.
async fn send_error<S>(
    ctx: &ConnectionContext,
    stream: &mut S,
    request_id: u64,
    code: &str,
) -> bool
where
    S: AsyncWrite + Unpin,
{
    write_response(ctx, stream, &ResponseEnvelope::error(request_id, code)).await
}

async fn write_response<S>(
    ctx: &ConnectionContext,
    stream: &mut S,
    response: &ResponseEnvelope,
) -> bool
where
    S: AsyncWrite + Unpin,
{
    let frame: Bytes = match ctx.codec.encode_response(response) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode response");
            return false;
        }
    };
    match stream.write_all(&frame).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Write failed");
            false
        }
    }
}
