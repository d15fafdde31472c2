//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Connecting → TlsHandshake → Unauthenticated →
//!   Authenticated → Draining → Closed)
//! - Generate unique connection IDs for tracing
//! - Count live connections so shutdown can wait for drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Uniqueness is all that matters here, so relaxed ordering suffices.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a client connection, carried through every log line
/// the connection produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{:06}", self.0)
    }
}

/// Per-connection lifecycle state.
///
/// Transitions are monotone: a connection only moves forward through this
/// sequence, except that any state may reset directly to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnState {
    /// Accepted, not yet handshaking.
    Connecting,
    /// TLS handshake in progress.
    TlsHandshake,
    /// Handshake done, no session yet.
    Unauthenticated,
    /// Session established; envelopes dispatch.
    Authenticated,
    /// No new envelopes; in-flight work finishing.
    Draining,
    /// Terminal. Resources released exactly once.
    Closed,
}

impl ConnState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_advance_to(self, next: ConnState) -> bool {
        next == ConnState::Closed || next > self
    }

    /// Advance to `next`, or stay put if the move would go backwards.
    pub fn advance(&mut self, next: ConnState) -> bool {
        if self.can_advance_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnState::Connecting => "connecting",
            ConnState::TlsHandshake => "tls_handshake",
            ConnState::Unauthenticated => "unauthenticated",
            ConnState::Authenticated => "authenticated",
            ConnState::Draining => "draining",
            ConnState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tracks live connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_drain(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}

/// Guard for one connection's lifetime; decrements the live count on drop.
/// Dropping is the single release point for the connection's tracker slot.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
