//! Client-facing transport: bounded TCP accept, TLS termination, and
//! per-connection lifecycle tracking.

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnState, ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener};
