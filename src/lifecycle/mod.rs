//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! start: load config → validate → build TLS/auth/router → bind listener
//! stop:  signal received → stop accepting → drain connections →
//!        force-close stragglers on drain timeout → release
//! ```
//!
//! The host owns the relay's lifetime through exactly two entry points,
//! [`crate::server::ProxyServer::start`] and
//! [`crate::server::ProxyHandle::stop`].

pub mod shutdown;

pub use shutdown::Shutdown;
