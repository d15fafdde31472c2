//! Error taxonomy for the relay.
//!
//! Every failed request envelope either produces an error response envelope
//! (carrying one of the wire codes below) or an explicit connection close.
//! There is no silent failure path.

use std::time::Duration;

use thiserror::Error;

/// I/O-level failures on the client or backend transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("tls handshake failed: {0}")]
    Handshake(String),
}

/// Framing and envelope decode failures.
///
/// `Oversized` is raised before the frame body is buffered, so a hostile
/// length prefix never allocates beyond the configured cap.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame of {len} bytes exceeds the {cap} byte cap")]
    Oversized { len: usize, cap: usize },

    #[error("malformed envelope: {0}")]
    Malformed(String),
}

impl CodecError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            CodecError::Oversized { .. } => "payload_too_large",
            CodecError::Malformed(_) => "malformed_request",
        }
    }
}

/// Token validation rejections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("no token presented before the authentication deadline")]
    TokenMissing,
}

impl AuthError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            AuthError::Expired => "token_expired",
            AuthError::Malformed | AuthError::SignatureInvalid | AuthError::TokenMissing => {
                "token_invalid"
            }
        }
    }
}

/// Dispatch rejections. These always surface to the client as an error
/// response envelope; the connection stays open.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("unknown target {0:?}")]
    TargetUnknown(String),

    #[error("session is not permitted to reach target {0:?}")]
    Unauthorized(String),

    #[error("target {0:?} is unreachable")]
    Unavailable(String),

    #[error("target {0:?} is overloaded")]
    Overloaded(String),
}

impl RoutingError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            RoutingError::TargetUnknown(_) => "target_unknown",
            RoutingError::Unauthorized(_) => "unauthorized",
            RoutingError::Unavailable(_) => "unavailable",
            RoutingError::Overloaded(_) => "overloaded",
        }
    }
}

/// Forwarding failures toward a backend target.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("backend i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend sent an invalid frame: {0}")]
    BadFrame(#[from] CodecError),
}

impl BackendError {
    pub fn wire_code(&self) -> &'static str {
        "backend_failure"
    }
}

/// Fatal-at-startup failures: unreadable configuration, rejected TLS
/// material, or an unbindable listener address.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("tls material rejected: {0}")]
    Tls(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("target {name:?} address {address:?} is not a valid socket address")]
    TargetAddress { name: String, address: String },

    #[error("verification key {id:?} has an unusable secret: {reason}")]
    VerificationKey { id: String, reason: String },
}
