//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from TOML config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// TLS material for the client-facing listener. When absent the relay
    /// accepts plaintext streams, which is intended for embedding and tests.
    pub tls: Option<TlsConfig>,

    /// Token verification settings.
    pub auth: AuthConfig,

    /// Payload and frame limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-target dispatch limits.
    pub routing: RoutingConfig,

    /// Retry configuration for idempotent forwarding.
    pub retries: RetryConfig,

    /// Target health probing settings.
    pub health: HealthConfig,

    /// Backend target definitions.
    pub targets: Vec<TargetConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7600").
    pub bind_address: String,

    /// Maximum concurrent client connections (accept backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7600".to_string(),
            max_connections: 10_000,
        }
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to the server certificate chain (PEM).
    pub tls_cert_path: String,

    /// Path to the server private key (PEM).
    pub tls_key_path: String,

    /// CA bundle (PEM) pinned for verifying TLS backend targets. Required
    /// when any target sets `tls = true`.
    pub trusted_ca_bundle: Option<String>,
}

/// Token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Verification keys accepted for token signatures.
    pub verification_keys: Vec<VerificationKeyConfig>,

    /// How long an unauthenticated connection may wait before presenting a
    /// valid token.
    pub auth_grace_ms: u64,

    /// Invalid-token attempts tolerated before the connection is closed.
    pub auth_max_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verification_keys: Vec::new(),
            auth_grace_ms: 5_000,
            auth_max_attempts: 3,
        }
    }
}

/// A named token verification key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationKeyConfig {
    /// Key identifier, matched against the token's `key_id` claim.
    pub id: String,

    /// HMAC-SHA256 secret, base64-encoded.
    pub secret_base64: String,
}

/// Payload limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum envelope frame size in bytes. A frame exactly at the cap is
    /// accepted; one byte over is a protocol error.
    pub max_payload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
        }
    }
}

/// Timeout configuration for every blocking operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TLS handshake deadline in milliseconds.
    pub handshake_timeout_ms: u64,

    /// Idle window without traffic before a connection is closed.
    pub idle_timeout_ms: u64,

    /// Backend connection establishment timeout.
    pub connect_timeout_ms: u64,

    /// Total time budget for one backend request/response exchange.
    pub request_timeout_ms: u64,

    /// How long `stop()` waits for draining connections before forcing close.
    pub drain_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            idle_timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            drain_timeout_ms: 10_000,
        }
    }
}

/// Per-target dispatch limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Maximum in-flight requests per backend target.
    pub max_inflight_per_target: usize,

    /// Requests queued per target once the in-flight limit is reached.
    /// The next request past the queue is rejected as overloaded.
    pub queue_depth_per_target: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_inflight_per_target: 64,
            queue_depth_per_target: 128,
        }
    }
}

/// Retry configuration.
///
/// Only request kinds listed in `idempotent_kinds` are ever retried;
/// everything else surfaces the first failure directly.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub retry_count: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub max_backoff_ms: u64,

    /// Request kinds declared idempotent.
    pub idempotent_kinds: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: 2,
            backoff_ms: 100,
            max_backoff_ms: 2_000,
            idempotent_kinds: Vec::new(),
        }
    }
}

/// Target health probing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe interval in milliseconds.
    pub probe_interval_ms: u64,

    /// Consecutive failures before a target is marked unreachable.
    pub unreachable_threshold: u32,

    /// Consecutive successes before a target is restored to healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 10_000,
            unreachable_threshold: 3,
            healthy_threshold: 1,
        }
    }
}

/// Backend target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Unique target identifier, matched against envelope `target` fields.
    pub name: String,

    /// Target address (e.g., "127.0.0.1:7610").
    pub address: String,

    /// Wrap the backend transport in TLS, verified against the pinned
    /// `trusted_ca_bundle`.
    #[serde(default)]
    pub tls: bool,

    /// SNI server name for TLS targets; defaults to the address host.
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
