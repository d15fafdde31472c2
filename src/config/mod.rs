//! Configuration subsystem.
//!
//! A single immutable [`ProxyConfig`] is loaded at startup and passed
//! explicitly to every component at construction. There is no global mutable
//! configuration state.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, HealthConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    RetryConfig, RoutingConfig, TargetConfig, TimeoutConfig, TlsConfig, VerificationKeyConfig,
};
pub use validation::{validate_config, ValidationError};
