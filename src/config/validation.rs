//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (unique target names, resolvable addresses)
//! - Validate value ranges (timeouts > 0, limits >= 1)
//!
//! Validation is a pure function and returns all errors, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use base64::prelude::*;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("duplicate target name {0:?}")]
    DuplicateTarget(String),

    #[error("target {name:?} address {address:?} is not a valid socket address")]
    TargetAddress { name: String, address: String },

    #[error("target {0:?} requires tls but no trusted_ca_bundle is configured")]
    MissingCaBundle(String),

    #[error("auth.verification_keys must not be empty")]
    NoVerificationKeys,

    #[error("verification key {0:?} has an invalid base64 secret")]
    BadKeySecret(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for target in &config.targets {
        if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.name.clone()));
        }
        if target.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::TargetAddress {
                name: target.name.clone(),
                address: target.address.clone(),
            });
        }
        let pinned_ca = config
            .tls
            .as_ref()
            .and_then(|t| t.trusted_ca_bundle.as_deref());
        if target.tls && pinned_ca.is_none() {
            errors.push(ValidationError::MissingCaBundle(target.name.clone()));
        }
    }

    if config.auth.verification_keys.is_empty() {
        errors.push(ValidationError::NoVerificationKeys);
    }
    for key in &config.auth.verification_keys {
        if BASE64_STANDARD.decode(&key.secret_base64).is_err() {
            errors.push(ValidationError::BadKeySecret(key.id.clone()));
        }
    }

    for (value, name) in [
        (config.listener.max_connections as u64, "listener.max_connections"),
        (config.limits.max_payload_bytes as u64, "limits.max_payload_bytes"),
        (config.timeouts.handshake_timeout_ms, "timeouts.handshake_timeout_ms"),
        (config.timeouts.idle_timeout_ms, "timeouts.idle_timeout_ms"),
        (config.timeouts.connect_timeout_ms, "timeouts.connect_timeout_ms"),
        (config.timeouts.request_timeout_ms, "timeouts.request_timeout_ms"),
        (config.routing.max_inflight_per_target as u64, "routing.max_inflight_per_target"),
        (config.auth.auth_max_attempts as u64, "auth.auth_max_attempts"),
        (config.health.unreachable_threshold as u64, "health.unreachable_threshold"),
        (config.health.healthy_threshold as u64, "health.healthy_threshold"),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
