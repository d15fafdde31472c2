//! Request dispatch.
//!
//! # Responsibilities
//! - Look up the backend target for an envelope
//! - Enforce the session's fixed permitted-target set
//! - Gate on target health and per-target backpressure
//! - Forward with bounded, idempotency-aware retries
//!
//! Every rejection and failure surfaces as an error response envelope with
//! the matching wire code; dispatch never drops a request silently.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::auth::Session;
use crate::config::{HealthConfig, RoutingConfig, TargetConfig};
use crate::error::{BackendError, RoutingError, StartupError};
use crate::observability::metrics;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::resilience::RetryPolicy;
use crate::routing::forwarder::Forward;
use crate::routing::target::Target;

/// Maps decoded envelopes to backend targets and forwards them.
pub struct Router {
    targets: DashMap<String, Arc<Target>>,
    forwarder: Arc<dyn Forward>,
    retry: RetryPolicy,
    health: HealthConfig,
}

impl Router {
    pub fn new(
        target_configs: &[TargetConfig],
        routing: &RoutingConfig,
        retry: RetryPolicy,
        health: HealthConfig,
        forwarder: Arc<dyn Forward>,
    ) -> Result<Self, StartupError> {
        let targets = DashMap::new();
        for config in target_configs {
            let target = Arc::new(Target::from_config(config, routing)?);
            targets.insert(config.name.clone(), target);
        }
        Ok(Self {
            targets,
            forwarder,
            retry,
            health,
        })
    }

    pub fn target(&self, name: &str) -> Option<Arc<Target>> {
        self.targets.get(name).map(|entry| Arc::clone(&entry))
    }

    pub fn targets(&self) -> Vec<Arc<Target>> {
        self.targets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Dispatch one envelope for an authenticated session.
    ///
    /// Always yields a response envelope correlated by `request_id`; routing
    /// rejections and backend failures become error envelopes.
    pub async fn dispatch(&self, envelope: RequestEnvelope, session: &Session) -> ResponseEnvelope {
        let request_id = envelope.request_id;
        let target_name = envelope.target.clone();
        let start = Instant::now();

        let response = match self.try_dispatch(envelope, session).await {
            Ok(response) => response,
            Err(DispatchError::Routing(e)) => {
                tracing::debug!(
                    request_id,
                    target_name = %target_name,
                    error = %e,
                    "Dispatch rejected"
                );
                ResponseEnvelope::error(request_id, e.wire_code())
            }
            Err(DispatchError::Backend(e)) => {
                tracing::warn!(
                    request_id,
                    target_name = %target_name,
                    error = %e,
                    "Forwarding failed"
                );
                ResponseEnvelope::error(request_id, e.wire_code())
            }
        };

        metrics::record_dispatch(&target_name, response.is_ok(), start);
        response
    }

    async fn try_dispatch(
        &self,
        envelope: RequestEnvelope,
        session: &Session,
    ) -> Result<ResponseEnvelope, DispatchError> {
        let target = self
            .target(&envelope.target)
            .ok_or_else(|| RoutingError::TargetUnknown(envelope.target.clone()))?;

        // The permitted set was fixed at authentication time; it is
        // re-checked here and never widened.
        if !session.permits(target.name()) {
            return Err(RoutingError::Unauthorized(envelope.target.clone()).into());
        }

        if target.is_unreachable() {
            return Err(RoutingError::Unavailable(envelope.target.clone()).into());
        }

        let _slot = target.acquire_slot().await?;

        let attempts_allowed = self.retry.attempts_for(envelope.kind.as_deref());
        let outbound = envelope.for_backend();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .forwarder
                .forward(Arc::clone(&target), outbound.clone())
                .await
            {
                Ok(response) => {
                    target.mark_success(self.health.healthy_threshold);
                    return Ok(response);
                }
                Err(error) => {
                    target.mark_failure(self.health.unreachable_threshold);
                    if attempt >= attempts_allowed {
                        return Err(error.into());
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::info!(
                        request_id = outbound.request_id,
                        target_name = %target.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying idempotent request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

enum DispatchError {
    Routing(RoutingError),
    Backend(BackendError),
}

impl From<RoutingError> for DispatchError {
    fn from(e: RoutingError) -> Self {
        DispatchError::Routing(e)
    }
}

impl From<BackendError> for DispatchError {
    fn from(e: BackendError) -> Self {
        DispatchError::Backend(e)
    }
}
