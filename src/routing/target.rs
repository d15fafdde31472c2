//! Backend target abstraction.
//!
//! # Responsibilities
//! - Represent one upstream endpoint
//! - Bound in-flight requests and queue depth (backpressure)
//! - Track health state with hysteresis
//!
//! # Health Transitions
//! ```text
//! Healthy → Degraded: first forwarding failure
//! Degraded → Unreachable: consecutive failures >= unreachable_threshold
//! Degraded/Unreachable → Healthy: consecutive successes >= healthy_threshold
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{RoutingConfig, TargetConfig};
use crate::error::{RoutingError, StartupError};

/// Target health taxonomy. Only `Unreachable` excludes a target from
/// dispatch; `Degraded` keeps serving while failures accumulate.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy = 0,
    Degraded = 1,
    Unreachable = 2,
}

impl From<u8> for HealthState {
    fn from(value: u8) -> Self {
        match value {
            1 => HealthState::Degraded,
            2 => HealthState::Unreachable,
            _ => HealthState::Healthy,
        }
    }
}

/// A named upstream endpoint with its own transport and backpressure bounds.
#[derive(Debug)]
pub struct Target {
    name: String,
    addr: SocketAddr,
    tls: bool,
    server_name: Option<String>,

    state: AtomicU8,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,

    inflight: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    queue_depth: usize,
}

impl Target {
    pub fn from_config(config: &TargetConfig, routing: &RoutingConfig) -> Result<Self, StartupError> {
        let addr = config
            .address
            .parse()
            .map_err(|_| StartupError::TargetAddress {
                name: config.name.clone(),
                address: config.address.clone(),
            })?;
        Ok(Self {
            name: config.name.clone(),
            addr,
            tls: config.tls,
            server_name: config.server_name.clone(),
            state: AtomicU8::new(HealthState::Healthy as u8),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            inflight: Arc::new(Semaphore::new(routing.max_inflight_per_target)),
            queued: Arc::new(AtomicUsize::new(0)),
            queue_depth: routing.queue_depth_per_target,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn health(&self) -> HealthState {
        self.state.load(Ordering::Relaxed).into()
    }

    pub fn is_unreachable(&self) -> bool {
        self.health() == HealthState::Unreachable
    }

    /// Free in-flight capacity right now.
    pub fn available_slots(&self) -> usize {
        self.inflight.available_permits()
    }

    /// Callers currently parked in the bounded queue.
    pub fn queued_count(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Acquire an in-flight slot, queuing up to the configured depth.
    ///
    /// The (max_inflight + queue_depth + 1)-th concurrent caller is rejected
    /// as overloaded rather than queued without bound.
    pub async fn acquire_slot(self: &Arc<Self>) -> Result<DispatchSlot, RoutingError> {
        if let Ok(permit) = self.inflight.clone().try_acquire_owned() {
            return Ok(DispatchSlot { _permit: permit });
        }

        let mut queued = self.queued.load(Ordering::Relaxed);
        loop {
            if queued >= self.queue_depth {
                return Err(RoutingError::Overloaded(self.name.clone()));
            }
            match self.queued.compare_exchange_weak(
                queued,
                queued + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => queued = current,
            }
        }

        // The guard decrements the queue count even if this wait is
        // cancelled by the connection closing.
        let _queue_guard = QueueGuard(Arc::clone(&self.queued));
        let permit = self
            .inflight
            .clone()
            .acquire_owned()
            .await
            .expect("inflight semaphore never closes");
        Ok(DispatchSlot { _permit: permit })
    }

    /// Report a successful forward or probe.
    pub fn mark_success(&self, healthy_threshold: u32) {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Healthy {
            return;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            tracing::info!(target_name = %self.name, "Target restored to healthy");
        }
    }

    /// Report a failed forward or probe.
    pub fn mark_failure(&self, unreachable_threshold: u32) {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Unreachable {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unreachable_threshold {
            self.state
                .store(HealthState::Unreachable as u8, Ordering::Relaxed);
            tracing::warn!(target_name = %self.name, failures, "Target marked unreachable");
        } else if self.health() == HealthState::Healthy {
            self.state
                .store(HealthState::Degraded as u8, Ordering::Relaxed);
            tracing::warn!(target_name = %self.name, failures, "Target degraded");
        }
    }
}

/// A held in-flight slot, released on drop.
#[derive(Debug)]
pub struct DispatchSlot {
    _permit: OwnedSemaphorePermit,
}

struct QueueGuard(Arc<AtomicUsize>);

impl Drop for QueueGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
