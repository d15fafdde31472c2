//! Retry policy keyed on declared request idempotency.

use std::collections::HashSet;

use crate::config::RetryConfig;

/// Decides how many forwarding attempts a request envelope gets.
///
/// Requests without a `kind`, or with a kind not declared idempotent, get
/// exactly one attempt: their failures surface directly rather than being
/// silently retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retry_count: u32,
    backoff_ms: u64,
    max_backoff_ms: u64,
    idempotent_kinds: HashSet<String>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            backoff_ms: config.backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            idempotent_kinds: config.idempotent_kinds.iter().cloned().collect(),
        }
    }

    pub fn is_idempotent(&self, kind: Option<&str>) -> bool {
        kind.is_some_and(|k| self.idempotent_kinds.contains(k))
    }

    /// Total attempts allowed for a request of the given kind.
    pub fn attempts_for(&self, kind: Option<&str>) -> u32 {
        if self.is_idempotent(kind) {
            1 + self.retry_count
        } else {
            1
        }
    }

    /// Delay before retry attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        super::jittered_backoff(attempt, self.backoff_ms, self.max_backoff_ms)
    }
}
