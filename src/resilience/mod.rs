//! Retry and backoff policy for backend forwarding.
//!
//! # Design Decisions
//! - Only request kinds declared idempotent are ever retried
//! - Jittered exponential backoff prevents thundering herd
//! - Retry counts are small and bounded; failures surface, never loop

pub mod backoff;
pub mod retry;

pub use backoff::jittered_backoff;
pub use retry::RetryPolicy;
