//! Routing and dispatch.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope + Session
//!     → target lookup (TargetUnknown)
//!     → permitted-target check (Unauthorized)
//!     → health gate (Unavailable)
//!     → in-flight slot / bounded queue (Overloaded)
//!     → forwarder (retries per idempotency policy)
//!     → ResponseEnvelope
//! ```
//!
//! The target table is the only cross-connection shared mutable state; each
//! target's counters are updated with atomics so no lock spans targets.

pub mod forwarder;
pub mod probe;
pub mod router;
pub mod target;

pub use forwarder::{Forward, Forwarder};
pub use probe::HealthProbe;
pub use router::Router;
pub use target::{DispatchSlot, HealthState, Target};
