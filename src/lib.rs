//! TLS-terminating relay for framed game traffic.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 PROXY RELAY                   │
//!                       │                                               │
//!   Client (TLS)        │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ───────────────────►│  │   net   │──►│  server  │──►│  routing  │  │
//!   length-prefixed     │  │ listener│   │ handler  │   │  router   │  │
//!   JSON envelopes      │  │  + tls  │   │          │   └─────┬─────┘  │
//!                       │  └─────────┘   └────┬─────┘         │        │
//!                       │                     │               ▼        │
//!                       │               ┌─────▼─────┐   ┌───────────┐  │
//!                       │               │   auth    │   │ forwarder │──┼──► Backend
//!                       │               │  tokens   │   │ (+retry)  │◄─┼─── targets
//!                       │               └───────────┘   └───────────┘  │
//!                       │                                               │
//!                       │  ┌─────────────────────────────────────────┐ │
//!                       │  │          Cross-Cutting Concerns         │ │
//!                       │  │  config · lifecycle · resilience ·      │ │
//!                       │  │  observability · health probing         │ │
//!                       │  └─────────────────────────────────────────┘ │
//!                       └───────────────────────────────────────────────┘
//! ```
//!
//! Clients connect over TLS, authenticate with an HMAC-signed token in their
//! first envelope, and exchange length-prefixed JSON frames. The relay routes
//! each envelope to a named backend target, applying per-target backpressure,
//! health gating, and idempotency-aware retries.

// Core subsystems
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod server;

// Traffic management
pub mod auth;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use server::{ProxyHandle, ProxyServer};
