//! Wire protocol: JSON envelopes behind a 4-byte length prefix.
//!
//! # Data Flow
//! ```text
//! Inbound:  [u32 len][json {request_id, target, token?, kind?, payload}]
//! Outbound: [u32 len][json {request_id, status, payload?, error?}]
//! ```
//!
//! The codec is a pure computation over byte buffers: it never performs I/O
//! and never blocks waiting for more bytes.

pub mod codec;
pub mod envelope;

pub use codec::Codec;
pub use envelope::{RequestEnvelope, ResponseEnvelope, Status};
