//! Session authentication.
//!
//! # Data Flow
//! ```text
//! token string → TokenValidator (signature + expiry against KeySet)
//!              → Session (subject, expiry, fixed permitted-target set)
//! ```
//!
//! Validation is a pure check: its only input besides the token is the
//! current verification-key snapshot. Token issuance and refresh belong to
//! the identity subsystem and never happen here.

pub mod keys;
pub mod session;
pub mod token;

pub use keys::{KeySet, SharedKeySet, VerificationKey};
pub use session::Session;
pub use token::{Claims, TokenValidator};
