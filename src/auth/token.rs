//! Token validation.
//!
//! # Responsibilities
//! - Parse the `base64url(claims).base64url(signature)` token format
//! - Verify the HMAC-SHA256 signature against the current key set
//! - Check expiry and materialize a [`Session`] from the claims
//!
//! Rejections are categorized as malformed, signature-invalid, or expired.
//! Subject-unauthorized-for-target is raised at dispatch time, where the
//! request target is known.

use std::sync::Arc;

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auth::keys::SharedKeySet;
use crate::auth::session::{unix_now, Session};
use crate::error::AuthError;

/// Claims carried inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject identity (the player or service the token was issued to).
    pub subject: String,

    /// Verification key the signature was produced with. When absent every
    /// key in the set is tried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// Expiry as unix seconds.
    pub expires_at: u64,

    /// Backend targets the subject may reach. Fixed for the session.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Verifies identity tokens against the published verification contract.
///
/// Validation is pure apart from reading the current key-set snapshot; the
/// external refresher keeps that snapshot current on a bounded schedule.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<SharedKeySet>,
}

impl TokenValidator {
    pub fn new(keys: Arc<SharedKeySet>) -> Self {
        Self { keys }
    }

    /// Validate `token` against the current key set and wall clock.
    pub fn validate(&self, token: &str) -> Result<Session, AuthError> {
        self.validate_at(token, unix_now())
    }

    /// Validation with an explicit clock. Signature is checked before expiry
    /// so an expired-but-forged token still reads as signature-invalid.
    pub fn validate_at(&self, token: &str, now_unix: u64) -> Result<Session, AuthError> {
        let (claims_b64, signature_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let claims_json = BASE64_URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| AuthError::Malformed)?;
        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_json).map_err(|_| AuthError::Malformed)?;

        let keys = self.keys.load();
        let verified = match claims.key_id.as_deref() {
            Some(id) => keys
                .get(id)
                .is_some_and(|key| key.verify(&claims_json, &signature)),
            None => keys.iter().any(|key| key.verify(&claims_json, &signature)),
        };
        if !verified {
            return Err(AuthError::SignatureInvalid);
        }

        if claims.expires_at <= now_unix {
            return Err(AuthError::Expired);
        }

        Ok(Session::new(
            claims.subject,
            claims.expires_at,
            claims.targets.into_iter().collect(),
        ))
    }
}

/// Encode and sign a token for the given claims.
///
/// Fixture/tooling helper; the relay only ever verifies.
pub fn sign_token(claims: &Claims, key: &crate::auth::keys::VerificationKey) -> String {
    let claims_json = serde_json::to_vec(claims).expect("claims serialize to json");
    let signature = key.sign(&claims_json);
    format!(
        "{}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(&claims_json),
        BASE64_URL_SAFE_NO_PAD.encode(signature)
    )
}
