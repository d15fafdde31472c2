//! Verification-key set with atomic refresh.
//!
//! The identity subsystem publishes HMAC verification keys out of band. The
//! relay holds the current set behind an [`arc_swap::ArcSwap`] so an external
//! refresher can replace it wholesale without pausing validation.

use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AuthConfig;
use crate::error::StartupError;

type HmacSha256 = Hmac<Sha256>;

/// A single named verification key.
#[derive(Clone)]
pub struct VerificationKey {
    id: String,
    secret: Vec<u8>,
}

impl VerificationKey {
    pub fn new(id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Constant-time HMAC-SHA256 verification of `message` against `signature`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(message);
        mac.verify_slice(signature).is_ok()
    }

    /// Sign `message` with this key. Used by tests and operational tooling
    /// to mint fixtures; the relay itself never issues tokens.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secrets stay out of logs.
        f.debug_struct("VerificationKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// An immutable snapshot of verification keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<VerificationKey>,
}

impl KeySet {
    pub fn new(keys: Vec<VerificationKey>) -> Self {
        Self { keys }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, StartupError> {
        let mut keys = Vec::with_capacity(config.verification_keys.len());
        for entry in &config.verification_keys {
            let secret = BASE64_STANDARD.decode(&entry.secret_base64).map_err(|e| {
                StartupError::VerificationKey {
                    id: entry.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            keys.push(VerificationKey::new(entry.id.clone(), secret));
        }
        Ok(Self::new(keys))
    }

    pub fn get(&self, id: &str) -> Option<&VerificationKey> {
        self.keys.iter().find(|k| k.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VerificationKey> {
        self.keys.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Shared handle to the current key set.
#[derive(Debug)]
pub struct SharedKeySet {
    inner: ArcSwap<KeySet>,
}

impl SharedKeySet {
    pub fn new(initial: KeySet) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Replace the key set atomically. Called by the external refresher on
    /// its bounded schedule.
    pub fn install(&self, next: KeySet) {
        tracing::info!(keys = next.keys.len(), "Verification key set replaced");
        self.inner.store(Arc::new(next));
    }

    /// Snapshot the current key set.
    pub fn load(&self) -> Arc<KeySet> {
        self.inner.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_own_signature() {
        let key = VerificationKey::new("k1", b"secret".to_vec());
        let sig = key.sign(b"message");
        assert!(key.verify(b"message", &sig));
        assert!(!key.verify(b"other message", &sig));
    }

    #[test]
    fn install_replaces_snapshot() {
        let shared = SharedKeySet::new(KeySet::new(vec![VerificationKey::new("old", b"a".to_vec())]));
        assert!(shared.load().get("old").is_some());

        shared.install(KeySet::new(vec![VerificationKey::new("new", b"b".to_vec())]));
        let snapshot = shared.load();
        assert!(snapshot.get("old").is_none());
        assert!(snapshot.get("new").is_some());
    }

    #[test]
    fn debug_hides_secret() {
        let key = VerificationKey::new("k1", b"super-secret".to_vec());
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
