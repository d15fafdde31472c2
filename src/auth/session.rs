//! Authenticated session context.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// The authenticated context bound to one connection after token validation.
///
/// The permitted-target set is fixed at authentication time and re-checked on
/// every dispatch; it is never widened while the session lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: Uuid,
    subject: String,
    expires_at: u64,
    permitted_targets: HashSet<String>,
}

impl Session {
    pub fn new(subject: String, expires_at: u64, permitted_targets: HashSet<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            subject,
            expires_at,
            permitted_targets,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether the session may dispatch to `target`.
    pub fn permits(&self, target: &str) -> bool {
        self.permitted_targets.contains(target)
    }

    pub fn expired_at(&self, now_unix: u64) -> bool {
        self.expires_at <= now_unix
    }

    pub fn expired(&self) -> bool {
        self.expired_at(unix_now())
    }
}

/// Current unix time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "player-1".into(),
            1_000,
            ["auth", "match"].into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn permits_only_fixed_targets() {
        let s = session();
        assert!(s.permits("auth"));
        assert!(s.permits("match"));
        assert!(!s.permits("admin"));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let s = session();
        assert!(!s.expired_at(999));
        assert!(s.expired_at(1_000));
        assert!(s.expired_at(1_001));
    }
}
