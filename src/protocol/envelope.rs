//! Request and response envelope types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded unit of work from a client.
///
/// Immutable once decoded; consumed by the router. `kind` tags the request
/// type so the retry policy can tell idempotent requests apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Client-assigned correlation id, echoed back in the response.
    pub request_id: u64,

    /// Backend target identifier.
    pub target: String,

    /// Authentication token. Required on the first envelope of an
    /// unauthenticated connection, ignored once a session exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request-type tag used by the idempotency/retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Opaque structured payload, relayed to the backend untouched.
    #[serde(default)]
    pub payload: Value,
}

impl RequestEnvelope {
    /// Copy forwarded to a backend, with the client token stripped.
    pub fn for_backend(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

/// Success/failure taxonomy for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Correlates to a request envelope by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: u64,

    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(request_id: u64, payload: Value) -> Self {
        Self {
            request_id,
            status: Status::Ok,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(request_id: u64, code: impl Into<String>) -> Self {
        Self {
            request_id,
            status: Status::Error,
            payload: None,
            error: Some(code.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
