use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a vendor-side workflow definition.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowRef {
    pub id: String,
}

/// Request to the ChatKit API to create a session
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateSessionRequest {
    pub workflow: WorkflowRef,
    pub user: String,
}

/// Raw success payload from the sessions endpoint, before validation.
///
/// `client_secret` is kept as a loose JSON value so a missing, null, or
/// wrongly typed field surfaces as a contract violation instead of a
/// deserialization failure.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionPayload {
    pub(crate) client_secret: Option<Value>,
    pub(crate) expires_after: Option<Value>,
}

/// Credentials returned by a successful session creation.
///
/// `expires_after` is relayed verbatim and serializes as `null` when the
/// vendor omitted it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionCredentials {
    pub client_secret: String,
    pub expires_after: Option<Value>,
}

/// Error envelope returned by the ChatKit API on non-success statuses.
#[derive(Debug, Deserialize)]
pub struct UpstreamErrorBody {
    pub error: Option<UpstreamErrorField>,
}

/// The `error` member of an upstream failure: either a bare string or an
/// object carrying a nested `message`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpstreamErrorField {
    Message(String),
    Nested { message: String },
}

impl UpstreamErrorBody {
    /// The printable message, when the envelope carried one.
    pub fn message(self) -> Option<String> {
        match self.error? {
            UpstreamErrorField::Message(message) => Some(message),
            UpstreamErrorField::Nested { message } => Some(message),
        }
    }
}
