//! Canonical request and response envelopes.
//!
//! Core dispatch logic only ever sees these shapes. Framing for the page
//! window and the host bus lives in [`wire`](super::wire).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::{RequestKind, ResponseKind};

// ============================================================================
// ErrorPayload
// ============================================================================

/// Error shape carried across every context boundary.
///
/// # Format
///
/// ```json
/// { "name": "SubmitError", "message": "tx_bad_seq", "stack": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error class name.
    pub name: String,
    /// Human readable message.
    pub message: String,
    /// Optional stack trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    /// Creates a payload without a stack.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }
}

impl From<&Error> for ErrorPayload {
    fn from(err: &Error) -> Self {
        match err {
            Error::Wallet {
                name,
                message,
                stack,
            } => Self {
                name: name.clone(),
                message: message.clone(),
                stack: stack.clone(),
            },
            other => Self::new(other.name(), other.to_string()),
        }
    }
}

impl From<ErrorPayload> for Error {
    fn from(payload: ErrorPayload) -> Self {
        Error::wallet(payload.name, payload.message, payload.stack)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Terminal state of a wallet call.
///
/// Rejection is a decision, not a fault, and is kept apart from failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation produced a result.
    Approved(Value),
    /// The user declined or closed the approval window.
    Rejected,
    /// The operation failed.
    Failed(ErrorPayload),
}

impl Outcome {
    /// Builds a failed outcome from a crate error.
    #[inline]
    #[must_use]
    pub fn failed(err: &Error) -> Self {
        Self::Failed(ErrorPayload::from(err))
    }

    /// Returns the result value, if approved.
    #[inline]
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Approved(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the error payload, if failed.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&ErrorPayload> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` for [`Outcome::Rejected`].
    #[inline]
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Converts into the page-facing result.
    ///
    /// Rejection becomes `Ok(None)`, failure becomes [`Error::Wallet`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if the outcome is a failure.
    pub fn into_result(self) -> Result<Option<Value>> {
        match self {
            Self::Approved(value) => Ok(Some(value)),
            Self::Rejected => Ok(None),
            Self::Failed(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// RequestEnvelope
// ============================================================================

/// A wallet request in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// Identity tag of the wallet application.
    pub app: String,
    /// Request type.
    pub kind: RequestKind,
    /// Optional request payload.
    pub payload: Option<Value>,
    /// Correlation id.
    pub id: RequestId,
}

impl RequestEnvelope {
    /// Creates a request with a fresh correlation id.
    #[must_use]
    pub fn new(app: impl Into<String>, kind: RequestKind, payload: Option<Value>) -> Self {
        Self {
            app: app.into(),
            kind,
            payload,
            id: RequestId::generate(),
        }
    }

    /// Payload, treating JSON `null` as absent.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref().filter(|value| !value.is_null())
    }
}

// ============================================================================
// ResponseEnvelope
// ============================================================================

/// A wallet response in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Identity tag of the wallet application.
    pub app: String,
    /// Response type, paired with the request type.
    pub kind: ResponseKind,
    /// Terminal state.
    pub outcome: Outcome,
    /// Correlation id of the request being answered.
    pub id: RequestId,
}

impl ResponseEnvelope {
    /// Creates a response.
    #[inline]
    #[must_use]
    pub fn new(app: impl Into<String>, kind: ResponseKind, id: RequestId, outcome: Outcome) -> Self {
        Self {
            app: app.into(),
            kind,
            outcome,
            id,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_error_payload_from_error() {
        let payload = ErrorPayload::from(&Error::bad_request("missing payload"));
        assert_eq!(payload.name, "BadRequestError");
        assert_eq!(payload.message, "Bad request: missing payload");
        assert!(payload.stack.is_none());
    }

    #[test]
    fn test_wallet_error_keeps_parts() {
        let err = Error::wallet("SubmitError", "tx_failed", Some("at submit".into()));
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.name, "SubmitError");
        assert_eq!(payload.message, "tx_failed");

        let rebuilt: Error = payload.into();
        assert_eq!(rebuilt.to_string(), "SubmitError: tx_failed");
    }

    #[test]
    fn test_error_payload_stack_optional() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"name":"E","message":"m"}"#).expect("parse");
        assert!(payload.stack.is_none());
        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(!json.contains("stack"));
    }

    #[test]
    fn test_outcome_into_result() {
        let approved = Outcome::Approved(json!({"network": "Testnet"}));
        assert_eq!(
            approved.into_result().expect("approved"),
            Some(json!({"network": "Testnet"}))
        );
        assert_eq!(Outcome::Rejected.into_result().expect("rejected"), None);

        let failed = Outcome::Failed(ErrorPayload::new("SubmitError", "boom"));
        assert!(matches!(failed.into_result(), Err(Error::Wallet { .. })));
    }

    #[test]
    fn test_request_payload_null_is_absent() {
        let request = RequestEnvelope::new("wallet", RequestKind::SignMessage, Some(Value::Null));
        assert!(request.payload().is_none());
    }
}
