//! Wire framing for the page window and the host message bus.
//!
//! # Page window
//!
//! ```json
//! {
//!   "source": "WALLET_MSG_REQUEST",
//!   "messageId": "uuid",
//!   "app": "wallet",
//!   "type": "REQUEST_GET_NETWORK",
//!   "payload": { ... }
//! }
//! ```
//!
//! Responses replace `payload` with `result` and `error`, or with a bare
//! legacy field such as `publicAddress`.
//!
//! # Host bus
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`BusRequest`] | relay → background | `{app, type, id, payload?}` |
//! | [`BusResponse`] | background → relay | `{app, type, payload: {id, type, result?, error?}}` |
//! | [`BusEvent`] | background → relay | `{app, type, detail?}` |
//! | [`BusSignal`] | relay → background | `{app, type}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::RequestId;

use super::{
    BroadcastEvent, ErrorPayload, EventKind, Outcome, RequestEnvelope, RequestKind,
    ResponseEnvelope, ResponseKind,
};

// ============================================================================
// Page Window Framing
// ============================================================================

/// Identity tag separating wallet traffic from other page messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSource {
    /// Page → relay.
    #[serde(rename = "WALLET_MSG_REQUEST")]
    Request,
    /// Relay → page, answering a request.
    #[serde(rename = "WALLET_MSG_RESPONSE")]
    Response,
    /// Relay → page, unsolicited broadcast.
    #[serde(rename = "WALLET_MSG_EVENT")]
    Event,
}

/// A message posted into the page window.
///
/// `type` is kept as a raw string: the version adapter decides whether it
/// names a current or a deprecated kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    /// Identity tag.
    pub source: MessageSource,

    /// Page-chosen correlation id. Absent on events.
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<RequestId>,

    /// Application tag.
    pub app: String,

    /// Wire type string.
    #[serde(rename = "type")]
    pub kind: String,

    /// Remaining fields: `payload`, `result`, `error` or a legacy field.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl PageMessage {
    /// Creates a message with an empty body.
    #[must_use]
    pub fn new(
        source: MessageSource,
        message_id: Option<RequestId>,
        app: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source,
            message_id,
            app: app.into(),
            kind: kind.into(),
            body: Map::new(),
        }
    }

    /// Adds a body field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.body.insert(name.into(), value);
        self
    }

    /// Returns a body field, treating JSON `null` as absent.
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name).filter(|value| !value.is_null())
    }

    /// Parses raw window data, returning `None` for anything that is not a
    /// wallet message.
    #[must_use]
    pub fn parse(data: &Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    /// Serialises into raw window data.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Bus Framing
// ============================================================================

/// Any message travelling on the host bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusMessage {
    /// Relay → background request.
    Request(BusRequest),
    /// Background → relay response.
    Response(BusResponse),
    /// Background → relay broadcast.
    Event(BusEvent),
    /// Relay → background attach/detach.
    Signal(BusSignal),
}

/// Relay → background request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRequest {
    /// Application tag.
    pub app: String,
    /// Request type.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Relay-chosen routing id.
    pub id: RequestId,
    /// Optional request payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl From<RequestEnvelope> for BusRequest {
    fn from(envelope: RequestEnvelope) -> Self {
        Self {
            app: envelope.app,
            kind: envelope.kind,
            id: envelope.id,
            payload: envelope.payload,
        }
    }
}

impl From<BusRequest> for RequestEnvelope {
    fn from(request: BusRequest) -> Self {
        Self {
            app: request.app,
            kind: request.kind,
            payload: request.payload,
            id: request.id,
        }
    }
}

/// Whether a bus response carries a result or a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// Result present.
    Response,
    /// Rejected, with or without an error.
    Reject,
}

/// Body of a [`BusResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResponsePayload {
    /// Routing id of the request being answered.
    pub id: RequestId,
    /// Result or rejection.
    #[serde(rename = "type")]
    pub status: ResponseStatus,
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// Background → relay response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResponse {
    /// Application tag.
    pub app: String,
    /// Response type.
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    /// Response body.
    pub payload: BusResponsePayload,
}

impl From<ResponseEnvelope> for BusResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        let (status, result, error) = match envelope.outcome {
            Outcome::Approved(value) => (ResponseStatus::Response, Some(value), None),
            Outcome::Rejected => (ResponseStatus::Reject, None, None),
            Outcome::Failed(err) => (ResponseStatus::Reject, None, Some(err)),
        };
        Self {
            app: envelope.app,
            kind: envelope.kind,
            payload: BusResponsePayload {
                id: envelope.id,
                status,
                result,
                error,
            },
        }
    }
}

impl From<BusResponse> for ResponseEnvelope {
    fn from(response: BusResponse) -> Self {
        let BusResponsePayload {
            id,
            status,
            result,
            error,
        } = response.payload;

        let outcome = match (error, status, result) {
            (Some(err), _, _) => Outcome::Failed(err),
            (None, ResponseStatus::Response, Some(value)) => Outcome::Approved(value),
            (None, ResponseStatus::Response, None) => Outcome::Approved(Value::Null),
            (None, ResponseStatus::Reject, _) => Outcome::Rejected,
        };

        Self {
            app: response.app,
            kind: response.kind,
            outcome,
            id,
        }
    }
}

/// Background → relay broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Application tag.
    pub app: String,
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl BusEvent {
    /// Wraps a broadcast event.
    #[must_use]
    pub fn new(app: impl Into<String>, event: BroadcastEvent) -> Self {
        Self {
            app: app.into(),
            kind: event.kind,
            detail: event.detail,
        }
    }
}

impl From<BusEvent> for BroadcastEvent {
    fn from(event: BusEvent) -> Self {
        Self::new(event.kind, event.detail)
    }
}

/// Relay lifecycle signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// A relay attached to its tab.
    #[serde(rename = "CONTENT_ATTACHED")]
    Attached,
    /// A relay detached from its tab.
    #[serde(rename = "CONTENT_DETACHED")]
    Detached,
}

/// Relay → background attach/detach announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSignal {
    /// Application tag.
    pub app: String,
    /// Signal type.
    #[serde(rename = "type")]
    pub kind: SignalKind,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_page_message_flattened_body() {
        let id = RequestId::generate();
        let message = PageMessage::new(
            MessageSource::Response,
            Some(id),
            "wallet",
            "RESPONSE_GET_NETWORK",
        )
        .with_field("result", json!({"network": "Testnet"}));

        let value = message.to_value();
        assert_eq!(value["source"], "WALLET_MSG_RESPONSE");
        assert_eq!(value["messageId"], id.to_string());
        assert_eq!(value["result"]["network"], "Testnet");

        let parsed = PageMessage::parse(&value).expect("parse");
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_page_message_rejects_foreign_data() {
        assert!(PageMessage::parse(&json!({"hello": "world"})).is_none());
        assert!(PageMessage::parse(&json!("string")).is_none());
        assert!(PageMessage::parse(&json!({"source": "OTHER", "app": "x", "type": "y"})).is_none());
    }

    #[test]
    fn test_bus_request_shape() {
        let request = BusRequest {
            app: "wallet".into(),
            kind: RequestKind::GetNetwork,
            id: RequestId::generate(),
            payload: None,
        };
        let value = serde_json::to_value(BusMessage::Request(request.clone())).expect("serialize");
        assert_eq!(value["type"], "REQUEST_GET_NETWORK");
        assert!(value.get("payload").is_none());

        let parsed: BusMessage = serde_json::from_value(value).expect("parse");
        assert_eq!(parsed, BusMessage::Request(request));
    }

    #[test]
    fn test_bus_response_outcomes() {
        let id = RequestId::generate();
        for outcome in [
            Outcome::Approved(json!({"network": "Testnet"})),
            Outcome::Rejected,
            Outcome::Failed(ErrorPayload::new("SubmitError", "boom")),
        ] {
            let envelope =
                ResponseEnvelope::new("wallet", ResponseKind::GetNetwork, id, outcome.clone());
            let bus = BusResponse::from(envelope.clone());
            let value = serde_json::to_value(BusMessage::Response(bus)).expect("serialize");
            let BusMessage::Response(parsed) = serde_json::from_value(value).expect("parse") else {
                panic!("expected response");
            };
            assert_eq!(ResponseEnvelope::from(parsed), envelope);
        }
    }

    #[test]
    fn test_bus_reject_status_wire() {
        let envelope = ResponseEnvelope::new(
            "wallet",
            ResponseKind::SignTransaction,
            RequestId::generate(),
            Outcome::Rejected,
        );
        let value = serde_json::to_value(BusResponse::from(envelope)).expect("serialize");
        assert_eq!(value["payload"]["type"], "Reject");
        assert!(value["payload"].get("result").is_none());
    }

    #[test]
    fn test_bus_event_and_signal_untagged() {
        let event: BusMessage =
            serde_json::from_value(json!({"app": "wallet", "type": "EVENT_LOGOUT"}))
                .expect("parse");
        assert!(matches!(event, BusMessage::Event(BusEvent { kind: EventKind::Logout, .. })));

        let signal: BusMessage =
            serde_json::from_value(json!({"app": "wallet", "type": "CONTENT_ATTACHED"}))
                .expect("parse");
        assert!(matches!(
            signal,
            BusMessage::Signal(BusSignal {
                kind: SignalKind::Attached,
                ..
            })
        ));
    }
}
