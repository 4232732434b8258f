//! Version-aware adapter between page framing and canonical envelopes.
//!
//! Current kinds answer with `{result, error}`. Deprecated kinds answer with
//! a bare field (`{publicAddress: ...}`) and may carry their payload in a
//! bare field too. Everything behind the content relay sees one canonical
//! shape; this module is the only translation point.
//!
//! A `null` or missing result field is read back as a rejection.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::{
    BroadcastEvent, ErrorPayload, EventKind, MessageSource, Outcome, PageMessage,
    RequestEnvelope, RequestKind, ResponseEnvelope, ResponseKind,
};

// ============================================================================
// Constants
// ============================================================================

/// Body field carrying the payload of a current request.
const PAYLOAD_FIELD: &str = "payload";

/// Body field carrying a failure.
const ERROR_FIELD: &str = "error";

/// Body field carrying event data.
const DETAIL_FIELD: &str = "detail";

// ============================================================================
// Requests
// ============================================================================

/// Frames a request for posting into the page window.
#[must_use]
pub fn encode_request(request: &RequestEnvelope) -> PageMessage {
    let message = PageMessage::new(
        MessageSource::Request,
        Some(request.id),
        request.app.clone(),
        request.kind.as_str(),
    );

    match (request.payload(), request.kind.legacy_payload_field()) {
        (Some(payload), Some(field)) => message.with_field(field, payload.clone()),
        (Some(payload), None) => message.with_field(PAYLOAD_FIELD, payload.clone()),
        (None, _) => message,
    }
}

/// Reads a page request into canonical form.
///
/// # Errors
///
/// - [`Error::Protocol`] if the message is not a request or has no id
/// - [`Error::UnknownKind`] if the type is outside the catalogue
pub fn decode_request(message: &PageMessage) -> Result<RequestEnvelope> {
    if message.source != MessageSource::Request {
        return Err(Error::protocol("not a request"));
    }
    let id = message
        .message_id
        .ok_or_else(|| Error::protocol("request without messageId"))?;
    let kind = RequestKind::from_wire(&message.kind)
        .ok_or_else(|| Error::unknown_kind(message.kind.clone()))?;

    let payload = message.field(PAYLOAD_FIELD).or_else(|| {
        kind.legacy_payload_field()
            .and_then(|field| message.field(field))
    });

    Ok(RequestEnvelope {
        app: message.app.clone(),
        kind,
        payload: payload.cloned(),
        id,
    })
}

// ============================================================================
// Responses
// ============================================================================

/// Frames a response in the shape the caller's API version expects.
#[must_use]
pub fn encode_response(response: &ResponseEnvelope) -> PageMessage {
    let field = response.kind.result_field();
    let mut body = Map::new();

    match &response.outcome {
        Outcome::Approved(value) => {
            body.insert(field.to_string(), value.clone());
        }
        Outcome::Rejected => {
            body.insert(field.to_string(), Value::Null);
        }
        Outcome::Failed(err) => {
            body.insert(field.to_string(), Value::Null);
            body.insert(
                ERROR_FIELD.to_string(),
                serde_json::to_value(err).unwrap_or(Value::Null),
            );
        }
    }

    let mut message = PageMessage::new(
        MessageSource::Response,
        Some(response.id),
        response.app.clone(),
        response.kind.as_str(),
    );
    message.body = body;
    message
}

/// Reads a page response back into canonical form.
///
/// # Errors
///
/// - [`Error::Protocol`] if the message is not a response for `expected`
pub fn decode_response(expected: ResponseKind, message: &PageMessage) -> Result<ResponseEnvelope> {
    if message.source != MessageSource::Response {
        return Err(Error::protocol("not a response"));
    }
    if message.kind != expected.as_str() {
        return Err(Error::protocol(format!(
            "expected {expected}, got {}",
            message.kind
        )));
    }
    let id = message
        .message_id
        .ok_or_else(|| Error::protocol("response without messageId"))?;

    let error = message
        .field(ERROR_FIELD)
        .map(|value| serde_json::from_value::<ErrorPayload>(value.clone()))
        .transpose()?;

    let outcome = match (error, message.field(expected.result_field())) {
        (Some(err), _) => Outcome::Failed(err),
        (None, Some(value)) => Outcome::Approved(value.clone()),
        (None, None) => Outcome::Rejected,
    };

    Ok(ResponseEnvelope::new(message.app.clone(), expected, id, outcome))
}

// ============================================================================
// Events
// ============================================================================

/// Frames a broadcast event for the page.
#[must_use]
pub fn encode_event(app: &str, event: &BroadcastEvent) -> PageMessage {
    let message = PageMessage::new(MessageSource::Event, None, app, event.kind.as_str());
    match &event.detail {
        Some(detail) => message.with_field(DETAIL_FIELD, detail.clone()),
        None => message,
    }
}

/// Reads a page event, returning `None` for anything else.
#[must_use]
pub fn decode_event(message: &PageMessage) -> Option<BroadcastEvent> {
    if message.source != MessageSource::Event {
        return None;
    }
    let kind = EventKind::from_wire(&message.kind)?;
    Some(BroadcastEvent::new(kind, message.field(DETAIL_FIELD).cloned()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_current_request_payload_field() {
        let request = RequestEnvelope::new(
            "wallet",
            RequestKind::SignTransaction,
            Some(json!("AAAA")),
        );
        let message = encode_request(&request);
        assert_eq!(message.field("payload"), Some(&json!("AAAA")));

        let decoded = decode_request(&message).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_legacy_request_payload_field() {
        let request = RequestEnvelope::new(
            "wallet",
            RequestKind::LegacySignTransaction,
            Some(json!("AAAA")),
        );
        let message = encode_request(&request);
        assert!(message.field("payload").is_none());
        assert_eq!(message.field("transactionXdr"), Some(&json!("AAAA")));

        let decoded = decode_request(&message).expect("decode");
        assert_eq!(decoded.payload, Some(json!("AAAA")));
    }

    #[test]
    fn test_decode_request_unknown_kind() {
        let message = PageMessage::new(
            MessageSource::Request,
            Some(RequestId::generate()),
            "wallet",
            "REQUEST_EXPORT_SEED",
        );
        assert!(matches!(
            decode_request(&message),
            Err(Error::UnknownKind { .. })
        ));
    }

    #[test]
    fn test_decode_request_without_id() {
        let message = PageMessage::new(MessageSource::Request, None, "wallet", "REQUEST_GET_NETWORK");
        assert!(decode_request(&message).is_err());
    }

    #[test]
    fn test_current_rejection_shape() {
        let response = ResponseEnvelope::new(
            "wallet",
            ResponseKind::GetAddress,
            RequestId::generate(),
            Outcome::Rejected,
        );
        let value = encode_response(&response).to_value();
        assert_eq!(value["result"], Value::Null);
        assert!(value.as_object().expect("object").contains_key("result"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_legacy_rejection_shape() {
        let response = ResponseEnvelope::new(
            "wallet",
            ResponseKind::LegacyPublicAddress,
            RequestId::generate(),
            Outcome::Rejected,
        );
        let value = encode_response(&response).to_value();
        let object = value.as_object().expect("object");
        assert!(object.contains_key("publicAddress"));
        assert_eq!(value["publicAddress"], Value::Null);
        assert!(!object.contains_key("result"));
    }

    #[test]
    fn test_response_decode_matches_encode() {
        let id = RequestId::generate();
        for (kind, outcome) in [
            (ResponseKind::GetNetwork, Outcome::Approved(json!({"network": "Testnet"}))),
            (ResponseKind::LegacyNetwork, Outcome::Approved(json!("TESTNET"))),
            (ResponseKind::SignTransaction, Outcome::Rejected),
            (
                ResponseKind::SubmitTransaction,
                Outcome::Failed(ErrorPayload::new("SubmitError", "tx_failed")),
            ),
        ] {
            let response = ResponseEnvelope::new("wallet", kind, id, outcome);
            let decoded = decode_response(kind, &encode_response(&response)).expect("decode");
            assert_eq!(decoded, response);
        }
    }

    #[test]
    fn test_decode_response_wrong_kind() {
        let response = ResponseEnvelope::new(
            "wallet",
            ResponseKind::GetNetwork,
            RequestId::generate(),
            Outcome::Rejected,
        );
        let message = encode_response(&response);
        assert!(decode_response(ResponseKind::GetAddress, &message).is_err());
    }

    #[test]
    fn test_event_framing() {
        let event = BroadcastEvent::network_changed(json!({"network": "Mainnet"}));
        let message = encode_event("wallet", &event);
        assert!(message.message_id.is_none());
        assert_eq!(decode_event(&message), Some(event));
    }
}
