//! Reject-on-close mapping.
//!
//! When an approval or probe window closes before it answered, the tab that
//! asked still has a call in flight. This maps the pending response kind to
//! the rejection that settles it.
//!
//! Every kind rejects with [`Outcome::Rejected`]. The page shape is chosen
//! later by [`encode_response`](crate::protocol::adapter::encode_response):
//! current kinds render `{result: null}`, legacy kinds a bare null field such
//! as `{publicAddress: null}`.

use crate::identifiers::RequestId;
use crate::protocol::{Outcome, ResponseEnvelope, ResponseKind};

/// Builds the rejection for a window closed without an answer.
#[must_use]
pub fn build_rejection(app: &str, kind: ResponseKind, route_id: RequestId) -> ResponseEnvelope {
    ResponseEnvelope::new(app, kind, route_id, Outcome::Rejected)
}

// ============================================================================
// Tests
// ============================================================================
