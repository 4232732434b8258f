//! Approval-window side of the handshake.
//!
//! A window opened by the dispatcher reads its navigation parameters, loads
//! the request payload, and answers exactly once.
//!
//! # Example
//!
//! ```ignore
//! let window = ApprovalWindow::open(dispatcher.clone(), &url).await?;
//! match window.kind() {
//!     RequestKind::SignTransaction => {
//!         let signed = sign(window.payload())?;
//!         window.approve(signed).await;
//!     }
//!     _ => window.reject().await,
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Result;
use crate::identifiers::{RequestId, TabId};
use crate::protocol::{ErrorPayload, Outcome, RequestKind};

use super::dispatcher::BackgroundDispatcher;
use super::popup::{ApprovalRoute, RoutePayload};

// ============================================================================
// ApprovalWindow
// ============================================================================

/// An opened approval or probe window.
pub struct ApprovalWindow {
    dispatcher: BackgroundDispatcher,
    route: ApprovalRoute,
    payload: Option<Value>,
    replied: AtomicBool,
}

impl ApprovalWindow {
    /// Parses the window URL and loads the payload.
    ///
    /// A stored payload is consumed here; opening the same URL twice fails
    /// the second time.
    ///
    /// # Errors
    ///
    /// - [`Error::BadRequest`](crate::Error::BadRequest) if the route parameters are invalid
    /// - [`Error::PayloadMissing`](crate::Error::PayloadMissing) if the stored payload was already consumed
    pub async fn open(dispatcher: BackgroundDispatcher, url: &Url) -> Result<Self> {
        let route = ApprovalRoute::from_url(url)?;

        let payload = match &route.payload {
            RoutePayload::None => None,
            RoutePayload::Inline(value) => Some(value.clone()),
            RoutePayload::Stored(key) => Some(dispatcher.payloads().take(key).await?),
        };

        trace!(kind = %route.kind, tab_id = %route.tab_id, "Approval window opened");
        Ok(Self {
            dispatcher,
            route,
            payload,
            replied: AtomicBool::new(false),
        })
    }

    /// Returns the request type.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.route.kind
    }

    /// Returns the tab that asked.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.route.tab_id
    }

    /// Returns the routing id.
    #[inline]
    #[must_use]
    pub fn route_id(&self) -> RequestId {
        self.route.route_id
    }

    /// Returns the request payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns `true` once a reply was sent.
    #[inline]
    #[must_use]
    pub fn has_replied(&self) -> bool {
        self.replied.load(Ordering::SeqCst)
    }

    /// Answers with a result.
    pub async fn approve(&self, result: Value) -> bool {
        self.reply(Outcome::Approved(result)).await
    }

    /// Answers with a user rejection.
    pub async fn reject(&self) -> bool {
        self.reply(Outcome::Rejected).await
    }

    /// Answers with a failure.
    pub async fn fail(&self, error: ErrorPayload) -> bool {
        self.reply(Outcome::Failed(error)).await
    }

    async fn reply(&self, outcome: Outcome) -> bool {
        if self.replied.swap(true, Ordering::SeqCst) {
            debug!(route_id = %self.route.route_id, "Ignoring second reply");
            return false;
        }
        self.dispatcher.respond(self.route.route_id, outcome).await
    }
}

// ============================================================================
// Tests
// ============================================================================
