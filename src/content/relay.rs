//! Content relay between the page window and the background.
//!
//! # Event Loop
//!
//! The relay spawns a tokio task that handles:
//!
//! - Page requests: identity check, version adapter, forward on the bus
//! - Bus responses: correlation by relay id, render in the caller's shape
//! - Bus events: republish into the page
//!
//! Each forwarded request gets a fresh relay id; the page's own `messageId`
//! is restored on the way back. Anything failing the identity check, or of
//! an unknown type, is dropped silently.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::WalletConfig;
use crate::host::{MessageBus, MessageSender};
use crate::identifiers::{RequestId, TabId};
use crate::page::{PageWindow, WindowMessage};
use crate::protocol::adapter::{decode_request, encode_event, encode_response};
use crate::protocol::{
    BroadcastEvent, BusEvent, BusMessage, BusRequest, BusResponse, BusSignal, MessageSource,
    Outcome, PageMessage, RequestKind, ResponseEnvelope, SignalKind,
};

// ============================================================================
// Types
// ============================================================================

/// A forwarded request awaiting its response.
#[derive(Debug, Clone, Copy)]
struct PendingCall {
    /// Correlation id chosen by the page.
    message_id: RequestId,
    /// Request type, fixing the expected response type.
    kind: RequestKind,
}

/// Map of relay ids to forwarded calls.
type CorrelationMap = FxHashMap<RequestId, PendingCall>;

struct RelayInner {
    app: String,
    extension_id: String,
    tab_id: TabId,
    window: Arc<PageWindow>,
    bus: Arc<dyn MessageBus>,
    pending: Mutex<CorrelationMap>,
}

// ============================================================================
// ContentRelay
// ============================================================================

/// Relay attached to one tab.
pub struct ContentRelay {
    inner: Arc<RelayInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ContentRelay {
    /// Attaches to a page and announces the tab to the background.
    ///
    /// `bus_rx` receives the messages the background sends to `tab_id`.
    pub async fn attach(
        config: &WalletConfig,
        tab_id: TabId,
        window: Arc<PageWindow>,
        bus: Arc<dyn MessageBus>,
        bus_rx: mpsc::UnboundedReceiver<BusMessage>,
    ) -> Self {
        let inner = Arc::new(RelayInner {
            app: config.app_tag.clone(),
            extension_id: config.extension_id.clone(),
            tab_id,
            window,
            bus,
            pending: Mutex::new(CorrelationMap::default()),
        });

        // Listen before marking so no request posted after the marker is missed.
        let page_rx = inner.window.subscribe();
        inner.window.set_marker(true);
        inner.signal(SignalKind::Attached).await;

        let task = tokio::spawn(Self::run_event_loop(Arc::clone(&inner), page_rx, bus_rx));
        debug!(%tab_id, "Content relay attached");

        Self {
            inner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Detaches from the page.
    ///
    /// Clears the marker, drops every scoped listener and announces the
    /// detach. Calls still in flight never resolve.
    pub async fn detach(&self) {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return;
        };
        task.abort();

        self.inner.window.set_marker(false);
        let dropped = {
            let mut pending = self.inner.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        self.inner.signal(SignalKind::Detached).await;
        debug!(tab_id = %self.inner.tab_id, dropped, "Content relay detached");
    }

    /// Returns the number of forwarded calls awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns the tab this relay serves.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.inner.tab_id
    }

    /// Event loop over page messages and bus messages.
    async fn run_event_loop(
        inner: Arc<RelayInner>,
        mut page_rx: mpsc::UnboundedReceiver<WindowMessage>,
        mut bus_rx: mpsc::UnboundedReceiver<BusMessage>,
    ) {
        loop {
            tokio::select! {
                message = page_rx.recv() => {
                    match message {
                        Some(message) => inner.handle_page_message(message).await,
                        None => {
                            debug!("Page window closed");
                            break;
                        }
                    }
                }

                message = bus_rx.recv() => {
                    match message {
                        Some(message) => inner.handle_bus_message(message),
                        None => {
                            debug!("Bus channel closed");
                            break;
                        }
                    }
                }
            }
        }

        inner.pending.lock().clear();
        debug!(tab_id = %inner.tab_id, "Relay event loop terminated");
    }
}

// ============================================================================
// RelayInner
// ============================================================================

impl RelayInner {
    fn sender(&self) -> MessageSender {
        MessageSender::tab(self.extension_id.clone(), self.tab_id)
    }

    async fn signal(&self, kind: SignalKind) {
        let signal = BusMessage::Signal(BusSignal {
            app: self.app.clone(),
            kind,
        });
        if let Err(e) = self.bus.send_to_background(self.sender(), signal).await {
            warn!(tab_id = %self.tab_id, error = %e, "Failed to announce relay");
        }
    }

    /// Handles a message observed on the page window.
    async fn handle_page_message(&self, message: WindowMessage) {
        if message.origin != self.window.origin() {
            trace!(origin = %message.origin, "Dropping cross-origin message");
            return;
        }
        let Some(page) = PageMessage::parse(&message.data) else {
            return;
        };
        // Our own responses and events come back through the same window.
        if page.source != MessageSource::Request {
            return;
        }
        if page.app != self.app {
            trace!(app = %page.app, "Dropping message for another app");
            return;
        }

        let request = match decode_request(&page) {
            Ok(request) => request,
            Err(e) => {
                debug!(kind = %page.kind, error = %e, "Dropping undecodable request");
                return;
            }
        };

        let message_id = request.id;
        let kind = request.kind;
        let relay_id = RequestId::generate();

        self.pending
            .lock()
            .insert(relay_id, PendingCall { message_id, kind });

        let forwarded = BusMessage::Request(BusRequest {
            app: self.app.clone(),
            kind,
            id: relay_id,
            payload: request.payload,
        });

        match self.bus.send_to_background(self.sender(), forwarded).await {
            Ok(()) => trace!(%kind, %relay_id, "Request forwarded"),
            Err(e) => {
                warn!(%kind, error = %e, "Failed to forward request");
                self.pending.lock().remove(&relay_id);
                let response = ResponseEnvelope::new(
                    self.app.clone(),
                    kind.response(),
                    message_id,
                    Outcome::failed(&e),
                );
                self.window.post(encode_response(&response).to_value());
            }
        }
    }

    /// Handles a message the background sent to this tab.
    fn handle_bus_message(&self, message: BusMessage) {
        match message {
            BusMessage::Response(response) => self.handle_response(response),
            BusMessage::Event(event) => self.handle_event(event),
            BusMessage::Request(_) | BusMessage::Signal(_) => {
                trace!("Ignoring tab-bound request or signal");
            }
        }
    }

    fn handle_response(&self, response: BusResponse) {
        if response.app != self.app {
            return;
        }
        let relay_id = response.payload.id;

        let call = {
            let mut pending = self.pending.lock();
            match pending.get(&relay_id).copied() {
                Some(call) if call.kind.response() == response.kind => {
                    pending.remove(&relay_id);
                    Some(call)
                }
                Some(_) => {
                    debug!(%relay_id, kind = %response.kind, "Response type mismatch");
                    None
                }
                None => None,
            }
        };

        let Some(call) = call else {
            trace!(%relay_id, "Response for unknown request");
            return;
        };

        let mut envelope = ResponseEnvelope::from(response);
        envelope.id = call.message_id;
        self.window.post(encode_response(&envelope).to_value());
        trace!(kind = %envelope.kind, "Response posted to page");
    }

    fn handle_event(&self, event: BusEvent) {
        if event.app != self.app {
            return;
        }
        let event = BroadcastEvent::from(event);
        self.window.post(encode_event(&self.app, &event).to_value());
        trace!(kind = %event.kind, "Event republished");
    }
}

// ============================================================================
// Tests
// ============================================================================
