//! Background dispatcher and event loop.
//!
//! The dispatcher is the routing node between content relays and windows.
//! It owns the session, the tab registry, the payload store and the popup
//! window manager, and enforces the transaction lock.
//!
//! # Request Flow
//!
//! | Step | Action |
//! |------|--------|
//! | 0 | Drop senders from another extension and foreign app tags |
//! | 1 | Answer `IsConnected` immediately |
//! | 2 | Fail requests missing a required payload |
//! | 3 | Apply the busy policy while an approval is pending |
//! | 4 | Store large payloads, keep small ones inline |
//! | 5 | Open a window carrying kind, routing id, tab id and payload |
//! | 6 | Take the transaction lock for approval kinds |
//!
//! The window replies through [`BackgroundDispatcher::respond`]. A window that
//! closes without replying is answered with a rejection.
//!
//! # Event Loop
//!
//! [`BackgroundDispatcher::run`] consumes bus messages and window events in a
//! single `tokio::select!` loop until both sources close.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use zeroize::Zeroizing;

use crate::config::{BusyPolicy, WalletConfig};
use crate::error::{Error, Result};
use crate::host::{BackgroundHost, Inbound, MessageSender, WindowEvent};
use crate::identifiers::{RequestId, TabId, WindowId};
use crate::protocol::{
    BroadcastEvent, BusMessage, BusRequest, BusSignal, Outcome, RequestClass, RequestEnvelope,
    ResponseEnvelope, SignalKind,
};

use super::payload::PayloadStore;
use super::popup::{ApprovalRoute, PendingWindowState, PopupWindowManager, RoutePayload, WindowOpening};
use super::rejection::build_rejection;
use super::session::SessionManager;
use super::tabs::TabRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Session store key mirroring the transaction lock.
pub const TRANSACTION_LOCK_KEY: &str = "transactionInProgress";

// ============================================================================
// Dispatch
// ============================================================================

/// What [`BackgroundDispatcher::dispatch`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Answered without a window.
    Answered,
    /// A window now carries the request.
    Window(WindowOpening),
    /// Dropped without a response.
    Dropped,
}

// ============================================================================
// BackgroundDispatcher
// ============================================================================

struct DispatcherInner {
    config: WalletConfig,
    host: BackgroundHost,
    popups: PopupWindowManager,
    payloads: PayloadStore,
    session: SessionManager,
    tabs: TabRegistry,
}

/// Privileged routing node.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct BackgroundDispatcher {
    inner: Arc<DispatcherInner>,
}

impl BackgroundDispatcher {
    /// Creates a dispatcher over `host`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::Url`] if the configuration is
    /// invalid.
    pub fn new(config: WalletConfig, host: BackgroundHost) -> Result<Self> {
        config.validate()?;

        let popups = PopupWindowManager::new(&config, host.windows.clone(), host.local_store.clone())?;
        let payloads = PayloadStore::new(host.session_store.clone());
        let session = SessionManager::new(config.session_duration, host.keep_alive.clone());
        let tabs = TabRegistry::new(host.bus.clone(), host.tab_probe.clone());

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                config,
                host,
                popups,
                payloads,
                session,
                tabs,
            }),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    /// Returns the session manager.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Returns the tab registry.
    #[inline]
    #[must_use]
    pub fn tabs(&self) -> &TabRegistry {
        &self.inner.tabs
    }

    /// Returns the payload store.
    #[inline]
    #[must_use]
    pub fn payloads(&self) -> &PayloadStore {
        &self.inner.payloads
    }

    /// Returns the popup window manager.
    #[inline]
    #[must_use]
    pub fn popups(&self) -> &PopupWindowManager {
        &self.inner.popups
    }

    /// Returns `true` while an approval is pending.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.popups.is_locked()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Routes a request from a content relay.
    pub async fn dispatch(&self, sender: &MessageSender, request: BusRequest) -> Dispatch {
        let config = &self.inner.config;

        if sender.extension_id != config.extension_id {
            warn!(extension_id = %sender.extension_id, "Dropping request from foreign extension");
            return Dispatch::Dropped;
        }
        let Some(tab_id) = sender.tab_id else {
            debug!(kind = %request.kind, "Dropping request without sender tab");
            return Dispatch::Dropped;
        };
        if request.app != config.app_tag {
            trace!(app = %request.app, "Dropping request with foreign app tag");
            return Dispatch::Dropped;
        }

        let request = RequestEnvelope::from(request);
        let kind = request.kind;
        trace!(%tab_id, %kind, id = %request.id, "Request received");

        if kind.class() == RequestClass::Immediate {
            self.reply(tab_id, &request, Outcome::Approved(json!({ "isConnected": true })))
                .await;
            return Dispatch::Answered;
        }

        if kind.requires_payload() && request.payload().is_none() {
            let err = Error::bad_request(format!("{kind} requires a payload"));
            debug!(%tab_id, %kind, "Request without payload");
            self.reply(tab_id, &request, Outcome::failed(&err)).await;
            return Dispatch::Answered;
        }

        if kind.requires_approval()
            && let Some(pending) = self.pending_approval()
        {
            if self.inner.popups.window_exists(pending.window_id).await {
                return match config.busy_policy {
                    BusyPolicy::Drop => {
                        info!(%tab_id, %kind, "Approval pending, dropping request");
                        Dispatch::Dropped
                    }
                    BusyPolicy::Reject => {
                        info!(%tab_id, %kind, "Approval pending, rejecting request");
                        self.reply(tab_id, &request, Outcome::failed(&Error::Busy))
                            .await;
                        Dispatch::Answered
                    }
                };
            }

            warn!(window_id = %pending.window_id, "Clearing stale transaction lock");
            self.on_window_closed(pending.window_id).await;
        }

        let payload = match request.payload() {
            None => RoutePayload::None,
            Some(value) if kind.is_large() => match self.inner.payloads.put(value).await {
                Ok(key) => RoutePayload::Stored(key),
                Err(e) => {
                    warn!(%tab_id, %kind, error = %e, "Failed to store payload");
                    self.reply(tab_id, &request, Outcome::failed(&e)).await;
                    return Dispatch::Answered;
                }
            },
            Some(value) => RoutePayload::Inline(value.clone()),
        };

        let route = ApprovalRoute {
            kind,
            tab_id,
            route_id: request.id,
            payload,
        };

        match self.inner.popups.open(&route).await {
            Ok(opening) => {
                if kind.requires_approval() {
                    self.mirror_lock(true).await;
                }
                Dispatch::Window(opening)
            }
            Err(e) => {
                warn!(%tab_id, %kind, error = %e, "Failed to open window");
                if let Some(key) = route.payload.storage_key() {
                    self.inner.payloads.discard(key).await;
                }
                self.reply(tab_id, &request, Outcome::failed(&e)).await;
                Dispatch::Answered
            }
        }
    }

    /// Delivers a window's answer to the tab that asked.
    ///
    /// Returns `false` if nothing is waiting on `route_id`, which includes a
    /// second answer to the same request.
    pub async fn respond(&self, route_id: RequestId, outcome: Outcome) -> bool {
        let Some(state) = self.inner.popups.mark_answered(route_id).await else {
            debug!(%route_id, "Reply for unknown or answered request");
            return false;
        };

        if state.kind.requires_approval() {
            self.mirror_lock(false).await;
        }

        let response = ResponseEnvelope::new(
            self.inner.config.app_tag.clone(),
            state.kind.response(),
            route_id,
            outcome,
        );
        self.deliver(state.tab_id, response).await;

        self.inner.popups.dismiss(state.window_id).await;
        if let Some(key) = &state.storage_key {
            self.inner.payloads.discard(key).await;
        }
        true
    }

    /// Handles a window that was closed, by the user or after an answer.
    pub async fn on_window_closed(&self, window_id: WindowId) {
        let Some(state) = self.inner.popups.closed(window_id).await else {
            trace!(%window_id, "Closed window carried no request");
            return;
        };

        if let Some(key) = &state.storage_key {
            self.inner.payloads.discard(key).await;
        }

        if state.answered {
            trace!(%window_id, "Answered window closed");
            return;
        }

        info!(%window_id, kind = %state.kind, tab_id = %state.tab_id, "Window closed without answer");
        if state.kind.requires_approval() {
            self.mirror_lock(false).await;
        }

        let rejection = build_rejection(
            &self.inner.config.app_tag,
            state.kind.response(),
            state.route_id,
        );
        self.deliver(state.tab_id, rejection).await;
    }

    /// Reloads approval window state after the background was revived.
    pub async fn restore(&self) -> Option<PendingWindowState> {
        let restored = self.inner.popups.restore().await;
        self.mirror_lock(restored.as_ref().is_some_and(PendingWindowState::holds_lock))
            .await;
        restored
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Unlocks the wallet and announces it to every tab.
    pub async fn unlock(&self, password: impl Into<String>) -> Instant {
        let expires_at = self.inner.session.start(password).await;
        self.broadcast(&BroadcastEvent::login()).await;
        expires_at
    }

    /// Locks the wallet and announces it to every tab.
    pub async fn lock(&self) {
        self.inner.session.end().await;
        self.broadcast(&BroadcastEvent::logout()).await;
    }

    /// Returns the password while the session is live.
    pub async fn password(&self) -> Option<Zeroizing<String>> {
        self.inner.session.password().await
    }

    /// Sends an event to every live tab. Returns the delivery count.
    pub async fn broadcast(&self, event: &BroadcastEvent) -> usize {
        self.inner
            .tabs
            .broadcast(&self.inner.config.app_tag, event)
            .await
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(
        &self,
        inbox: mpsc::UnboundedReceiver<Inbound>,
        window_events: mpsc::UnboundedReceiver<WindowEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(inbox, window_events))
    }

    /// Processes bus messages and window events until both channels close.
    pub async fn run(
        self,
        mut inbox: mpsc::UnboundedReceiver<Inbound>,
        mut window_events: mpsc::UnboundedReceiver<WindowEvent>,
    ) {
        let mut inbox_open = true;
        let mut events_open = true;

        loop {
            tokio::select! {
                inbound = inbox.recv(), if inbox_open => {
                    match inbound {
                        Some(inbound) => self.handle_inbound(inbound).await,
                        None => {
                            debug!("Inbox closed");
                            inbox_open = false;
                        }
                    }
                }

                event = window_events.recv(), if events_open => {
                    match event {
                        Some(WindowEvent::Closed(window_id)) => {
                            self.on_window_closed(window_id).await;
                        }
                        None => {
                            debug!("Window event channel closed");
                            events_open = false;
                        }
                    }
                }

                else => break,
            }
        }

        debug!("Dispatcher event loop terminated");
    }

    async fn handle_inbound(&self, inbound: Inbound) {
        let Inbound { sender, message } = inbound;
        match message {
            BusMessage::Request(request) => {
                self.dispatch(&sender, request).await;
            }
            BusMessage::Signal(signal) => self.handle_signal(&sender, &signal),
            BusMessage::Response(_) | BusMessage::Event(_) => {
                trace!("Ignoring background-bound response or event");
            }
        }
    }

    fn handle_signal(&self, sender: &MessageSender, signal: &BusSignal) {
        if sender.extension_id != self.inner.config.extension_id
            || signal.app != self.inner.config.app_tag
        {
            trace!("Ignoring foreign signal");
            return;
        }
        let Some(tab_id) = sender.tab_id else {
            return;
        };

        match signal.kind {
            SignalKind::Attached => {
                self.inner.tabs.add(tab_id);
            }
            SignalKind::Detached => {
                self.inner.tabs.remove(tab_id);
            }
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn pending_approval(&self) -> Option<PendingWindowState> {
        self.inner
            .popups
            .approval()
            .filter(PendingWindowState::holds_lock)
    }

    async fn reply(&self, tab_id: TabId, request: &RequestEnvelope, outcome: Outcome) {
        let response = ResponseEnvelope::new(
            request.app.clone(),
            request.kind.response(),
            request.id,
            outcome,
        );
        self.deliver(tab_id, response).await;
    }

    async fn deliver(&self, tab_id: TabId, response: ResponseEnvelope) {
        let kind = response.kind;
        let message = BusMessage::Response(response.into());
        match self.inner.host.bus.send_to_tab(tab_id, message).await {
            Ok(()) => trace!(%tab_id, %kind, "Response delivered"),
            Err(e) => debug!(%tab_id, %kind, error = %e, "Response delivery failed"),
        }
    }

    async fn mirror_lock(&self, locked: bool) {
        let result = self
            .inner
            .host
            .session_store
            .set(TRANSACTION_LOCK_KEY, locked.to_string())
            .await;
        if let Err(e) = result {
            warn!(locked, error = %e, "Failed to mirror transaction lock");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
