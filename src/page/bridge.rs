//! Page-side wallet API.
//!
//! Each call posts a tagged request into the page window and waits for the
//! response carrying the same correlation id. A fresh listener is registered
//! per call, before posting, and dropped once the matching response arrives,
//! so concurrent calls of the same type never resolve each other.
//!
//! # Example
//!
//! ```ignore
//! let bridge = PageBridge::new(window, &config);
//!
//! if bridge.is_connected().await {
//!     match bridge.get_network().await? {
//!         Some(network) => println!("{network}"),
//!         None => println!("user declined"),
//!     }
//! }
//! ```
//!
//! `send` has no deadline: a call nobody answers never resolves. Use
//! [`PageBridge::send_with_timeout`] to bound it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::protocol::adapter::{decode_event, decode_response, encode_request};
use crate::protocol::{
    BroadcastEvent, MessageSource, PageMessage, RequestEnvelope, RequestKind, ResponseEnvelope,
};

use super::window::{PageWindow, WindowMessage};

// ============================================================================
// PageBridge
// ============================================================================

/// Wallet client running in the page.
#[derive(Clone)]
pub struct PageBridge {
    window: Arc<PageWindow>,
    app: String,
    probe_timeout: Duration,
}

impl PageBridge {
    /// Creates a bridge on `window`.
    #[must_use]
    pub fn new(window: Arc<PageWindow>, config: &WalletConfig) -> Self {
        Self {
            window,
            app: config.app_tag.clone(),
            probe_timeout: config.probe_timeout,
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInstalled`] if no relay marked the page
    /// - [`Error::Protocol`] if the matching response is malformed
    pub async fn send(&self, kind: RequestKind, payload: Option<Value>) -> Result<ResponseEnvelope> {
        if !self.window.has_marker() {
            return Err(Error::NotInstalled);
        }
        self.round_trip(kind, payload).await
    }

    /// Sends a request with a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no response arrives in time, or any
    /// error of [`send`](Self::send).
    pub async fn send_with_timeout(
        &self,
        kind: RequestKind,
        payload: Option<Value>,
        deadline: Duration,
    ) -> Result<ResponseEnvelope> {
        timeout(deadline, self.send(kind, payload))
            .await
            .map_err(|_| Error::timeout(kind.as_str(), deadline.as_millis() as u64))?
    }

    /// Returns `true` if a wallet relay answers.
    ///
    /// Resolves immediately when the presence marker is set; otherwise
    /// probes and gives up after the configured timeout.
    pub async fn is_connected(&self) -> bool {
        if self.window.has_marker() {
            return true;
        }

        match timeout(
            self.probe_timeout,
            self.round_trip(RequestKind::IsConnected, None),
        )
        .await
        {
            Ok(Ok(response)) => response
                .outcome
                .result()
                .and_then(|value| value.get("isConnected"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Ok(Err(e)) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                trace!("Connectivity probe timed out");
                false
            }
        }
    }

    /// Alias of [`is_connected`](Self::is_connected).
    pub async fn is_installed(&self) -> bool {
        self.is_connected().await
    }

    // ========================================================================
    // Typed Helpers
    // ========================================================================

    /// Sends a request and unwraps its outcome.
    ///
    /// Rejection is `Ok(None)`; a wallet failure is [`Error::Wallet`].
    ///
    /// # Errors
    ///
    /// Any error of [`send`](Self::send), or the wallet's failure.
    pub async fn call(&self, kind: RequestKind, payload: Option<Value>) -> Result<Option<Value>> {
        self.send(kind, payload).await?.outcome.into_result()
    }

    /// Reads the active account address.
    pub async fn get_address(&self) -> Result<Option<Value>> {
        self.call(RequestKind::GetAddress, None).await
    }

    /// Reads the active network.
    pub async fn get_network(&self) -> Result<Option<Value>> {
        self.call(RequestKind::GetNetwork, None).await
    }

    /// Reads the active account public key.
    pub async fn get_public_key(&self) -> Result<Option<Value>> {
        self.call(RequestKind::GetPublicKey, None).await
    }

    /// Asks the user to allow this page.
    pub async fn request_access(&self) -> Result<Option<Value>> {
        self.call(RequestKind::RequestAccess, None).await
    }

    /// Asks the user to sign a message.
    pub async fn sign_message(&self, message: Value) -> Result<Option<Value>> {
        self.call(RequestKind::SignMessage, Some(message)).await
    }

    /// Asks the user to sign a transaction.
    pub async fn sign_transaction(&self, transaction: Value) -> Result<Option<Value>> {
        self.call(RequestKind::SignTransaction, Some(transaction))
            .await
    }

    /// Asks the user to sign and submit a transaction.
    pub async fn submit_transaction(&self, transaction: Value) -> Result<Option<Value>> {
        self.call(RequestKind::SubmitTransaction, Some(transaction))
            .await
    }

    /// Deprecated address read.
    pub async fn legacy_public_address(&self) -> Result<Option<Value>> {
        self.call(RequestKind::LegacyPublicAddress, None).await
    }

    /// Deprecated network read.
    pub async fn legacy_network(&self) -> Result<Option<Value>> {
        self.call(RequestKind::LegacyNetwork, None).await
    }

    /// Deprecated transaction signing.
    pub async fn legacy_sign_transaction(&self, transaction: Value) -> Result<Option<Value>> {
        self.call(RequestKind::LegacySignTransaction, Some(transaction))
            .await
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Listens for wallet broadcast events.
    #[must_use]
    pub fn events(&self) -> EventListener {
        EventListener {
            rx: self.window.subscribe(),
            origin: self.window.origin().to_string(),
            app: self.app.clone(),
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    async fn round_trip(&self, kind: RequestKind, payload: Option<Value>) -> Result<ResponseEnvelope> {
        let request = RequestEnvelope::new(self.app.clone(), kind, payload);

        // Subscribe first so a fast response is not missed.
        let mut rx = self.window.subscribe();
        self.window.post(encode_request(&request).to_value());
        trace!(%kind, id = %request.id, "Request posted");

        loop {
            let Some(message) = rx.recv().await else {
                return Err(Error::message_bus("page window closed"));
            };

            if let Some(page) = self.accept(&message, MessageSource::Response)
                && page.message_id == Some(request.id)
            {
                return decode_response(kind.response(), &page);
            }
        }
    }

    /// Same-origin, tagged, same-app filter.
    fn accept(&self, message: &WindowMessage, source: MessageSource) -> Option<PageMessage> {
        if message.origin != self.window.origin() {
            return None;
        }
        PageMessage::parse(&message.data)
            .filter(|page| page.source == source && page.app == self.app)
    }
}

// ============================================================================
// EventListener
// ============================================================================

/// Stream of broadcast events reaching the page.
pub struct EventListener {
    rx: mpsc::UnboundedReceiver<WindowMessage>,
    origin: String,
    app: String,
}

impl EventListener {
    /// Waits for the next wallet event.
    ///
    /// Returns `None` once the page window is gone.
    pub async fn next(&mut self) -> Option<BroadcastEvent> {
        while let Some(message) = self.rx.recv().await {
            if message.origin != self.origin {
                continue;
            }
            if let Some(event) = PageMessage::parse(&message.data)
                .filter(|page| page.app == self.app)
                .as_ref()
                .and_then(decode_event)
            {
                return Some(event);
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
