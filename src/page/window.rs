//! Page window message channel.
//!
//! Models the page's `window.postMessage` surface: every listener sees every
//! message together with the origin it was posted from, and no listener ever
//! misses one. The content relay also sets a presence marker here when it
//! attaches.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

// ============================================================================
// WindowMessage
// ============================================================================

/// A message observed on the page window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    /// Origin of the poster.
    pub origin: String,
    /// Structured-cloned data.
    pub data: Value,
}

// ============================================================================
// PageWindow
// ============================================================================

/// Same-origin message channel shared by a page and its content relay.
///
/// Each listener owns an unbounded queue; a listener that stops reading is
/// pruned on the next post.
pub struct PageWindow {
    origin: String,
    listeners: Mutex<Vec<mpsc::UnboundedSender<WindowMessage>>>,
    marker: AtomicBool,
}

impl PageWindow {
    /// Creates a window for `origin` without a presence marker.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.into(),
            listeners: Mutex::new(Vec::new()),
            marker: AtomicBool::new(false),
        })
    }

    /// Returns the page origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Posts data from the page's own origin.
    pub fn post(&self, data: Value) {
        self.post_from(self.origin.clone(), data);
    }

    /// Posts data from an arbitrary origin, as a foreign frame would.
    pub fn post_from(&self, origin: impl Into<String>, data: Value) {
        let message = WindowMessage {
            origin: origin.into(),
            data,
        };
        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| tx.send(message.clone()).is_ok());
        if listeners.is_empty() {
            trace!("Window message posted without listeners");
        }
    }

    /// Registers a listener for subsequent messages.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(tx);
        rx
    }

    /// Returns the number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Sets or clears the extension presence marker.
    pub fn set_marker(&self, present: bool) {
        self.marker.store(present, Ordering::SeqCst);
    }

    /// Returns `true` if an extension relay marked this page.
    #[inline]
    #[must_use]
    pub fn has_marker(&self) -> bool {
        self.marker.load(Ordering::SeqCst)
    }
}
