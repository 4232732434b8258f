//! Host runtime abstractions.
//!
//! Every suspension point of the protocol is a call through one of these
//! traits. Production hosts bind them to the browser's runtime messaging,
//! window and storage APIs; [`memory`] provides deterministic in-process
//! implementations.
//!
//! | Trait | Host concern |
//! |-------|--------------|
//! | [`MessageBus`] | runtime messaging between relays and the background |
//! | [`WindowManager`] | approval/probe window lifecycle |
//! | [`KeyValueStore`] | session store and local persistent store |
//! | [`TabProbe`] | tab liveness for event fan-out |
//! | [`KeepAlive`] | always-alive helper context while unlocked |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory host implementations.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::config::WindowGeometry;
use crate::error::Result;
use crate::identifiers::{TabId, WindowId};
use crate::protocol::BusMessage;

// ============================================================================
// MessageBus
// ============================================================================

/// Identity of whoever put a message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSender {
    /// Id of the extension the sender belongs to.
    pub extension_id: String,
    /// Tab of the sending relay; `None` for extension pages.
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    /// Sender for a relay running in `tab_id`.
    #[inline]
    #[must_use]
    pub fn tab(extension_id: impl Into<String>, tab_id: TabId) -> Self {
        Self {
            extension_id: extension_id.into(),
            tab_id: Some(tab_id),
        }
    }
}

/// A bus message delivered to the background together with its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Sender identity, as reported by the host.
    pub sender: MessageSender,
    /// The message.
    pub message: BusMessage,
}

/// Host runtime message bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Sends a message from a relay to the background.
    async fn send_to_background(&self, sender: MessageSender, message: BusMessage) -> Result<()>;

    /// Sends a message from the background to the relay in `tab_id`.
    ///
    /// Point-to-point: no other tab observes it.
    async fn send_to_tab(&self, tab_id: TabId, message: BusMessage) -> Result<()>;
}

// ============================================================================
// WindowManager
// ============================================================================

/// Parameters for a window the dispatcher opens.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    /// Route with navigation parameters.
    pub url: Url,
    /// Size and position.
    pub geometry: WindowGeometry,
    /// Whether the window takes focus.
    pub focused: bool,
}

/// Window lifecycle events observed by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// A window was removed, by the user or programmatically.
    Closed(WindowId),
}

/// Host window manager.
#[async_trait]
pub trait WindowManager: Send + Sync {
    /// Opens a popup window.
    async fn create(&self, spec: WindowSpec) -> Result<WindowId>;

    /// Brings an existing window to the front, optionally navigating it.
    async fn focus(&self, window_id: WindowId, url: Option<Url>) -> Result<()>;

    /// Closes a window. Emits [`WindowEvent::Closed`].
    async fn close(&self, window_id: WindowId) -> Result<()>;

    /// Returns `true` if the window still exists.
    async fn exists(&self, window_id: WindowId) -> bool;
}

// ============================================================================
// KeyValueStore
// ============================================================================

/// String key/value store.
///
/// Used twice: as the session store (cleared at browser-session end) and as
/// the local persistent store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// TabProbe
// ============================================================================

/// Liveness check used before delivering a broadcast.
#[async_trait]
pub trait TabProbe: Send + Sync {
    /// Returns `true` if `tab_id` can still receive messages.
    async fn is_alive(&self, tab_id: TabId) -> bool;
}

// ============================================================================
// KeepAlive
// ============================================================================

/// Companion helper context that stops the host from suspending the
/// background while a session is unlocked.
#[async_trait]
pub trait KeepAlive: Send + Sync {
    /// Starts the helper context. Arming twice is harmless.
    async fn arm(&self) -> Result<()>;

    /// Stops the helper context. Disarming twice is harmless.
    async fn disarm(&self);
}

// ============================================================================
// BackgroundHost
// ============================================================================

/// Bundle of host bindings the background dispatcher runs against.
#[derive(Clone)]
pub struct BackgroundHost {
    /// Runtime message bus.
    pub bus: Arc<dyn MessageBus>,
    /// Window manager.
    pub windows: Arc<dyn WindowManager>,
    /// Session-scoped store.
    pub session_store: Arc<dyn KeyValueStore>,
    /// Persistent store.
    pub local_store: Arc<dyn KeyValueStore>,
    /// Tab liveness probe.
    pub tab_probe: Arc<dyn TabProbe>,
    /// Keep-alive helper context.
    pub keep_alive: Arc<dyn KeepAlive>,
}
