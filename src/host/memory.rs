//! In-memory host implementations.
//!
//! Deterministic stand-ins for the browser runtime, used by the test suite
//! and the benches. Each type also exposes a few knobs (offline bus, failing
//! window creation, user-closed windows) so error paths can be driven.
//!
//! # Example
//!
//! ```ignore
//! let (host, channels) = MemoryHost::new();
//! let dispatcher = BackgroundDispatcher::new(config, host.background_host())?;
//! dispatcher.spawn(channels.inbox, channels.window_events);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;
use url::Url;

use crate::config::WindowGeometry;
use crate::error::{Error, Result};
use crate::identifiers::{TabId, WindowId};
use crate::protocol::BusMessage;

use super::{
    BackgroundHost, Inbound, KeepAlive, KeyValueStore, MessageBus, MessageSender, TabProbe,
    WindowEvent, WindowManager, WindowSpec,
};

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the opened-window notification channel.
const OPENED_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// MemoryStore
// ============================================================================

/// Key/value store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Drops every entry, as at browser-session end.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// MemoryBus
// ============================================================================

/// Message bus routing over tokio channels.
///
/// The background side reads [`Inbound`] messages from the receiver returned
/// by [`MemoryBus::new`]; each tab reads from the receiver returned by
/// [`MemoryBus::connect_tab`].
pub struct MemoryBus {
    background: mpsc::UnboundedSender<Inbound>,
    tabs: RwLock<FxHashMap<TabId, mpsc::UnboundedSender<BusMessage>>>,
    offline: AtomicBool,
}

impl MemoryBus {
    /// Creates a bus and the background's inbox.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Inbound>) {
        let (background, inbox) = mpsc::unbounded_channel();
        let bus = Arc::new(Self {
            background,
            tabs: RwLock::new(FxHashMap::default()),
            offline: AtomicBool::new(false),
        });
        (bus, inbox)
    }

    /// Connects a tab, returning the receiver its relay reads from.
    ///
    /// Reconnecting a tab replaces the previous receiver.
    pub fn connect_tab(&self, tab_id: TabId) -> mpsc::UnboundedReceiver<BusMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tabs.write().insert(tab_id, tx);
        rx
    }

    /// Makes every relay → background send fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn send_to_background(&self, sender: MessageSender, message: BusMessage) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::message_bus("could not establish connection"));
        }
        self.background
            .send(Inbound { sender, message })
            .map_err(|_| Error::message_bus("background context terminated"))
    }

    async fn send_to_tab(&self, tab_id: TabId, message: BusMessage) -> Result<()> {
        let tx = self
            .tabs
            .read()
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| Error::tab_not_found(tab_id))?;

        if tx.send(message).is_err() {
            self.tabs.write().remove(&tab_id);
            return Err(Error::tab_not_found(tab_id));
        }
        Ok(())
    }
}

#[async_trait]
impl TabProbe for MemoryBus {
    async fn is_alive(&self, tab_id: TabId) -> bool {
        self.tabs
            .read()
            .get(&tab_id)
            .is_some_and(|tx| !tx.is_closed())
    }
}

// ============================================================================
// MemoryWindows
// ============================================================================

/// A window created or re-targeted by [`MemoryWindows`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedWindow {
    /// Window id.
    pub window_id: WindowId,
    /// Current route.
    pub url: Url,
    /// Size and position.
    pub geometry: WindowGeometry,
    /// `true` if an existing window was focused rather than created.
    pub reused: bool,
}

/// Window manager keeping windows in a map.
///
/// Close events, user-initiated or programmatic, go to the receiver returned
/// by [`MemoryWindows::new`]. Creations and focus changes are announced on
/// [`MemoryWindows::subscribe`].
pub struct MemoryWindows {
    next_id: AtomicU32,
    open: Mutex<FxHashMap<WindowId, OpenedWindow>>,
    events: mpsc::UnboundedSender<WindowEvent>,
    opened: broadcast::Sender<OpenedWindow>,
    fail_create: AtomicBool,
    defer_close: AtomicBool,
    closing: Mutex<Vec<WindowId>>,
    created: AtomicUsize,
    focused: AtomicUsize,
}

impl MemoryWindows {
    /// Creates a window manager and its close-event receiver.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WindowEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (opened, _) = broadcast::channel(OPENED_CHANNEL_CAPACITY);
        let windows = Arc::new(Self {
            next_id: AtomicU32::new(0),
            open: Mutex::new(FxHashMap::default()),
            events,
            opened,
            fail_create: AtomicBool::new(false),
            defer_close: AtomicBool::new(false),
            closing: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            focused: AtomicUsize::new(0),
        });
        (windows, rx)
    }

    /// Subscribes to window creation and focus notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OpenedWindow> {
        self.opened.subscribe()
    }

    /// Simulates the user closing a window.
    ///
    /// Returns `false` if the window was not open.
    pub fn user_close(&self, window_id: WindowId) -> bool {
        let removed = self.open.lock().remove(&window_id).is_some();
        if removed {
            let _ = self.events.send(WindowEvent::Closed(window_id));
        }
        removed
    }

    /// Removes a window without emitting a close event, as when it vanished
    /// while the background was suspended.
    pub fn forget(&self, window_id: WindowId) {
        self.open.lock().remove(&window_id);
    }

    /// Makes subsequent creations fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Makes programmatic closes resolve before the window goes away.
    ///
    /// Deferred windows stay open until [`finish_closes`](Self::finish_closes).
    pub fn set_defer_close(&self, defer: bool) {
        self.defer_close.store(defer, Ordering::SeqCst);
    }

    /// Completes every deferred close, returning how many windows went away.
    pub fn finish_closes(&self) -> usize {
        let closing = std::mem::take(&mut *self.closing.lock());
        closing
            .into_iter()
            .filter(|&window_id| self.user_close(window_id))
            .count()
    }

    /// Returns the open windows.
    #[must_use]
    pub fn open_windows(&self) -> Vec<OpenedWindow> {
        self.open.lock().values().cloned().collect()
    }

    /// Returns the number of windows ever created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Returns the number of focus calls on existing windows.
    #[must_use]
    pub fn focus_count(&self) -> usize {
        self.focused.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowManager for MemoryWindows {
    async fn create(&self, spec: WindowSpec) -> Result<WindowId> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::window("window creation refused by host"));
        }

        let window_id = WindowId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let window = OpenedWindow {
            window_id,
            url: spec.url,
            geometry: spec.geometry,
            reused: false,
        };

        self.open.lock().insert(window_id, window.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        trace!(%window_id, url = %window.url, "Memory window created");

        let _ = self.opened.send(window);
        Ok(window_id)
    }

    async fn focus(&self, window_id: WindowId, url: Option<Url>) -> Result<()> {
        let window = {
            let mut open = self.open.lock();
            let window = open
                .get_mut(&window_id)
                .ok_or_else(|| Error::window(format!("no window with id {window_id}")))?;
            if let Some(url) = url {
                window.url = url;
            }
            window.reused = true;
            window.clone()
        };

        self.focused.fetch_add(1, Ordering::SeqCst);
        let _ = self.opened.send(window);
        Ok(())
    }

    async fn close(&self, window_id: WindowId) -> Result<()> {
        if self.defer_close.load(Ordering::SeqCst) && self.open.lock().contains_key(&window_id) {
            self.closing.lock().push(window_id);
            return Ok(());
        }
        if self.user_close(window_id) {
            Ok(())
        } else {
            Err(Error::window(format!("no window with id {window_id}")))
        }
    }

    async fn exists(&self, window_id: WindowId) -> bool {
        self.open.lock().contains_key(&window_id)
    }
}

// ============================================================================
// MemoryKeepAlive
// ============================================================================

/// Keep-alive that records its state.
#[derive(Debug, Default)]
pub struct MemoryKeepAlive {
    armed: AtomicBool,
    fail: AtomicBool,
    disarm_calls: AtomicUsize,
}

impl MemoryKeepAlive {
    /// Creates a disarmed keep-alive.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns `true` while armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Makes subsequent arm calls fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of disarm calls.
    #[must_use]
    pub fn disarm_calls(&self) -> usize {
        self.disarm_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepAlive for MemoryKeepAlive {
    async fn arm(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::keep_alive("offscreen document unavailable"));
        }
        self.armed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disarm(&self) {
        self.disarm_calls.fetch_add(1, Ordering::SeqCst);
        self.armed.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// MemoryHost
// ============================================================================

/// All in-memory host pieces, wired together.
#[derive(Clone)]
pub struct MemoryHost {
    /// Message bus; also the tab probe.
    pub bus: Arc<MemoryBus>,
    /// Window manager.
    pub windows: Arc<MemoryWindows>,
    /// Session store.
    pub session_store: Arc<MemoryStore>,
    /// Local persistent store.
    pub local_store: Arc<MemoryStore>,
    /// Keep-alive helper.
    pub keep_alive: Arc<MemoryKeepAlive>,
}

/// Receivers the background event loop consumes.
pub struct MemoryChannels {
    /// Relay → background messages.
    pub inbox: mpsc::UnboundedReceiver<Inbound>,
    /// Window close events.
    pub window_events: mpsc::UnboundedReceiver<WindowEvent>,
}

impl MemoryHost {
    /// Creates a fresh host.
    #[must_use]
    pub fn new() -> (Self, MemoryChannels) {
        let (bus, inbox) = MemoryBus::new();
        let (windows, window_events) = MemoryWindows::new();
        let host = Self {
            bus,
            windows,
            session_store: MemoryStore::new(),
            local_store: MemoryStore::new(),
            keep_alive: MemoryKeepAlive::new(),
        };
        (
            host,
            MemoryChannels {
                inbox,
                window_events,
            },
        )
    }

    /// Returns the bindings for a background dispatcher.
    #[must_use]
    pub fn background_host(&self) -> BackgroundHost {
        BackgroundHost {
            bus: self.bus.clone(),
            windows: self.windows.clone(),
            session_store: self.session_store.clone(),
            local_store: self.local_store.clone(),
            tab_probe: self.bus.clone(),
            keep_alive: self.keep_alive.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
