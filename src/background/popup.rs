//! Approval and probe window management.
//!
//! # Approval slot
//!
//! At most one approval window exists at a time:
//!
//! ```text
//! Idle --open--> Awaiting --answer--> Answered --closed--> Idle
//!                   |                     |
//!                   +------closed---------+--> Idle (rejects if unanswered)
//! ```
//!
//! An approval request arriving while the slot holds an answered window that
//! has not closed yet re-targets and focuses that window instead of opening
//! another one.
//!
//! # Probe windows
//!
//! Non-approval reads open a near-invisible window each. Probes are tracked
//! by window id, overlap freely, and never touch the approval slot.
//!
//! # Route
//!
//! ```text
//! chrome-extension://{id}/{route}?kind=REQUEST_SIGN_TX&tabId=7&routeId={uuid}&storageKey=payload:{uuid}
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{WalletConfig, WindowGeometry};
use crate::error::{Error, Result};
use crate::host::{KeyValueStore, WindowManager, WindowSpec};
use crate::identifiers::{RequestId, StorageKey, TabId, WindowId};
use crate::protocol::RequestKind;

// ============================================================================
// Constants
// ============================================================================

/// Local store key holding the approval slot across background restarts.
pub const APPROVAL_WINDOW_KEY: &str = "approvalWindow";

const PARAM_KIND: &str = "kind";
const PARAM_TAB_ID: &str = "tabId";
const PARAM_ROUTE_ID: &str = "routeId";
const PARAM_PAYLOAD: &str = "payload";
const PARAM_STORAGE_KEY: &str = "storageKey";

// ============================================================================
// ApprovalRoute
// ============================================================================

/// How the request payload reaches the window.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePayload {
    /// No payload.
    None,
    /// JSON in the route itself.
    Inline(Value),
    /// Key into the session store.
    Stored(StorageKey),
}

impl RoutePayload {
    /// Returns the storage key, if stored.
    #[inline]
    #[must_use]
    pub fn storage_key(&self) -> Option<&StorageKey> {
        match self {
            Self::Stored(key) => Some(key),
            _ => None,
        }
    }
}

/// Navigation parameters of an approval or probe window.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRoute {
    /// Request type being handled.
    pub kind: RequestKind,
    /// Tab that asked.
    pub tab_id: TabId,
    /// Routing id the reply must carry.
    pub route_id: RequestId,
    /// Request payload.
    pub payload: RoutePayload,
}

impl ApprovalRoute {
    /// Renders the route onto `base`, replacing any existing query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if an inline payload cannot be serialised.
    pub fn to_url(&self, base: &Url) -> Result<Url> {
        let mut url = base.clone();
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(PARAM_KIND, self.kind.as_str())
                .append_pair(PARAM_TAB_ID, &self.tab_id.to_string())
                .append_pair(PARAM_ROUTE_ID, &self.route_id.to_string());

            match &self.payload {
                RoutePayload::None => {}
                RoutePayload::Inline(value) => {
                    query.append_pair(PARAM_PAYLOAD, &serde_json::to_string(value)?);
                }
                RoutePayload::Stored(key) => {
                    query.append_pair(PARAM_STORAGE_KEY, key.as_str());
                }
            }
        }
        Ok(url)
    }

    /// Parses navigation parameters from a window URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadRequest`] if a parameter is missing or invalid.
    pub fn from_url(url: &Url) -> Result<Self> {
        let mut kind = None;
        let mut tab_id = None;
        let mut route_id = None;
        let mut payload = RoutePayload::None;

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                PARAM_KIND => kind = RequestKind::from_wire(&value),
                PARAM_TAB_ID => tab_id = value.parse::<u32>().ok().and_then(TabId::new),
                PARAM_ROUTE_ID => route_id = RequestId::parse(&value),
                PARAM_PAYLOAD => {
                    let parsed = serde_json::from_str(&value)
                        .map_err(|e| Error::bad_request(format!("invalid inline payload: {e}")))?;
                    payload = RoutePayload::Inline(parsed);
                }
                PARAM_STORAGE_KEY => payload = RoutePayload::Stored(StorageKey::from_raw(value)),
                _ => {}
            }
        }

        Ok(Self {
            kind: kind.ok_or_else(|| Error::bad_request("route has no valid kind"))?,
            tab_id: tab_id.ok_or_else(|| Error::bad_request("route has no valid tabId"))?,
            route_id: route_id.ok_or_else(|| Error::bad_request("route has no valid routeId"))?,
            payload,
        })
    }
}

// ============================================================================
// PendingWindowState
// ============================================================================

/// A window carrying a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWindowState {
    /// Host window id.
    pub window_id: WindowId,
    /// Request type the window handles.
    pub kind: RequestKind,
    /// Tab the answer goes to.
    pub tab_id: TabId,
    /// Routing id of the request.
    pub route_id: RequestId,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// `true` once a reply was delivered.
    pub answered: bool,
    /// Stored payload, if the request was large.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<StorageKey>,
}

impl PendingWindowState {
    fn new(window_id: WindowId, route: &ApprovalRoute) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            window_id,
            kind: route.kind,
            tab_id: route.tab_id,
            route_id: route.route_id,
            created_at_ms,
            answered: false,
            storage_key: route.payload.storage_key().cloned(),
        }
    }

    /// Returns `true` while this window holds the transaction lock.
    #[inline]
    #[must_use]
    pub fn holds_lock(&self) -> bool {
        self.kind.requires_approval() && !self.answered
    }
}

/// How [`PopupWindowManager::open`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOpening {
    /// A new window was created.
    Created(WindowId),
    /// An existing approval window was re-targeted and focused.
    Focused(WindowId),
}

impl WindowOpening {
    /// Returns the window id.
    #[inline]
    #[must_use]
    pub fn window_id(self) -> WindowId {
        match self {
            Self::Created(id) | Self::Focused(id) => id,
        }
    }
}

// ============================================================================
// PopupWindowManager
// ============================================================================

#[derive(Default)]
struct PopupState {
    approval: Option<PendingWindowState>,
    probes: FxHashMap<WindowId, PendingWindowState>,
    /// Dismissed windows whose close event has not arrived yet.
    closing: FxHashSet<WindowId>,
}

/// Owner of every window the dispatcher opens.
pub struct PopupWindowManager {
    windows: Arc<dyn WindowManager>,
    local_store: Arc<dyn KeyValueStore>,
    base_url: Url,
    approval_geometry: WindowGeometry,
    probe_geometry: WindowGeometry,
    state: Mutex<PopupState>,
}

impl PopupWindowManager {
    /// Creates a manager with an empty approval slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the approval route is not a valid URL.
    pub fn new(
        config: &WalletConfig,
        windows: Arc<dyn WindowManager>,
        local_store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        Ok(Self {
            windows,
            local_store,
            base_url: config.approval_url()?,
            approval_geometry: config.approval_geometry,
            probe_geometry: config.probe_geometry,
            state: Mutex::new(PopupState::default()),
        })
    }

    /// Opens a window for `route`.
    ///
    /// Probe kinds always get a new window. Approval kinds fill the slot,
    /// reusing an answered window that has not closed yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if the slot holds an unanswered approval
    /// - [`Error::Window`] if the host cannot create the window
    pub async fn open(&self, route: &ApprovalRoute) -> Result<WindowOpening> {
        let url = route.to_url(&self.base_url)?;

        if !route.kind.requires_approval() {
            let window_id = self
                .windows
                .create(WindowSpec {
                    url,
                    geometry: self.probe_geometry,
                    focused: false,
                })
                .await?;

            let state = PendingWindowState::new(window_id, route);
            self.state.lock().probes.insert(window_id, state);
            debug!(%window_id, kind = %route.kind, "Probe window opened");
            return Ok(WindowOpening::Created(window_id));
        }

        let current = self.state.lock().approval.clone();
        if let Some(current) = current {
            if !current.answered {
                return Err(Error::Busy);
            }

            match self.windows.focus(current.window_id, Some(url.clone())).await {
                Ok(()) => {
                    let state = PendingWindowState::new(current.window_id, route);
                    self.state.lock().approval = Some(state.clone());
                    self.persist(Some(&state)).await;
                    info!(window_id = %current.window_id, kind = %route.kind, "Approval window re-targeted");
                    return Ok(WindowOpening::Focused(current.window_id));
                }
                Err(e) => {
                    debug!(window_id = %current.window_id, error = %e, "Answered window gone, creating new one");
                    let mut state = self.state.lock();
                    if state
                        .approval
                        .as_ref()
                        .is_some_and(|slot| slot.window_id == current.window_id)
                    {
                        state.approval = None;
                    }
                }
            }
        }

        let window_id = self
            .windows
            .create(WindowSpec {
                url,
                geometry: self.approval_geometry,
                focused: true,
            })
            .await?;

        let state = PendingWindowState::new(window_id, route);
        self.state.lock().approval = Some(state.clone());
        self.persist(Some(&state)).await;
        info!(%window_id, kind = %route.kind, "Approval window opened");
        Ok(WindowOpening::Created(window_id))
    }

    /// Marks the window carrying `route_id` as answered.
    ///
    /// Returns `None` if no unanswered window carries it, so a second reply
    /// is never delivered.
    pub async fn mark_answered(&self, route_id: RequestId) -> Option<PendingWindowState> {
        let (answered, persist) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(slot) = state
                .approval
                .as_mut()
                .filter(|slot| slot.route_id == route_id && !slot.answered)
            {
                slot.answered = true;
                (Some(slot.clone()), true)
            } else {
                let probe = state
                    .probes
                    .values_mut()
                    .find(|probe| probe.route_id == route_id && !probe.answered);
                match probe {
                    Some(probe) => {
                        probe.answered = true;
                        (Some(probe.clone()), false)
                    }
                    None => (None, false),
                }
            }
        };

        if persist {
            self.persist(answered.as_ref()).await;
        }
        answered
    }

    /// Forgets a closed window, returning what it carried.
    ///
    /// A window retired by [`dismiss`](Self::dismiss) carries nothing.
    pub async fn closed(&self, window_id: WindowId) -> Option<PendingWindowState> {
        let (removed, was_approval) = {
            let mut state = self.state.lock();
            if state.closing.remove(&window_id) {
                return None;
            }
            if state
                .approval
                .as_ref()
                .is_some_and(|slot| slot.window_id == window_id)
            {
                (state.approval.take(), true)
            } else {
                (state.probes.remove(&window_id), false)
            }
        };

        if was_approval {
            self.persist(None).await;
        }
        removed
    }

    /// Retires a window and closes it, returning what it carried.
    ///
    /// The window leaves the slot at once, so a later request never
    /// re-targets a window that is on its way out.
    pub async fn dismiss(&self, window_id: WindowId) -> Option<PendingWindowState> {
        let (retired, was_approval) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let retired = if state
                .approval
                .as_ref()
                .is_some_and(|slot| slot.window_id == window_id)
            {
                (state.approval.take(), true)
            } else {
                (state.probes.remove(&window_id), false)
            };
            state.closing.insert(window_id);
            retired
        };

        if was_approval {
            self.persist(None).await;
        }

        if let Err(e) = self.windows.close(window_id).await {
            // No close event follows a failed close.
            self.state.lock().closing.remove(&window_id);
            debug!(%window_id, error = %e, "Failed to close window");
        }
        retired
    }

    /// Returns `true` if the host still shows `window_id`.
    pub async fn window_exists(&self, window_id: WindowId) -> bool {
        self.windows.exists(window_id).await
    }

    /// Returns the approval slot.
    #[must_use]
    pub fn approval(&self) -> Option<PendingWindowState> {
        self.state.lock().approval.clone()
    }

    /// Returns `true` while an approval is pending.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state
            .lock()
            .approval
            .as_ref()
            .is_some_and(PendingWindowState::holds_lock)
    }

    /// Returns the number of open probe windows.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.state.lock().probes.len()
    }

    /// Reloads the approval slot from the local store.
    ///
    /// A persisted window that no longer exists is dropped.
    pub async fn restore(&self) -> Option<PendingWindowState> {
        let raw = match self.local_store.get(APPROVAL_WINDOW_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted approval window");
                return None;
            }
        };

        let persisted = match serde_json::from_str::<PendingWindowState>(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Discarding corrupt approval window state");
                self.persist(None).await;
                return None;
            }
        };

        if !self.windows.exists(persisted.window_id).await {
            debug!(window_id = %persisted.window_id, "Persisted approval window is gone");
            self.persist(None).await;
            return None;
        }

        self.state.lock().approval = Some(persisted.clone());
        info!(window_id = %persisted.window_id, kind = %persisted.kind, "Approval window restored");
        Some(persisted)
    }

    async fn persist(&self, slot: Option<&PendingWindowState>) {
        let result = match slot {
            Some(state) => match serde_json::to_string(state) {
                Ok(json) => self.local_store.set(APPROVAL_WINDOW_KEY, json).await,
                Err(e) => Err(e.into()),
            },
            None => self.local_store.remove(APPROVAL_WINDOW_KEY).await,
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist approval window state");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::host::memory::{MemoryStore, MemoryWindows};

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    fn route(kind: RequestKind, payload: RoutePayload) -> ApprovalRoute {
        ApprovalRoute {
            kind,
            tab_id: tab(7),
            route_id: RequestId::generate(),
            payload,
        }
    }

    fn manager() -> (PopupWindowManager, Arc<MemoryWindows>, Arc<MemoryStore>) {
        let (windows, _events) = MemoryWindows::new();
        let store = MemoryStore::new();
        let manager =
            PopupWindowManager::new(&WalletConfig::new(), windows.clone(), store.clone())
                .expect("manager");
        (manager, windows, store)
    }

    #[test]
    fn test_route_url_roundtrip() {
        let base = Url::parse("chrome-extension://abc/popup.html").expect("url");
        for payload in [
            RoutePayload::None,
            RoutePayload::Inline(json!({"message": "hello & bye"})),
            RoutePayload::Stored(StorageKey::generate()),
        ] {
            let original = route(RequestKind::SignMessage, payload);
            let url = original.to_url(&base).expect("to_url");
            assert!(url.as_str().starts_with("chrome-extension://abc/popup.html?kind="));
            assert_eq!(ApprovalRoute::from_url(&url).expect("from_url"), original);
        }
    }

    #[test]
    fn test_route_missing_params() {
        let url = Url::parse("chrome-extension://abc/popup.html?kind=REQUEST_ACCESS").expect("url");
        assert!(matches!(
            ApprovalRoute::from_url(&url),
            Err(Error::BadRequest { .. })
        ));

        let url = Url::parse(
            "chrome-extension://abc/popup.html?kind=REQUEST_ACCESS&tabId=0&routeId=x",
        )
        .expect("url");
        assert!(ApprovalRoute::from_url(&url).is_err());
    }

    #[tokio::test]
    async fn test_approval_slot_lifecycle() {
        let (manager, windows, store) = manager();
        let route = route(RequestKind::RequestAccess, RoutePayload::None);

        let opening = manager.open(&route).await.expect("open");
        let WindowOpening::Created(window_id) = opening else {
            panic!("expected new window");
        };
        assert!(manager.is_locked());
        assert!(store.contains(APPROVAL_WINDOW_KEY));
        assert_eq!(windows.open_windows()[0].geometry, WindowGeometry::APPROVAL);

        let answered = manager.mark_answered(route.route_id).await.expect("answered");
        assert_eq!(answered.window_id, window_id);
        assert!(!manager.is_locked());
        assert!(manager.mark_answered(route.route_id).await.is_none());

        let closed = manager.closed(window_id).await.expect("closed");
        assert!(closed.answered);
        assert!(manager.approval().is_none());
        assert!(!store.contains(APPROVAL_WINDOW_KEY));
    }

    #[tokio::test]
    async fn test_second_approval_is_busy() {
        let (manager, windows, _store) = manager();
        manager
            .open(&route(RequestKind::RequestAccess, RoutePayload::None))
            .await
            .expect("open");

        let second = manager
            .open(&route(RequestKind::SignMessage, RoutePayload::Inline(json!("hi"))))
            .await;
        assert!(matches!(second, Err(Error::Busy)));
        assert_eq!(windows.created_count(), 1);
    }

    #[tokio::test]
    async fn test_answered_window_is_refocused() {
        let (manager, windows, _store) = manager();
        let first = route(RequestKind::RequestAccess, RoutePayload::None);
        let window_id = manager.open(&first).await.expect("open").window_id();
        manager.mark_answered(first.route_id).await.expect("answered");

        let second = route(RequestKind::SignMessage, RoutePayload::Inline(json!("hi")));
        let opening = manager.open(&second).await.expect("open");
        assert_eq!(opening, WindowOpening::Focused(window_id));
        assert_eq!(windows.focus_count(), 1);
        assert_eq!(windows.created_count(), 1);
        assert_eq!(manager.approval().expect("slot").route_id, second.route_id);
        assert!(manager.is_locked());
    }

    #[tokio::test]
    async fn test_dismissed_window_is_never_retargeted() {
        let (manager, windows, store) = manager();
        windows.set_defer_close(true);

        let first = route(RequestKind::RequestAccess, RoutePayload::None);
        let first_window = manager.open(&first).await.expect("open").window_id();
        manager.mark_answered(first.route_id).await.expect("answered");
        let retired = manager.dismiss(first_window).await.expect("retired");
        assert_eq!(retired.route_id, first.route_id);
        assert!(manager.approval().is_none());
        assert!(!store.contains(APPROVAL_WINDOW_KEY));

        // Still on screen, but closing.
        assert!(manager.window_exists(first_window).await);

        let second = route(RequestKind::SignMessage, RoutePayload::Inline(json!("hi")));
        let opening = manager.open(&second).await.expect("open");
        assert!(matches!(opening, WindowOpening::Created(id) if id != first_window));
        assert_eq!(windows.focus_count(), 0);

        assert_eq!(windows.finish_closes(), 1);
        assert!(manager.closed(first_window).await.is_none());
        assert_eq!(manager.approval().expect("slot").route_id, second.route_id);
        assert!(manager.is_locked());
    }

    #[tokio::test]
    async fn test_dismiss_of_vanished_window() {
        let (manager, windows, _store) = manager();
        let probe = route(RequestKind::GetAddress, RoutePayload::None);
        let window_id = manager.open(&probe).await.expect("open").window_id();
        windows.forget(window_id);

        assert!(manager.dismiss(window_id).await.is_some());
        assert!(manager.state.lock().closing.is_empty());
        assert_eq!(manager.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_probes_overlap() {
        let (manager, windows, _store) = manager();
        manager
            .open(&route(RequestKind::RequestAccess, RoutePayload::None))
            .await
            .expect("approval");

        for _ in 0..3 {
            let opening = manager
                .open(&route(RequestKind::GetNetwork, RoutePayload::None))
                .await
                .expect("probe");
            assert!(matches!(opening, WindowOpening::Created(_)));
        }
        assert_eq!(manager.probe_count(), 3);
        assert_eq!(windows.created_count(), 4);
        assert!(
            windows
                .open_windows()
                .iter()
                .filter(|w| w.geometry == WindowGeometry::PROBE)
                .count()
                == 3
        );
    }

    #[tokio::test]
    async fn test_create_failure_leaves_slot_empty() {
        let (manager, windows, _store) = manager();
        windows.set_fail_create(true);

        let result = manager
            .open(&route(RequestKind::RequestAccess, RoutePayload::None))
            .await;
        assert!(matches!(result, Err(Error::Window { .. })));
        assert!(manager.approval().is_none());
        assert!(!manager.is_locked());
    }

    #[tokio::test]
    async fn test_restore_live_and_stale() {
        let (windows, _events) = MemoryWindows::new();
        let store = MemoryStore::new();
        let config = WalletConfig::new();

        let first = PopupWindowManager::new(&config, windows.clone(), store.clone()).expect("new");
        let window_id = first
            .open(&route(RequestKind::SignTransaction, RoutePayload::Stored(StorageKey::generate())))
            .await
            .expect("open")
            .window_id();

        let revived = PopupWindowManager::new(&config, windows.clone(), store.clone()).expect("new");
        let restored = revived.restore().await.expect("restored");
        assert_eq!(restored.window_id, window_id);
        assert!(restored.storage_key.is_some());
        assert!(revived.is_locked());

        windows.forget(window_id);
        let stale = PopupWindowManager::new(&config, windows, store.clone()).expect("new");
        assert!(stale.restore().await.is_none());
        assert!(!store.contains(APPROVAL_WINDOW_KEY));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Open(bool),
        AnswerLatest,
        CloseLatest,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            any::<bool>().prop_map(Step::Open),
            Just(Step::AnswerLatest),
            Just(Step::CloseLatest),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_unanswered_approval(steps in proptest::collection::vec(step(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");

            runtime.block_on(async {
                let (manager, windows, _store) = manager();
                let mut routes: Vec<ApprovalRoute> = Vec::new();
                let mut windows_seen: Vec<WindowId> = Vec::new();

                for step in steps {
                    match step {
                        Step::Open(approval) => {
                            let kind = if approval { RequestKind::RequestAccess } else { RequestKind::GetAddress };
                            let route = route(kind, RoutePayload::None);
                            let was_locked = manager.is_locked();
                            match manager.open(&route).await {
                                Ok(opening) => {
                                    prop_assert!(!(approval && was_locked), "opened while locked");
                                    windows_seen.push(opening.window_id());
                                    routes.push(route);
                                }
                                Err(Error::Busy) => {
                                    prop_assert!(approval && was_locked, "busy while unlocked");
                                }
                                Err(e) => prop_assert!(false, "unexpected error: {e}"),
                            }
                        }
                        Step::AnswerLatest => {
                            if let Some(route) = routes.last() {
                                manager.mark_answered(route.route_id).await;
                            }
                        }
                        Step::CloseLatest => {
                            if let Some(window_id) = windows_seen.pop() {
                                windows.user_close(window_id);
                                manager.closed(window_id).await;
                            }
                        }
                    }

                    let open = windows.open_windows();
                    let slot_open = manager
                        .approval()
                        .is_none_or(|slot| open.iter().any(|w| w.window_id == slot.window_id));
                    prop_assert!(slot_open, "approval slot refers to a closed window");
                    prop_assert_eq!(
                        open.iter().filter(|w| w.geometry == WindowGeometry::PROBE).count(),
                        manager.probe_count()
                    );
                }
                Ok(())
            })?;
        }
    }
}
