//! Live-tab registry and event fan-out.
//!
//! A tab is live while its content relay is attached. Broadcasts are best
//! effort: every registered tab is probed concurrently, dead tabs are pruned
//! and skipped, delivery failures are logged and ignored.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::host::{MessageBus, TabProbe};
use crate::identifiers::TabId;
use crate::protocol::{BroadcastEvent, BusEvent, BusMessage};

// ============================================================================
// TabRegistry
// ============================================================================

/// Set of tabs with an attached relay.
pub struct TabRegistry {
    tabs: RwLock<FxHashSet<TabId>>,
    bus: Arc<dyn MessageBus>,
    probe: Arc<dyn TabProbe>,
}

impl TabRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, probe: Arc<dyn TabProbe>) -> Self {
        Self {
            tabs: RwLock::new(FxHashSet::default()),
            bus,
            probe,
        }
    }

    /// Registers a tab. Returns `false` if it was already registered.
    pub fn add(&self, tab_id: TabId) -> bool {
        let added = self.tabs.write().insert(tab_id);
        if added {
            debug!(%tab_id, "Tab registered");
        }
        added
    }

    /// Unregisters a tab. Returns `false` if it was not registered.
    pub fn remove(&self, tab_id: TabId) -> bool {
        let removed = self.tabs.write().remove(&tab_id);
        if removed {
            debug!(%tab_id, "Tab unregistered");
        }
        removed
    }

    /// Returns `true` if the tab is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.read().contains(&tab_id)
    }

    /// Returns the number of registered tabs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.read().len()
    }

    /// Returns `true` if no tab is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.read().is_empty()
    }

    /// Returns the registered tabs in ascending order.
    #[must_use]
    pub fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<_> = self.tabs.read().iter().copied().collect();
        tabs.sort_unstable();
        tabs
    }

    /// Sends an event to every live tab.
    ///
    /// Returns the number of tabs the event was delivered to.
    pub async fn broadcast(&self, app: &str, event: &BroadcastEvent) -> usize {
        let tabs = self.tabs();

        let deliveries = tabs.into_iter().map(|tab_id| {
            let message = BusMessage::Event(BusEvent::new(app, event.clone()));
            async move {
                if !self.probe.is_alive(tab_id).await {
                    trace!(%tab_id, "Skipping dead tab");
                    return (tab_id, None);
                }
                let delivered = match self.bus.send_to_tab(tab_id, message).await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(%tab_id, error = %e, "Event delivery failed");
                        false
                    }
                };
                (tab_id, Some(delivered))
            }
        });

        let results = join_all(deliveries).await;

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (tab_id, result) in results {
            match result {
                Some(true) => delivered += 1,
                Some(false) => {}
                None => dead.push(tab_id),
            }
        }

        if !dead.is_empty() {
            let mut tabs = self.tabs.write();
            for tab_id in &dead {
                tabs.remove(tab_id);
            }
        }

        debug!(kind = %event.kind, delivered, pruned = dead.len(), "Event broadcast");
        delivered
    }
}

// ============================================================================
// Tests
// ============================================================================
